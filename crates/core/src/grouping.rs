//! # Grouping
//!
//! Read-time projections of the catalog: a flat list annotated with favorite
//! status, and a partition by primary classification tag. Pure and
//! synchronous; nothing here touches storage.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::CatalogItem;

/// A catalog item joined with the favorites set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub is_favorite: bool,
}

impl AnnotatedItem {
    pub fn new(item: CatalogItem, favorites: &HashSet<u32>) -> Self {
        let is_favorite = favorites.contains(&item.id);
        Self { item, is_favorite }
    }
}

/// Order in which groups are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Order in which each primary tag first appears in the input
    #[default]
    FirstSeen,
    /// Lexicographic order of the tag strings
    Alphabetical,
}

/// Items sharing one primary tag, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub tag: String,
    pub items: Vec<AnnotatedItem>,
}

/// The catalog partitioned by primary classification tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedCatalog {
    groups: Vec<Group>,
}

impl GroupedCatalog {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }

    pub fn get(&self, tag: &str) -> Option<&[AnnotatedItem]> {
        self.groups
            .iter()
            .find(|g| g.tag == tag)
            .map(|g| g.items.as_slice())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.tag.as_str())
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of items across all groups
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

/// Partition `items` by primary tag, groups in first-seen order.
pub fn group(items: &[CatalogItem], favorites: &HashSet<u32>) -> GroupedCatalog {
    group_with_order(items, favorites, GroupOrder::FirstSeen)
}

pub fn group_with_order(
    items: &[CatalogItem],
    favorites: &HashSet<u32>,
    order: GroupOrder,
) -> GroupedCatalog {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items {
        let tag = item.primary_tag();
        let slot = *index.entry(tag).or_insert_with(|| {
            groups.push(Group {
                tag: tag.to_string(),
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot]
            .items
            .push(AnnotatedItem::new(item.clone(), favorites));
    }

    if order == GroupOrder::Alphabetical {
        groups.sort_by(|a, b| a.tag.cmp(&b.tag));
    }

    GroupedCatalog { groups }
}

/// Flat list view: every item with its favorite flag, sorted by id.
pub fn annotate(items: &[CatalogItem], favorites: &HashSet<u32>) -> Vec<AnnotatedItem> {
    let mut annotated: Vec<AnnotatedItem> = items
        .iter()
        .cloned()
        .map(|item| AnnotatedItem::new(item, favorites))
        .collect();
    annotated.sort_by_key(|a| a.item.id);
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_item;

    fn ids(items: &[AnnotatedItem]) -> Vec<u32> {
        items.iter().map(|a| a.item.id).collect()
    }

    #[test]
    fn test_fire_water_scenario() {
        let catalog = vec![
            sample_item(1, &["fire"]),
            sample_item(2, &["water"]),
            sample_item(3, &["fire"]),
        ];

        let grouped = group(&catalog, &HashSet::new());

        assert_eq!(grouped.tags().collect::<Vec<_>>(), vec!["fire", "water"]);
        assert_eq!(ids(grouped.get("fire").unwrap()), vec![1, 3]);
        assert_eq!(ids(grouped.get("water").unwrap()), vec![2]);
        assert!(grouped.get("grass").is_none());
    }

    #[test]
    fn test_partition_has_no_drops_or_duplicates() {
        let tags = ["Grass", "Fire", "Water", "Bug", "Normal"];
        let catalog: Vec<CatalogItem> = (1..=40)
            .map(|id| {
                let primary = tags[(id as usize * 7) % tags.len()];
                let secondary = tags[(id as usize * 3) % tags.len()];
                sample_item(id, &[primary, secondary])
            })
            .collect();

        let grouped = group(&catalog, &HashSet::new());

        assert_eq!(grouped.item_count(), catalog.len());
        let mut seen: Vec<u32> = grouped
            .groups()
            .iter()
            .flat_map(|g| g.items.iter().map(|a| a.item.id))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=40).collect::<Vec<u32>>());

        for g in grouped.groups() {
            assert!(g.items.iter().all(|a| a.item.primary_tag() == g.tag));
        }
    }

    #[test]
    fn test_secondary_tag_does_not_create_membership() {
        let catalog = vec![sample_item(1, &["Grass", "Poison"])];
        let grouped = group(&catalog, &HashSet::new());

        assert_eq!(grouped.len(), 1);
        assert!(grouped.get("Poison").is_none());
    }

    #[test]
    fn test_first_seen_order_is_not_alphabetical() {
        let catalog = vec![
            sample_item(1, &["Water"]),
            sample_item(2, &["Bug"]),
            sample_item(3, &["Fire"]),
            sample_item(4, &["Bug"]),
        ];

        let first_seen = group(&catalog, &HashSet::new());
        assert_eq!(
            first_seen.tags().collect::<Vec<_>>(),
            vec!["Water", "Bug", "Fire"]
        );

        let alphabetical = group_with_order(&catalog, &HashSet::new(), GroupOrder::Alphabetical);
        assert_eq!(
            alphabetical.tags().collect::<Vec<_>>(),
            vec!["Bug", "Fire", "Water"]
        );
        assert_eq!(ids(alphabetical.get("Bug").unwrap()), vec![2, 4]);
    }

    #[test]
    fn test_within_group_order_follows_input() {
        let catalog = vec![
            sample_item(9, &["Fire"]),
            sample_item(2, &["Fire"]),
            sample_item(5, &["Fire"]),
        ];
        let grouped = group(&catalog, &HashSet::new());
        assert_eq!(ids(grouped.get("Fire").unwrap()), vec![9, 2, 5]);
    }

    #[test]
    fn test_favorites_are_annotated() {
        let catalog = vec![sample_item(1, &["fire"]), sample_item(2, &["water"])];
        let favorites = HashSet::from([2, 77]);

        let grouped = group(&catalog, &favorites);
        assert!(!grouped.get("fire").unwrap()[0].is_favorite);
        assert!(grouped.get("water").unwrap()[0].is_favorite);
    }

    #[test]
    fn test_empty_catalog() {
        let grouped = group(&[], &HashSet::new());
        assert!(grouped.is_empty());
        assert_eq!(grouped.item_count(), 0);
    }

    #[test]
    fn test_annotate_sorts_by_id() {
        let catalog = vec![sample_item(3, &["a"]), sample_item(1, &["b"])];
        let annotated = annotate(&catalog, &HashSet::from([3]));
        assert_eq!(ids(&annotated), vec![1, 3]);
        assert!(annotated[1].is_favorite);
    }

    #[test]
    fn test_grouped_catalog_serializes_as_list() {
        let catalog = vec![sample_item(1, &["fire"])];
        let json = serde_json::to_value(group(&catalog, &HashSet::new())).unwrap();
        assert_eq!(json[0]["tag"], "fire");
        assert_eq!(json[0]["items"][0]["id"], 1);
        assert_eq!(json[0]["items"][0]["is_favorite"], false);
    }
}
