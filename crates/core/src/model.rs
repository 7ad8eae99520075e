//! # Catalog Model
//!
//! Plain data types shared by the stores, the grouping projection and the
//! presentation layer. No storage or UI concerns live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DexError, DexResult};

/// Canonical stat names, in display order.
pub const STAT_NAMES: [&str; 6] = [
    "hp",
    "attack",
    "defense",
    "sp_attack",
    "sp_defense",
    "speed",
];

/// Map a stat label from any known source spelling onto the canonical vocabulary.
///
/// Accepts `HP`, `Sp. Attack`, `special-defense`, `sp_attack` and similar.
pub fn canonical_stat_name(raw: &str) -> Option<&'static str> {
    let folded: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match folded.as_str() {
        "hp" => Some("hp"),
        "attack" | "atk" => Some("attack"),
        "defense" | "def" => Some("defense"),
        "spattack" | "specialattack" | "spatk" => Some("sp_attack"),
        "spdefense" | "specialdefense" | "spdef" => Some("sp_defense"),
        "speed" | "spe" => Some("speed"),
        _ => None,
    }
}

/// Ordered category tags of an item: a primary tag and an optional secondary one.
///
/// An empty tag list cannot be represented, so every stored item has a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Classification {
    primary: String,
    secondary: Option<String>,
}

impl Classification {
    pub fn new(primary: impl Into<String>, secondary: Option<String>) -> DexResult<Self> {
        let mut tags = vec![primary.into()];
        tags.extend(secondary);
        Self::try_from(tags).map_err(DexError::InvalidItem)
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.secondary.as_deref())
    }
}

impl TryFrom<Vec<String>> for Classification {
    type Error = String;

    fn try_from(tags: Vec<String>) -> Result<Self, Self::Error> {
        let mut tags = tags.into_iter().map(|t| t.trim().to_string());
        let primary = match tags.next() {
            Some(tag) if !tag.is_empty() => tag,
            Some(_) => return Err("primary classification tag is blank".to_string()),
            None => return Err("classification needs at least one tag".to_string()),
        };
        let secondary = tags.next().filter(|t| !t.is_empty());
        if tags.next().is_some() {
            return Err("classification holds at most two tags".to_string());
        }
        Ok(Self { primary, secondary })
    }
}

impl From<Classification> for Vec<String> {
    fn from(c: Classification) -> Self {
        let mut tags = vec![c.primary];
        tags.extend(c.secondary);
        tags
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(f, "{}/{}", self.primary, secondary),
            None => write!(f, "{}", self.primary),
        }
    }
}

/// A single creature record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique positive identifier
    pub id: u32,
    /// Human-readable name
    pub display_name: String,
    /// URL or local path of the display image
    pub image_ref: String,
    /// Primary and optional secondary tag
    pub classification: Classification,
    /// Stat name to value, keyed by the canonical vocabulary
    #[serde(default)]
    pub attributes: BTreeMap<String, i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CatalogItem {
    pub fn new(
        id: u32,
        display_name: impl Into<String>,
        image_ref: impl Into<String>,
        classification: Classification,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            image_ref: image_ref.into(),
            classification,
            attributes: BTreeMap::new(),
            description: None,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: i64) -> Self {
        let key = canonical_stat_name(name).unwrap_or(name);
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn primary_tag(&self) -> &str {
        self.classification.primary()
    }

    /// Check the invariants a persisted item must satisfy.
    pub fn validate(&self) -> DexResult<()> {
        if self.id == 0 {
            return Err(DexError::InvalidItem(format!(
                "'{}' has id 0; ids must be positive",
                self.display_name
            )));
        }
        if let Some(name) = self
            .attributes
            .keys()
            .find(|k| !STAT_NAMES.contains(&k.as_str()))
        {
            return Err(DexError::InvalidItem(format!(
                "item {} has unknown attribute '{}'",
                self.id, name
            )));
        }
        Ok(())
    }
}

/// A name as a plain string or as a localized `{english: ..}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawName {
    Plain(String),
    Localized { english: String },
}

impl RawName {
    pub(crate) fn into_text(self) -> String {
        match self {
            RawName::Plain(name) | RawName::Localized { english: name } => name,
        }
    }
}

/// An image as a single URL or as a set of resolutions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawImage {
    Url(String),
    Variants {
        #[serde(default)]
        hires: Option<String>,
        #[serde(default)]
        thumbnail: Option<String>,
        #[serde(default)]
        sprite: Option<String>,
    },
}

impl RawImage {
    /// Highest resolution available.
    pub(crate) fn best(self) -> Option<String> {
        match self {
            RawImage::Url(url) => Some(url),
            RawImage::Variants {
                hires,
                thumbnail,
                sprite,
            } => hires.or(thumbnail).or(sprite),
        }
    }
}

/// Membership record for a favorited item.
///
/// Name and image are copied from the item so favorites stay displayable even
/// after the item leaves the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredFavorite")]
pub struct FavoriteEntry {
    pub item_id: u32,
    pub display_name: String,
    pub image_ref: String,
    pub favorited_at: DateTime<Utc>,
}

/// Any persisted favorite shape: the current entry, or a whole catalog
/// record with a nested name and image.
#[derive(Deserialize)]
struct StoredFavorite {
    #[serde(alias = "id")]
    item_id: u32,
    #[serde(alias = "name", default)]
    display_name: Option<RawName>,
    #[serde(alias = "image", default)]
    image_ref: Option<RawImage>,
    #[serde(rename = "localImage", default)]
    local_image: Option<String>,
    #[serde(default = "Utc::now")]
    favorited_at: DateTime<Utc>,
}

impl From<StoredFavorite> for FavoriteEntry {
    fn from(stored: StoredFavorite) -> Self {
        Self {
            item_id: stored.item_id,
            display_name: stored
                .display_name
                .map(RawName::into_text)
                .unwrap_or_default(),
            image_ref: stored
                .image_ref
                .and_then(RawImage::best)
                .or(stored.local_image)
                .unwrap_or_default(),
            favorited_at: stored.favorited_at,
        }
    }
}

impl FavoriteEntry {
    pub fn from_item(item: &CatalogItem) -> Self {
        Self {
            item_id: item.id,
            display_name: item.display_name.clone(),
            image_ref: item.image_ref.clone(),
            favorited_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_item(id: u32, tags: &[&str]) -> CatalogItem {
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    let classification = Classification::try_from(tags).expect("valid tags");
    CatalogItem::new(
        id,
        format!("Creature {}", id),
        format!("images/{:03}.png", id),
        classification,
    )
    .with_attribute("HP", 45)
    .with_attribute("Sp. Attack", 65)
}
