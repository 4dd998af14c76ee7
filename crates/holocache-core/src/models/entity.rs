use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::Record;

/// One of the six remote dataset categories.
///
/// Declaration order is the sync order: films first because they need no detail
/// phase and other views depend on their per-person back-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Films,
    People,
    Planets,
    Starships,
    Vehicles,
    Species,
}

impl EntityType {
    /// Every entity type, in the order a sync walks them.
    pub const SYNC_ORDER: [EntityType; 6] = [
        EntityType::Films,
        EntityType::People,
        EntityType::Planets,
        EntityType::Starships,
        EntityType::Vehicles,
        EntityType::Species,
    ];

    /// Path segment used by the remote API and the name of the local table.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Films => "films",
            EntityType::People => "people",
            EntityType::Planets => "planets",
            EntityType::Starships => "starships",
            EntityType::Vehicles => "vehicles",
            EntityType::Species => "species",
        }
    }

    /// Listings of this type already carry full detail nested under `properties`.
    pub fn has_inline_detail(&self) -> bool {
        matches!(self, EntityType::Films)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::SYNC_ORDER
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown entity type: {}", s))
    }
}

/// A typed view over a stored record.
pub trait Entity: DeserializeOwned {
    const TYPE: EntityType;

    fn uid(&self) -> &str;

    /// Canonical url, the token other entities use to reference this one.
    fn url(&self) -> Option<&str>;
}

/// Entities that list the people pointing at them.
pub trait BackReferences: Entity {
    /// Stored field holding the list of person urls.
    const BACK_REFERENCE_FIELD: &'static str;

    /// Whether a stored record of this type lists `person_url`. Missing,
    /// null or malformed lists count as no match.
    fn record_references(record: &Record, person_url: &str) -> bool {
        record
            .references(Self::BACK_REFERENCE_FIELD)
            .any(|url| url == person_url)
    }
}
