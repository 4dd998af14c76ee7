use serde::{Deserialize, Serialize};

use super::{BackReferences, Entity, EntityType};

/// A film. The stored `name` is the title; the listing payload already carries
/// every detail field, so films never go through a detail phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub episode_id: Option<i64>,
    pub opening_crawl: Option<String>,
    pub director: Option<String>,
    pub producer: Option<String>,
    pub release_date: Option<String>,
    pub description: Option<String>,
    /// Back-references to the characters appearing in this film.
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub planets: Vec<String>,
    #[serde(default)]
    pub starships: Vec<String>,
    #[serde(default)]
    pub vehicles: Vec<String>,
    #[serde(default)]
    pub species: Vec<String>,
}

impl Entity for Film {
    const TYPE: EntityType = EntityType::Films;

    fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl BackReferences for Film {
    const BACK_REFERENCE_FIELD: &'static str = "characters";
}
