use serde::{Deserialize, Serialize};

use super::{BackReferences, Entity, EntityType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
    pub classification: Option<String>,
    pub designation: Option<String>,
    pub average_height: Option<String>,
    pub average_lifespan: Option<String>,
    pub hair_colors: Option<String>,
    pub skin_colors: Option<String>,
    pub eye_colors: Option<String>,
    pub homeworld: Option<String>,
    pub language: Option<String>,
    /// Back-references to the people of this species.
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub films: Vec<String>,
}

impl Entity for Species {
    const TYPE: EntityType = EntityType::Species;

    fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl BackReferences for Species {
    const BACK_REFERENCE_FIELD: &'static str = "people";
}
