use serde::{Deserialize, Serialize};

use super::{Entity, EntityType};

/// A character. Relation fields on the person side are forward references;
/// only `homeworld` and `films` are reliably populated by the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
    pub height: Option<String>,
    pub mass: Option<String>,
    pub hair_color: Option<String>,
    pub skin_color: Option<String>,
    pub eye_color: Option<String>,
    pub birth_year: Option<String>,
    pub gender: Option<String>,
    pub homeworld: Option<String>,
    #[serde(default)]
    pub films: Vec<String>,
    #[serde(default)]
    pub species: Vec<String>,
    #[serde(default)]
    pub starships: Vec<String>,
    #[serde(default)]
    pub vehicles: Vec<String>,
}

impl Entity for Person {
    const TYPE: EntityType = EntityType::People;

    fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl Person {
    /// Attributes worth showing in a detail view, skipping unknown values.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        [
            ("Birth Year", &self.birth_year),
            ("Gender", &self.gender),
            ("Height", &self.height),
            ("Mass", &self.mass),
            ("Hair Color", &self.hair_color),
            ("Skin Color", &self.skin_color),
            ("Eye Color", &self.eye_color),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty() && *v != "n/a" && *v != "unknown")
                .map(|v| (label, v))
        })
        .collect()
    }
}
