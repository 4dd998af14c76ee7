use serde::{Deserialize, Serialize};

use super::{Entity, EntityType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
    pub diameter: Option<String>,
    pub rotation_period: Option<String>,
    pub orbital_period: Option<String>,
    pub gravity: Option<String>,
    pub population: Option<String>,
    pub climate: Option<String>,
    pub terrain: Option<String>,
    pub surface_water: Option<String>,
    #[serde(default)]
    pub residents: Vec<String>,
    #[serde(default)]
    pub films: Vec<String>,
}

impl Entity for Planet {
    const TYPE: EntityType = EntityType::Planets;

    fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
