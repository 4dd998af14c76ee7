//! Starships and vehicles. Both list their pilots as back-references.

use serde::{Deserialize, Serialize};

use super::{BackReferences, Entity, EntityType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Starship {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
    pub model: Option<String>,
    pub starship_class: Option<String>,
    pub manufacturer: Option<String>,
    pub cost_in_credits: Option<String>,
    pub length: Option<String>,
    pub crew: Option<String>,
    pub passengers: Option<String>,
    pub max_atmosphering_speed: Option<String>,
    pub hyperdrive_rating: Option<String>,
    #[serde(rename = "MGLT")]
    pub mglt: Option<String>,
    pub cargo_capacity: Option<String>,
    pub consumables: Option<String>,
    #[serde(default)]
    pub pilots: Vec<String>,
    #[serde(default)]
    pub films: Vec<String>,
}

impl Entity for Starship {
    const TYPE: EntityType = EntityType::Starships;

    fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl BackReferences for Starship {
    const BACK_REFERENCE_FIELD: &'static str = "pilots";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
    pub model: Option<String>,
    pub vehicle_class: Option<String>,
    pub manufacturer: Option<String>,
    pub cost_in_credits: Option<String>,
    pub length: Option<String>,
    pub crew: Option<String>,
    pub passengers: Option<String>,
    pub max_atmosphering_speed: Option<String>,
    pub cargo_capacity: Option<String>,
    pub consumables: Option<String>,
    #[serde(default)]
    pub pilots: Vec<String>,
    #[serde(default)]
    pub films: Vec<String>,
}

impl Entity for Vehicle {
    const TYPE: EntityType = EntityType::Vehicles;

    fn uid(&self) -> &str {
        &self.uid
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl BackReferences for Vehicle {
    const BACK_REFERENCE_FIELD: &'static str = "pilots";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use serde_json::json;

    #[test]
    fn test_starship_pilot_back_references() {
        let record = Record::new("12", "X-wing")
            .with("MGLT", "100")
            .with("pilots", json!(["https://www.swapi.tech/api/people/1"]));
        let ship: Starship = record.decode().unwrap();
        assert_eq!(ship.mglt.as_deref(), Some("100"));
        assert!(Starship::record_references(&record, "https://www.swapi.tech/api/people/1"));
        assert!(!Starship::record_references(&record, "https://www.swapi.tech/api/people/10"));
    }

    #[test]
    fn test_null_pilots_match_nobody() {
        let record = Record::new("4", "Sand Crawler").with("pilots", json!(null));
        assert!(!Vehicle::record_references(&record, "https://www.swapi.tech/api/people/1"));
        assert!(record.decode::<Vehicle>().is_err());
    }
}
