//! Read-time resolution of a person's related entities.
//!
//! The dataset declares relations inconsistently: a person reliably carries
//! forward references only for its homeworld and films, while species,
//! starships and vehicles are only reliable as back-references on the related
//! entity. Nothing is denormalized at write time (related tables may still be
//! empty mid-sync), so resolution scans both directions here instead.
//!
//! | relation  | path                                               |
//! |-----------|----------------------------------------------------|
//! | homeworld | forward: `person.homeworld` → planets table        |
//! | species   | back: `species.people` contains the person url     |
//! | starships | back: `starships.pilots` contains the person url   |
//! | vehicles  | back: `vehicles.pilots` contains the person url    |
//! | films     | forward `person.films` **and** back `film.characters` |
//!
//! Films are the union of both paths without deduplication, so a film listed
//! on both sides appears twice. Set `dedupe_films` to keep one entry per uid.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RelationConfig;
use crate::models::{BackReferences, Entity, EntityType, Film, Person, Planet, Record, Species, Starship, Vehicle};
use crate::store::{EntityStore, StoreError};
use crate::utils::extract_uid;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonRelations {
    pub homeworld: Option<Planet>,
    pub species: Vec<Species>,
    pub starships: Vec<Starship>,
    pub vehicles: Vec<Vehicle>,
    pub films: Vec<Film>,
}

/// A person together with everything related to them, as a detail view needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonWithRelations {
    #[serde(flatten)]
    pub person: Person,
    pub relations: PersonRelations,
}

#[derive(Clone)]
pub struct RelationResolver {
    store: Arc<dyn EntityStore>,
    dedupe_films: bool,
}

impl RelationResolver {
    pub fn new(store: Arc<dyn EntityStore>, config: &RelationConfig) -> Self {
        Self {
            store,
            dedupe_films: config.dedupe_films,
        }
    }

    pub fn resolve(&self, person: &Person) -> Result<PersonRelations, StoreError> {
        let homeworld = match person.homeworld.as_deref() {
            Some(url) => self.lookup::<Planet>(url)?,
            None => None,
        };

        let (species, starships, vehicles) = match person.url() {
            Some(url) => (
                self.back_referencing::<Species>(url)?,
                self.back_referencing::<Starship>(url)?,
                self.back_referencing::<Vehicle>(url)?,
            ),
            None => Default::default(),
        };

        let mut films = Vec::new();
        for url in &person.films {
            if let Some(film) = self.lookup::<Film>(url)? {
                films.push(film);
            }
        }
        if let Some(url) = person.url() {
            films.extend(self.back_referencing::<Film>(url)?);
        }
        if self.dedupe_films {
            let mut seen = HashSet::new();
            films.retain(|film| seen.insert(film.uid().to_string()));
        }

        debug!(
            person = %person.uid,
            homeworld = homeworld.is_some(),
            species = species.len(),
            starships = starships.len(),
            vehicles = vehicles.len(),
            films = films.len(),
            "Relations resolved"
        );

        Ok(PersonRelations {
            homeworld,
            species,
            starships,
            vehicles,
            films,
        })
    }

    /// Load a person by uid and resolve their relations. `None` if the person
    /// is not in the store.
    pub fn person_with_relations(&self, uid: &str) -> Result<Option<PersonWithRelations>, StoreError> {
        let Some(record) = self.store.get(EntityType::People, uid)? else {
            return Ok(None);
        };
        let person: Person = decode(&record)?;
        let relations = self.resolve(&person)?;
        Ok(Some(PersonWithRelations { person, relations }))
    }

    /// Forward reference: uid from the url, then a direct lookup.
    fn lookup<T: Entity>(&self, url: &str) -> Result<Option<T>, StoreError> {
        let Some(uid) = extract_uid(url) else {
            debug!(url, "Reference url has no uid");
            return Ok(None);
        };
        Ok(self
            .store
            .get(T::TYPE, uid)?
            .and_then(|record| decode_or_skip(&record)))
    }

    /// Back reference: every record of the type whose list names the person.
    /// Matching happens on the stored record, so unrelated rows are never
    /// decoded.
    fn back_referencing<T: BackReferences>(&self, person_url: &str) -> Result<Vec<T>, StoreError> {
        Ok(self
            .store
            .get_all(T::TYPE)?
            .iter()
            .filter(|record| T::record_references(record, person_url))
            .filter_map(decode_or_skip)
            .collect())
    }
}

/// Decode a related row, logging and dropping it if it does not fit the
/// typed view.
pub(crate) fn decode_or_skip<T: Entity>(record: &Record) -> Option<T> {
    match record.decode() {
        Ok(entity) => Some(entity),
        Err(e) => {
            warn!(table = %T::TYPE, uid = %record.uid, error = %e, "Skipping undecodable row");
            None
        }
    }
}

fn decode<T: Entity>(record: &Record) -> Result<T, StoreError> {
    record.decode().map_err(|source| StoreError::Decode {
        table: T::TYPE.to_string(),
        source,
    })
}
