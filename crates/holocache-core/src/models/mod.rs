//! Data models for the Star Wars dataset.
//!
//! Records are persisted in their generic form (`Record`) so that every field the
//! remote API returns survives a round trip through the store. Typed views are
//! decoded from records on the read path:
//!
//! - `Person`: characters, the root of every relation lookup
//! - `Planet`: homeworlds
//! - `Starship`, `Vehicle`: craft, back-referencing their pilots
//! - `Species`: back-referencing their people
//! - `Film`: back-referencing their characters

pub mod craft;
pub mod entity;
pub mod film;
pub mod person;
pub mod planet;
pub mod record;
pub mod species;

pub use craft::{Starship, Vehicle};
pub use entity::{BackReferences, Entity, EntityType};
pub use film::Film;
pub use person::Person;
pub use planet::Planet;
pub use record::Record;
pub use species::Species;
