//! Local persistence: favorites, downloads, visit history and the
//! key-value table behind the settings store, all in one SQLite file.

mod history;
mod places;
mod preferences;
mod schema;
mod types;

pub use history::History;
pub use places::{ConflictPolicy, Downloads, Favorites, PlaceCollection, PlaceRepository};
pub use schema::Database;
pub use types::{DatabaseError, HistoryEntry, Place};
