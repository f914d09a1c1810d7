//! Domain types
mod ids;
mod track;

pub use ids::{MediaId, TrackId};
pub use track::{StreamSource, Track};
