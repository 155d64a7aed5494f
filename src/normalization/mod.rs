//! Legacy rows → normalized entities.
pub mod coerce;
pub mod identity;
pub mod normalizer;
pub mod rating;

pub use coerce::{coerce, CoercionError};
pub use normalizer::normalize;
pub use rating::LegacyRating;
