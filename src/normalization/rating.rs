use tracing::debug;

use super::coerce::{coerce, CoercionError};
use crate::legacy::RawValue;
use crate::models::{FieldType, FieldValue};

/// Marker the legacy file uses for "no rating".
pub const NOT_AVAILABLE: &str = "N/A";

/// Rating as read from the legacy file. Keeps "no rating" apart from "rated 0.0" even though
/// the target column cannot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegacyRating {
    Rated(f64),
    NotAvailable,
}

impl LegacyRating {
    /// Interpret a raw `imdb_rating` value. Null, blank, the `N/A` marker, other non-numeric
    /// text, non-finite and negative values are all `NotAvailable`.
    pub fn from_raw(raw: &RawValue) -> Self {
        match coerce(raw, FieldType::Float) {
            Ok(FieldValue::Float(Some(v))) if v.is_finite() && v >= 0.0 => LegacyRating::Rated(v),
            Ok(FieldValue::Float(Some(v))) => {
                debug!(value = v, "rating out of range; treating as not available");
                LegacyRating::NotAvailable
            }
            Err(CoercionError::NotNumeric(text)) if !is_marker(&text) => {
                debug!(value = %text, "unparseable rating; treating as not available");
                LegacyRating::NotAvailable
            }
            _ => LegacyRating::NotAvailable,
        }
    }

    /// Value stored in `film_work.rating`; "no rating" collapses to 0.0.
    pub fn stored(self) -> f64 {
        match self {
            LegacyRating::Rated(v) => v,
            LegacyRating::NotAvailable => 0.0,
        }
    }
}

/// The `N/A` marker is the expected way of saying "no rating" and is not worth a log line.
fn is_marker(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(NOT_AVAILABLE)
}
