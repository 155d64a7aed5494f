//! Legacy raw value → typed target value, driven by the declared `FieldType`.
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::legacy::RawValue;
use crate::models::{FieldType, FieldValue};

#[derive(Error, Debug, PartialEq)]
pub enum CoercionError {
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("'{0}' is not a UUID")]
    InvalidUuid(String),
    #[error("'{0}' is not an ISO-8601 date")]
    InvalidDate(String),
    #[error("'{0}' is not an ISO-8601 timestamp")]
    InvalidTimestamp(String),
    #[error("'{value}' is not one of {allowed:?}")]
    UnknownVariant {
        value: String,
        allowed: &'static [&'static str],
    },
}

/// Converts one legacy value into the representation of a field of type `ty`.
///
/// Text is trimmed and blank text counts as absent for every type. Null becomes the absent
/// value of `ty`.
pub fn coerce(raw: &RawValue, ty: FieldType) -> Result<FieldValue, CoercionError> {
    match ty {
        FieldType::Text => Ok(FieldValue::Text(text(raw))),
        FieldType::Float => float(raw).map(FieldValue::Float),
        FieldType::Uuid => uuid(raw).map(FieldValue::Uuid),
        FieldType::Date => {
            let Some(t) = text(raw) else {
                return Ok(FieldValue::Date(None));
            };
            parse_date(&t)
                .map(|d| FieldValue::Date(Some(d)))
                .ok_or(CoercionError::InvalidDate(t))
        }
        FieldType::Timestamp => {
            let Some(t) = text(raw) else {
                return Ok(FieldValue::Timestamp(None));
            };
            parse_timestamp(&t)
                .map(|ts| FieldValue::Timestamp(Some(ts)))
                .ok_or(CoercionError::InvalidTimestamp(t))
        }
        FieldType::Enum(allowed) => match text(raw) {
            None => Ok(FieldValue::Text(None)),
            Some(t) if allowed.contains(&t.as_str()) => Ok(FieldValue::Text(Some(t))),
            Some(value) => Err(CoercionError::UnknownVariant { value, allowed }),
        },
    }
}

fn text(raw: &RawValue) -> Option<String> {
    let t = raw.as_text()?;
    let trimmed = t.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn float(raw: &RawValue) -> Result<Option<f64>, CoercionError> {
    match raw {
        RawValue::Integer(i) => Ok(Some(*i as f64)),
        RawValue::Real(f) => Ok(Some(*f)),
        other => match text(other) {
            None => Ok(None),
            Some(t) => t
                .parse::<f64>()
                .map(Some)
                .map_err(|_| CoercionError::NotNumeric(t)),
        },
    }
}

fn uuid(raw: &RawValue) -> Result<Option<Uuid>, CoercionError> {
    if let RawValue::Blob(bytes) = raw {
        if bytes.len() == 16 {
            return Uuid::from_slice(bytes)
                .map(Some)
                .map_err(|_| CoercionError::InvalidUuid(format!("{bytes:?}")));
        }
    }
    match text(raw) {
        None => Ok(None),
        Some(t) => Uuid::parse_str(&t)
            .map(Some)
            .map_err(|_| CoercionError::InvalidUuid(t)),
    }
}

fn parse_date(t: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(t).map(|ts| ts.date_naive()))
}

fn parse_timestamp(t: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(t) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(t, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PERSON_ROLES;
    use chrono::{Datelike, Timelike};

    fn txt(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn text_is_trimmed_and_blank_is_absent() {
        assert_eq!(
            coerce(&txt("  Star Wars "), FieldType::Text),
            Ok(FieldValue::Text(Some("Star Wars".into())))
        );
        assert_eq!(coerce(&txt("   "), FieldType::Text), Ok(FieldValue::Text(None)));
        assert_eq!(coerce(&RawValue::Null, FieldType::Text), Ok(FieldValue::Text(None)));
        assert_eq!(
            coerce(&RawValue::Integer(42), FieldType::Text),
            Ok(FieldValue::Text(Some("42".into())))
        );
    }

    #[test]
    fn quotes_are_kept_verbatim_for_bind_parameters() {
        assert_eq!(
            coerce(&txt("Schindler's List"), FieldType::Text),
            Ok(FieldValue::Text(Some("Schindler's List".into())))
        );
    }

    #[test]
    fn floats_from_numbers_and_text() {
        assert_eq!(coerce(&txt("7.8"), FieldType::Float), Ok(FieldValue::Float(Some(7.8))));
        assert_eq!(coerce(&RawValue::Integer(7), FieldType::Float), Ok(FieldValue::Float(Some(7.0))));
        assert_eq!(coerce(&RawValue::Null, FieldType::Float), Ok(FieldValue::Float(None)));
        assert_eq!(
            coerce(&txt("N/A"), FieldType::Float),
            Err(CoercionError::NotNumeric("N/A".into()))
        );
    }

    #[test]
    fn uuids_from_text_and_blob() {
        let id = Uuid::new_v4();
        assert_eq!(
            coerce(&txt(&id.to_string()), FieldType::Uuid),
            Ok(FieldValue::Uuid(Some(id)))
        );
        assert_eq!(
            coerce(&RawValue::Blob(id.as_bytes().to_vec()), FieldType::Uuid),
            Ok(FieldValue::Uuid(Some(id)))
        );
        assert!(matches!(
            coerce(&txt("tt0076759"), FieldType::Uuid),
            Err(CoercionError::InvalidUuid(_))
        ));
    }

    #[test]
    fn dates_from_iso_text() {
        let FieldValue::Date(Some(d)) = coerce(&txt("1977-05-25"), FieldType::Date).unwrap() else {
            panic!("expected a date");
        };
        assert_eq!((d.year(), d.month(), d.day()), (1977, 5, 25));

        assert_eq!(
            coerce(&txt("2021-06-16T20:14:09"), FieldType::Date),
            Ok(FieldValue::Date(NaiveDate::from_ymd_opt(2021, 6, 16)))
        );
        assert_eq!(
            coerce(&txt("16/06/2021"), FieldType::Date),
            Err(CoercionError::InvalidDate("16/06/2021".into()))
        );
    }

    #[test]
    fn timestamps_accept_rfc3339_and_naive_forms() {
        let FieldValue::Timestamp(Some(ts)) =
            coerce(&txt("2021-06-16T20:14:09+03:00"), FieldType::Timestamp).unwrap()
        else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts.hour(), 17);

        let FieldValue::Timestamp(Some(ts)) =
            coerce(&txt("2021-06-16 20:14:09.5"), FieldType::Timestamp).unwrap()
        else {
            panic!("expected a timestamp");
        };
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (20, 14, 9));

        assert!(matches!(
            coerce(&txt("yesterday"), FieldType::Timestamp),
            Err(CoercionError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn enums_only_accept_declared_variants() {
        let ty = FieldType::Enum(PERSON_ROLES);
        assert_eq!(coerce(&txt(" writer "), ty), Ok(FieldValue::Text(Some("writer".into()))));
        assert_eq!(coerce(&RawValue::Null, ty), Ok(FieldValue::Text(None)));
        assert!(matches!(
            coerce(&txt("gaffer"), ty),
            Err(CoercionError::UnknownVariant { .. })
        ));
    }
}
