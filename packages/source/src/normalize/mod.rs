//! Pure mapping from upstream JSON items to [`CanonicalRecord`]s.
//!
//! Each domain has a typed raw schema and a `normalize` function. Every
//! field other than the identifying ones is read through [`Field`], so a
//! value of the wrong JSON type is treated like a missing one: it is
//! replaced with a domain-appropriate default and reported in
//! [`Normalized::Partial`]. Only items whose identifying fields are missing
//! or unusable come back as [`Normalized::Malformed`]. Nothing here performs
//! I/O or panics.

pub mod apod;
pub mod donki;
pub mod eonet;
pub mod epic;
pub mod exoplanet;
pub mod launch;
pub mod mars;
pub mod neo;
pub mod news;
pub mod rover;
pub mod spacex;

use astro_sync_domain_models::{CanonicalRecord, Domain};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Outcome of normalizing one upstream item.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Every expected field was present.
    Complete(CanonicalRecord),
    /// Usable record with defaults substituted for the listed fields.
    Partial {
        record: CanonicalRecord,
        defaulted: Vec<&'static str>,
    },
    /// Identifying fields are missing or the item has the wrong shape.
    Malformed { reason: String },
}

impl Normalized {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// The record, if the item was usable.
    #[must_use]
    pub fn into_record(self) -> Option<CanonicalRecord> {
        match self {
            Self::Complete(record) | Self::Partial { record, .. } => Some(record),
            Self::Malformed { .. } => None,
        }
    }

    #[must_use]
    pub const fn record(&self) -> Option<&CanonicalRecord> {
        match self {
            Self::Complete(record) | Self::Partial { record, .. } => Some(record),
            Self::Malformed { .. } => None,
        }
    }

    /// Fields that were defaulted. Empty for complete and malformed items.
    #[must_use]
    pub fn defaulted(&self) -> &[&'static str] {
        match self {
            Self::Partial { defaulted, .. } => defaulted,
            _ => &[],
        }
    }
}

/// Normalizes one raw item of `domain`.
#[must_use]
pub fn normalize(domain: Domain, raw: &Value) -> Normalized {
    if !raw.is_object() {
        return Normalized::malformed(format!("{domain}: expected a JSON object, got {raw}"));
    }
    match domain {
        Domain::Apod => apod::normalize(raw),
        Domain::NearEarthObjects => neo::normalize(raw),
        Domain::MarsPhotos => mars::normalize(raw),
        Domain::MarsRovers => rover::normalize(raw),
        Domain::Epic => epic::normalize(raw),
        Domain::SpaceWeather => donki::normalize(raw),
        Domain::NaturalEvents => eonet::normalize(raw),
        Domain::News => news::normalize(raw),
        Domain::Launches => launch::normalize(raw),
        Domain::Rockets => spacex::rocket(raw),
        Domain::Launchpads => spacex::launchpad(raw),
        Domain::SpacexHistory => spacex::history_event(raw),
        Domain::SpacexMissions => spacex::mission(raw),
        Domain::Starlink => spacex::starlink(raw),
        Domain::Cores => spacex::core(raw),
        Domain::Capsules => spacex::capsule(raw),
        Domain::Exoplanets => exoplanet::normalize(raw),
    }
}

/// Deserializes `raw` into a domain's raw schema.
fn parse<T: DeserializeOwned>(domain: Domain, raw: &Value) -> Result<T, Normalized> {
    T::deserialize(raw).map_err(|e| Normalized::malformed(format!("{domain}: {e}")))
}

/// A non-identifying field of a raw payload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Field<T> {
    Missing,
    Present(T),
    /// The upstream sent a value of another JSON type.
    Invalid,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Missing
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Self::Present)
    }
}

impl<T> Field<T> {
    pub(crate) fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Missing | Self::Invalid => None,
        }
    }
}

impl<T: DeserializeOwned> Field<T> {
    fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::Missing;
        }
        if let Ok(parsed) = T::deserialize(value) {
            return Self::Present(parsed);
        }
        numeric_string(value)
            .and_then(|coerced| T::deserialize(&coerced).ok())
            .map_or(Self::Invalid, Self::Present)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Self::from_value(&value))
    }
}

/// `"21.6"` as `21.6`, `"true"` as `true`.
fn numeric_string(value: &Value) -> Option<Value> {
    let Value::String(s) = value else {
        return None;
    };
    serde_json::from_str::<Value>(s.trim())
        .ok()
        .filter(|v| v.is_number() || v.is_boolean())
}

/// Tracks which fields fell back to defaults while building a record.
#[derive(Debug, Default)]
struct Defaults(Vec<&'static str>);

impl Defaults {
    fn push(&mut self, field: &'static str) {
        if !self.0.contains(&field) {
            self.0.push(field);
        }
    }

    /// The value of an optional field. Invalid values are reported.
    fn take<T>(&mut self, field: &'static str, value: Field<T>) -> Option<T> {
        match value {
            Field::Present(value) => Some(value),
            Field::Missing => None,
            Field::Invalid => {
                self.push(field);
                None
            }
        }
    }

    fn or<T>(&mut self, field: &'static str, value: impl Into<Field<T>>, default: T) -> T {
        match value.into() {
            Field::Present(value) => value,
            Field::Missing | Field::Invalid => {
                self.push(field);
                default
            }
        }
    }

    fn text(&mut self, field: &'static str, value: impl Into<Field<String>>) -> String {
        let value = match value.into() {
            Field::Present(s) if s.is_empty() => Field::Missing,
            other => other,
        };
        self.or(field, value, String::new())
    }

    fn finish(self, record: CanonicalRecord) -> Normalized {
        if self.0.is_empty() {
            Normalized::Complete(record)
        } else {
            Normalized::Partial {
                record,
                defaulted: self.0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn non_objects_are_malformed_for_every_domain() {
        for raw in [json!(null), json!([1, 2]), json!("apod"), json!(42)] {
            assert!(matches!(
                normalize(Domain::Apod, &raw),
                Normalized::Malformed { .. }
            ));
            assert!(normalize(Domain::Launches, &raw).into_record().is_none());
        }
    }

    #[test]
    fn wrong_optional_type_is_defaulted_not_malformed() {
        let normalized = normalize(
            Domain::Apod,
            &json!({"date": "2024-05-01", "title": "T", "url": "http://x", "copyright": 42}),
        );
        assert!(normalized.defaulted().contains(&"copyright"));
        let record = normalized.into_record().unwrap();
        assert_eq!(record.external_key, "apod_20240501");
    }

    #[test]
    fn wrong_identifying_type_is_malformed() {
        let normalized = normalize(Domain::Apod, &json!({"date": 20_240_501, "title": "T"}));
        let Normalized::Malformed { reason } = normalized else {
            panic!("expected malformed, got {normalized:?}");
        };
        assert!(reason.starts_with("apod:"));
    }

    #[test]
    fn field_reads_present_missing_and_invalid_values() {
        assert_eq!(Field::<f64>::from_value(&json!(1.5)), Field::Present(1.5));
        assert_eq!(Field::<f64>::from_value(&json!(" 21.6 ")), Field::Present(21.6));
        assert_eq!(Field::<bool>::from_value(&json!("true")), Field::Present(true));
        assert_eq!(Field::<f64>::from_value(&json!(null)), Field::Missing);
        assert_eq!(Field::<f64>::from_value(&json!("n/a")), Field::Invalid);
        assert_eq!(Field::<String>::from_value(&json!(42)), Field::Invalid);
        assert_eq!(Field::<Vec<String>>::from_value(&json!({"a": 1})), Field::Invalid);
    }

    #[test]
    fn defaults_report_missing_fields() {
        let mut defaults = Defaults::default();
        assert_eq!(defaults.text("title", None), "");
        assert_eq!(defaults.text("url", Some(String::new())), "");
        assert!(defaults.or("featured", Some(true), false));
        assert_eq!(defaults.take("hdurl", Field::<String>::Invalid), None);
        assert_eq!(defaults.take("copyright", Field::<String>::Missing), None);
        assert_eq!(defaults.text("title", Field::Invalid), "");
        assert_eq!(defaults.0, vec!["title", "url", "hdurl"]);
    }
}
