//! Near-earth objects from the NEO feed.

use astro_sync_domain_models::{CanonicalRecord, CloseApproach, Domain, DomainFields, NeoFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_date, value_to_key};

#[derive(Debug, Deserialize)]
struct RawNeo {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    neo_reference_id: Option<Value>,
    #[serde(default)]
    name: Field<String>,
    #[serde(default)]
    designation: Field<String>,
    #[serde(default)]
    is_potentially_hazardous_asteroid: Field<bool>,
    #[serde(default)]
    estimated_diameter: Field<RawDiameters>,
    #[serde(default)]
    absolute_magnitude_h: Field<f64>,
    #[serde(default)]
    is_sentry_object: Field<bool>,
    #[serde(default)]
    close_approach_data: Field<Vec<RawApproach>>,
}

#[derive(Debug, Deserialize)]
struct RawDiameters {
    #[serde(default)]
    kilometers: Field<RawRange>,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    #[serde(default)]
    estimated_diameter_min: Field<f64>,
    #[serde(default)]
    estimated_diameter_max: Field<f64>,
}

#[derive(Debug, Deserialize)]
struct RawApproach {
    #[serde(default)]
    close_approach_date: Field<String>,
    #[serde(default)]
    close_approach_date_full: Field<String>,
    #[serde(default)]
    relative_velocity: Field<RawVelocity>,
    #[serde(default)]
    miss_distance: Field<RawDistance>,
    #[serde(default)]
    orbiting_body: Field<String>,
}

// Velocities and distances arrive as numeric strings.
#[derive(Debug, Deserialize)]
struct RawVelocity {
    #[serde(default)]
    kilometers_per_hour: Field<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDistance {
    #[serde(default)]
    kilometers: Field<f64>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawNeo = match parse(Domain::NearEarthObjects, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(id) = raw
        .id
        .as_ref()
        .and_then(value_to_key)
        .or_else(|| raw.neo_reference_id.as_ref().and_then(value_to_key))
    else {
        return Normalized::malformed("near_earth_objects: missing id");
    };

    let mut defaults = Defaults::default();
    let name = defaults.text("name", raw.name);
    let designation = match defaults
        .take("designation", raw.designation)
        .filter(|d| !d.is_empty())
    {
        Some(designation) => designation,
        None => defaults.or("designation", None, name.trim_matches(['(', ')']).to_string()),
    };
    let range = defaults
        .take("estimated_diameter", raw.estimated_diameter)
        .and_then(|d| defaults.take("estimated_diameter", d.kilometers));
    let (diameter_min, diameter_max) = range.map_or((Field::Missing, Field::Missing), |k| {
        (k.estimated_diameter_min, k.estimated_diameter_max)
    });

    let approaches = defaults
        .take("close_approach_data", raw.close_approach_data)
        .unwrap_or_default();
    let reported_at = approaches
        .iter()
        .find_map(|a| match &a.close_approach_date {
            Field::Present(date) => parse_date(date),
            Field::Missing | Field::Invalid => None,
        })
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());

    let close_approaches = approaches
        .into_iter()
        .map(|a| CloseApproach {
            date: a
                .close_approach_date_full
                .present()
                .or_else(|| a.close_approach_date.present())
                .unwrap_or_default(),
            relative_velocity_kmh: a
                .relative_velocity
                .present()
                .and_then(|v| v.kilometers_per_hour.present())
                .unwrap_or(0.0),
            miss_distance_km: a
                .miss_distance
                .present()
                .and_then(|d| d.kilometers.present())
                .unwrap_or(0.0),
            orbiting_body: a.orbiting_body.present().unwrap_or_default(),
        })
        .collect();

    let fields = NeoFields {
        name,
        designation,
        is_potentially_hazardous: defaults.or(
            "is_potentially_hazardous_asteroid",
            raw.is_potentially_hazardous_asteroid,
            false,
        ),
        diameter_min_km: defaults.or("estimated_diameter_min", diameter_min, 0.0),
        diameter_max_km: defaults.or("estimated_diameter_max", diameter_max, 0.0),
        absolute_magnitude: defaults.or("absolute_magnitude_h", raw.absolute_magnitude_h, 0.0),
        is_sentry_object: defaults.or("is_sentry_object", raw.is_sentry_object, false),
        close_approaches,
    };

    defaults.finish(CanonicalRecord::new(
        id,
        reported_at,
        DomainFields::NearEarthObject(fields),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn feed_item() -> Value {
        json!({
            "id": "3542519",
            "neo_reference_id": "3542519",
            "name": "(2010 PK9)",
            "absolute_magnitude_h": 21.2,
            "estimated_diameter": {
                "kilometers": {
                    "estimated_diameter_min": 0.1529,
                    "estimated_diameter_max": 0.3419
                }
            },
            "is_potentially_hazardous_asteroid": true,
            "close_approach_data": [{
                "close_approach_date": "2024-05-03",
                "close_approach_date_full": "2024-May-03 14:21",
                "relative_velocity": {"kilometers_per_hour": "110352.7719"},
                "miss_distance": {"kilometers": "6372811.2"},
                "orbiting_body": "Earth"
            }],
            "is_sentry_object": false
        })
    }

    #[test]
    fn feed_item_normalizes_with_string_numbers() {
        let normalized = normalize(&feed_item());
        assert_eq!(normalized.defaulted(), &["designation"]);

        let record = normalized.into_record().unwrap();
        assert_eq!(record.external_key, "3542519");
        assert_eq!(
            record.reported_at.unwrap().date_naive().to_string(),
            "2024-05-03"
        );
        let DomainFields::NearEarthObject(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.designation, "2010 PK9");
        assert!(fields.is_potentially_hazardous);
        assert_eq!(fields.close_approaches.len(), 1);
        let approach = &fields.close_approaches[0];
        assert_eq!(approach.date, "2024-May-03 14:21");
        assert!((approach.relative_velocity_kmh - 110_352.771_9).abs() < 1e-6);
        assert!((approach.miss_distance_km - 6_372_811.2).abs() < 1e-6);
    }

    #[test]
    fn missing_sentry_flag_defaults_to_false() {
        let mut item = feed_item();
        item.as_object_mut().unwrap().remove("is_sentry_object");

        let normalized = normalize(&item);
        assert!(normalized.defaulted().contains(&"is_sentry_object"));
        let DomainFields::NearEarthObject(fields) = normalized.into_record().unwrap().fields else {
            panic!("wrong fields");
        };
        assert!(!fields.is_sentry_object);
    }

    #[test]
    fn numeric_id_is_accepted() {
        let record = normalize(&json!({"id": 2_000_433, "name": "433 Eros (A898 PA)"}))
            .into_record()
            .unwrap();
        assert_eq!(record.external_key, "2000433");
        assert_eq!(record.reported_at, None);
    }

    #[test]
    fn string_magnitude_is_read_and_mistyped_flags_are_defaulted() {
        let normalized = normalize(&json!({
            "id": "3542519",
            "name": "(2010 PK9)",
            "absolute_magnitude_h": "21.6",
            "is_sentry_object": "maybe",
            "close_approach_data": "none"
        }));

        let Normalized::Partial { record, defaulted } = normalized else {
            panic!("expected partial, got {normalized:?}");
        };
        assert!(defaulted.contains(&"is_sentry_object"));
        assert!(defaulted.contains(&"close_approach_data"));
        assert!(!defaulted.contains(&"absolute_magnitude_h"));
        assert_eq!(record.external_key, "3542519");
        let DomainFields::NearEarthObject(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert!((fields.absolute_magnitude - 21.6).abs() < 1e-9);
        assert!(!fields.is_sentry_object);
        assert!(fields.close_approaches.is_empty());
    }

    #[test]
    fn missing_id_is_malformed() {
        assert!(normalize(&json!({"name": "(2010 PK9)"})).into_record().is_none());
    }
}
