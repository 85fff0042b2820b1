//! Mars rover mission manifests (the `photo_manifest` object).

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, MarsRoverFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::parse_date;

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    landing_date: Field<String>,
    #[serde(default)]
    launch_date: Field<String>,
    #[serde(default)]
    status: Field<String>,
    #[serde(default)]
    max_sol: Field<i64>,
    #[serde(default)]
    max_date: Field<String>,
    #[serde(default)]
    total_photos: Field<i64>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawManifest = match parse(Domain::MarsRovers, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(name) = raw.name.filter(|n| !n.trim().is_empty()) else {
        return Normalized::malformed("mars_rovers: missing name");
    };

    let mut defaults = Defaults::default();
    let mut date = |field: &'static str, value: Field<String>| {
        let text = defaults.take(field, value)?;
        let parsed = parse_date(&text);
        if parsed.is_none() {
            defaults.push(field);
        }
        parsed
    };
    let landing_date = date("landing_date", raw.landing_date);
    let launch_date = date("launch_date", raw.launch_date);
    let max_date = date("max_date", raw.max_date);

    let fields = MarsRoverFields {
        name: name.trim().to_owned(),
        landing_date,
        launch_date,
        status: defaults.text("status", raw.status).to_lowercase(),
        max_sol: defaults.take("max_sol", raw.max_sol),
        max_date,
        total_photos: defaults.take("total_photos", raw.total_photos),
    };

    defaults.finish(CanonicalRecord::new(
        fields.name.to_lowercase(),
        max_date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc()),
        DomainFields::MarsRover(fields),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn manifest_is_keyed_by_lowercase_rover_name() {
        let normalized = normalize(&json!({
            "name": "Curiosity",
            "landing_date": "2012-08-06",
            "launch_date": "2011-11-26",
            "status": "active",
            "max_sol": 4102,
            "max_date": "2024-02-19",
            "total_photos": 695_670,
            "photos": []
        }));

        let Normalized::Complete(record) = normalized else {
            panic!("expected complete, got {normalized:?}");
        };
        assert_eq!(record.external_key, "curiosity");
        assert_eq!(record.domain, Domain::MarsRovers);
        let DomainFields::MarsRover(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.name, "Curiosity");
        assert_eq!(fields.max_sol, Some(4102));
        assert_eq!(fields.total_photos, Some(695_670));
        assert_eq!(fields.landing_date, parse_date("2012-08-06"));
    }

    #[test]
    fn unparseable_dates_are_reported() {
        let normalized = normalize(&json!({
            "name": "Spirit",
            "landing_date": "January 4, 2004",
            "status": "complete",
            "max_sol": "2208"
        }));
        assert_eq!(normalized.defaulted(), &["landing_date"]);
        let DomainFields::MarsRover(fields) = normalized.into_record().unwrap().fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.landing_date, None);
        assert_eq!(fields.max_sol, Some(2208));
    }

    #[test]
    fn nameless_manifest_is_malformed() {
        assert!(normalize(&json!({"max_sol": 10})).into_record().is_none());
    }
}
