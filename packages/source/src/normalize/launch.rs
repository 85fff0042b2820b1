//! `SpaceX` launches (API v5).

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, LaunchFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_datetime, value_to_key};

#[derive(Debug, Deserialize)]
struct RawLaunch {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Field<String>,
    #[serde(default)]
    flight_number: Field<i64>,
    #[serde(default)]
    date_utc: Field<String>,
    #[serde(default)]
    date_precision: Field<String>,
    #[serde(default)]
    upcoming: Field<bool>,
    #[serde(default)]
    success: Field<bool>,
    #[serde(default)]
    tbd: Field<bool>,
    #[serde(default)]
    details: Field<String>,
    #[serde(default)]
    rocket: Field<String>,
    #[serde(default)]
    launchpad: Field<String>,
    #[serde(default)]
    links: Field<RawLinks>,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    #[serde(default)]
    webcast: Field<String>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawLaunch = match parse(Domain::Launches, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(id) = raw.id.as_ref().and_then(value_to_key) else {
        return Normalized::malformed("launches: missing id");
    };

    let mut defaults = Defaults::default();
    let fields = LaunchFields {
        name: defaults.text("name", raw.name),
        flight_number: defaults.take("flight_number", raw.flight_number),
        date_precision: defaults.or(
            "date_precision",
            raw.date_precision.present().filter(|p| !p.is_empty()),
            "hour".to_string(),
        ),
        upcoming: defaults.or("upcoming", raw.upcoming, false),
        success: defaults.take("success", raw.success),
        tbd: defaults.take("tbd", raw.tbd).unwrap_or(false),
        details: defaults.take("details", raw.details).unwrap_or_default(),
        rocket_id: defaults.take("rocket", raw.rocket),
        launchpad_id: defaults.take("launchpad", raw.launchpad),
        webcast: defaults
            .take("links", raw.links)
            .and_then(|l| defaults.take("links.webcast", l.webcast)),
    };
    let launched_at = defaults
        .take("date_utc", raw.date_utc)
        .as_deref()
        .and_then(parse_datetime);

    defaults.finish(CanonicalRecord::new(
        id,
        launched_at,
        DomainFields::Launch(fields),
    ))
}
