//! `SpaceX` reference collections (API v4): rockets, launchpads, company
//! history, missions, Starlink satellites, cores, and capsules.
//!
//! Every collection is keyed by the upstream `id`.

use astro_sync_domain_models::{
    CanonicalRecord, CapsuleFields, CoreFields, Domain, DomainFields, HistoryEventFields,
    LaunchpadFields, MissionFields, RocketFields, StarlinkFields,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_date, parse_datetime, value_to_key};

/// Parses `raw` and reads its `id`.
fn identified<T: DeserializeOwned>(
    domain: Domain,
    raw: &Value,
) -> Result<(String, T), Normalized> {
    let id = raw.get("id").and_then(value_to_key);
    let parsed = parse(domain, raw)?;
    id.map(|id| (id, parsed))
        .ok_or_else(|| Normalized::malformed(format!("{domain}: missing id")))
}

fn midnight(date: Option<NaiveDate>) -> Option<DateTime<Utc>> {
    date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc())
}

#[derive(Debug, Deserialize)]
struct RawLength {
    #[serde(default)]
    meters: Field<f64>,
}

#[derive(Debug, Deserialize)]
struct RawMass {
    #[serde(default)]
    kg: Field<f64>,
}

#[derive(Debug, Deserialize)]
struct RawRocket {
    #[serde(default)]
    name: Field<String>,
    #[serde(default, rename = "type")]
    rocket_type: Field<String>,
    #[serde(default)]
    active: Field<bool>,
    #[serde(default)]
    stages: Field<i64>,
    #[serde(default)]
    boosters: Field<i64>,
    #[serde(default)]
    cost_per_launch: Field<i64>,
    #[serde(default)]
    success_rate_pct: Field<f64>,
    #[serde(default)]
    first_flight: Field<String>,
    #[serde(default)]
    country: Field<String>,
    #[serde(default)]
    company: Field<String>,
    #[serde(default)]
    height: Field<RawLength>,
    #[serde(default)]
    diameter: Field<RawLength>,
    #[serde(default)]
    mass: Field<RawMass>,
    #[serde(default)]
    description: Field<String>,
    #[serde(default)]
    wikipedia: Field<String>,
    #[serde(default)]
    flickr_images: Field<Vec<String>>,
}

#[must_use]
pub fn rocket(raw: &Value) -> Normalized {
    let (id, raw): (_, RawRocket) = match identified(Domain::Rockets, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let first_flight = d
        .take("first_flight", raw.first_flight)
        .as_deref()
        .and_then(parse_date);
    let height_meters = d
        .take("height", raw.height)
        .and_then(|h| d.take("height.meters", h.meters));
    let diameter_meters = d
        .take("diameter", raw.diameter)
        .and_then(|h| d.take("diameter.meters", h.meters));
    let mass_kg = d.take("mass", raw.mass).and_then(|m| d.take("mass.kg", m.kg));

    let fields = RocketFields {
        name: d.text("name", raw.name),
        rocket_type: d.take("type", raw.rocket_type).unwrap_or_default(),
        active: d.or("active", raw.active, true),
        stages: d.take("stages", raw.stages),
        boosters: d.take("boosters", raw.boosters),
        cost_per_launch: d.take("cost_per_launch", raw.cost_per_launch),
        success_rate_pct: d.take("success_rate_pct", raw.success_rate_pct),
        first_flight,
        country: d.take("country", raw.country).unwrap_or_default(),
        company: d
            .take("company", raw.company)
            .unwrap_or_else(|| "SpaceX".to_string()),
        height_meters,
        diameter_meters,
        mass_kg,
        description: d.take("description", raw.description).unwrap_or_default(),
        wikipedia: d.take("wikipedia", raw.wikipedia).unwrap_or_default(),
        flickr_images: d.take("flickr_images", raw.flickr_images).unwrap_or_default(),
    };

    d.finish(CanonicalRecord::new(
        id,
        midnight(first_flight),
        DomainFields::Rocket(fields),
    ))
}

#[derive(Debug, Deserialize)]
struct RawLaunchpad {
    #[serde(default)]
    name: Field<String>,
    #[serde(default)]
    full_name: Field<String>,
    #[serde(default)]
    locality: Field<String>,
    #[serde(default)]
    region: Field<String>,
    #[serde(default)]
    latitude: Field<f64>,
    #[serde(default)]
    longitude: Field<f64>,
    #[serde(default)]
    launch_attempts: Field<i64>,
    #[serde(default)]
    launch_successes: Field<i64>,
    #[serde(default)]
    status: Field<String>,
    #[serde(default)]
    details: Field<String>,
}

#[must_use]
pub fn launchpad(raw: &Value) -> Normalized {
    let (id, raw): (_, RawLaunchpad) = match identified(Domain::Launchpads, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let fields = LaunchpadFields {
        name: d.text("name", raw.name),
        full_name: d.take("full_name", raw.full_name).unwrap_or_default(),
        locality: d.take("locality", raw.locality).unwrap_or_default(),
        region: d.take("region", raw.region).unwrap_or_default(),
        latitude: d.take("latitude", raw.latitude),
        longitude: d.take("longitude", raw.longitude),
        launch_attempts: d.or("launch_attempts", raw.launch_attempts, 0),
        launch_successes: d.or("launch_successes", raw.launch_successes, 0),
        status: d.text("status", raw.status),
        details: d.take("details", raw.details).unwrap_or_default(),
    };

    d.finish(CanonicalRecord::new(id, None, DomainFields::Launchpad(fields)))
}

#[derive(Debug, Deserialize)]
struct RawHistoryEvent {
    #[serde(default)]
    title: Field<String>,
    #[serde(default)]
    event_date_utc: Field<String>,
    #[serde(default)]
    flight_number: Field<i64>,
    #[serde(default)]
    details: Field<String>,
    #[serde(default)]
    links: Field<RawArticleLinks>,
}

#[derive(Debug, Deserialize)]
struct RawArticleLinks {
    #[serde(default)]
    article: Field<String>,
}

#[must_use]
pub fn history_event(raw: &Value) -> Normalized {
    let (id, raw): (_, RawHistoryEvent) = match identified(Domain::SpacexHistory, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let happened_at = d
        .take("event_date_utc", raw.event_date_utc)
        .as_deref()
        .and_then(parse_datetime);
    let fields = HistoryEventFields {
        title: d.text("title", raw.title),
        flight_number: d.take("flight_number", raw.flight_number),
        details: d.take("details", raw.details).unwrap_or_default(),
        article: d
            .take("links", raw.links)
            .and_then(|l| d.take("links.article", l.article)),
    };

    d.finish(CanonicalRecord::new(
        id,
        happened_at,
        DomainFields::HistoryEvent(fields),
    ))
}

#[derive(Debug, Deserialize)]
struct RawMission {
    #[serde(default)]
    name: Field<String>,
    #[serde(default)]
    mission_id: Field<String>,
    #[serde(default)]
    manufacturers: Field<Vec<String>>,
    #[serde(default)]
    payload_ids: Field<Vec<String>>,
    #[serde(default)]
    description: Field<String>,
    #[serde(default)]
    wikipedia: Field<String>,
    #[serde(default)]
    website: Field<String>,
    #[serde(default)]
    twitter: Field<String>,
}

#[must_use]
pub fn mission(raw: &Value) -> Normalized {
    let (id, raw): (_, RawMission) = match identified(Domain::SpacexMissions, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let fields = MissionFields {
        name: d.text("name", raw.name),
        mission_id: d.take("mission_id", raw.mission_id).unwrap_or_default(),
        manufacturers: d.take("manufacturers", raw.manufacturers).unwrap_or_default(),
        payload_ids: d.take("payload_ids", raw.payload_ids).unwrap_or_default(),
        description: d.take("description", raw.description).unwrap_or_default(),
        wikipedia: d.take("wikipedia", raw.wikipedia).unwrap_or_default(),
        website: d.take("website", raw.website).unwrap_or_default(),
        twitter: d.take("twitter", raw.twitter).unwrap_or_default(),
    };

    d.finish(CanonicalRecord::new(id, None, DomainFields::Mission(fields)))
}

#[derive(Debug, Deserialize)]
struct RawStarlink {
    #[serde(default)]
    version: Field<String>,
    #[serde(default)]
    launch: Field<String>,
    #[serde(default)]
    latitude: Field<f64>,
    #[serde(default)]
    longitude: Field<f64>,
    #[serde(default)]
    height_km: Field<f64>,
    #[serde(default)]
    velocity_kms: Field<f64>,
}

/// Position fields are null for decayed satellites.
#[must_use]
pub fn starlink(raw: &Value) -> Normalized {
    let (id, raw): (_, RawStarlink) = match identified(Domain::Starlink, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let fields = StarlinkFields {
        version: d.text("version", raw.version),
        launch_id: d.take("launch", raw.launch),
        latitude: d.take("latitude", raw.latitude),
        longitude: d.take("longitude", raw.longitude),
        height_km: d.take("height_km", raw.height_km),
        velocity_kms: d.take("velocity_kms", raw.velocity_kms),
    };

    d.finish(CanonicalRecord::new(
        id,
        None,
        DomainFields::StarlinkSatellite(fields),
    ))
}

#[derive(Debug, Deserialize)]
struct RawCore {
    #[serde(default)]
    serial: Field<String>,
    #[serde(default)]
    block: Field<i64>,
    #[serde(default)]
    status: Field<String>,
    #[serde(default)]
    reuse_count: Field<i64>,
    #[serde(default)]
    rtls_attempts: Field<i64>,
    #[serde(default)]
    rtls_landings: Field<i64>,
    #[serde(default)]
    asds_attempts: Field<i64>,
    #[serde(default)]
    asds_landings: Field<i64>,
    #[serde(default)]
    last_update: Field<String>,
    #[serde(default)]
    launches: Field<Vec<String>>,
}

#[must_use]
pub fn core(raw: &Value) -> Normalized {
    let (id, raw): (_, RawCore) = match identified(Domain::Cores, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let fields = CoreFields {
        serial: d.text("serial", raw.serial),
        block: d.take("block", raw.block),
        status: d.text("status", raw.status),
        reuse_count: d.or("reuse_count", raw.reuse_count, 0),
        rtls_attempts: d.or("rtls_attempts", raw.rtls_attempts, 0),
        rtls_landings: d.or("rtls_landings", raw.rtls_landings, 0),
        asds_attempts: d.or("asds_attempts", raw.asds_attempts, 0),
        asds_landings: d.or("asds_landings", raw.asds_landings, 0),
        last_update: d.take("last_update", raw.last_update).unwrap_or_default(),
        launches: d.take("launches", raw.launches).unwrap_or_default(),
    };

    d.finish(CanonicalRecord::new(id, None, DomainFields::Core(fields)))
}

#[derive(Debug, Deserialize)]
struct RawCapsule {
    #[serde(default)]
    serial: Field<String>,
    #[serde(default)]
    status: Field<String>,
    #[serde(default, rename = "type")]
    capsule_type: Field<String>,
    #[serde(default)]
    reuse_count: Field<i64>,
    #[serde(default)]
    water_landings: Field<i64>,
    #[serde(default)]
    land_landings: Field<i64>,
    #[serde(default)]
    last_update: Field<String>,
    #[serde(default)]
    launches: Field<Vec<String>>,
}

#[must_use]
pub fn capsule(raw: &Value) -> Normalized {
    let (id, raw): (_, RawCapsule) = match identified(Domain::Capsules, raw) {
        Ok(parsed) => parsed,
        Err(malformed) => return malformed,
    };

    let mut d = Defaults::default();
    let fields = CapsuleFields {
        serial: d.text("serial", raw.serial),
        status: d.text("status", raw.status),
        capsule_type: d.text("type", raw.capsule_type),
        reuse_count: d.or("reuse_count", raw.reuse_count, 0),
        water_landings: d.or("water_landings", raw.water_landings, 0),
        land_landings: d.or("land_landings", raw.land_landings, 0),
        last_update: d.take("last_update", raw.last_update).unwrap_or_default(),
        launches: d.take("launches", raw.launches).unwrap_or_default(),
    };

    d.finish(CanonicalRecord::new(id, None, DomainFields::Capsule(fields)))
}
