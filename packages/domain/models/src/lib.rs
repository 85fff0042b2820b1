#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical record types shared by every stage of the sync pipeline.
//!
//! Each upstream data domain (picture of the day, near-earth objects, rover
//! photos, ...) is normalized into a [`CanonicalRecord`] whose payload is one
//! variant of [`DomainFields`]. Records are identified by their
//! `(domain, external_key)` pair.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A synchronized upstream data domain.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    /// Astronomy picture of the day
    Apod,
    /// Near-earth object feed
    NearEarthObjects,
    /// Mars rover photos
    MarsPhotos,
    /// Mars rover mission manifests, written by the photo runs
    MarsRovers,
    /// Earth polychromatic imaging camera snapshots
    Epic,
    /// DONKI space weather notifications
    SpaceWeather,
    /// EONET natural events
    NaturalEvents,
    /// Spaceflight news articles, blogs, and reports
    News,
    /// `SpaceX` launches
    Launches,
    /// `SpaceX` launch vehicles
    Rockets,
    /// `SpaceX` launch sites
    Launchpads,
    /// `SpaceX` company history milestones
    SpacexHistory,
    /// `SpaceX` customer missions
    SpacexMissions,
    /// Starlink satellites
    Starlink,
    /// `SpaceX` first-stage cores
    Cores,
    /// Dragon capsules
    Capsules,
    /// Confirmed exoplanets
    Exoplanets,
}

/// How often a scheduled run fires.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Cadence {
    /// Narrow windows.
    Daily,
    /// Wide windows and larger limits.
    Weekly,
}

impl Cadence {
    /// Time between scheduled runs.
    #[must_use]
    pub const fn period(self) -> Duration {
        match self {
            Self::Daily => Duration::from_secs(24 * 60 * 60),
            Self::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// One normalized upstream item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Domain this record belongs to.
    pub domain: Domain,
    /// Natural key derived from the upstream payload. Unique per domain.
    pub external_key: String,
    /// When the upstream reported the item, if it says.
    pub reported_at: Option<DateTime<Utc>>,
    /// Domain-specific fields.
    pub fields: DomainFields,
}

impl CanonicalRecord {
    /// Builds a record, taking the domain from the field variant.
    #[must_use]
    pub fn new(
        external_key: impl Into<String>,
        reported_at: Option<DateTime<Utc>>,
        fields: DomainFields,
    ) -> Self {
        Self {
            domain: fields.domain(),
            external_key: external_key.into(),
            reported_at,
            fields,
        }
    }
}

/// Domain-specific payload of a [`CanonicalRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainFields {
    /// Picture of the day.
    Apod(ApodFields),
    /// Near-earth object.
    NearEarthObject(NeoFields),
    /// Rover photo.
    RoverPhoto(RoverPhotoFields),
    /// Rover mission manifest.
    MarsRover(MarsRoverFields),
    /// EPIC snapshot.
    EpicImage(EpicImageFields),
    /// Space weather notification.
    SpaceWeatherEvent(SpaceWeatherFields),
    /// Natural event.
    NaturalEvent(NaturalEventFields),
    /// News article, blog, or report.
    NewsArticle(NewsArticleFields),
    /// Launch.
    Launch(LaunchFields),
    Rocket(RocketFields),
    Launchpad(LaunchpadFields),
    HistoryEvent(HistoryEventFields),
    Mission(MissionFields),
    StarlinkSatellite(StarlinkFields),
    Core(CoreFields),
    Capsule(CapsuleFields),
    /// Exoplanet.
    Exoplanet(ExoplanetFields),
}

impl DomainFields {
    /// Returns the domain the fields belong to.
    #[must_use]
    pub const fn domain(&self) -> Domain {
        match self {
            Self::Apod(_) => Domain::Apod,
            Self::NearEarthObject(_) => Domain::NearEarthObjects,
            Self::RoverPhoto(_) => Domain::MarsPhotos,
            Self::MarsRover(_) => Domain::MarsRovers,
            Self::EpicImage(_) => Domain::Epic,
            Self::SpaceWeatherEvent(_) => Domain::SpaceWeather,
            Self::NaturalEvent(_) => Domain::NaturalEvents,
            Self::NewsArticle(_) => Domain::News,
            Self::Launch(_) => Domain::Launches,
            Self::Rocket(_) => Domain::Rockets,
            Self::Launchpad(_) => Domain::Launchpads,
            Self::HistoryEvent(_) => Domain::SpacexHistory,
            Self::Mission(_) => Domain::SpacexMissions,
            Self::StarlinkSatellite(_) => Domain::Starlink,
            Self::Core(_) => Domain::Cores,
            Self::Capsule(_) => Domain::Capsules,
            Self::Exoplanet(_) => Domain::Exoplanets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApodFields {
    pub date: NaiveDate,
    pub title: String,
    pub explanation: String,
    pub url: String,
    pub hdurl: Option<String>,
    /// `"image"` or `"video"`. Defaults to `"image"`.
    pub media_type: String,
    pub copyright: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeoFields {
    pub name: String,
    pub designation: String,
    pub is_potentially_hazardous: bool,
    pub diameter_min_km: f64,
    pub diameter_max_km: f64,
    pub absolute_magnitude: f64,
    pub is_sentry_object: bool,
    pub close_approaches: Vec<CloseApproach>,
}

/// A single close approach of a near-earth object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseApproach {
    /// Upstream full approach date (e.g. `"2024-May-01 12:30"`).
    pub date: String,
    pub relative_velocity_kmh: f64,
    pub miss_distance_km: f64,
    pub orbiting_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoverPhotoFields {
    pub rover: String,
    pub sol: i64,
    pub img_src: String,
    pub earth_date: Option<NaiveDate>,
    pub camera_name: String,
    pub camera_full_name: String,
}

/// Mission manifest of one rover, keyed by lowercase rover name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarsRoverFields {
    pub name: String,
    pub landing_date: Option<NaiveDate>,
    pub launch_date: Option<NaiveDate>,
    /// `"active"` or `"complete"`.
    pub status: String,
    pub max_sol: Option<i64>,
    pub max_date: Option<NaiveDate>,
    pub total_photos: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicImageFields {
    pub image: String,
    pub caption: String,
    /// Archive URL of the PNG rendition.
    pub image_url: String,
    pub centroid_lat: Option<f64>,
    pub centroid_lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceWeatherFields {
    /// DONKI event type (`CME`, `FLR`, `GST`, ...).
    pub event_type: String,
    pub link: String,
    pub note: String,
    pub instruments: Vec<String>,
    pub linked_events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaturalEventFields {
    pub title: String,
    pub description: String,
    pub link: String,
    pub closed: bool,
    pub category_id: String,
    pub category_title: String,
    pub geometry: Vec<EventGeometry>,
}

/// One observation of a natural event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGeometry {
    pub date: Option<DateTime<Utc>>,
    /// `"Point"` or `"Polygon"`.
    pub geometry_type: String,
    /// Raw `GeoJSON` coordinates, kept as-is.
    pub coordinates: serde_json::Value,
    pub magnitude_value: Option<f64>,
    pub magnitude_unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticleFields {
    /// `"article"`, `"blog"`, or `"report"`.
    pub article_type: String,
    pub title: String,
    pub url: String,
    pub image_url: String,
    pub news_site: String,
    pub summary: String,
    pub featured: bool,
    pub authors: Vec<String>,
    /// Launch library IDs mentioned by the article.
    pub launches: Vec<String>,
    /// Event IDs mentioned by the article.
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFields {
    pub name: String,
    pub flight_number: Option<i64>,
    pub date_precision: String,
    pub upcoming: bool,
    pub success: Option<bool>,
    pub tbd: bool,
    pub details: String,
    pub rocket_id: Option<String>,
    pub launchpad_id: Option<String>,
    pub webcast: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocketFields {
    pub name: String,
    pub rocket_type: String,
    pub active: bool,
    pub stages: Option<i64>,
    pub boosters: Option<i64>,
    pub cost_per_launch: Option<i64>,
    pub success_rate_pct: Option<f64>,
    pub first_flight: Option<NaiveDate>,
    pub country: String,
    pub company: String,
    pub height_meters: Option<f64>,
    pub diameter_meters: Option<f64>,
    pub mass_kg: Option<f64>,
    pub description: String,
    pub wikipedia: String,
    pub flickr_images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchpadFields {
    pub name: String,
    pub full_name: String,
    pub locality: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub launch_attempts: i64,
    pub launch_successes: i64,
    pub status: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEventFields {
    pub title: String,
    pub flight_number: Option<i64>,
    pub details: String,
    pub article: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionFields {
    pub name: String,
    pub mission_id: String,
    pub manufacturers: Vec<String>,
    pub payload_ids: Vec<String>,
    pub description: String,
    pub wikipedia: String,
    pub website: String,
    pub twitter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarlinkFields {
    /// Satellite generation, e.g. `"v1.0"`.
    pub version: String,
    pub launch_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub height_km: Option<f64>,
    pub velocity_kms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreFields {
    pub serial: String,
    pub block: Option<i64>,
    pub status: String,
    pub reuse_count: i64,
    pub rtls_attempts: i64,
    pub rtls_landings: i64,
    pub asds_attempts: i64,
    pub asds_landings: i64,
    pub last_update: String,
    /// Launch IDs the core flew on.
    pub launches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleFields {
    pub serial: String,
    pub status: String,
    pub capsule_type: String,
    pub reuse_count: i64,
    pub water_landings: i64,
    pub land_landings: i64,
    pub last_update: String,
    pub launches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExoplanetFields {
    pub name: String,
    pub host_star: String,
    pub discovery_method: String,
    pub discovery_year: Option<i32>,
    pub orbital_period_days: Option<f64>,
    pub radius_earth: Option<f64>,
    pub mass_earth: Option<f64>,
    pub distance_pc: Option<f64>,
    pub equilibrium_temp_k: Option<f64>,
    pub habitable_zone: bool,
}

/// One outbound HTTP call, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    /// Upstream-qualified endpoint, e.g. `nasa:planetary/apod`.
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    pub latency_secs: f64,
    /// HTTP status, or `0` when the call never returned.
    pub status_code: u16,
    pub error: Option<String>,
}

impl UsageLogEntry {
    /// Whether the call produced a usable 2xx response.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        (200..300).contains(&self.status_code) && self.error.is_none()
    }
}

/// Phases a single domain run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Idle,
    Fetching,
    Normalizing,
    Persisting,
    Done,
    PartialFailure,
}

impl RunPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::PartialFailure)
    }
}

/// Terminal status of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Done,
    PartialFailure,
}

/// Outcome of one domain sync run. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunResult {
    pub domain: Domain,
    /// Upstream calls attempted.
    pub steps: u64,
    /// Records inserted for the first time.
    pub created: u64,
    /// Existing records overwritten in place.
    pub updated: u64,
    /// Items the normalizer rejected.
    pub skipped: u64,
    pub fetch_failures: u64,
    pub persist_failures: u64,
    pub duration: Duration,
}

impl SyncRunResult {
    #[must_use]
    pub const fn new(domain: Domain) -> Self {
        Self {
            domain,
            steps: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            fetch_failures: 0,
            persist_failures: 0,
            duration: Duration::ZERO,
        }
    }

    /// Total failures counted against the run.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.fetch_failures + self.persist_failures
    }

    #[must_use]
    pub const fn status(&self) -> RunStatus {
        if self.failures() > 0 {
            RunStatus::PartialFailure
        } else {
            RunStatus::Done
        }
    }
}
