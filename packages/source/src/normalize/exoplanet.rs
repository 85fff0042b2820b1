//! Exoplanet archive TAP rows.

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, ExoplanetFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::value_to_bool;

#[derive(Debug, Deserialize)]
struct RawPlanet {
    #[serde(default)]
    pl_name: Option<String>,
    #[serde(default)]
    hostname: Field<String>,
    #[serde(default)]
    discoverymethod: Field<String>,
    #[serde(default)]
    disc_year: Field<i32>,
    #[serde(default)]
    pl_orbper: Field<f64>,
    #[serde(default)]
    pl_rade: Field<f64>,
    #[serde(default)]
    pl_masse: Field<f64>,
    #[serde(default)]
    sy_dist: Field<f64>,
    #[serde(default)]
    pl_eqt: Field<f64>,
    /// `1`/`0` in TAP output.
    #[serde(default)]
    pl_habitable: Option<Value>,
}

fn habitable(value: Option<&Value>) -> Field<bool> {
    match value {
        None | Some(Value::Null) => Field::Missing,
        Some(value) => value_to_bool(value).map_or(Field::Invalid, Field::Present),
    }
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawPlanet = match parse(Domain::Exoplanets, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(name) = raw.pl_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
        return Normalized::malformed("exoplanets: missing pl_name");
    };

    let mut defaults = Defaults::default();
    let fields = ExoplanetFields {
        host_star: defaults.text("hostname", raw.hostname),
        discovery_method: defaults.text("discoverymethod", raw.discoverymethod),
        discovery_year: defaults.take("disc_year", raw.disc_year),
        orbital_period_days: defaults.take("pl_orbper", raw.pl_orbper),
        radius_earth: defaults.take("pl_rade", raw.pl_rade),
        mass_earth: defaults.take("pl_masse", raw.pl_masse),
        distance_pc: defaults.take("sy_dist", raw.sy_dist),
        equilibrium_temp_k: defaults.take("pl_eqt", raw.pl_eqt),
        habitable_zone: defaults
            .take("pl_habitable", habitable(raw.pl_habitable.as_ref()))
            .unwrap_or(false),
        name: name.clone(),
    };

    defaults.finish(CanonicalRecord::new(
        name.replace(' ', "_"),
        None,
        DomainFields::Exoplanet(fields),
    ))
}
