//! EPIC natural-color Earth snapshots.

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, EpicImageFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_datetime, value_to_key};

const ARCHIVE_BASE: &str = "https://api.nasa.gov/EPIC/archive/natural";

#[derive(Debug, Deserialize)]
struct RawEpic {
    #[serde(default)]
    identifier: Option<Value>,
    #[serde(default)]
    caption: Field<String>,
    #[serde(default)]
    image: Field<String>,
    #[serde(default)]
    date: Field<String>,
    #[serde(default)]
    centroid_coordinates: Field<RawCentroid>,
}

#[derive(Debug, Deserialize)]
struct RawCentroid {
    #[serde(default)]
    lat: Field<f64>,
    #[serde(default)]
    lon: Field<f64>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawEpic = match parse(Domain::Epic, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(identifier) = raw.identifier.as_ref().and_then(value_to_key) else {
        return Normalized::malformed("epic: missing identifier");
    };

    let mut defaults = Defaults::default();
    let taken_at = defaults
        .take("date", raw.date)
        .as_deref()
        .and_then(parse_datetime);
    let image = defaults.text("image", raw.image);

    let archive_url = taken_at.filter(|_| !image.is_empty()).map(|dt| {
        format!("{ARCHIVE_BASE}/{}/png/{image}.png", dt.format("%Y/%m/%d"))
    });
    let (centroid_lat, centroid_lon) = defaults
        .take("centroid_coordinates", raw.centroid_coordinates)
        .map_or((None, None), |c| {
            (
                defaults.take("centroid_coordinates", c.lat),
                defaults.take("centroid_coordinates", c.lon),
            )
        });

    let fields = EpicImageFields {
        caption: defaults.text("caption", raw.caption),
        image_url: defaults.text("image_url", archive_url),
        image,
        centroid_lat,
        centroid_lon,
    };

    defaults.finish(CanonicalRecord::new(
        identifier,
        taken_at,
        DomainFields::EpicImage(fields),
    ))
}
