//! Mars rover photos.

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, RoverPhotoFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_date, value_to_i64, value_to_key};

#[derive(Debug, Deserialize)]
struct RawPhoto {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    sol: Option<Value>,
    #[serde(default)]
    img_src: Field<String>,
    #[serde(default)]
    earth_date: Field<String>,
    #[serde(default)]
    camera: Field<RawCamera>,
    #[serde(default)]
    rover: Field<RawRover>,
}

#[derive(Debug, Deserialize)]
struct RawCamera {
    #[serde(default)]
    name: Field<String>,
    #[serde(default)]
    full_name: Field<String>,
}

#[derive(Debug, Deserialize)]
struct RawRover {
    #[serde(default)]
    name: Field<String>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawPhoto = match parse(Domain::MarsPhotos, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(id) = raw.id.as_ref().and_then(value_to_key) else {
        return Normalized::malformed("mars_photos: missing id");
    };

    let mut defaults = Defaults::default();
    let earth_date = defaults
        .take("earth_date", raw.earth_date)
        .as_deref()
        .and_then(parse_date);
    let (camera_name, camera_full_name) = defaults
        .take("camera", raw.camera)
        .map_or((Field::Missing, Field::Missing), |c| (c.name, c.full_name));
    let rover_name = defaults
        .take("rover", raw.rover)
        .map_or(Field::Missing, |r| r.name);

    let fields = RoverPhotoFields {
        rover: defaults.text("rover", rover_name).to_lowercase(),
        sol: defaults.or("sol", raw.sol.as_ref().and_then(value_to_i64), 0),
        img_src: defaults.text("img_src", raw.img_src),
        earth_date,
        camera_name: defaults.text("camera.name", camera_name),
        camera_full_name: defaults.text("camera.full_name", camera_full_name),
    };

    defaults.finish(CanonicalRecord::new(
        id,
        earth_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        DomainFields::RoverPhoto(fields),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn photo_normalizes_with_camera_and_rover() {
        let normalized = normalize(&json!({
            "id": 102_693,
            "sol": 1000,
            "camera": {"id": 20, "name": "FHAZ", "rover_id": 5, "full_name": "Front Hazard Avoidance Camera"},
            "img_src": "http://mars.jpl.nasa.gov/msl-raw-images/proj/msl/redops/ods/surface/sol/01000/opgs/edr/fcam/FLB_486265257EDR_F0481570FHAZ00323M_.JPG",
            "earth_date": "2015-05-30",
            "rover": {"id": 5, "name": "Curiosity", "status": "active"}
        }));

        let Normalized::Complete(record) = normalized else {
            panic!("expected complete, got {normalized:?}");
        };
        assert_eq!(record.external_key, "102693");
        let DomainFields::RoverPhoto(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.rover, "curiosity");
        assert_eq!(fields.sol, 1000);
        assert_eq!(fields.camera_name, "FHAZ");
        assert_eq!(fields.earth_date, parse_date("2015-05-30"));
    }

    #[test]
    fn missing_camera_is_defaulted() {
        let normalized = normalize(&json!({"id": "7", "sol": "12", "rover": {"name": "Spirit"}}));
        assert_eq!(
            normalized.defaulted(),
            &["img_src", "camera.name", "camera.full_name"]
        );
        assert_eq!(normalized.record().unwrap().reported_at, None);
    }

    #[test]
    fn mistyped_camera_keeps_the_photo() {
        let normalized = normalize(&json!({
            "id": 102_693,
            "sol": 1000,
            "camera": "FHAZ",
            "img_src": "http://x/1.jpg",
            "earth_date": 20_150_530,
            "rover": {"name": "Curiosity"}
        }));

        let defaulted = normalized.defaulted().to_vec();
        assert!(defaulted.contains(&"camera"));
        assert!(defaulted.contains(&"earth_date"));
        let record = normalized.into_record().unwrap();
        assert_eq!(record.external_key, "102693");
        assert_eq!(record.reported_at, None);
    }

    #[test]
    fn missing_id_is_malformed() {
        assert!(normalize(&json!({"sol": 1000})).into_record().is_none());
    }
}
