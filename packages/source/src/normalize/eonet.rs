//! EONET natural events (wildfires, storms, volcanoes, ...).

use astro_sync_domain_models::{
    CanonicalRecord, Domain, DomainFields, EventGeometry, NaturalEventFields,
};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_datetime, value_to_key};

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Field<String>,
    #[serde(default)]
    description: Field<String>,
    #[serde(default)]
    link: Field<String>,
    /// Closing timestamp, or null while the event is open.
    #[serde(default)]
    closed: Option<Value>,
    #[serde(default)]
    categories: Field<Vec<RawCategory>>,
    #[serde(default)]
    geometry: Field<Vec<RawGeometry>>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Field<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGeometry {
    #[serde(default)]
    date: Field<String>,
    #[serde(default, rename = "type")]
    geometry_type: Field<String>,
    #[serde(default)]
    coordinates: Option<Value>,
    #[serde(default)]
    magnitude_value: Field<f64>,
    #[serde(default)]
    magnitude_unit: Field<String>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawEvent = match parse(Domain::NaturalEvents, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(id) = raw.id.as_ref().and_then(value_to_key) else {
        return Normalized::malformed("natural_events: missing id");
    };

    let mut defaults = Defaults::default();
    let category = defaults
        .take("categories", raw.categories)
        .unwrap_or_default()
        .into_iter()
        .next();
    let (category_id, category_title) = category.map_or((None, Field::Missing), |c| {
        (c.id.as_ref().and_then(value_to_key), c.title)
    });

    let geometry: Vec<EventGeometry> = defaults
        .take("geometry", raw.geometry)
        .unwrap_or_default()
        .into_iter()
        .map(|g| EventGeometry {
            date: g.date.present().as_deref().and_then(parse_datetime),
            geometry_type: g
                .geometry_type
                .present()
                .unwrap_or_else(|| "Point".to_string()),
            coordinates: g.coordinates.unwrap_or(Value::Null),
            magnitude_value: g.magnitude_value.present(),
            magnitude_unit: g.magnitude_unit.present(),
        })
        .collect();
    let reported_at = geometry.iter().filter_map(|g| g.date).min();

    let fields = NaturalEventFields {
        title: defaults.text("title", raw.title),
        description: defaults
            .take("description", raw.description)
            .unwrap_or_default(),
        link: defaults.text("link", raw.link),
        closed: raw.closed.is_some_and(|c| !c.is_null()),
        category_id: defaults.text("categories.id", category_id),
        category_title: defaults.text("categories.title", category_title),
        geometry,
    };

    defaults.finish(CanonicalRecord::new(
        id,
        reported_at,
        DomainFields::NaturalEvent(fields),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn open_event_takes_first_category_and_earliest_geometry() {
        let normalized = normalize(&json!({
            "id": "EONET_6512",
            "title": "Wildfire in Alberta",
            "description": null,
            "link": "https://eonet.gsfc.nasa.gov/api/v3/events/EONET_6512",
            "closed": null,
            "categories": [{"id": "wildfires", "title": "Wildfires"}],
            "sources": [{"id": "IRWIN", "url": "https://example.test"}],
            "geometry": [
                {"magnitudeValue": 1200.0, "magnitudeUnit": "acres", "date": "2024-05-03T00:00:00Z", "type": "Point", "coordinates": [-117.2, 56.1]},
                {"magnitudeValue": 900.0, "magnitudeUnit": "acres", "date": "2024-05-01T00:00:00Z", "type": "Point", "coordinates": [-117.3, 56.0]}
            ]
        }));

        let Normalized::Complete(record) = normalized else {
            panic!("expected complete, got {normalized:?}");
        };
        assert_eq!(record.external_key, "EONET_6512");
        assert_eq!(
            record.reported_at.unwrap().to_rfc3339(),
            "2024-05-01T00:00:00+00:00"
        );
        let DomainFields::NaturalEvent(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert!(!fields.closed);
        assert_eq!(fields.category_id, "wildfires");
        assert_eq!(fields.geometry.len(), 2);
        assert_eq!(fields.geometry[0].coordinates, json!([-117.2, 56.1]));
        assert_eq!(fields.description, "");
    }

    #[test]
    fn closed_timestamp_marks_event_closed() {
        let record = normalize(&json!({
            "id": "EONET_1",
            "title": "Iceberg A23A",
            "closed": "2024-04-30T00:00:00Z",
            "categories": [{"id": "seaLakeIce", "title": "Sea and Lake Ice"}]
        }))
        .into_record()
        .unwrap();
        let DomainFields::NaturalEvent(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert!(fields.closed);
        assert!(fields.geometry.is_empty());
    }

    #[test]
    fn mistyped_geometry_is_defaulted() {
        let normalized = normalize(&json!({
            "id": "EONET_7",
            "title": "Storm",
            "link": "https://example.test/7",
            "categories": [{"id": "severeStorms", "title": "Severe Storms"}],
            "geometry": {"type": "Point"}
        }));

        assert_eq!(normalized.defaulted(), &["geometry"]);
        let record = normalized.into_record().unwrap();
        assert_eq!(record.external_key, "EONET_7");
        assert_eq!(record.reported_at, None);
    }

    #[test]
    fn missing_id_is_malformed() {
        assert!(normalize(&json!({"title": "Storm"})).into_record().is_none());
    }
}
