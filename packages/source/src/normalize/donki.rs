//! DONKI space weather notifications.
//!
//! Every DONKI event type names its identifier differently, and the
//! payloads carry no event type of their own; the orchestrator tags items
//! with `event_type` from the endpoint variant.

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, SpaceWeatherFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::parse_datetime;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default, rename = "event_type")]
    event_type: Option<String>,
    #[serde(default, rename = "activityID")]
    activity_id: Field<String>,
    #[serde(default, rename = "flrID")]
    flr_id: Field<String>,
    #[serde(default, rename = "sepID")]
    sep_id: Field<String>,
    #[serde(default, rename = "gstID")]
    gst_id: Field<String>,
    #[serde(default, rename = "mpcID")]
    mpc_id: Field<String>,
    #[serde(default, rename = "rbeID")]
    rbe_id: Field<String>,
    #[serde(default, rename = "hssID")]
    hss_id: Field<String>,
    #[serde(default, rename = "messageID")]
    message_id: Field<String>,
    #[serde(default)]
    begin_time: Field<String>,
    #[serde(default)]
    start_time: Field<String>,
    #[serde(default)]
    event_time: Field<String>,
    #[serde(default)]
    message_issue_time: Field<String>,
    #[serde(default)]
    link: Field<String>,
    #[serde(default)]
    note: Field<String>,
    #[serde(default)]
    message_body: Field<String>,
    #[serde(default)]
    instruments: Field<Vec<RawInstrument>>,
    #[serde(default)]
    linked_events: Field<Vec<RawLinkedEvent>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstrument {
    #[serde(default)]
    display_name: Field<String>,
}

#[derive(Debug, Deserialize)]
struct RawLinkedEvent {
    #[serde(default, rename = "activityID")]
    activity_id: Field<String>,
}

impl RawEvent {
    fn identifier(&self) -> Option<&str> {
        [
            &self.activity_id,
            &self.flr_id,
            &self.sep_id,
            &self.gst_id,
            &self.mpc_id,
            &self.rbe_id,
            &self.hss_id,
            &self.message_id,
        ]
        .into_iter()
        .filter_map(|id| match id {
            Field::Present(id) => Some(id.trim()),
            Field::Missing | Field::Invalid => None,
        })
        .find(|id| !id.is_empty())
    }
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawEvent = match parse(Domain::SpaceWeather, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(event_type) = raw.event_type.as_deref().filter(|t| !t.is_empty()) else {
        return Normalized::malformed("space_weather: missing event_type");
    };
    let Some(id) = raw.identifier() else {
        return Normalized::malformed(format!("space_weather: {event_type} item has no ID"));
    };
    let external_key = format!("{event_type}_{id}");
    let event_type = event_type.to_string();

    let mut defaults = Defaults::default();
    let reported_at = [
        ("beginTime", raw.begin_time),
        ("startTime", raw.start_time),
        ("eventTime", raw.event_time),
        ("messageIssueTime", raw.message_issue_time),
    ]
    .into_iter()
    .filter_map(|(field, time)| defaults.take(field, time))
    .find_map(|time| parse_datetime(&time));

    let note = defaults.take("note", raw.note);
    let message_body = defaults.take("messageBody", raw.message_body);
    let fields = SpaceWeatherFields {
        event_type,
        link: defaults.text("link", raw.link),
        note: note.or(message_body).unwrap_or_default(),
        instruments: defaults
            .take("instruments", raw.instruments)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| i.display_name.present())
            .collect(),
        linked_events: defaults
            .take("linkedEvents", raw.linked_events)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| e.activity_id.present())
            .collect(),
    };

    defaults.finish(CanonicalRecord::new(
        external_key,
        reported_at,
        DomainFields::SpaceWeatherEvent(fields),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flare_uses_flr_id_and_begin_time() {
        let normalized = normalize(&json!({
            "event_type": "FLR",
            "flrID": "2024-05-01T01:10:00-FLR-001",
            "instruments": [{"displayName": "GOES-P: EXIS 1.0-8.0"}],
            "beginTime": "2024-05-01T01:10Z",
            "peakTime": "2024-05-01T01:26Z",
            "classType": "M2.3",
            "linkedEvents": [{"activityID": "2024-05-01T02:12:00-CME-001"}],
            "link": "https://webtools.ccmc.gsfc.nasa.gov/DONKI/view/FLR/30000/-1"
        }));

        let record = normalized.into_record().unwrap();
        assert_eq!(record.external_key, "FLR_2024-05-01T01:10:00-FLR-001");
        assert_eq!(
            record.reported_at.unwrap().to_rfc3339(),
            "2024-05-01T01:10:00+00:00"
        );
        let DomainFields::SpaceWeatherEvent(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.instruments, vec!["GOES-P: EXIS 1.0-8.0"]);
        assert_eq!(fields.linked_events, vec!["2024-05-01T02:12:00-CME-001"]);
    }

    #[test]
    fn storm_uses_gst_id_and_start_time() {
        let record = normalize(&json!({
            "event_type": "GST",
            "gstID": "2024-05-10T15:00:00-GST-001",
            "startTime": "2024-05-10T15:00Z",
            "link": "https://example.test/gst"
        }))
        .into_record()
        .unwrap();
        assert_eq!(record.external_key, "GST_2024-05-10T15:00:00-GST-001");
        assert!(record.reported_at.is_some());
    }

    #[test]
    fn notification_uses_message_fields() {
        let record = normalize(&json!({
            "event_type": "MPC",
            "messageID": "20240501-AL-001",
            "messageIssueTime": "2024-05-01T12:00Z",
            "messageBody": "## Summary: magnetopause crossing",
            "messageURL": "https://example.test/msg"
        }))
        .into_record()
        .unwrap();
        assert_eq!(record.external_key, "MPC_20240501-AL-001");
        let DomainFields::SpaceWeatherEvent(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert!(fields.note.contains("magnetopause"));
    }

    #[test]
    fn item_without_any_id_is_skipped() {
        let normalized = normalize(&json!({"event_type": "CME", "startTime": "2024-05-01T00:00Z"}));
        assert!(matches!(normalized, Normalized::Malformed { .. }));
    }

    #[test]
    fn mistyped_instruments_keep_the_event() {
        let normalized = normalize(&json!({
            "event_type": "FLR",
            "activityID": 17,
            "flrID": "2024-05-01T01:10:00-FLR-001",
            "beginTime": "2024-05-01T01:10Z",
            "instruments": "GOES-P",
            "link": "https://example.test/flr"
        }));

        assert_eq!(normalized.defaulted(), &["instruments"]);
        let record = normalized.into_record().unwrap();
        assert_eq!(record.external_key, "FLR_2024-05-01T01:10:00-FLR-001");
        let DomainFields::SpaceWeatherEvent(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert!(fields.instruments.is_empty());
    }

    #[test]
    fn untagged_item_is_malformed() {
        assert!(normalize(&json!({"activityID": "x"})).into_record().is_none());
    }
}
