//! Astronomy Picture of the Day.
//!
//! One item per calendar day, keyed `apod_YYYYMMDD`.

use astro_sync_domain_models::{ApodFields, CanonicalRecord, Domain, DomainFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::parse_date;

#[derive(Debug, Deserialize)]
struct RawApod {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    title: Field<String>,
    #[serde(default)]
    explanation: Field<String>,
    #[serde(default)]
    url: Field<String>,
    #[serde(default)]
    hdurl: Field<String>,
    #[serde(default)]
    media_type: Field<String>,
    #[serde(default)]
    copyright: Field<String>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawApod = match parse(Domain::Apod, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(date) = raw.date.as_deref().and_then(parse_date) else {
        return Normalized::malformed(format!("apod: missing or invalid date {:?}", raw.date));
    };

    let mut defaults = Defaults::default();
    let fields = ApodFields {
        date,
        title: defaults.text("title", raw.title),
        explanation: defaults.text("explanation", raw.explanation),
        url: defaults.text("url", raw.url),
        hdurl: defaults.take("hdurl", raw.hdurl).filter(|s| !s.is_empty()),
        media_type: defaults.or(
            "media_type",
            raw.media_type.present().filter(|s| !s.is_empty()),
            "image".to_string(),
        ),
        copyright: defaults
            .take("copyright", raw.copyright)
            .map(|c| c.trim().to_string()),
    };

    defaults.finish(CanonicalRecord::new(
        format!("apod_{}", date.format("%Y%m%d")),
        date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        DomainFields::Apod(fields),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn minimal_item_gets_key_and_defaults() {
        let normalized = normalize(&json!({
            "title": "T",
            "url": "http://x",
            "date": "2024-05-01"
        }));

        assert_eq!(normalized.defaulted(), &["explanation", "media_type"]);
        let record = normalized.into_record().unwrap();
        assert_eq!(record.domain, Domain::Apod);
        assert_eq!(record.external_key, "apod_20240501");
        assert_eq!(
            record.reported_at.unwrap().to_rfc3339(),
            "2024-05-01T00:00:00+00:00"
        );

        let DomainFields::Apod(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.title, "T");
        assert_eq!(fields.url, "http://x");
        assert_eq!(fields.media_type, "image");
        assert_eq!(fields.hdurl, None);
    }

    #[test]
    fn complete_item_keeps_video_media_type() {
        let normalized = normalize(&json!({
            "date": "2024-05-02",
            "title": "Eclipse",
            "explanation": "Totality over Texas.",
            "url": "https://www.youtube.com/embed/abc",
            "media_type": "video",
            "copyright": "\nJane Doe\n",
            "service_version": "v1"
        }));

        let Normalized::Complete(record) = normalized else {
            panic!("expected complete, got {normalized:?}");
        };
        let DomainFields::Apod(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.media_type, "video");
        assert_eq!(fields.copyright.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn numeric_copyright_does_not_drop_the_picture() {
        let normalized = normalize(&json!({
            "date": "2024-05-01",
            "title": "T",
            "url": "http://x",
            "copyright": 42
        }));

        let Normalized::Partial { record, defaulted } = normalized else {
            panic!("expected partial, got {normalized:?}");
        };
        assert!(defaulted.contains(&"copyright"));
        assert_eq!(record.external_key, "apod_20240501");
        let DomainFields::Apod(fields) = record.fields else {
            panic!("wrong fields");
        };
        assert_eq!(fields.title, "T");
        assert_eq!(fields.copyright, None);
    }

    #[test]
    fn missing_date_is_malformed() {
        assert!(normalize(&json!({"title": "T", "url": "http://x"}))
            .into_record()
            .is_none());
        assert!(normalize(&json!({"date": "May 1st", "title": "T"}))
            .into_record()
            .is_none());
    }
}
