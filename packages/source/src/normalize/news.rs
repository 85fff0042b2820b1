//! Spaceflight News articles, blogs, and reports.

use astro_sync_domain_models::{CanonicalRecord, Domain, DomainFields, NewsArticleFields};
use serde::Deserialize;
use serde_json::Value;

use super::{Defaults, Field, Normalized, parse};
use crate::parsing::{parse_datetime, value_to_key};

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(default)]
    id: Option<Value>,
    /// Endpoint the item came from (`articles`, `blogs`, `reports`).
    #[serde(default)]
    news_type: Field<String>,
    #[serde(default)]
    title: Field<String>,
    #[serde(default)]
    url: Field<String>,
    #[serde(default)]
    image_url: Field<String>,
    #[serde(default)]
    news_site: Field<String>,
    #[serde(default)]
    summary: Field<String>,
    #[serde(default)]
    published_at: Field<String>,
    #[serde(default)]
    featured: Field<bool>,
    #[serde(default)]
    authors: Field<Vec<RawAuthor>>,
    #[serde(default)]
    launches: Field<Vec<RawLaunchRef>>,
    #[serde(default)]
    events: Field<Vec<RawEventRef>>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Field<String>,
}

#[derive(Debug, Deserialize)]
struct RawLaunchRef {
    #[serde(default)]
    launch_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawEventRef {
    #[serde(default)]
    event_id: Option<Value>,
}

#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let raw: RawArticle = match parse(Domain::News, raw) {
        Ok(raw) => raw,
        Err(malformed) => return malformed,
    };
    let Some(id) = raw.id.as_ref().and_then(value_to_key) else {
        return Normalized::malformed("news: missing id");
    };

    let mut defaults = Defaults::default();
    let article_type = raw
        .news_type
        .present()
        .map(|t| t.strip_suffix('s').unwrap_or(&t).to_string());
    let published_at = defaults
        .take("published_at", raw.published_at)
        .as_deref()
        .and_then(parse_datetime);

    let fields = NewsArticleFields {
        article_type: defaults.or("news_type", article_type, "article".to_string()),
        title: defaults.text("title", raw.title),
        url: defaults.text("url", raw.url),
        image_url: defaults.take("image_url", raw.image_url).unwrap_or_default(),
        news_site: defaults.text("news_site", raw.news_site),
        summary: defaults.take("summary", raw.summary).unwrap_or_default(),
        featured: defaults.take("featured", raw.featured).unwrap_or(false),
        authors: defaults
            .take("authors", raw.authors)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name.present())
            .collect(),
        launches: defaults
            .take("launches", raw.launches)
            .unwrap_or_default()
            .iter()
            .filter_map(|l| l.launch_id.as_ref().and_then(value_to_key))
            .collect(),
        events: defaults
            .take("events", raw.events)
            .unwrap_or_default()
            .iter()
            .filter_map(|e| e.event_id.as_ref().and_then(value_to_key))
            .collect(),
    };

    defaults.finish(CanonicalRecord::new(
        format!("snapi_{id}"),
        published_at,
        DomainFields::NewsArticle(fields),
    ))
}
