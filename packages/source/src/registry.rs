//! Target registry. Loads every sync target and upstream definition from
//! embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/targets/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a domain means adding a TOML
//! file, a normalizer, and a line below.

use astro_sync_domain_models::Domain;

use crate::target::{SyncTarget, parse_target_toml};
use crate::upstream::{UpstreamDefinition, parse_upstreams_toml};

/// Target TOML configs embedded at compile time.
const TARGET_TOMLS: &[(&str, &str)] = &[
    // ── NASA api.nasa.gov ────────────────────────────────────────────
    ("apod", include_str!("../targets/apod.toml")),
    (
        "near_earth_objects",
        include_str!("../targets/near_earth_objects.toml"),
    ),
    ("mars_photos", include_str!("../targets/mars_photos.toml")),
    ("epic", include_str!("../targets/epic.toml")),
    ("space_weather", include_str!("../targets/space_weather.toml")),
    // ── Other upstreams ──────────────────────────────────────────────
    ("natural_events", include_str!("../targets/natural_events.toml")),
    ("news", include_str!("../targets/news.toml")),
    // ── SpaceX api.spacexdata.com ────────────────────────────────────
    ("launches", include_str!("../targets/launches.toml")),
    ("rockets", include_str!("../targets/rockets.toml")),
    ("launchpads", include_str!("../targets/launchpads.toml")),
    ("spacex_history", include_str!("../targets/spacex_history.toml")),
    ("spacex_missions", include_str!("../targets/spacex_missions.toml")),
    ("starlink", include_str!("../targets/starlink.toml")),
    ("cores", include_str!("../targets/cores.toml")),
    ("capsules", include_str!("../targets/capsules.toml")),
    // ── Exoplanet Archive ────────────────────────────────────────────
    ("exoplanets", include_str!("../targets/exoplanets.toml")),
];

const UPSTREAMS_TOML: &str = include_str!("../upstreams.toml");

/// Returns all configured sync targets, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_targets() -> Vec<SyncTarget> {
    TARGET_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_target_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Returns the target for `domain`, if one is configured.
#[must_use]
pub fn target(domain: Domain) -> Option<SyncTarget> {
    all_targets().into_iter().find(|t| t.domain == domain)
}

/// Returns all upstream definitions.
///
/// # Panics
///
/// Panics if `upstreams.toml` is malformed.
#[must_use]
pub fn all_upstreams() -> Vec<UpstreamDefinition> {
    parse_upstreams_toml(UPSTREAMS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse upstreams.toml: {e}"))
}

#[cfg(test)]
mod tests {
    use astro_sync_domain_models::Cadence;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_domain_is_written_by_exactly_one_target() {
        let targets = all_targets();
        assert_eq!(targets.len(), TARGET_TOMLS.len());
        for domain in Domain::iter() {
            let count = targets
                .iter()
                .filter(|t| t.domain == domain || t.manifest_domain() == Some(domain))
                .count();
            assert_eq!(count, 1, "{domain}: expected one writer, found {count}");
        }
    }

    #[test]
    fn rover_manifests_are_kept_from_photo_runs() {
        let mars = target(Domain::MarsPhotos).unwrap();
        assert_eq!(mars.manifest_domain(), Some(Domain::MarsRovers));
        assert!(target(Domain::MarsRovers).is_none());
    }

    #[test]
    fn spans_count_today_and_every_day_back() {
        let span = |domain, cadence| target(domain).unwrap().params_for(cadence).unwrap().span;
        // one day back, thirty days back
        assert_eq!(span(Domain::Apod, Cadence::Daily), 2);
        assert_eq!(span(Domain::Apod, Cadence::Weekly), 31);
        assert_eq!(span(Domain::SpaceWeather, Cadence::Daily), 8);
        assert_eq!(span(Domain::SpaceWeather, Cadence::Weekly), 31);
        assert_eq!(span(Domain::NearEarthObjects, Cadence::Daily), 8);
        assert_eq!(span(Domain::News, Cadence::Daily), 2);
        // the latest sol and twenty before it
        assert_eq!(span(Domain::MarsPhotos, Cadence::Weekly), 21);
    }

    #[test]
    fn spacex_collections_follow_their_refresh_schedule() {
        let daily: Vec<Domain> = all_targets()
            .into_iter()
            .filter(|t| t.upstream == "spacex" && t.params_for(Cadence::Daily).is_some())
            .map(|t| t.domain)
            .collect();
        assert_eq!(daily, vec![Domain::Launches, Domain::SpacexHistory]);

        let starlink = target(Domain::Starlink).unwrap();
        let weekly = starlink.params_for(Cadence::Weekly).unwrap();
        assert_eq!(starlink.item_cap(weekly), Some(1000));
    }

    #[test]
    fn file_names_match_domains() {
        for ((name, _), target) in TARGET_TOMLS.iter().zip(all_targets()) {
            assert_eq!(*name, target.domain.as_ref());
        }
    }

    #[test]
    fn targets_reference_known_upstreams() {
        let upstreams = all_upstreams();
        for target in &all_targets() {
            assert!(
                upstreams.iter().any(|u| u.name == target.upstream),
                "{}: unknown upstream '{}'",
                target.domain,
                target.upstream
            );
        }
    }

    #[test]
    fn delays_stay_within_polite_bounds() {
        for target in &all_targets() {
            assert!(
                (100..=500).contains(&target.delay_ms),
                "{}: delay {}ms",
                target.domain,
                target.delay_ms
            );
        }
    }

    #[test]
    fn every_target_runs_on_some_cadence() {
        for target in &all_targets() {
            assert!(
                Cadence::iter().any(|c| target.params_for(c).is_some()),
                "{} never runs",
                target.domain
            );
        }
    }

    #[test]
    fn weekly_windows_are_at_least_as_wide_as_daily() {
        for target in &all_targets() {
            if let (Some(daily), Some(weekly)) = (
                target.params_for(Cadence::Daily),
                target.params_for(Cadence::Weekly),
            ) {
                assert!(weekly.span >= daily.span, "{}", target.domain);
                assert!(weekly.limit >= daily.limit, "{}", target.domain);
            }
        }
    }

    #[test]
    fn nasa_upstream_defaults_to_demo_key() {
        let nasa = all_upstreams()
            .into_iter()
            .find(|u| u.name == "nasa")
            .unwrap();
        assert_eq!(nasa.key_env.as_deref(), Some("NASA_API_KEY"));
        assert_eq!(nasa.default_key.as_deref(), Some("DEMO_KEY"));
    }
}
