#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Config-driven sync targets for space-data upstreams.
//!
//! Every upstream domain is described by a [`target::SyncTarget`] loaded
//! from embedded TOML (see [`registry`]). A target knows how to turn a run's
//! parameters into an ordered list of fetch steps ([`plan`]), where the items
//! live inside a response ([`extract`]), and which pure function maps each
//! item into a canonical record ([`normalize`]).

pub mod extract;
pub mod normalize;
pub mod parsing;
pub mod plan;
pub mod progress;
pub mod registry;
pub mod target;
pub mod upstream;

/// Errors that can occur while loading or planning a sync target.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A TOML definition could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A definition is internally inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },
}

impl SourceError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
