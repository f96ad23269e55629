//! Application settings
//!
//! Settings pick the capture endpoint and tune the few timings the quiz has.
//! They can be read from JSON or from `GROWTH_SCORE_*` environment variables;
//! either way they are validated before use.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::timing::{
        DEMO_SUBMIT_DELAY, MAX_DELAY, MAX_REQUEST_TIMEOUT, MIN_DELAY, MIN_REQUEST_TIMEOUT,
        REQUEST_TIMEOUT,
    },
    engine::Options,
};

/// Environment variable holding the capture endpoint URL
pub const CAPTURE_URL_VAR: &str = "GROWTH_SCORE_CAPTURE_URL";
/// Environment variable holding the demo delay in milliseconds
pub const DEMO_DELAY_VAR: &str = "GROWTH_SCORE_DEMO_DELAY_MS";
/// Environment variable holding the request timeout in milliseconds
pub const REQUEST_TIMEOUT_VAR: &str = "GROWTH_SCORE_REQUEST_TIMEOUT_MS";
/// Environment variable holding the auto-advance delay in milliseconds
pub const AUTO_ADVANCE_VAR: &str = "GROWTH_SCORE_AUTO_ADVANCE_MS";

/// Validates that a duration falls within specified bounds, in milliseconds.
///
/// # Errors
///
/// Returns a `garde::Error` if the duration is outside the inclusive bounds.
pub fn validate_duration<const MIN_MILLIS: u64, const MAX_MILLIS: u64>(
    val: &Duration,
    _ctx: &(),
) -> garde::Result {
    if (u128::from(MIN_MILLIS)..=u128::from(MAX_MILLIS)).contains(&val.as_millis()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_MILLIS}ms,{MAX_MILLIS}ms]",
        )))
    }
}

/// Errors that can occur while loading settings or content
#[derive(Error, Debug)]
pub enum Error {
    /// The text was not well-formed JSON for the expected shape
    #[error("could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// The values parsed but break a constraint
    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
    /// An environment variable did not hold a number of milliseconds
    #[error("environment variable {name} must be a whole number of milliseconds, got `{value}`")]
    Variable {
        /// Name of the offending variable
        name: &'static str,
        /// The value it held
        value: String,
    },
}

/// Top-level settings for a quiz deployment
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Capture endpoint; empty or containing `[[FORM_ID]]` means demo mode
    #[garde(length(max = 2048))]
    pub capture_url: String,
    /// How long a demo-mode submission pretends to take
    #[garde(custom(validate_duration::<MIN_DELAY, MAX_DELAY>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub demo_delay: Duration,
    /// Timeout applied to each relay request
    #[garde(custom(validate_duration::<MIN_REQUEST_TIMEOUT, MAX_REQUEST_TIMEOUT>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    /// Engine tuning
    #[garde(dive)]
    pub engine: Options,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capture_url: String::new(),
            demo_delay: Duration::from_millis(DEMO_SUBMIT_DELAY),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT),
            engine: Options::default(),
        }
    }
}

impl Settings {
    /// Parses and validates settings from JSON; missing fields take defaults
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the JSON is malformed or a value is out of range.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Builds settings from the process environment
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if a variable is not a number or a value is out
    /// of range.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if a variable is not a number or a value is out
    /// of range.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, Error>
    where
        L: Fn(&str) -> Option<String>,
    {
        let millis = |name: &'static str| -> Result<Option<Duration>, Error> {
            lookup(name)
                .map(|value| {
                    let parsed = value.trim().parse::<u64>();
                    parsed
                        .map(Duration::from_millis)
                        .map_err(|_| Error::Variable { name, value })
                })
                .transpose()
        };

        let mut settings = Self::default();

        if let Some(url) = lookup(CAPTURE_URL_VAR) {
            settings.capture_url = url;
        }
        if let Some(delay) = millis(DEMO_DELAY_VAR)? {
            settings.demo_delay = delay;
        }
        if let Some(timeout) = millis(REQUEST_TIMEOUT_VAR)? {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = millis(AUTO_ADVANCE_VAR)? {
            settings.engine.auto_advance = delay;
        }

        settings.validate()?;
        Ok(settings)
    }
}
