//! Runtime configuration read from the environment.

use std::path::PathBuf;

use crate::error::CollectorError;

pub const DEFAULT_OPENFDA_BASE: &str = "https://api.fda.gov";
pub const DEFAULT_DATA_DIR: &str = "Data";
pub const DEFAULT_SCHEDULE_HOUR: u8 = 1;

pub const DEMO_PUBLISH_URL: &str = "https://reqres.in/api/users";
pub const DEMO_TOKEN_URL: &str = "https://example.com/token";
const DEMO_CLIENT_ID: &str = "theClientId";
const DEMO_CLIENT_SECRET: &str = "theSuperSecretSecret";

const OPENFDA_BASE_ENV: &str = "FDA_COLLECTOR_OPENFDA_BASE";
const OPENFDA_API_KEY_ENV: &str = "OPENFDA_API_KEY";
const PUBLISH_URL_ENV: &str = "FDA_COLLECTOR_PUBLISH_URL";
const TOKEN_URL_ENV: &str = "FDA_COLLECTOR_TOKEN_URL";
const CLIENT_ID_ENV: &str = "FDA_COLLECTOR_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "FDA_COLLECTOR_CLIENT_SECRET";
const DEMO_ENV: &str = "FDA_COLLECTOR_DEMO";
const DATA_DIR_ENV: &str = "FDA_COLLECTOR_DATA_DIR";
const SCHEDULE_HOUR_ENV: &str = "FDA_COLLECTOR_SCHEDULE_HOUR";

#[derive(Clone)]
pub struct CollectorConfig {
    pub openfda_base: String,
    pub openfda_api_key: Option<String>,
    pub publish_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Allows a placeholder bearer token when the token exchange fails.
    pub demo_mode: bool,
    pub data_dir: PathBuf,
    pub schedule_hour: u8,
}

impl std::fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("openfda_base", &self.openfda_base)
            .field("openfda_api_key", &self.openfda_api_key.as_ref().map(|_| "<redacted>"))
            .field("publish_url", &self.publish_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("demo_mode", &self.demo_mode)
            .field("data_dir", &self.data_dir)
            .field("schedule_hour", &self.schedule_hour)
            .finish()
    }
}

impl CollectorConfig {
    /// Reads configuration from the process environment. `force_demo` turns
    /// demo mode on regardless of `FDA_COLLECTOR_DEMO`.
    pub fn from_env(force_demo: bool) -> Result<Self, CollectorError> {
        Self::from_lookup(force_demo, |key| std::env::var(key).ok())
    }

    /// The artifact directory alone, for commands that only read snapshots.
    pub fn data_dir_from_env() -> PathBuf {
        std::env::var(DATA_DIR_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    fn from_lookup<F>(force_demo: bool, lookup: F) -> Result<Self, CollectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let demo_mode = force_demo || get(DEMO_ENV).is_some_and(|v| is_truthy(&v));
        let required = |key: &str, demo_default: &str| match get(key) {
            Some(value) => Ok(value),
            None if demo_mode => Ok(demo_default.to_string()),
            None => Err(CollectorError::Config(format!("{key} is not set"))),
        };

        let schedule_hour = match get(SCHEDULE_HOUR_ENV) {
            Some(raw) => parse_hour(&raw)?,
            None => DEFAULT_SCHEDULE_HOUR,
        };

        Ok(Self {
            openfda_base: get(OPENFDA_BASE_ENV).unwrap_or_else(|| DEFAULT_OPENFDA_BASE.to_string()),
            openfda_api_key: get(OPENFDA_API_KEY_ENV),
            publish_url: required(PUBLISH_URL_ENV, DEMO_PUBLISH_URL)?,
            token_url: required(TOKEN_URL_ENV, DEMO_TOKEN_URL)?,
            client_id: required(CLIENT_ID_ENV, DEMO_CLIENT_ID)?,
            client_secret: required(CLIENT_SECRET_ENV, DEMO_CLIENT_SECRET)?,
            demo_mode,
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            schedule_hour,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub(crate) fn parse_hour(raw: &str) -> Result<u8, CollectorError> {
    raw.trim()
        .parse::<u8>()
        .map_err(|_| {
            CollectorError::Config(format!("{SCHEDULE_HOUR_ENV} must be an hour between 0 and 23"))
        })
        .and_then(check_hour)
}

pub(crate) fn check_hour(hour: u8) -> Result<u8, CollectorError> {
    if hour < 24 {
        Ok(hour)
    } else {
        Err(CollectorError::Config(format!(
            "schedule hour must be between 0 and 23, got {hour}"
        )))
    }
}
