use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::source::generator::GeneratorConfig;
use crate::{Error, Result};

const ENV_SUBSCRIPTION: &str = "BIDFEED_SUBSCRIPTION";
const ENV_STREAM_BUFFER: &str = "BIDFEED_STREAM_BUFFER";
const ENV_SOURCE_RETRIES: &str = "BIDFEED_SOURCE_RETRIES";
const ENV_SOURCE_RETRY_INTERVAL_MS: &str = "BIDFEED_SOURCE_RETRY_INTERVAL_MS";
const ENV_GEN_INTERVAL_MS: &str = "BIDFEED_GEN_INTERVAL_MS";
const ENV_GEN_ROWS_PER_INTERVAL: &str = "BIDFEED_GEN_ROWS_PER_INTERVAL";

const DEFAULT_SUBSCRIPTION: &str = "notify_winners";
const DEFAULT_STREAM_BUFFER: usize = 64;
const DEFAULT_SOURCE_RETRIES: usize = 3;
const DEFAULT_SOURCE_RETRY_INTERVAL_MS: u64 = 500;

pub fn config() -> &'static Settings {
    static CONF: OnceLock<Settings> = OnceLock::new();
    CONF.get_or_init(|| {
        let env_vars: HashMap<String, String> = env::vars().collect();
        match env_vars.try_into() {
            Ok(v) => v,
            Err(e) => {
                panic!("Failed to load configuration: {:?}", e);
            }
        }
    })
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Name of the logical stream. At most one active consumer per name may
    /// write checkpoints; the caller must guarantee this.
    pub subscription: String,
    /// Capacity of the raw-record and outbound channels.
    pub stream_buffer: usize,
    /// How often a failed source connection is reattempted before giving up.
    pub source_retries: usize,
    pub source_retry_interval: Duration,
    pub generator: GeneratorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            subscription: DEFAULT_SUBSCRIPTION.to_string(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
            source_retries: DEFAULT_SOURCE_RETRIES,
            source_retry_interval: Duration::from_millis(DEFAULT_SOURCE_RETRY_INTERVAL_MS),
            generator: GeneratorConfig::default(),
        }
    }
}

impl TryFrom<HashMap<String, String>> for Settings {
    type Error = Error;

    fn try_from(env_vars: HashMap<String, String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(subscription) = env_vars.get(ENV_SUBSCRIPTION) {
            settings.subscription = subscription.clone();
        }
        if let Some(buffer) = parse_var::<usize>(&env_vars, ENV_STREAM_BUFFER)? {
            settings.stream_buffer = buffer;
        }
        if let Some(retries) = parse_var::<usize>(&env_vars, ENV_SOURCE_RETRIES)? {
            settings.source_retries = retries;
        }
        if let Some(millis) = parse_var::<u64>(&env_vars, ENV_SOURCE_RETRY_INTERVAL_MS)? {
            settings.source_retry_interval = Duration::from_millis(millis);
        }
        if let Some(millis) = parse_var::<u64>(&env_vars, ENV_GEN_INTERVAL_MS)? {
            settings.generator.interval = Duration::from_millis(millis);
        }
        if let Some(rows) = parse_var::<usize>(&env_vars, ENV_GEN_ROWS_PER_INTERVAL)? {
            settings.generator.rows_per_interval = rows;
        }

        if settings.stream_buffer == 0 {
            return Err(Error::Config(format!(
                "{ENV_STREAM_BUFFER} must be greater than zero"
            )));
        }

        Ok(settings)
    }
}

fn parse_var<T>(env_vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_vars.get(key) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Parsing {key}={value}: {e}"))),
        None => Ok(None),
    }
}
