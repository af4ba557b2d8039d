//! Configuration management for the client runtime.

use ledger_engine::DedupPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL of the local store
    pub database_url: String,
    /// Directory scanned document images are copied into
    pub documents_dir: PathBuf,
    /// Pause between an optimistic add and its background push
    pub sync_delay: Duration,
    /// Minimum spacing between completed remote fetches
    pub refetch_throttle: Duration,
    /// Give up on a record after this many failed pushes (`None` = never)
    pub max_sync_attempts: Option<u32>,
    /// Duplicate detection windows and compared fields
    pub dedup: DedupPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ledger.db?mode=rwc".to_string(),
            documents_dir: PathBuf::from("documents"),
            sync_delay: Duration::from_millis(250),
            refetch_throttle: Duration::from_millis(1000),
            max_sync_attempts: None,
            dedup: DedupPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let defaults_dedup = defaults.dedup.clone();

        let database_url = lookup("LEDGER_DATABASE_URL").unwrap_or(defaults.database_url);

        let documents_dir = lookup("LEDGER_DOCUMENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.documents_dir);

        let sync_delay = match parse_u64(&lookup, "LEDGER_SYNC_DELAY_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.sync_delay,
        };

        let refetch_throttle = match parse_u64(&lookup, "LEDGER_REFETCH_THROTTLE_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.refetch_throttle,
        };

        let max_sync_attempts = parse_u64(&lookup, "LEDGER_MAX_SYNC_ATTEMPTS")?
            .map(|n| u32::try_from(n).map_err(|_| invalid("LEDGER_MAX_SYNC_ATTEMPTS", n)))
            .transpose()?;

        let dedup = DedupPolicy {
            window_ms: parse_u64(&lookup, "LEDGER_DEDUP_WINDOW_MS")?
                .unwrap_or(defaults_dedup.window_ms),
            lenient_window_ms: parse_u64(&lookup, "LEDGER_INCOME_DEDUP_WINDOW_MS")?
                .unwrap_or(defaults_dedup.lenient_window_ms),
            add_guard_ms: parse_u64(&lookup, "LEDGER_ADD_GUARD_MS")?
                .unwrap_or(defaults_dedup.add_guard_ms),
            transaction_fields: lookup("LEDGER_TRANSACTION_SIGNATURE_FIELDS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults_dedup.transaction_fields),
            document_fields: lookup("LEDGER_DOCUMENT_SIGNATURE_FIELDS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults_dedup.document_fields),
        };

        Ok(Self {
            database_url,
            documents_dir,
            sync_delay,
            refetch_throttle,
            max_sync_attempts,
            dedup,
        })
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                value: raw.clone(),
            })
        })
        .transpose()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn invalid(name: &'static str, value: u64) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
