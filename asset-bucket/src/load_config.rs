/// `load_config` module: Loads the optional static YAML config and merges it with
/// environment variables and command-line flags into the internal configs.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into type-safe structs (no secrets in there)
/// - Resolve store settings with precedence flag > environment > file
/// - Fail with a clear message, before any document is touched, when a required
///   store setting is missing
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use asset_bucket_core::config::{LegacyConfig, MigrationConfig, DEFAULT_AUDIO_MARKER, DEFAULT_EXTENSION};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

pub const ENV_ACCESS_KEY: &str = "ASSET_BUCKET_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "ASSET_BUCKET_SECRET_KEY";
pub const ENV_BUCKET: &str = "ASSET_BUCKET_BUCKET";
pub const ENV_DOMAIN: &str = "ASSET_BUCKET_DOMAIN";
pub const ENV_ENDPOINT: &str = "ASSET_BUCKET_ENDPOINT";

const DEFAULT_KEY_PREFIX: &str = "tutorial";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub migrate: MigrateSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    pub bucket: Option<String>,
    pub domain: Option<String>,
    pub endpoint: Option<String>,
    pub key_prefix: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MigrateSection {
    pub extension: Option<String>,
    pub audio_marker: Option<String>,
    pub legacy: Option<LegacyConfig>,
}

/// Store settings supplied on the command line. Unset fields fall back to
/// the environment and then to the config file.
#[derive(Debug, Default, Clone)]
pub struct StoreOverrides {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub domain: Option<String>,
    pub endpoint: Option<String>,
}

/// Fully resolved settings for the remote store client.
#[derive(Clone)]
pub struct StoreConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Public domain objects are served from, with or without scheme.
    pub domain: String,
    /// Base URL uploads are sent to.
    pub endpoint: String,
    pub key_prefix: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("domain", &self.domain)
            .field("endpoint", &self.endpoint)
            .field("key_prefix", &self.key_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl StoreConfig {
    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            domain = %self.domain,
            endpoint = %self.endpoint,
            "Loaded StoreConfig"
        );
        debug!(?self, "StoreConfig loaded (full debug)");
    }
}

/// Loads a static YAML config file (no secrets).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, empty config.
    if config_content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str::<FileConfig>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

fn pick(flag: &Option<String>, env_key: &str, file: &Option<String>) -> Option<String> {
    flag.clone()
        .or_else(|| env::var(env_key).ok())
        .or_else(|| file.clone())
        .filter(|value| !value.trim().is_empty())
}

/// Public store domain without requiring credentials (flag > environment > file).
pub fn resolve_domain(file: &FileConfig, flag: &Option<String>) -> Option<String> {
    pick(flag, ENV_DOMAIN, &file.store.domain)
}

/// Merge flags, environment and file into a complete [`StoreConfig`].
pub fn resolve_store_config(file: &FileConfig, overrides: &StoreOverrides) -> Result<StoreConfig> {
    let access_key = pick(&overrides.access_key, ENV_ACCESS_KEY, &None);
    let secret_key = pick(&overrides.secret_key, ENV_SECRET_KEY, &None);
    let bucket = pick(&overrides.bucket, ENV_BUCKET, &file.store.bucket);
    let domain = pick(&overrides.domain, ENV_DOMAIN, &file.store.domain);
    let endpoint = pick(&overrides.endpoint, ENV_ENDPOINT, &file.store.endpoint);

    match (access_key, secret_key, bucket, domain, endpoint) {
        (Some(access_key), Some(secret_key), Some(bucket), Some(domain), Some(endpoint)) => {
            Ok(StoreConfig {
                access_key,
                secret_key,
                bucket,
                domain,
                endpoint,
                key_prefix: file
                    .store
                    .key_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
                timeout_secs: file.store.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            })
        }
        (access_key, secret_key, bucket, domain, endpoint) => {
            let missing: Vec<&str> = [
                (access_key.is_none(), "--ak / ASSET_BUCKET_ACCESS_KEY"),
                (secret_key.is_none(), "--sk / ASSET_BUCKET_SECRET_KEY"),
                (bucket.is_none(), "--bucket / ASSET_BUCKET_BUCKET"),
                (domain.is_none(), "--domain / ASSET_BUCKET_DOMAIN"),
                (endpoint.is_none(), "--endpoint / ASSET_BUCKET_ENDPOINT"),
            ]
            .into_iter()
            .filter_map(|(is_missing, name)| is_missing.then_some(name))
            .collect();
            error!(?missing, "Store configuration incomplete");
            Err(anyhow::anyhow!(
                "Missing required setting(s): {}",
                missing.join(", ")
            ))
        }
    }
}

/// `migrate.audio_marker`, or the default when unset or blank.
fn audio_marker(configured: &Option<String>) -> String {
    match configured.as_deref().map(str::trim) {
        Some("") => {
            warn!("migrate.audio_marker is blank, using the default marker");
            DEFAULT_AUDIO_MARKER.to_string()
        }
        Some(marker) => marker.to_string(),
        None => DEFAULT_AUDIO_MARKER.to_string(),
    }
}

/// Build the [`MigrationConfig`] for a run. The legacy section only takes
/// effect when `relink_legacy` is set.
pub fn migration_config(
    file: &FileConfig,
    remote_domain: Option<String>,
    relink_legacy: bool,
) -> MigrationConfig {
    let legacy = if relink_legacy {
        if file.migrate.legacy.is_none() {
            warn!("--relink-legacy given but the config file has no migrate.legacy section");
        }
        file.migrate.legacy.clone()
    } else {
        None
    };
    MigrationConfig {
        extension: file
            .migrate
            .extension
            .clone()
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        audio_marker: audio_marker(&file.migrate.audio_marker),
        remote_domain,
        legacy,
    }
}
