use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default marker that tags an audio link, e.g. `🔊[intro](./audio/intro.mp3)`.
pub const DEFAULT_AUDIO_MARKER: &str = "🔊";

/// Default extension of documents picked up from a directory walk.
pub const DEFAULT_EXTENSION: &str = "md";

/// Settings for scanning and migrating documents. Built once at startup and
/// passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Extension (without dot) of documents to migrate.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Marker preceding `[label](target)` for audio references.
    #[serde(default = "default_audio_marker")]
    pub audio_marker: String,
    /// Public domain of the object store. Links pointing here are never re-uploaded.
    #[serde(default)]
    pub remote_domain: Option<String>,
    /// Legacy relink settings. `None` disables the pass.
    #[serde(default)]
    pub legacy: Option<LegacyConfig>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            audio_marker: default_audio_marker(),
            remote_domain: None,
            legacy: None,
        }
    }
}

impl MigrationConfig {
    pub fn trace_loaded(&self) {
        info!(
            extension = %self.extension,
            remote_domain = ?self.remote_domain,
            legacy_relink = self.legacy.is_some(),
            "Loaded MigrationConfig"
        );
        debug!(?self, "MigrationConfig loaded (full debug)");
    }
}

/// Describes remote links produced by an older naming scheme that should be
/// re-uploaded from a matching local file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Fragment identifying a legacy link, e.g. `cdn.example/tutorial/images/`.
    pub url_fragment: String,
    /// Only legacy file names starting with one of these are relinked. Empty matches all.
    #[serde(default)]
    pub filename_prefixes: Vec<String>,
    /// Directory next to the document holding candidate local files.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    /// Extension (without dot) of candidate local files.
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_audio_marker() -> String {
    DEFAULT_AUDIO_MARKER.to_string()
}

fn default_images_dir() -> String {
    "images".to_string()
}

fn default_image_extension() -> String {
    "png".to_string()
}
