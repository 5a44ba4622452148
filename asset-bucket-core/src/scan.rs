//! Reference scanner: finds image and audio links in markdown text.
//!
//! Recognised forms:
//! - `![label](target)` for images
//! - `<marker>[label](target)` for audio, where the marker defaults to `🔊`
//!
//! Scanning is pure: no filesystem access, no existence checks. References are
//! returned in order of appearance, remote ones included.

use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::config::DEFAULT_AUDIO_MARKER;

/// Which link syntax a reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
}

impl AssetKind {
    /// Render `label`/`target` back in this kind's link syntax.
    pub fn render(&self, audio_marker: &str, label: &str, target: &str) -> String {
        match self {
            AssetKind::Image => format!("![{label}]({target})"),
            AssetKind::Audio => format!("{audio_marker}[{label}]({target})"),
        }
    }
}

/// Where the target of a reference lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "path", rename_all = "lowercase")]
pub enum AssetLocation {
    /// Local file, joined onto the document's directory as given: absolute
    /// when the document path is absolute, otherwise relative to the current
    /// working directory.
    Local(PathBuf),
    /// Already remote; never uploaded.
    Remote,
}

/// One occurrence of an asset link in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetReference {
    pub label: String,
    pub target: String,
    pub kind: AssetKind,
    pub location: AssetLocation,
    /// Full matched text, e.g. `![diagram](./images/fig1.png)`.
    pub matched: String,
    pub span: Range<usize>,
}

impl AssetReference {
    pub fn is_local(&self) -> bool {
        matches!(self.location, AssetLocation::Local(_))
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            AssetLocation::Local(path) => Some(path),
            AssetLocation::Remote => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceScanner {
    pattern: Regex,
    audio_marker: String,
    remote_host: Option<String>,
}

impl ReferenceScanner {
    /// Build a scanner for the given audio marker. `remote_domain` is the
    /// store's public domain; targets on that host count as remote even
    /// without an `http(s)://` scheme.
    ///
    /// A blank marker would turn every plain `[text](link)` into an audio
    /// reference, so it is replaced by [`DEFAULT_AUDIO_MARKER`].
    pub fn new(audio_marker: &str, remote_domain: Option<&str>) -> Self {
        let audio_marker = if audio_marker.trim().is_empty() {
            warn!("Blank audio marker, using the default");
            DEFAULT_AUDIO_MARKER
        } else {
            audio_marker
        };
        let pattern = format!(
            r"(!|{})\[([^\]]*)\]\(([^)]+)\)",
            regex::escape(audio_marker)
        );
        let pattern = Regex::new(&pattern).expect("escaped marker always forms a valid pattern");
        let remote_host = remote_domain
            .map(|domain| strip_scheme(domain.trim()).trim_end_matches('/').to_string())
            .filter(|host| !host.is_empty());
        Self {
            pattern,
            audio_marker: audio_marker.to_string(),
            remote_host,
        }
    }

    pub fn audio_marker(&self) -> &str {
        &self.audio_marker
    }

    /// Extract all asset references from `text`, which was read from `document`.
    ///
    /// Local targets are resolved against `document`'s parent without touching
    /// the filesystem, so pass an absolute document path to get absolute asset
    /// paths.
    pub fn scan(&self, document: &Path, text: &str) -> Vec<AssetReference> {
        let base_dir = document.parent().unwrap_or_else(|| Path::new(""));
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let kind = if &caps[1] == "!" {
                    AssetKind::Image
                } else {
                    AssetKind::Audio
                };
                let label = caps[2].to_string();
                let target = caps[3].to_string();
                let location = if self.is_remote(&target) {
                    AssetLocation::Remote
                } else {
                    AssetLocation::Local(resolve_local(base_dir, &target))
                };
                Some(AssetReference {
                    label,
                    target,
                    kind,
                    location,
                    matched: whole.as_str().to_string(),
                    span: whole.range(),
                })
            })
            .collect()
    }

    /// True if `target` is a URL or points at the configured store domain.
    pub fn is_remote(&self, target: &str) -> bool {
        if target.starts_with("http://") || target.starts_with("https://") {
            return true;
        }
        match &self.remote_host {
            Some(host) => {
                let bare = strip_scheme(target);
                let bare = bare.strip_prefix("//").unwrap_or(bare);
                bare == host.as_str() || bare.starts_with(&format!("{host}/"))
            }
            None => false,
        }
    }
}

fn strip_scheme(value: &str) -> &str {
    value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value)
}

fn resolve_local(base_dir: &Path, target: &str) -> PathBuf {
    let relative = target.strip_prefix("./").unwrap_or(target);
    base_dir.join(relative)
}
