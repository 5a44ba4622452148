//! Best-effort relinking of remote links produced by an older naming scheme.
//!
//! A legacy link carries no trace of the local file it was made from, so the
//! local substitute is guessed: the label is turned into a slug (spaces to `-`,
//! lower-cased) and the first file in the document's images directory whose
//! lower-cased name contains that slug is taken. The guess can be wrong; every
//! decision is logged and nothing here is an error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::LegacyConfig;
use crate::scan::{AssetKind, AssetReference};

/// Returns true if `reference` is a remote image link written under the legacy scheme.
pub fn is_legacy_link(config: &LegacyConfig, reference: &AssetReference) -> bool {
    if reference.kind != AssetKind::Image || reference.is_local() {
        return false;
    }
    if !reference.target.contains(&config.url_fragment) {
        return false;
    }
    let file_name = reference.target.rsplit('/').next().unwrap_or_default();
    config.filename_prefixes.is_empty()
        || config
            .filename_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
}

/// Find the local file that most likely produced a legacy link in `document`.
pub fn find_local_substitute(
    config: &LegacyConfig,
    document: &Path,
    reference: &AssetReference,
) -> Option<PathBuf> {
    let images_dir = document
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&config.images_dir);

    let entries = match fs::read_dir(&images_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %images_dir.display(), error = %e, "[LEGACY] Cannot list images directory, skipping relink");
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(&config.image_extension))
        })
        .collect();
    candidates.sort();

    let slug = reference.label.replace(' ', "-").to_lowercase();
    debug!(slug = %slug, candidates = candidates.len(), "[LEGACY] Matching label against local files");

    let found = candidates.into_iter().find(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase().contains(&slug))
            .unwrap_or(false)
    });
    match &found {
        Some(path) => info!(link = %reference.target, local = %path.display(), "[LEGACY] Found local substitute"),
        None => warn!(link = %reference.target, label = %reference.label, "[LEGACY] No local file matches label"),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::AssetLocation;

    fn remote_ref(label: &str, target: &str) -> AssetReference {
        AssetReference {
            label: label.to_string(),
            target: target.to_string(),
            kind: AssetKind::Image,
            location: AssetLocation::Remote,
            matched: format!("![{label}]({target})"),
            span: 0..0,
        }
    }

    #[test]
    fn prefix_filter_limits_legacy_links() {
        let config = LegacyConfig {
            url_fragment: "old.cdn/tutorial/images/".into(),
            filename_prefixes: vec!["fee74e00".into()],
            images_dir: "images".into(),
            image_extension: "png".into(),
        };
        assert!(is_legacy_link(
            &config,
            &remote_ref("x", "https://old.cdn/tutorial/images/fee74e00abc.png")
        ));
        assert!(!is_legacy_link(
            &config,
            &remote_ref("x", "https://old.cdn/tutorial/images/12345678.png")
        ));
        assert!(!is_legacy_link(
            &config,
            &remote_ref("x", "https://new.cdn/tutorial/unit1/fee74e00.png")
        ));
    }
}
