//! Migration engine: moves the local assets of one document to the remote store.
//!
//! Per document the engine:
//!   - reads the text and writes a `<name>.bak` sibling before anything else
//!   - scans asset references and uploads every local one that exists on disk
//!   - replaces each uploaded reference's exact text, all occurrences at once
//!   - writes the document back only if something was migrated, otherwise
//!     removes the backup again
//!
//! Missing files and failed uploads are logged and counted; they never fail the
//! document. Only reading the document, writing the backup and writing the
//! document back are errors.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::MigrationConfig;
use crate::contract::AssetStore;
use crate::legacy::{find_local_substitute, is_legacy_link};
use crate::scan::{AssetLocation, AssetReference, ReferenceScanner};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to read document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write backup {path}: {source}")]
    Backup {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write document {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One rewritten link.
#[derive(Debug, Clone, Serialize)]
pub struct Rewrite {
    pub from: String,
    pub to: String,
}

/// What happened to one document.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub document: PathBuf,
    /// References uploaded and rewritten, legacy relinks included.
    pub migrated: usize,
    /// Local references whose file does not exist.
    pub missing: usize,
    /// Uploads that failed.
    pub failed: usize,
    /// Remote references left as they are.
    pub remote: usize,
    /// Legacy links re-uploaded from a local substitute.
    pub relinked: usize,
    /// Whether the document was rewritten (and its backup kept).
    pub written: bool,
    pub rewrites: Vec<Rewrite>,
}

impl MigrationOutcome {
    fn new(document: &Path) -> Self {
        Self {
            document: document.to_path_buf(),
            migrated: 0,
            missing: 0,
            failed: 0,
            remote: 0,
            relinked: 0,
            written: false,
            rewrites: Vec::new(),
        }
    }

    pub fn skipped(&self) -> usize {
        self.missing + self.failed
    }
}

/// Path of the backup written next to `document`: `guide.md` -> `guide.md.bak`.
pub fn backup_path(document: &Path) -> PathBuf {
    let mut name: OsString = document
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    document.with_file_name(name)
}

/// Namespace under which a document's assets are uploaded: the name of the
/// directory containing it (`tutorial/unit1/guide.md` -> `unit1`).
pub fn namespace_key(document: &Path) -> String {
    fn dir_name(path: &Path) -> Option<String> {
        path.parent()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
    dir_name(document)
        .or_else(|| fs::canonicalize(document).ok().and_then(|abs| dir_name(&abs)))
        .unwrap_or_else(|| "root".to_string())
}

pub struct MigrationEngine<'a, S: AssetStore + ?Sized> {
    config: &'a MigrationConfig,
    store: &'a S,
    scanner: ReferenceScanner,
}

impl<'a, S: AssetStore + ?Sized> MigrationEngine<'a, S> {
    pub fn new(config: &'a MigrationConfig, store: &'a S) -> Self {
        let scanner =
            ReferenceScanner::new(&config.audio_marker, config.remote_domain.as_deref());
        Self {
            config,
            store,
            scanner,
        }
    }

    /// Migrate every local asset of `document`.
    pub async fn migrate_document(
        &self,
        document: &Path,
    ) -> Result<MigrationOutcome, MigrationError> {
        info!(document = %document.display(), "[MIGRATE] Processing document");

        let original = fs::read_to_string(document).map_err(|source| {
            error!(document = %document.display(), error = %source, "[MIGRATE][ERROR] Failed to read document");
            MigrationError::Read {
                path: document.display().to_string(),
                source,
            }
        })?;

        let backup = backup_path(document);
        fs::write(&backup, &original).map_err(|source| {
            error!(backup = %backup.display(), error = %source, "[MIGRATE][ERROR] Failed to write backup");
            MigrationError::Backup {
                path: backup.display().to_string(),
                source,
            }
        })?;
        debug!(backup = %backup.display(), "[MIGRATE] Created backup");

        let references = self.scanner.scan(document, &original);
        let namespace = namespace_key(document);
        debug!(references = references.len(), namespace = %namespace, "[MIGRATE] Scanned document");

        let mut content = original.clone();
        let mut outcome = MigrationOutcome::new(document);
        let mut attempted: HashSet<&str> = HashSet::new();

        for reference in &references {
            match &reference.location {
                AssetLocation::Local(path) => {
                    // Identical references were rewritten (or failed) together with the first one.
                    if !attempted.insert(reference.matched.as_str()) {
                        debug!(reference = %reference.matched, "[MIGRATE] Repeated reference already handled");
                        continue;
                    }
                    if !path.exists() {
                        warn!(document = %document.display(), asset = %path.display(), "[MIGRATE] Referenced file does not exist, skipping");
                        outcome.missing += 1;
                        continue;
                    }
                    if self
                        .upload_and_rewrite(&mut content, &mut outcome, reference, path, &namespace)
                        .await
                    {
                        outcome.migrated += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
                AssetLocation::Remote => {
                    if self
                        .relink_legacy(&mut content, &mut outcome, &mut attempted, document, reference, &namespace)
                        .await
                    {
                        continue;
                    }
                    debug!(link = %reference.target, "[MIGRATE] Remote reference left unchanged");
                    outcome.remote += 1;
                }
            }
        }

        if outcome.migrated > 0 {
            fs::write(document, &content).map_err(|source| {
                error!(document = %document.display(), error = %source, "[MIGRATE][ERROR] Failed to write document, backup kept");
                MigrationError::Write {
                    path: document.display().to_string(),
                    source,
                }
            })?;
            outcome.written = true;
            info!(
                document = %document.display(),
                migrated = outcome.migrated,
                backup = %backup.display(),
                "[MIGRATE] Document rewritten"
            );
        } else {
            if let Err(e) = fs::remove_file(&backup) {
                warn!(backup = %backup.display(), error = %e, "[MIGRATE] Failed to remove unused backup");
            }
            info!(document = %document.display(), "[MIGRATE] Nothing migrated, document left untouched");
        }

        Ok(outcome)
    }

    /// Relink `reference` if it is a legacy link with a local substitute.
    /// Returns true if the reference was handled here (relinked or failed).
    async fn relink_legacy<'r>(
        &self,
        content: &mut String,
        outcome: &mut MigrationOutcome,
        attempted: &mut HashSet<&'r str>,
        document: &Path,
        reference: &'r AssetReference,
        namespace: &str,
    ) -> bool {
        let Some(legacy) = &self.config.legacy else {
            return false;
        };
        if !is_legacy_link(legacy, reference) {
            return false;
        }
        if attempted.contains(reference.matched.as_str()) {
            return true;
        }
        let Some(local) = find_local_substitute(legacy, document, reference) else {
            return false;
        };
        attempted.insert(reference.matched.as_str());
        if self
            .upload_and_rewrite(content, outcome, reference, &local, namespace)
            .await
        {
            outcome.migrated += 1;
            outcome.relinked += 1;
        } else {
            outcome.failed += 1;
        }
        true
    }

    async fn upload_and_rewrite(
        &self,
        content: &mut String,
        outcome: &mut MigrationOutcome,
        reference: &AssetReference,
        local: &Path,
        namespace: &str,
    ) -> bool {
        info!(asset = %local.display(), namespace = %namespace, "[MIGRATE] Uploading asset");
        match self.store.upload(local, namespace).await {
            Ok(url) => {
                let replacement =
                    reference
                        .kind
                        .render(self.scanner.audio_marker(), &reference.label, &url);
                *content = content.replace(&reference.matched, &replacement);
                info!(asset = %local.display(), url = %url, "[MIGRATE] Uploaded and rewrote reference");
                outcome.rewrites.push(Rewrite {
                    from: reference.target.clone(),
                    to: url,
                });
                true
            }
            Err(e) => {
                warn!(asset = %local.display(), error = %e, "[MIGRATE] Upload failed, reference left unchanged");
                false
            }
        }
    }
}
