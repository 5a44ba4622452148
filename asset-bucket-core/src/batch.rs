//! Batch runner: resolves input paths to documents and migrates them one by one.
//!
//! Batch semantics are best effort. A document that cannot be read or written
//! is recorded in the report and the run continues with the next one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::contract::AssetStore;
use crate::migrate::{MigrationEngine, MigrationOutcome};

/// Directories never descended into while collecting documents.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("path does not exist: {0}")]
    InputNotFound(String),
    #[error("failed to list directory {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub document: PathBuf,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<MigrationOutcome>,
    pub failures: Vec<DocumentFailure>,
    /// Assets migrated across all documents.
    pub total_migrated: usize,
}

/// Expand `inputs` into the list of documents to migrate.
///
/// Files are kept when they carry `extension`; directories are walked
/// recursively in name order. Any input that does not exist is an error,
/// raised before a single document is touched.
pub fn collect_documents(inputs: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>, BatchError> {
    fn has_extension(path: &Path, extension: &str) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    }

    fn visit_dir(dir: &Path, extension: &str, results: &mut Vec<PathBuf>) -> Result<(), BatchError> {
        let walk_err = |source| BatchError::Walk {
            path: dir.display().to_string(),
            source,
        };
        let mut entries = fs::read_dir(dir)
            .map_err(walk_err)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(walk_err)?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if SKIPPED_DIRS.contains(&name) {
                    debug!(path = %path.display(), "Skipping directory");
                    continue;
                }
                visit_dir(&path, extension, results)?;
            } else if path.is_file() && has_extension(&path, extension) {
                results.push(path);
            }
        }
        Ok(())
    }

    let mut documents = Vec::new();
    for input in inputs {
        if input.is_dir() {
            visit_dir(input, extension, &mut documents)?;
        } else if input.is_file() {
            if has_extension(input, extension) {
                documents.push(input.clone());
            } else {
                warn!(path = %input.display(), extension, "[BATCH] Not a document, skipping");
            }
        } else {
            error!(path = %input.display(), "[BATCH][ERROR] Input path does not exist");
            return Err(BatchError::InputNotFound(input.display().to_string()));
        }
    }

    let mut seen = HashSet::new();
    documents.retain(|doc| seen.insert(doc.clone()));
    info!(count = documents.len(), "[BATCH] Collected documents");
    Ok(documents)
}

/// Migrate each document in turn, collecting outcomes and failures.
pub async fn run_batch<S>(engine: &MigrationEngine<'_, S>, documents: &[PathBuf]) -> BatchReport
where
    S: AssetStore + ?Sized,
{
    info!(documents = documents.len(), "[BATCH] Starting migration run");
    let mut report = BatchReport::default();

    for document in documents {
        match engine.migrate_document(document).await {
            Ok(outcome) => {
                report.total_migrated += outcome.migrated;
                report.outcomes.push(outcome);
            }
            Err(e) => {
                error!(document = %document.display(), error = %e, "[BATCH][ERROR] Document failed, continuing");
                report.failures.push(DocumentFailure {
                    document: document.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        total_migrated = report.total_migrated,
        documents = report.outcomes.len(),
        failures = report.failures.len(),
        "[BATCH] Migration run complete"
    );
    report
}
