//! Concurrent anonymization of a directory of documents.

use crate::document::{anonymize_text, VersionPolicy};
use anyhow::{Context, Result};
use hostanon_common::{SchemaVersion, Timestamp};
use hostanon_pseudonym::{TableSet, TransformStats};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Documents processed at the same time.
    pub jobs: usize,
    pub version: VersionPolicy,
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Anonymized,
    Failed,
}

/// Outcome for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub file: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<SchemaVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub substituted: usize,
    pub skipped: usize,
}

impl DocumentReport {
    fn failed(file: String, error: String) -> Self {
        Self {
            file,
            status: DocumentStatus::Failed,
            version: None,
            error: Some(error),
            substituted: 0,
            skipped: 0,
        }
    }
}

/// Report of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub duration_ms: i64,
    pub succeeded: usize,
    pub failed: usize,
    pub documents: Vec<DocumentReport>,
    pub totals: TransformStats,
}

/// Anonymize every `*.json` file of the input directory into the output directory.
///
/// A document that fails is reported and does not stop the others.
pub async fn run_batch(tables: Arc<TableSet>, options: BatchOptions) -> Result<BatchReport> {
    let started_at = Timestamp::now();
    let files = list_documents(&options.input_dir)?;
    std::fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", options.output_dir))?;

    info!(
        "Anonymizing {} documents from {:?} with {} jobs",
        files.len(),
        options.input_dir,
        options.jobs
    );

    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let tables = Arc::clone(&tables);
        let options = options.clone();
        let name = file_name(&path);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            process_document(&tables, &path, &options)
        });
        handles.push((name, handle));
    }

    let mut documents = Vec::with_capacity(handles.len());
    let mut totals = TransformStats::default();
    for (name, handle) in handles {
        let report = match handle.await {
            Ok((report, stats)) => {
                if let Some(stats) = stats {
                    totals.merge(&stats);
                }
                report
            }
            Err(e) => DocumentReport::failed(name, format!("worker failed: {}", e)),
        };
        documents.push(report);
    }

    let succeeded = documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Anonymized)
        .count();
    let failed = documents.len() - succeeded;
    let finished_at = Timestamp::now();

    info!("Batch done: {} anonymized, {} failed", succeeded, failed);

    Ok(BatchReport {
        started_at,
        finished_at,
        duration_ms: started_at.millis_until(&finished_at),
        succeeded,
        failed,
        documents,
        totals,
    })
}

fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {:?}", dir))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn process_document(
    tables: &TableSet,
    path: &Path,
    options: &BatchOptions,
) -> (DocumentReport, Option<TransformStats>) {
    let name = file_name(path);
    let result = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))
        .and_then(|input| anonymize_text(tables, &input, options.version, options.pretty))
        .and_then(|out| {
            let target = options.output_dir.join(&name);
            std::fs::write(&target, &out.text)
                .with_context(|| format!("Failed to write {:?}", target))?;
            Ok(out)
        });

    match result {
        Ok(out) => {
            debug!("{}: {} substituted", name, out.stats.substituted);
            let report = DocumentReport {
                file: name,
                status: DocumentStatus::Anonymized,
                version: Some(out.version),
                error: None,
                substituted: out.stats.substituted,
                skipped: out.stats.total_skipped(),
            };
            (report, Some(out.stats))
        }
        Err(e) => {
            warn!("{}: {:#}", name, e);
            (DocumentReport::failed(name, format!("{:#}", e)), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::tables;
    use pretty_assertions::assert_eq;

    fn options(input: &Path, output: &Path) -> BatchOptions {
        BatchOptions {
            input_dir: input.to_path_buf(),
            output_dir: output.to_path_buf(),
            jobs: 2,
            version: VersionPolicy::default(),
            pretty: false,
        }
    }

    #[tokio::test]
    async fn test_failed_document_does_not_stop_batch() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(
            input.path().join("a.json"),
            r#"{"HostDataSchemaVersion":3,"Hostname":"srv-db-01"}"#,
        )
        .unwrap();
        std::fs::write(input.path().join("b.json"), "{not json").unwrap();
        std::fs::write(
            input.path().join("c.json"),
            r#"{"schemaVersion":1,"hostname":"srv-db-01"}"#,
        )
        .unwrap();
        std::fs::write(input.path().join("notes.txt"), "ignored").unwrap();

        let report = run_batch(Arc::new(tables()), options(input.path(), output.path()))
            .await
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let files: Vec<_> = report.documents.iter().map(|d| d.file.as_str()).collect();
        assert_eq!(files, vec!["a.json", "b.json", "c.json"]);
        assert_eq!(report.documents[1].status, DocumentStatus::Failed);
        assert_eq!(report.documents[2].version, Some(SchemaVersion::V1));
        assert_eq!(report.totals.substituted, 2);

        assert!(!output.path().join("b.json").exists());
        let a = std::fs::read_to_string(output.path().join("a.json")).unwrap();
        let c = std::fs::read_to_string(output.path().join("c.json")).unwrap();
        assert!(a.contains("arcturus-38945154f3fd2aeaaf54a81446a5ffea"));
        assert!(c.contains("arcturus-38945154f3fd2aeaaf54a81446a5ffea"));
    }

    #[tokio::test]
    async fn test_default_version_only_for_unmarked_documents() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(
            input.path().join("legacy.json"),
            r#"{"HostDataSchemaVersion":3,"Hostname":"srv-db-01"}"#,
        )
        .unwrap();
        std::fs::write(input.path().join("plain.json"), r#"{"hostname":"srv-db-01"}"#).unwrap();

        let mut options = options(input.path(), output.path());
        options.version.fallback = Some(SchemaVersion::V1);
        let report = run_batch(Arc::new(tables()), options).await.unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(report.documents[0].version, Some(SchemaVersion::V0));
        assert_eq!(report.documents[0].substituted, 1);
        assert_eq!(report.documents[1].version, Some(SchemaVersion::V1));
        assert_eq!(report.documents[1].substituted, 1);
    }

    #[tokio::test]
    async fn test_unknown_version_is_reported() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("x.json"), r#"{"schemaVersion":2}"#).unwrap();

        let report = run_batch(Arc::new(tables()), options(input.path(), output.path()))
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        let error = report.documents[0].error.as_deref().unwrap();
        assert!(error.contains("2"), "{}", error);
    }

    #[tokio::test]
    async fn test_missing_input_dir() {
        let output = tempfile::tempdir().unwrap();
        let missing = output.path().join("nope");
        assert!(run_batch(Arc::new(tables()), options(&missing, output.path()))
            .await
            .is_err());
    }
}
