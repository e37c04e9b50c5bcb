//! Job records and their persistence contract.
//!
//! Upload handling and HTTP routing live outside this crate; what they need
//! from the core is a durable record of each digest job. [`JobStore`] is
//! that contract, and [`JsonFileStore`] is the bundled implementation: one
//! JSON array in a file, written atomically (temp file + rename) so a crash
//! mid-write never leaves a half-serialized store behind.
//!
//! ## Lifecycle
//!
//! A job is created `Processing` and transitions exactly once to
//! `Complete` or `Failed`; after that it is immutable except for deletion.
//! [`JobRecord::finish_complete`] and [`JobRecord::finish_failed`] enforce
//! the single transition. All store mutations for a given file are
//! serialized behind one async mutex — one writer per store, even when
//! multiple documents are digested concurrently.

use crate::error::DigestError;
use crate::output::DigestOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Processing state of one digest job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
    Failed,
}

/// One digest job as the job-management layer sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    /// Unix timestamp (seconds) of job creation.
    pub created_at: u64,
    pub status: JobStatus,
    /// Per-section summaries, present once the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<BTreeMap<String, String>>,
    /// Synthesized summary, present once the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Failure message, present once the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// Create a new record in the `Processing` state.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: id.into(),
            title: title.into(),
            created_at,
            status: JobStatus::Processing,
            sections: None,
            summary: None,
            error: None,
        }
    }

    fn ensure_processing(&self) -> Result<(), DigestError> {
        if self.status != JobStatus::Processing {
            return Err(DigestError::JobAlreadyFinished {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Transition `Processing` → `Complete`, attaching the digest output.
    pub fn finish_complete(&mut self, output: &DigestOutput) -> Result<(), DigestError> {
        self.ensure_processing()?;
        self.status = JobStatus::Complete;
        self.sections = Some(
            output
                .sections
                .iter()
                .map(|r| (r.label.as_str().to_string(), r.summary.clone()))
                .collect(),
        );
        self.summary = Some(output.summary.clone());
        Ok(())
    }

    /// Transition `Processing` → `Failed` with a message.
    pub fn finish_failed(&mut self, message: impl Into<String>) -> Result<(), DigestError> {
        self.ensure_processing()?;
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        Ok(())
    }
}

/// Persistence contract for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Add a new record.
    async fn append(&self, record: JobRecord) -> Result<(), DigestError>;

    /// Fetch one record by id.
    async fn get(&self, id: &str) -> Result<Option<JobRecord>, DigestError>;

    /// All records, in insertion order.
    async fn list(&self) -> Result<Vec<JobRecord>, DigestError>;

    /// Replace the record with the same id.
    async fn update(&self, record: JobRecord) -> Result<(), DigestError>;

    /// Remove a record; returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, DigestError>;
}

/// JSON-array file store.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes load-modify-save cycles; one writer per store.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<JobRecord>, DigestError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                serde_json::from_str(&text).map_err(|e| DigestError::StoreCorrupt {
                    path: self.path.clone(),
                    detail: e.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(DigestError::StoreIo {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Atomic write: serialize to a sibling temp file, then rename over the
    /// store file.
    async fn save(&self, records: &[JobRecord]) -> Result<(), DigestError> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| DigestError::Internal(format!("job serialization: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DigestError::StoreIo {
                        path: self.path.clone(),
                        source: e,
                    })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| DigestError::StoreIo {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DigestError::StoreIo {
                path: self.path.clone(),
                source: e,
            })
    }
}

#[async_trait]
impl JobStore for JsonFileStore {
    async fn append(&self, record: JobRecord) -> Result<(), DigestError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        records.push(record);
        self.save(&records).await
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, DigestError> {
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }

    async fn list(&self) -> Result<Vec<JobRecord>, DigestError> {
        self.load().await
    }

    async fn update(&self, record: JobRecord) -> Result<(), DigestError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let Some(slot) = records.iter_mut().find(|r| r.id == record.id) else {
            return Err(DigestError::JobNotFound { id: record.id });
        };
        *slot = record;
        self.save(&records).await
    }

    async fn delete(&self, id: &str) -> Result<bool, DigestError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        let removed = records.len() != before;
        if removed {
            self.save(&records).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{DigestStats, SectionReport, VerificationStatus, NOT_REPORTED};
    use crate::pipeline::segment::{SectionLabel, SegmentationMode};

    fn sample_output() -> DigestOutput {
        DigestOutput {
            sections: vec![SectionReport {
                label: SectionLabel::Results,
                summary: "Accuracy was 85 percent.".into(),
                status: VerificationStatus::Accepted,
                source_chars: 300,
                chunk_count: 1,
                input_tokens: 100,
                output_tokens: 10,
                duration_ms: 50,
                retries: 0,
                error: None,
            }],
            summary: "Background: a study. Results: accuracy was 85 percent.".into(),
            stats: DigestStats {
                total_sections: 1,
                summarized_sections: 1,
                failed_sections: 0,
                skipped_sections: 0,
                total_input_tokens: 100,
                total_output_tokens: 10,
                total_duration_ms: 60,
                generation_duration_ms: 50,
                synthesis_fallback: false,
                segmentation: SegmentationMode::Headers,
            },
        }
    }

    #[tokio::test]
    async fn append_get_list_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("papers.json"));

        store.append(JobRecord::new("paper_1", "First")).await.unwrap();
        store.append(JobRecord::new("paper_2", "Second")).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "paper_1");

        let one = store.get("paper_2").await.unwrap().unwrap();
        assert_eq!(one.title, "Second");
        assert_eq!(one.status, JobStatus::Processing);

        assert!(store.delete("paper_1").await.unwrap());
        assert!(!store.delete("paper_1").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.json");
        tokio::fs::write(&path, "{ not an array").await.unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.list().await,
            Err(DigestError::StoreCorrupt { .. })
        ));
    }

    #[tokio::test]
    async fn job_transitions_exactly_once() {
        let mut record = JobRecord::new("paper_9", "Ninth");
        record.finish_complete(&sample_output()).unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(
            record.sections.as_ref().unwrap().get("results").unwrap(),
            "Accuracy was 85 percent."
        );

        // Second transition of either kind must be rejected.
        assert!(matches!(
            record.finish_failed("late failure"),
            Err(DigestError::JobAlreadyFinished { .. })
        ));
        assert!(matches!(
            record.finish_complete(&sample_output()),
            Err(DigestError::JobAlreadyFinished { .. })
        ));
    }

    #[tokio::test]
    async fn failed_job_carries_its_message() {
        let mut record = JobRecord::new("paper_3", "Third");
        record.finish_failed("backend unavailable").unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("backend unavailable"));
        assert!(record.sections.is_none());
    }

    #[tokio::test]
    async fn update_replaces_by_id_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("papers.json"));

        store.append(JobRecord::new("paper_5", "Fifth")).await.unwrap();
        let mut record = store.get("paper_5").await.unwrap().unwrap();
        record.finish_complete(&sample_output()).unwrap();
        store.update(record).await.unwrap();

        let reloaded = store.get("paper_5").await.unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Complete);
        assert!(reloaded.summary.as_ref().unwrap().contains("85 percent"));

        let unknown = JobRecord::new("paper_404", "Missing");
        assert!(matches!(
            store.update(unknown).await,
            Err(DigestError::JobNotFound { .. })
        ));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }

    // NOT_REPORTED keeps its literal shape through the store.
    #[tokio::test]
    async fn not_reported_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("papers.json"));
        let mut record = JobRecord::new("paper_7", "Seventh");
        let mut output = sample_output();
        output.sections[0].summary = NOT_REPORTED.to_string();
        record.finish_complete(&output).unwrap();
        store.append(record).await.unwrap();

        let reloaded = store.get("paper_7").await.unwrap().unwrap();
        assert_eq!(
            reloaded.sections.unwrap().get("results").unwrap(),
            NOT_REPORTED
        );
    }
}
