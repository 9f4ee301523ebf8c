//! Local-filesystem collaborators.
//!
//! - [`ManifestProblemSource`] serves tasks from a JSON manifest
//! - [`DropDirSubmissionSink`] drops accepted programs into a directory that
//!   an external uploader watches, optionally waiting for its acknowledgment

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::{ProblemData, ProblemSource, SubmissionSink};
use crate::task::{Sample, Task, TaskSnapshot};
use crate::util::slugify;
use crate::wait::{wait_until, WaitOutcome};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task '{name}' has an invalid URL '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("Task '{0}' appears more than once in the manifest")]
    DuplicateTask(String),

    #[error("Tasks '{first}' and '{second}' map to the same file name '{slug}'")]
    SlugCollision {
        first: String,
        second: String,
        slug: String,
    },

    #[error("Task '{0}' is not in the manifest")]
    UnknownTask(String),

    #[error("Task '{0}' has neither `statement` nor `statement_file`")]
    MissingStatement(String),

    #[error("No acknowledgment for '{task}' within {timeout:?}")]
    AckTimedOut { task: String, timeout: Duration },

    #[error("Waiting for acknowledgment of '{0}' was cancelled")]
    AckCancelled(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SourceError + '_ {
    move |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    name: String,
    url: String,
    #[serde(default)]
    statement: Option<String>,
    #[serde(default)]
    statement_file: Option<PathBuf>,
    #[serde(default)]
    samples: Vec<ManifestSample>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestSample {
    input: String,
    output: String,
}

/// Problem source backed by a JSON manifest:
///
/// ```json
/// [{ "name": "A", "url": "https://...", "statement_file": "a.md",
///    "samples": [{ "input": "1 2\n", "output": "3\n" }] }]
/// ```
///
/// `statement_file` is resolved against the manifest's directory and read
/// on every fetch, so edits are picked up between runs.
#[derive(Debug, Clone)]
pub struct ManifestProblemSource {
    base_dir: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl ManifestProblemSource {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(io_error(path))?;
        let entries: Vec<ManifestEntry> =
            serde_json::from_str(&raw).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut seen = HashSet::new();
        let mut slugs: HashMap<String, &str> = HashMap::new();
        for entry in &entries {
            if url::Url::parse(&entry.url).is_err() {
                return Err(SourceError::InvalidUrl {
                    name: entry.name.clone(),
                    url: entry.url.clone(),
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(SourceError::DuplicateTask(entry.name.clone()));
            }
            let slug = slugify(&entry.name);
            if let Some(first) = slugs.insert(slug.clone(), entry.name.as_str()) {
                return Err(SourceError::SlugCollision {
                    first: first.to_string(),
                    second: entry.name.clone(),
                    slug,
                });
            }
            if entry.statement.is_none() && entry.statement_file.is_none() {
                return Err(SourceError::MissingStatement(entry.name.clone()));
            }
        }

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::info!(path = %path.display(), tasks = entries.len(), "Loaded task manifest");
        Ok(Self { base_dir, entries })
    }

    fn entry(&self, name: &str) -> Result<&ManifestEntry, SourceError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| SourceError::UnknownTask(name.to_string()))
    }

    async fn statement(&self, entry: &ManifestEntry) -> Result<String, SourceError> {
        if let Some(text) = &entry.statement {
            return Ok(text.clone());
        }
        let Some(file) = &entry.statement_file else {
            return Err(SourceError::MissingStatement(entry.name.clone()));
        };
        let path = self.base_dir.join(file);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(io_error(&path))
    }
}

#[async_trait]
impl ProblemSource for ManifestProblemSource {
    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let tasks = self
            .entries
            .iter()
            .map(|e| Task::new(e.name.as_str(), e.url.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    async fn fetch_problem(&self, task: &TaskSnapshot) -> anyhow::Result<ProblemData> {
        let entry = self.entry(&task.name)?;
        let statement = self.statement(entry).await?;
        let samples = entry
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| Sample::new(i + 1, s.input.as_str(), s.output.as_str()))
            .collect();
        Ok(ProblemData { statement, samples })
    }
}

/// Receipt written next to each dropped program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: Uuid,
    pub task: String,
    pub url: String,
    pub file: String,
    pub bytes: usize,
    pub submitted_at: DateTime<Utc>,
}

/// Submission sink that writes `<dir>/<task-slug>.<ext>` plus a
/// `<task-slug>.json` receipt. When an acknowledgment timeout is set, the
/// sink then waits for `<task-slug>.ack` to appear.
#[derive(Debug, Clone)]
pub struct DropDirSubmissionSink {
    dir: PathBuf,
    extension: String,
    ack_timeout: Option<Duration>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl DropDirSubmissionSink {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            ack_timeout: None,
            poll_interval: Duration::from_millis(500),
            cancel: CancellationToken::new(),
        }
    }

    /// Sink configured from `submit_dir`, the program file's extension and
    /// `submit_ack_timeout`.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Self {
        let extension = Path::new(&config.harness.program_file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("txt")
            .to_string();
        Self {
            ack_timeout: config.submit_ack_timeout,
            cancel,
            ..Self::new(&config.submit_dir, extension)
        }
    }

    pub fn with_ack(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self.poll_interval = poll_interval;
        self
    }

    pub fn program_path(&self, task: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", slugify(task), self.extension))
    }

    pub fn ack_path(&self, task: &str) -> PathBuf {
        self.dir.join(format!("{}.ack", slugify(task)))
    }

    /// Write `contents` to `path` through a temporary file and a rename, so
    /// a watcher never sees a partial file.
    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SourceError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("submission");
        let tmp = path.with_file_name(format!(".{}.tmp", file_name));
        tokio::fs::write(&tmp, contents).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, path).await.map_err(io_error(path))
    }

    async fn drop_program(&self, task: &TaskSnapshot, source: &str) -> Result<SubmissionReceipt, SourceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;

        // An ack left by an earlier submission must not confirm this one.
        let ack = self.ack_path(&task.name);
        match tokio::fs::remove_file(&ack).await {
            Ok(()) => tracing::debug!(task = %task.name, "Removed stale acknowledgment"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&ack)(e)),
        }

        let program = self.program_path(&task.name);
        Self::write_atomic(&program, source.as_bytes()).await?;

        let receipt = SubmissionReceipt {
            id: Uuid::new_v4(),
            task: task.name.clone(),
            url: task.url.clone(),
            file: program
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            bytes: source.len(),
            submitted_at: Utc::now(),
        };
        let receipt_path = self.dir.join(format!("{}.json", slugify(&task.name)));
        let json = serde_json::to_vec_pretty(&receipt).map_err(|source| SourceError::Parse {
            path: receipt_path.clone(),
            source,
        })?;
        Self::write_atomic(&receipt_path, &json).await?;

        tracing::info!(task = %task.name, path = %program.display(), id = %receipt.id, "Dropped submission");
        Ok(receipt)
    }

    async fn await_ack(&self, task: &str, timeout: Duration) -> Result<(), SourceError> {
        let ack = self.ack_path(task);
        let outcome = wait_until(
            || {
                let ack = ack.clone();
                async move { tokio::fs::try_exists(&ack).await.ok().filter(|exists| *exists) }
            },
            self.poll_interval,
            timeout,
            &self.cancel,
        )
        .await;

        match outcome {
            WaitOutcome::Ready(_) => {
                tracing::info!(task = %task, "Submission acknowledged");
                Ok(())
            }
            WaitOutcome::TimedOut => Err(SourceError::AckTimedOut {
                task: task.to_string(),
                timeout,
            }),
            WaitOutcome::Cancelled => Err(SourceError::AckCancelled(task.to_string())),
        }
    }
}

#[async_trait]
impl SubmissionSink for DropDirSubmissionSink {
    async fn submit(&self, task: &TaskSnapshot, source: &str) -> anyhow::Result<()> {
        self.drop_program(task, source).await?;
        if let Some(timeout) = self.ack_timeout {
            self.await_ack(&task.name, timeout).await?;
        }
        Ok(())
    }
}
