//! Resumable, retryable downloads of large media files over HTTP
//!
//! The host schedules attempts; each attempt is one call to
//! [`DownloadWorker::run_attempt`], which returns an [`AttemptOutcome`].
//! Progress survives cancellation, crashes and retries through a
//! [`RecordStore`] keyed by (content id, quality).

pub mod config;
pub mod download;
pub mod error;
pub mod file;
pub mod storage;

pub use config::DownloadConfig;
pub use download::{AttemptOutcome, ChannelHost, DownloadEvent, DownloadRequest, DownloadWorker, JobHost, Notifier};
pub use error::{DownloadError, FailureKind, Result};
pub use storage::{Database, DownloadKey, DownloadRecord, MemoryRecordStore, RecordStore, SqliteRecordStore};
