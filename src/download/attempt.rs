// Media Download Core - Resumable media downloads for mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Attempt controller
//!
//! One call to [`DownloadWorker::run_attempt`] is one attempt of one job.
//! The host owns scheduling: it calls again with the next attempt number
//! when the outcome is [`AttemptOutcome::Retry`], with whatever backoff it
//! likes.
//!
//! # Attempt flow
//! 1. Budget check (no I/O when exhausted)
//! 2. Foreground request
//! 3. Find the record, or probe to create it
//! 4. `is_downloading = true`, persist
//! 5. Ranged or fresh GET, then stream into the destination
//! 6. `is_downloading = false`, persist, on every exit path
//! 7. Classify: success, retry, cancellation or terminal failure

use crate::config::DownloadConfig;
use crate::download::fetcher::{FetchResponse, RangeFetcher};
use crate::download::host::{ForegroundInfo, JobHost, Notifier};
use crate::download::probe::{probe, ProbeTarget, Probed};
use crate::download::progress::ProgressReporter;
use crate::download::stream::write_stream;
use crate::error::{DownloadError, FailureKind, Result};
use crate::file::DestinationResolver;
use crate::storage::{DownloadKey, DownloadRecord, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Invocation input for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub content_id: String,
    pub quality: String,
    pub title: String,
    #[serde(default)]
    pub cover_url: String,
    pub source_url: String,
    /// Job was scheduled to remove the download; nothing to fetch
    #[serde(default)]
    pub delete: bool,
}

impl DownloadRequest {
    pub fn key(&self) -> DownloadKey {
        DownloadKey::new(self.content_id.clone(), self.quality.clone())
    }
}

/// Result of one attempt, handed back to the host scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Finished, cancelled, or nothing to do
    Success,
    /// Schedule another attempt; partial progress is kept
    Retry,
    /// Give up; the reason is user facing
    TerminalFailure(String),
}

impl AttemptOutcome {
    pub fn is_retry(&self) -> bool {
        matches!(self, AttemptOutcome::Retry)
    }
}

/// Runs download attempts against a record store and a host
pub struct DownloadWorker {
    config: DownloadConfig,
    store: Arc<dyn RecordStore>,
    host: Arc<dyn JobHost>,
    notifier: Arc<dyn Notifier>,
    fetcher: RangeFetcher,
    resolver: DestinationResolver,
    notification_id: Uuid,
}

impl DownloadWorker {
    /// Create a worker; the notification id is fixed for its lifetime
    pub fn new(
        config: DownloadConfig,
        store: Arc<dyn RecordStore>,
        host: Arc<dyn JobHost>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;

        let fetcher = RangeFetcher::new(&config)?;
        let resolver = DestinationResolver::new(
            config.download_directory.clone(),
            config.file_extension.clone(),
        );

        Ok(Self {
            config,
            store,
            host,
            notifier,
            fetcher,
            resolver,
            notification_id: Uuid::new_v4(),
        })
    }

    pub fn notification_id(&self) -> Uuid {
        self.notification_id
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Where the file for this request lives
    pub fn destination_for(&self, request: &DownloadRequest) -> std::path::PathBuf {
        self.resolver.resolve(&request.title, &request.quality)
    }

    /// Run one attempt. Never returns an error; every failure is an outcome.
    pub async fn run_attempt(
        &self,
        request: &DownloadRequest,
        attempt_number: u32,
        cancel: &CancellationToken,
    ) -> AttemptOutcome {
        let key = request.key();

        if request.delete {
            tracing::info!(key = %key, "delete requested, nothing to download");
            return AttemptOutcome::Success;
        }

        if attempt_number > self.config.max_attempts {
            let err = DownloadError::TooManyAttempts {
                attempts: attempt_number,
                max: self.config.max_attempts,
            };
            tracing::error!(key = %key, attempt = attempt_number, max = self.config.max_attempts, "attempt budget exhausted");
            let reason = err.user_message();
            self.notifier
                .failure(self.notification_id, &request.title, &reason);
            return AttemptOutcome::TerminalFailure(reason);
        }

        tracing::info!(key = %key, attempt = attempt_number, "starting download attempt");

        let foreground = ForegroundInfo {
            notification_id: self.notification_id,
            title: request.title.clone(),
            percent: 0,
        };
        if let Err(e) = self.host.request_foreground(&foreground).await {
            tracing::warn!(key = %key, error = %e, "foreground request rejected, continuing");
        }

        let mut active: Option<DownloadRecord> = None;
        let mut result = self.download(request, cancel, &mut active).await;

        if let Some(record) = active.as_mut() {
            record.is_downloading = false;
            if let Err(e) = self.store.update(record).await {
                tracing::error!(key = %key, error = %e, "failed to persist final download state");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.classify(request, attempt_number, result)
    }

    /// Prepare the record and transfer. `active` holds the record once it
    /// exists so the caller can clear `is_downloading` afterwards.
    async fn download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
        active: &mut Option<DownloadRecord>,
    ) -> Result<()> {
        let key = request.key();

        let (record, probed) = match self.store.find_by_key(&key).await? {
            Some(record) => (record, None),
            None => {
                let destination = self.destination_for(request);
                let target = ProbeTarget {
                    key: &key,
                    title: &request.title,
                    cover_url: &request.cover_url,
                    source_url: &request.source_url,
                    destination: &destination,
                };
                match probe(&self.fetcher, self.store.as_ref(), target, cancel).await? {
                    Some(Probed { record, response }) => (record, Some(response)),
                    None => {
                        return Err(DownloadError::ProbeFailed(format!(
                            "no length learned for {}",
                            key
                        )))
                    }
                }
            }
        };

        let record = active.insert(record);

        if record.is_complete() {
            tracing::info!(key = %key, "download already complete");
            return Ok(());
        }

        if record.source_url != request.source_url {
            tracing::debug!(key = %key, "source url changed since record was created");
            record.source_url = request.source_url.clone();
        }

        let resume = record.is_resumable();
        if resume {
            check_partial_file(record).await?;
        }

        record.is_downloading = true;
        self.store.update(record).await?;

        let response = match probed {
            Some(response) => response,
            None => {
                self.fetcher
                    .fetch(&record.source_url, record.downloaded_length, cancel)
                    .await?
            }
        };

        self.reconcile_total(record, &response, resume).await?;

        tracing::info!(
            key = %key,
            offset = record.downloaded_length,
            total = record.total_length,
            resume,
            "streaming download"
        );

        let mut reporter = ProgressReporter::new(
            self.store.clone(),
            self.host.clone(),
            self.notifier.clone(),
            self.config.progress_interval(),
            self.notification_id,
        );
        let written = write_stream(
            response.into_body_stream(),
            record,
            &mut reporter,
            cancel,
            self.config.read_timeout(),
        )
        .await?;

        if self.config.verify_length && written < record.total_length {
            return Err(DownloadError::TruncatedBody {
                expected: record.total_length,
                actual: written,
            });
        }

        Ok(())
    }

    /// Apply the length the server reports to the record
    ///
    /// A fresh start adopts it before any bytes are written. A resume must
    /// see the same total it started with.
    async fn reconcile_total(
        &self,
        record: &mut DownloadRecord,
        response: &FetchResponse,
        resume: bool,
    ) -> Result<()> {
        let Some(total) = response.total_length else {
            return Ok(());
        };

        if total == record.total_length {
            return Ok(());
        }

        if resume {
            return Err(DownloadError::SourceChanged {
                expected: record.total_length,
                actual: total,
            });
        }

        if total > 0 {
            tracing::info!(
                content_id = %record.content_id,
                quality = %record.quality,
                old_total = record.total_length,
                new_total = total,
                "updating total length"
            );
            record.total_length = total;
            self.store.update(record).await?;
        }

        Ok(())
    }

    fn classify(
        &self,
        request: &DownloadRequest,
        attempt_number: u32,
        result: Result<()>,
    ) -> AttemptOutcome {
        let key = request.key();

        let err = match result {
            Ok(()) => {
                tracing::info!(key = %key, attempt = attempt_number, "download finished");
                self.notifier.success(self.notification_id, &request.title);
                return AttemptOutcome::Success;
            }
            Err(e) => e,
        };

        match err.kind() {
            FailureKind::Cancelled => {
                tracing::info!(key = %key, attempt = attempt_number, "download cancelled, progress kept");
                AttemptOutcome::Success
            }
            FailureKind::Transient => {
                tracing::warn!(key = %key, attempt = attempt_number, error = %err, "download attempt failed, will retry");
                AttemptOutcome::Retry
            }
            FailureKind::Fatal => {
                tracing::error!(key = %key, attempt = attempt_number, error = %err, "download failed");
                let reason = err.user_message();
                self.notifier
                    .failure(self.notification_id, &request.title, &reason);
                AttemptOutcome::TerminalFailure(reason)
            }
        }
    }
}

/// The file must still hold at least the bytes the record claims
async fn check_partial_file(record: &DownloadRecord) -> Result<()> {
    let path = &record.destination_path;
    let len = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DownloadError::PartialFileMissing(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    if len < record.downloaded_length {
        return Err(DownloadError::PartialFileMissing(format!(
            "{} holds {} bytes, record says {}",
            path.display(),
            len,
            record.downloaded_length
        )));
    }

    Ok(())
}
