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


//! Download progress tracking and reporting
//!
//! Progress is reported on a time basis, not per chunk: at most one report
//! per interval (500ms by default). Each report persists the record and then
//! notifies the host's progress channel and the presentation layer.

use crate::download::host::{ForegroundInfo, JobHost, Notifier};
use crate::error::Result;
use crate::storage::models::DownloadRecord;
use crate::storage::store::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Time-based throttle
///
/// The first check is always due so a slow link shows progress right away.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_report: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
        }
    }

    /// Returns true (and restarts the interval) if a report should go out now
    pub fn is_due(&mut self) -> bool {
        let now = Instant::now();
        let due = match self.last_report {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.last_report = Some(now);
        }
        due
    }
}

/// Reports throttled progress for one attempt
pub struct ProgressReporter {
    store: Arc<dyn RecordStore>,
    host: Arc<dyn JobHost>,
    notifier: Arc<dyn Notifier>,
    throttle: ProgressThrottle,
    notification_id: Uuid,
    last_percent: u8,
}

impl ProgressReporter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        host: Arc<dyn JobHost>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        notification_id: Uuid,
    ) -> Self {
        Self {
            store,
            host,
            notifier,
            throttle: ProgressThrottle::new(interval),
            notification_id,
            last_percent: 0,
        }
    }

    pub fn is_due(&mut self) -> bool {
        self.throttle.is_due()
    }

    /// Persist the record, then emit its percentage
    ///
    /// Percentages never go down within one reporter.
    pub async fn report(&mut self, record: &DownloadRecord) -> Result<u8> {
        self.store.update(record).await?;

        let percent = record.progress_percent().max(self.last_percent);
        self.last_percent = percent;

        tracing::debug!(
            content_id = %record.content_id,
            quality = %record.quality,
            downloaded = record.downloaded_length,
            total = record.total_length,
            percent,
            "download progress"
        );

        if let Err(e) = self.host.set_progress(percent).await {
            tracing::warn!(error = %e, "host rejected progress update");
        }
        self.notifier.progress(&ForegroundInfo {
            notification_id: self.notification_id,
            title: record.title.clone(),
            percent,
        });

        Ok(percent)
    }
}
