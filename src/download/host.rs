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


//! Host and presentation collaborators
//!
//! The attempt controller runs inside a job host it does not own (a mobile
//! background-work scheduler, a desktop CLI loop) and reports to a
//! presentation layer it does not render. Both are reached through the
//! traits here.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// What the host shows while a download runs in the foreground
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundInfo {
    /// Stable for the lifetime of one worker
    pub notification_id: Uuid,
    pub title: String,
    pub percent: u8,
}

/// The job execution host running one attempt at a time
#[async_trait]
pub trait JobHost: Send + Sync {
    /// Ask to be run as a long-lived foreground task
    async fn request_foreground(&self, info: &ForegroundInfo) -> Result<()>;

    /// Progress channel, 0-100
    async fn set_progress(&self, percent: u8) -> Result<()>;
}

/// Presentation layer for download events
pub trait Notifier: Send + Sync {
    fn progress(&self, info: &ForegroundInfo);

    fn success(&self, notification_id: Uuid, title: &str);

    fn failure(&self, notification_id: Uuid, title: &str, reason: &str);
}

/// Every event a worker emits, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DownloadEvent {
    Foreground(ForegroundInfo),
    HostProgress { percent: u8 },
    Progress(ForegroundInfo),
    Succeeded { notification_id: Uuid, title: String },
    Failed { notification_id: Uuid, title: String, reason: String },
}

/// Host and notifier that forward everything into an unbounded channel
///
/// Lets a UI layer (or a test) consume events from another task.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: DownloadEvent) {
        // Receiver gone means nobody is watching; the download carries on
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl JobHost for ChannelHost {
    async fn request_foreground(&self, info: &ForegroundInfo) -> Result<()> {
        self.send(DownloadEvent::Foreground(info.clone()));
        Ok(())
    }

    async fn set_progress(&self, percent: u8) -> Result<()> {
        self.send(DownloadEvent::HostProgress { percent });
        Ok(())
    }
}

impl Notifier for ChannelHost {
    fn progress(&self, info: &ForegroundInfo) {
        self.send(DownloadEvent::Progress(info.clone()));
    }

    fn success(&self, notification_id: Uuid, title: &str) {
        self.send(DownloadEvent::Succeeded {
            notification_id,
            title: title.to_string(),
        });
    }

    fn failure(&self, notification_id: Uuid, title: &str, reason: &str) {
        self.send(DownloadEvent::Failed {
            notification_id,
            title: title.to_string(),
            reason: reason.to_string(),
        });
    }
}
