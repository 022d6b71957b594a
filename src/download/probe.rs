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


//! Probe step
//!
//! Runs only when no record exists for a key. A fresh request learns the
//! total length; only then is the destination file pre-sized and the record
//! created. The probe response is handed back so the attempt streams from
//! it instead of issuing a second request.

use crate::download::fetcher::{FetchResponse, RangeFetcher};
use crate::error::{DownloadError, FailureKind, Result};
use crate::storage::models::{DownloadKey, DownloadRecord};
use crate::storage::store::RecordStore;
use std::path::Path;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Descriptive fields for a new record
#[derive(Debug, Clone)]
pub struct ProbeTarget<'a> {
    pub key: &'a DownloadKey,
    pub title: &'a str,
    pub cover_url: &'a str,
    pub source_url: &'a str,
    pub destination: &'a Path,
}

/// A record created by a successful probe, plus the response that proved it
#[derive(Debug)]
pub struct Probed {
    pub record: DownloadRecord,
    pub response: FetchResponse,
}

/// Probe the source and create the record
///
/// Returns `Ok(None)` when no length could be learned; no record is left
/// behind and the next attempt probes again. Cancellation and storage
/// errors are returned as errors.
pub async fn probe(
    fetcher: &RangeFetcher,
    store: &dyn RecordStore,
    target: ProbeTarget<'_>,
    cancel: &CancellationToken,
) -> Result<Option<Probed>> {
    match try_probe(fetcher, store, &target, cancel).await {
        Ok(probed) => {
            tracing::info!(
                key = %target.key,
                total = probed.record.total_length,
                "probe created download record"
            );
            Ok(Some(probed))
        }
        Err(e) if e.kind() == FailureKind::Transient => {
            tracing::warn!(key = %target.key, error = %e, "probe failed");
            remove_empty_artifact(target.destination).await;
            Ok(None)
        }
        Err(e) => {
            remove_empty_artifact(target.destination).await;
            Err(e)
        }
    }
}

async fn try_probe(
    fetcher: &RangeFetcher,
    store: &dyn RecordStore,
    target: &ProbeTarget<'_>,
    cancel: &CancellationToken,
) -> Result<Probed> {
    let response = fetcher.fetch(target.source_url, 0, cancel).await?;

    let total_length = match response.total_length {
        Some(len) if len > 0 => len,
        _ => {
            return Err(DownloadError::ProbeFailed(format!(
                "no content length for {}",
                target.key
            )))
        }
    };

    preallocate(target.destination, total_length).await?;

    let record = DownloadRecord::new(
        target.key,
        target.title,
        target.cover_url,
        target.source_url,
        target.destination.to_path_buf(),
        total_length,
    );
    if let Err(e) = store.insert(&record).await {
        // No record will point at this file
        if let Err(rm) = fs::remove_file(target.destination).await {
            tracing::warn!(path = %target.destination.display(), error = %rm, "could not remove preallocated file");
        }
        return Err(e);
    }

    Ok(Probed { record, response })
}

/// Create the destination and size it to the full length
async fn preallocate(path: &Path, total_length: u64) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .await?;
    file.set_len(total_length).await?;

    Ok(())
}

/// Remove a zero-byte file left by a failed probe
async fn remove_empty_artifact(path: &Path) {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() == 0 => {
            if let Err(e) = fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "could not remove empty file");
            }
        }
        _ => {}
    }
}
