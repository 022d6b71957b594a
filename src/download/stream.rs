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


//! Streaming a response body into the destination file
//!
//! The file is opened read-write without truncation and seeked once to the
//! resume offset. Chunks are written sequentially from there. The in-memory
//! byte count is copied into the record only after the file has been flushed
//! and synced, so the persisted `downloaded_length` never runs ahead of what
//! is on disk.

use crate::download::progress::ProgressReporter;
use crate::error::{DownloadError, Result};
use crate::storage::models::DownloadRecord;
use futures_util::{Stream, StreamExt};
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Open the destination for random access and position it at `offset`
///
/// The file is sized to `total_length` when that is known and the file is
/// new or the write starts from zero. A resume never touches the length.
pub async fn open_at_offset(path: &Path, offset: u64, total_length: u64) -> Result<File> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .await?;

    let current = file.metadata().await?.len();
    if total_length > 0 && current != total_length && (current == 0 || offset == 0) {
        file.set_len(total_length).await?;
    }

    file.seek(SeekFrom::Start(offset)).await?;
    Ok(file)
}

/// Write `stream` into the file at the record's current offset
///
/// Returns the total bytes durably written (offset included). On error or
/// cancellation the record keeps the last value that was reported.
pub async fn write_stream<S, B, E>(
    stream: S,
    record: &mut DownloadRecord,
    reporter: &mut ProgressReporter,
    cancel: &CancellationToken,
    read_timeout: Duration,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<DownloadError>,
{
    let destination = record.destination_path.clone();
    let file = open_at_offset(&destination, record.downloaded_length, record.total_length).await?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
    let mut written = record.downloaded_length;

    tokio::pin!(stream);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = tokio::time::timeout(read_timeout, stream.next()) => next,
        };

        let chunk = match next {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => break,
            Err(_) => {
                return Err(DownloadError::IoError(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no data received for {}s", read_timeout.as_secs()),
                )))
            }
        };
        let bytes = chunk.as_ref();

        let next_total = written + bytes.len() as u64;
        if record.total_length > 0 && next_total > record.total_length {
            return Err(DownloadError::LengthExceeded {
                expected: record.total_length,
                actual: next_total,
            });
        }

        writer.write_all(bytes).await?;
        written = next_total;

        if reporter.is_due() {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            sync(&mut writer).await?;
            record.downloaded_length = written;
            reporter.report(record).await?;
        }
    }

    sync(&mut writer).await?;
    record.downloaded_length = written;

    Ok(written)
}

async fn sync(writer: &mut BufWriter<File>) -> Result<()> {
    writer.flush().await?;
    writer.get_ref().sync_data().await?;
    Ok(())
}
