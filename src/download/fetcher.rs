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


//! Range-aware HTTP fetcher
//!
//! Issues one GET per call. A non-zero offset adds `Range: bytes=<offset>-`
//! and then only `206 Partial Content` is acceptable; without a range only
//! an ordinary 2xx (not 206) is.
//!
//! # Resume Mechanism
//! 1. Send Range header: bytes={offset}-
//! 2. Server responds with 206 Partial Content
//! 3. Content-Range start must equal the requested offset
//! 4. Continue writing from the offset

use crate::config::DownloadConfig;
use crate::error::{status_line, DownloadError, Result};
use futures_util::Stream;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A validated response ready to be streamed
#[derive(Debug)]
pub struct FetchResponse {
    response: Response,
    /// Offset the body starts at
    pub offset: u64,
    pub status: StatusCode,
    /// Full resource length, from Content-Range (206) or Content-Length (200)
    pub total_length: Option<u64>,
}

impl FetchResponse {
    /// Consume the response into its body chunk stream
    pub fn into_body_stream(self) -> impl Stream<Item = reqwest::Result<impl AsRef<[u8]>>> {
        self.response.bytes_stream()
    }
}

/// HTTP fetcher with range support
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    client: Client,
}

impl RangeFetcher {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issue one GET, ranged when `offset > 0`, and validate the status
    pub async fn fetch(
        &self,
        url: &str,
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse> {
        let url = parse_download_url(url)?;

        let mut request = self.client.get(url.clone());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        tracing::info!(
            host = url.host_str().unwrap_or_default(),
            offset,
            status = %status_line(status),
            "download response"
        );

        let total_length = validate_status(status, offset, &response)?;

        Ok(FetchResponse {
            response,
            offset,
            status,
            total_length,
        })
    }
}

fn parse_download_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(DownloadError::InvalidDownloadUrl(format!(
            "Unsupported scheme '{}' in {}",
            other, url
        ))),
    }
}

/// Check the status against what was requested and learn the total length
fn validate_status(status: StatusCode, offset: u64, response: &Response) -> Result<Option<u64>> {
    let ranged = offset > 0;

    match status {
        StatusCode::PARTIAL_CONTENT if ranged => {
            let content_range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range);

            match content_range {
                Some(range) if range.start != offset => Err(DownloadError::ContentRangeMismatch {
                    requested: offset,
                    served: range.start,
                }),
                Some(range) => Ok(range.total),
                // Trust the status when the header is absent or opaque
                None => Ok(response.content_length().map(|len| len + offset)),
            }
        }
        StatusCode::PARTIAL_CONTENT => Err(DownloadError::RangeMismatch {
            expected: StatusCode::OK.as_u16(),
            actual: status.as_u16(),
        }),
        s if s.is_success() && ranged => Err(DownloadError::RangeMismatch {
            expected: StatusCode::PARTIAL_CONTENT.as_u16(),
            actual: s.as_u16(),
        }),
        s if s.is_success() => Ok(response.content_length()),
        s => Err(DownloadError::unexpected_status(s)),
    }
}

/// Parsed `Content-Range: bytes <start>-<end>/<total>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    /// `None` when the server sends `*`
    pub total: Option<u64>,
}

pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;

    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };

    if end < start {
        return None;
    }

    Some(ContentRange { start, end, total })
}
