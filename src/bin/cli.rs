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


use clap::{Parser, Subcommand};
use media_download_core::storage::database::Database;
use media_download_core::{
    AttemptOutcome, ChannelHost, DownloadConfig, DownloadEvent, DownloadKey, DownloadRequest,
    DownloadWorker, RecordStore, SqliteRecordStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const MAX_BACKOFF_SECS: u64 = 32;

#[derive(Parser)]
#[command(name = "download-cli")]
#[command(about = "Media download core - Desktop host for resumable downloads", long_about = None)]
struct Cli {
    /// Record database (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a file, resuming any earlier progress
    Fetch {
        #[arg(long)]
        content_id: String,
        #[arg(long)]
        quality: String,
        #[arg(long)]
        title: String,
        /// Source URL
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        cover_url: String,
        /// Download directory, overrides the configuration
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show the stored record for a download
    Status {
        #[arg(long)]
        content_id: String,
        #[arg(long)]
        quality: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DownloadConfig::load(path)?,
        None => DownloadConfig::default(),
    };
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => Database::get_default_path(),
    };
    let store = Arc::new(SqliteRecordStore::new(Database::new(&db_path).await?));

    match cli.command {
        Commands::Fetch {
            content_id,
            quality,
            title,
            url,
            cover_url,
            dir,
        } => {
            let mut config = config;
            if let Some(dir) = dir {
                config.download_directory = dir;
            }
            let request = DownloadRequest {
                content_id,
                quality,
                title,
                cover_url,
                source_url: url,
                delete: false,
            };
            fetch(config, store, request).await
        }
        Commands::Status { content_id, quality } => {
            let key = DownloadKey::new(content_id, quality);
            match store.find_by_key(&key).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No download recorded for {}", key),
            }
            Ok(())
        }
    }
}

async fn fetch(
    config: DownloadConfig,
    store: Arc<SqliteRecordStore>,
    request: DownloadRequest,
) -> anyhow::Result<()> {
    let (host, mut events) = ChannelHost::new();
    let host = Arc::new(host);
    let worker = DownloadWorker::new(config, store, host.clone(), host)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, pausing download");
            on_signal.cancel();
        }
    });

    let max_attempts = worker.config().max_attempts;
    let mut attempt = 1;
    loop {
        let outcome = worker.run_attempt(&request, attempt, &cancel).await;
        match outcome {
            AttemptOutcome::Success if cancel.is_cancelled() => {
                println!("Paused; run the same command again to resume");
                return Ok(());
            }
            AttemptOutcome::Success => {
                println!("Saved to {}", worker.destination_for(&request).display());
                return Ok(());
            }
            AttemptOutcome::TerminalFailure(reason) => anyhow::bail!(reason),
            AttemptOutcome::Retry => {
                // One extra call past the budget produces the terminal outcome
                let delay = backoff(attempt);
                if attempt <= max_attempts {
                    tracing::info!(attempt, delay_secs = delay.as_secs(), "retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                attempt += 1;
            }
        }
    }
}

/// `2^attempt` seconds, capped
fn backoff(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

fn log_event(event: &DownloadEvent) {
    match event {
        DownloadEvent::Foreground(info) => tracing::info!(title = %info.title, "download running"),
        DownloadEvent::HostProgress { .. } => {}
        DownloadEvent::Progress(info) => {
            tracing::info!(title = %info.title, percent = info.percent, "progress")
        }
        DownloadEvent::Succeeded { title, .. } => tracing::info!(%title, "download complete"),
        DownloadEvent::Failed { title, reason, .. } => {
            tracing::error!(%title, %reason, "download failed")
        }
    }
}
