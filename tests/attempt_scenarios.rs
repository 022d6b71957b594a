//! End-to-end attempt scenarios
//!
//! Runs the attempt controller against a local HTTP server and the SQLite
//! record store, checking the outcome, the persisted record and the file.

use media_download_core::{
    AttemptOutcome, ChannelHost, Database, DownloadConfig, DownloadEvent, DownloadRecord,
    DownloadRequest, DownloadWorker, RecordStore, SqliteRecordStore,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MEDIA_PATH: &str = "/media/abc-123.mp4";

struct Harness {
    _dir: TempDir,
    server: MockServer,
    store: Arc<SqliteRecordStore>,
    worker: DownloadWorker,
    events: UnboundedReceiver<DownloadEvent>,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let db = Database::new_in_memory().await.unwrap();
        let store = Arc::new(SqliteRecordStore::new(db));
        let (host, events) = ChannelHost::new();
        let host = Arc::new(host);

        let config = DownloadConfig {
            download_directory: dir.path().join("downloads"),
            ..Default::default()
        };
        let worker = DownloadWorker::new(config, store.clone(), host.clone(), host).unwrap();

        Self {
            _dir: dir,
            server,
            store,
            worker,
            events,
        }
    }

    fn request(&self) -> DownloadRequest {
        DownloadRequest {
            content_id: "abc-123".to_string(),
            quality: "720p".to_string(),
            title: "Sample Clip".to_string(),
            cover_url: "https://img.example.com/abc-123.jpg".to_string(),
            source_url: format!("{}{}", self.server.uri(), MEDIA_PATH),
            delete: false,
        }
    }

    /// Store a record that already has `downloaded` bytes on disk
    async fn seed_partial(&self, body: &[u8], downloaded: usize) -> DownloadRecord {
        let req = self.request();
        let destination = self.worker.destination_for(&req);
        std::fs::create_dir_all(destination.parent().unwrap()).unwrap();

        let mut file = vec![0u8; body.len()];
        file[..downloaded].copy_from_slice(&body[..downloaded]);
        std::fs::write(&destination, file).unwrap();

        let mut record = DownloadRecord::new(
            &req.key(),
            &req.title,
            &req.cover_url,
            &req.source_url,
            destination,
            body.len() as u64,
        );
        record.downloaded_length = downloaded as u64;
        self.store.insert(&record).await.unwrap();
        record
    }

    async fn stored(&self) -> Option<DownloadRecord> {
        self.store.find_by_key(&self.request().key()).await.unwrap()
    }

    fn drain_events(&mut self) -> Vec<DownloadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn media_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn partial(body: &[u8], from: usize) -> ResponseTemplate {
    ResponseTemplate::new(206)
        .insert_header(
            "Content-Range",
            format!("bytes {}-{}/{}", from, body.len() - 1, body.len()).as_str(),
        )
        .set_body_bytes(body[from..].to_vec())
}

#[tokio::test]
async fn test_fresh_download_completes() {
    let mut h = Harness::new().await;
    let body = media_body(1000);

    Mock::given(method("GET"))
        .and(path(MEDIA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 1, &CancellationToken::new()).await;
    assert_eq!(outcome, AttemptOutcome::Success);

    let record = h.stored().await.expect("record created by probe");
    assert_eq!(record.total_length, 1000);
    assert_eq!(record.downloaded_length, 1000);
    assert!(!record.is_downloading);
    assert_eq!(record.cover_url, "https://img.example.com/abc-123.jpg");
    assert_eq!(std::fs::read(&record.destination_path).unwrap(), body);

    let events = h.drain_events();
    assert!(matches!(events.first(), Some(DownloadEvent::Foreground(_))));
    assert!(matches!(
        events.last(),
        Some(DownloadEvent::Succeeded { title, .. }) if title == "Sample Clip"
    ));
}

#[tokio::test]
async fn test_resume_requests_exact_offset() {
    let h = Harness::new().await;
    let body = media_body(1000);
    h.seed_partial(&body, 400).await;

    Mock::given(method("GET"))
        .and(path(MEDIA_PATH))
        .and(header("Range", "bytes=400-"))
        .respond_with(partial(&body, 400))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 2, &CancellationToken::new()).await;
    assert_eq!(outcome, AttemptOutcome::Success);

    let record = h.stored().await.unwrap();
    assert_eq!(record.downloaded_length, 1000);
    assert!(!record.is_downloading);
    assert_eq!(std::fs::read(&record.destination_path).unwrap(), body);
}

#[tokio::test]
async fn test_resume_answered_with_full_body_retries() {
    let h = Harness::new().await;
    let body = media_body(1000);
    h.seed_partial(&body, 400).await;

    Mock::given(method("GET"))
        .and(path(MEDIA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 1, &CancellationToken::new()).await;
    assert_eq!(outcome, AttemptOutcome::Retry);

    let record = h.stored().await.unwrap();
    assert_eq!(record.downloaded_length, 400);
    assert!(!record.is_downloading);
}

#[tokio::test]
async fn test_budget_exhausted_without_network() {
    let mut h = Harness::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(media_body(10)))
        .expect(0)
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 4, &CancellationToken::new()).await;
    assert_eq!(outcome, AttemptOutcome::TerminalFailure("Too many attempts".to_string()));
    assert!(h.stored().await.is_none());

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], DownloadEvent::Failed { reason, .. } if reason == "Too many attempts"));
}

#[tokio::test]
async fn test_failing_source_retries_until_budget() {
    let h = Harness::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    for attempt in 1..=3 {
        let outcome = h.worker.run_attempt(&h.request(), attempt, &cancel).await;
        assert_eq!(outcome, AttemptOutcome::Retry, "attempt {}", attempt);
        // Probe failures leave neither a record nor an empty file behind
        assert!(h.stored().await.is_none());
        assert!(!h.worker.destination_for(&h.request()).exists());
    }

    let outcome = h.worker.run_attempt(&h.request(), 4, &cancel).await;
    assert!(matches!(outcome, AttemptOutcome::TerminalFailure(_)));

    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_cancel_keeps_partial_progress() {
    let mut h = Harness::new().await;
    let body = media_body(1000);
    h.seed_partial(&body, 400).await;

    Mock::given(method("GET"))
        .and(header("Range", "bytes=400-"))
        .respond_with(partial(&body, 400).set_delay(Duration::from_secs(10)))
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let outcome = h.worker.run_attempt(&h.request(), 1, &cancel).await;
    assert_eq!(outcome, AttemptOutcome::Success);

    let record = h.stored().await.unwrap();
    assert_eq!(record.downloaded_length, 400);
    assert!(!record.is_downloading);

    // Cancellation is neither a success nor a failure notification
    let events = h.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, DownloadEvent::Succeeded { .. } | DownloadEvent::Failed { .. })));
}

#[tokio::test]
async fn test_truncated_body_resumes_next_attempt() {
    let h = Harness::new().await;
    let body = media_body(1000);
    h.seed_partial(&body, 400).await;

    // Claims the rest of the file but closes after 100 bytes
    Mock::given(method("GET"))
        .and(header("Range", "bytes=400-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 400-999/1000")
                .set_body_bytes(body[400..500].to_vec()),
        )
        .mount(&h.server)
        .await;

    let cancel = CancellationToken::new();
    let outcome = h.worker.run_attempt(&h.request(), 1, &cancel).await;
    assert_eq!(outcome, AttemptOutcome::Retry);
    assert_eq!(h.stored().await.unwrap().downloaded_length, 500);

    h.server.reset().await;
    Mock::given(method("GET"))
        .and(header("Range", "bytes=500-"))
        .respond_with(partial(&body, 500))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 2, &cancel).await;
    assert_eq!(outcome, AttemptOutcome::Success);

    let record = h.stored().await.unwrap();
    assert_eq!(record.downloaded_length, 1000);
    assert_eq!(std::fs::read(&record.destination_path).unwrap(), body);
}

#[tokio::test]
async fn test_changed_source_is_terminal() {
    let h = Harness::new().await;
    let body = media_body(1000);
    h.seed_partial(&body, 400).await;

    Mock::given(method("GET"))
        .and(header("Range", "bytes=400-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 400-1199/1200")
                .set_body_bytes(vec![0u8; 800]),
        )
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 1, &CancellationToken::new()).await;
    assert!(matches!(outcome, AttemptOutcome::TerminalFailure(_)));

    let record = h.stored().await.unwrap();
    assert_eq!(record.total_length, 1000);
    assert_eq!(record.downloaded_length, 400);
    assert!(!record.is_downloading);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_bounded() {
    let mut h = Harness::new().await;
    let body = media_body(512 * 1024);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 1, &CancellationToken::new()).await;
    assert_eq!(outcome, AttemptOutcome::Success);

    let percents: Vec<u8> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            DownloadEvent::Progress(info) => Some(info.percent),
            _ => None,
        })
        .collect();

    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(percents.iter().all(|p| *p <= 100));
}

#[tokio::test]
async fn test_delete_flag_does_nothing() {
    let mut h = Harness::new().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let req = DownloadRequest {
        delete: true,
        ..h.request()
    };
    let outcome = h.worker.run_attempt(&req, 1, &CancellationToken::new()).await;

    assert_eq!(outcome, AttemptOutcome::Success);
    assert!(h.stored().await.is_none());
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn test_fresh_restart_adopts_smaller_source() {
    let h = Harness::new().await;
    let old = media_body(1000);
    h.seed_partial(&old, 0).await;

    let new = vec![42u8; 800];
    Mock::given(method("GET"))
        .and(path(MEDIA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(new.clone()))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h.worker.run_attempt(&h.request(), 2, &CancellationToken::new()).await;
    assert_eq!(outcome, AttemptOutcome::Success);

    let record = h.stored().await.unwrap();
    assert_eq!(record.total_length, 800);
    assert_eq!(record.downloaded_length, 800);
    assert_eq!(std::fs::read(&record.destination_path).unwrap(), new);
}
