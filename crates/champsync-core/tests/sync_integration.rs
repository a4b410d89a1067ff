//! Integration tests: the engine with the libcurl transport against a local HTTP server.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use champsync_core::checksum::{self, ContentHash};
use champsync_core::engine::{FetchStatus, SyncEngine, SyncOptions};
use champsync_core::fingerprint::{Fingerprint, FingerprintDb, FingerprintStore};
use champsync_core::manifest::{AssetCategory, DownloadTask};
use champsync_core::retry::RetryPolicy;
use champsync_core::storage::temp_path;
use champsync_core::transport::{CurlTransport, TransportOptions};
use common::asset_server::{AssetServer, Behavior};
use tempfile::tempdir;

fn options(request_timeout: Duration) -> SyncOptions {
    let transport = CurlTransport::new(TransportOptions {
        connect_timeout: Duration::from_secs(2),
        request_timeout,
        ..TransportOptions::default()
    });
    let mut opts = SyncOptions::new(Arc::new(transport));
    opts.retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    };
    opts
}

fn task(key: &str, url: String, dest: &Path, category: AssetCategory) -> DownloadTask {
    DownloadTask::new(key, url, dest, category)
}

fn fingerprint(key: &str, body: &[u8], path: &Path, etag: Option<&str>) -> Fingerprint {
    Fingerprint {
        logical_key: key.to_string(),
        content_hash: ContentHash::of(body),
        byte_length: body.len() as u64,
        local_path: path.to_path_buf(),
        etag: etag.map(str::to_string),
        last_verified_at: 1_700_000_000,
    }
}

#[test]
fn cached_new_and_missing_assets() {
    let server = AssetServer::start(vec![
        ("/Ahri_0.jpg", Behavior::body(b"remote splash")),
        ("/Ahri_Loading.jpg", Behavior::body(b"loading screen art")),
    ]);
    let out = tempdir().unwrap();
    let a = out.path().join("Ahri/skins/Base/splash.jpg");
    std::fs::create_dir_all(a.parent().unwrap()).unwrap();
    std::fs::write(&a, b"cached splash").unwrap();
    let b = out.path().join("Ahri/skins/Base/loading.jpg");
    let c = out.path().join("Ahri/abilities/Q.png");

    let mut store: FingerprintStore =
        vec![fingerprint("A", b"cached splash", &a, None)].into_iter().collect();
    let tasks = vec![
        task("A", server.url("/Ahri_0.jpg"), &a, AssetCategory::Splash),
        task("B", server.url("/Ahri_Loading.jpg"), &b, AssetCategory::Loading),
        task("C", server.url("/Ahri_Q.png"), &c, AssetCategory::Ability),
    ];

    let report = SyncEngine::new(options(Duration::from_secs(5)))
        .sync(&tasks, &mut store, 3)
        .unwrap();

    let statuses: Vec<_> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        [FetchStatus::Skipped, FetchStatus::Downloaded, FetchStatus::Failed]
    );
    assert_eq!(report.outcomes[2].error.as_deref(), Some("HTTP 404"));
    assert_eq!(server.hits("GET", "/Ahri_0.jpg"), 0);
    assert_eq!(server.hits("GET", "/Ahri_Q.png"), 1);

    assert_eq!(std::fs::read(&b).unwrap(), b"loading screen art");
    let fp = store.get("B").unwrap();
    assert_eq!(fp.content_hash, checksum::sha256_path(&b).unwrap());
    assert_eq!(fp.byte_length, 18);
    assert!(store.get("C").is_none());
    assert!(!c.exists());
}

#[test]
fn request_timeout_exhausts_three_attempts() {
    let server = AssetServer::start(vec![(
        "/slow.ogg",
        Behavior::Stall(Duration::from_secs(2), b"late".to_vec()),
    )]);
    let out = tempdir().unwrap();
    let dest = out.path().join("audio/slow.ogg");
    let mut store = FingerprintStore::new();
    let report = SyncEngine::new(options(Duration::from_millis(300)))
        .sync(
            &[task("slow", server.url("/slow.ogg"), &dest, AssetCategory::Audio)],
            &mut store,
            1,
        )
        .unwrap();
    let o = &report.outcomes[0];
    assert_eq!(o.status, FetchStatus::Failed);
    assert_eq!(o.attempts, 3);
    assert!(o.error.as_deref().unwrap().starts_with("timeout"));
    assert_eq!(server.hits("GET", "/slow.ogg"), 3);
    assert!(!dest.exists());
    assert!(!temp_path(&dest).exists());
}

#[test]
fn truncated_body_never_replaces_destination() {
    let server = AssetServer::start(vec![("/tile.jpg", Behavior::Truncated(vec![42u8; 4096]))]);
    let out = tempdir().unwrap();
    let dest = out.path().join("tile.jpg");
    std::fs::write(&dest, b"good old tile").unwrap();
    let mut store = FingerprintStore::new();
    let report = SyncEngine::new(options(Duration::from_secs(5)))
        .sync(
            &[task("tile", server.url("/tile.jpg"), &dest, AssetCategory::Tile)],
            &mut store,
            1,
        )
        .unwrap();
    assert_eq!(report.outcomes[0].status, FetchStatus::Failed);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("partial transfer"));
    assert_eq!(server.hits("GET", "/tile.jpg"), 3);
    assert_eq!(std::fs::read(&dest).unwrap(), b"good old tile");
    assert!(!temp_path(&dest).exists());
    assert!(store.is_empty());
}

#[test]
fn throttled_then_ok_is_retried() {
    let server = AssetServer::start(vec![(
        "/square.png",
        Behavior::FlakyThenOk(2, b"square icon".to_vec()),
    )]);
    let out = tempdir().unwrap();
    let dest = out.path().join("square.png");
    let mut store = FingerprintStore::new();
    let report = SyncEngine::new(options(Duration::from_secs(5)))
        .sync(
            &[task("sq", server.url("/square.png"), &dest, AssetCategory::Square)],
            &mut store,
            1,
        )
        .unwrap();
    assert_eq!(report.outcomes[0].status, FetchStatus::Downloaded);
    assert_eq!(report.outcomes[0].attempts, 3);
    assert_eq!(std::fs::read(&dest).unwrap(), b"square icon");
}

#[test]
fn server_errors_fail_after_retry_budget() {
    let server = AssetServer::start(vec![("/broken.png", Behavior::Status(500))]);
    let out = tempdir().unwrap();
    let dest = out.path().join("broken.png");
    let mut store = FingerprintStore::new();
    let report = SyncEngine::new(options(Duration::from_secs(5)))
        .sync(
            &[task("broken", server.url("/broken.png"), &dest, AssetCategory::Other)],
            &mut store,
            1,
        )
        .unwrap();
    assert_eq!(report.outcomes[0].error.as_deref(), Some("HTTP 500"));
    assert_eq!(report.outcomes[0].attempts, 3);
    assert_eq!(server.hits("GET", "/broken.png"), 3);
    assert!(!dest.exists());
}

#[test]
fn redirects_are_followed() {
    let server = AssetServer::start(vec![
        ("/Special:FilePath/Lux.png", Behavior::Redirect("/images/a/ab/Lux.png".to_string())),
        ("/images/a/ab/Lux.png", Behavior::body(b"lux circle")),
    ]);
    let out = tempdir().unwrap();
    let dest = out.path().join("Lux/circle.png");
    let mut store = FingerprintStore::new();
    let report = SyncEngine::new(options(Duration::from_secs(5)))
        .sync(
            &[task(
                "lux",
                server.url("/Special:FilePath/Lux.png"),
                &dest,
                AssetCategory::Circle,
            )],
            &mut store,
            1,
        )
        .unwrap();
    assert_eq!(report.outcomes[0].status, FetchStatus::Downloaded);
    assert_eq!(std::fs::read(&dest).unwrap(), b"lux circle");
}

#[test]
fn probe_compares_etag_and_length() {
    let server = AssetServer::start(vec![
        ("/same.png", Behavior::tagged(b"same bytes", "v1")),
        ("/retagged.png", Behavior::tagged(b"new  bytes", "v2")),
    ]);
    let out = tempdir().unwrap();
    let same = out.path().join("same.png");
    let retagged = out.path().join("retagged.png");
    std::fs::write(&same, b"same bytes").unwrap();
    std::fs::write(&retagged, b"old  bytes").unwrap();
    let mut store: FingerprintStore = vec![
        fingerprint("same", b"same bytes", &same, Some("v1")),
        fingerprint("retagged", b"old  bytes", &retagged, Some("v1")),
    ]
    .into_iter()
    .collect();

    let mut opts = options(Duration::from_secs(5));
    opts.probe_remote = true;
    let report = SyncEngine::new(opts)
        .sync(
            &[
                task("same", server.url("/same.png"), &same, AssetCategory::Centered),
                task("retagged", server.url("/retagged.png"), &retagged, AssetCategory::Centered),
            ],
            &mut store,
            2,
        )
        .unwrap();

    assert_eq!(report.outcomes[0].status, FetchStatus::Skipped);
    assert_eq!(report.outcomes[1].status, FetchStatus::Downloaded);
    assert_eq!(server.hits("HEAD", "/same.png"), 1);
    assert_eq!(server.hits("GET", "/same.png"), 0);
    assert_eq!(server.hits("GET", "/retagged.png"), 1);
    assert_eq!(store.get("retagged").unwrap().etag.as_deref(), Some("v2"));
    assert_eq!(std::fs::read(&retagged).unwrap(), b"new  bytes");
}

#[tokio::test]
async fn second_run_after_persisting_transfers_nothing() {
    let server = AssetServer::start(vec![
        ("/1.png", Behavior::body(b"one")),
        ("/2.png", Behavior::body(b"two")),
    ]);
    let out = tempdir().unwrap();
    let state = tempdir().unwrap();
    let db = FingerprintDb::open_at(state.path().join("fingerprints.db"))
        .await
        .unwrap();
    let tasks = vec![
        task("one", server.url("/1.png"), &out.path().join("1.png"), AssetCategory::Other),
        task("two", server.url("/2.png"), &out.path().join("2.png"), AssetCategory::Other),
    ];

    for expected in [FetchStatus::Downloaded, FetchStatus::Skipped] {
        let mut store = db.load().await.unwrap();
        let run_tasks = tasks.clone();
        let (report, store) = tokio::task::spawn_blocking(move || {
            let report = SyncEngine::new(options(Duration::from_secs(5)))
                .sync(&run_tasks, &mut store, 2)
                .unwrap();
            (report, store)
        })
        .await
        .unwrap();
        db.save(&store).await.unwrap();
        assert!(report.outcomes.iter().all(|o| o.status == expected));
    }
    assert_eq!(server.hits("GET", "/1.png"), 1);
    assert_eq!(server.hits("GET", "/2.png"), 1);
}
