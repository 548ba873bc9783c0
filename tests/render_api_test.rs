//! HTTP-level render server tests
//!
//! Drives the full router (admission, validation, cache, inline and heavy
//! rendering) through `axum_test::TestServer` with a cache directory rooted in
//! a per-test temp dir.

use axum::http::StatusCode;
use axum_test::TestServer;
use image::GrayImage;
use rstest::rstest;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use mandelbrot_server::{
    cache::CacheStore,
    config::Config,
    heavy_queue::HeavyRequestScheduler,
    models::{RenderRequest, Resolution},
    render::{Bitmap, EscapeTimeEngine, RenderEngine},
    services::RenderService,
    web::{AppState, create_router},
};

/// Real escape-time engine for light requests, blank bitmap for heavy ones
#[derive(Default)]
struct InstrumentedEngine {
    inner: EscapeTimeEngine,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    hold: Duration,
}

impl RenderEngine for InstrumentedEngine {
    fn render(&self, request: &RenderRequest) -> Bitmap {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.hold);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if request.is_heavy() {
            GrayImage::new(4, 4)
        } else {
            self.inner.render(request)
        }
    }
}

struct TestApp {
    server: TestServer,
    engine: Arc<InstrumentedEngine>,
    cache_dir: PathBuf,
    _parent: TempDir,
}

fn spawn_app(engine: InstrumentedEngine, max_connections: usize, heavy_delay: Duration) -> TestApp {
    let parent = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.web.max_connections = max_connections;
    config.heavy.simulated_delay = heavy_delay;
    config.cache.parent_dir = parent.path().to_path_buf();

    let cache = CacheStore::from_config(&config.cache).unwrap();
    let cache_dir = cache.directory().to_path_buf();

    let engine = Arc::new(engine);
    let (scheduler, _worker) = HeavyRequestScheduler::spawn(engine.clone(), heavy_delay);
    let service = RenderService::new(cache, engine.clone(), scheduler, max_connections);

    let server = TestServer::new(create_router(AppState::new(service))).unwrap();
    TestApp {
        server,
        engine,
        cache_dir,
        _parent: parent,
    }
}

fn light_app() -> TestApp {
    spawn_app(InstrumentedEngine::default(), 20, Duration::ZERO)
}

async fn wait_for_file(path: &std::path::Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn cache_entries(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_small_render_is_png_and_cached() {
    let app = light_app();

    let response = app
        .server
        .get("/")
        .add_query_param("x", "0")
        .add_query_param("y", "0")
        .add_query_param("zoom", "1")
        .add_query_param("res", "small")
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "image/png");
    assert_eq!(response.header("x-cache"), "MISS");

    let decoded = image::load_from_memory(response.as_bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 64));

    wait_for_file(&app.cache_dir.join("0E+00-0E+00-1-64.png")).await;
}

#[tokio::test]
async fn test_repeat_request_is_a_cache_hit() {
    let app = light_app();

    let first = app.server.get("/?x=0&y=0&zoom=1&res=small").await;
    first.assert_status_ok();
    wait_for_file(&app.cache_dir.join("0E+00-0E+00-1-64.png")).await;

    let second = app.server.get("/?x=0&y=0&zoom=1&res=small").await;
    second.assert_status_ok();
    assert_eq!(second.header("x-cache"), "HIT");
    assert_eq!(second.as_bytes(), first.as_bytes());
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ultra_request_goes_through_heavy_worker() {
    let delay = Duration::from_millis(200);
    let app = spawn_app(InstrumentedEngine::default(), 20, delay);

    let start = Instant::now();
    let response = app.server.get("/?x=0&y=0&zoom=1&res=ultra").await;
    response.assert_status_ok();
    assert!(start.elapsed() >= delay);
    assert_eq!(response.header("content-type"), "image/png");

    wait_for_file(&app.cache_dir.join("0E+00-0E+00-1-4096.png")).await;
}

#[tokio::test]
async fn test_invalid_zoom_is_rejected_without_side_effects() {
    let app = light_app();

    let response = app.server.get("/?x=0&y=0&zoom=abc&res=small").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_text("400: invalid zoom");
    assert_eq!(
        response.header("content-type"),
        "text/plain; charset=utf-8"
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache_entries(&app.cache_dir).is_empty());
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case::bad_x("/?x=abc&y=0&zoom=1&res=small", "400: failed to parse x")]
#[case::x_too_big("/?x=2.5&y=0&zoom=1&res=small", "400: x must be between -2.0 and 2.0")]
#[case::y_too_small("/?x=0&y=-3&zoom=1&res=small", "400: y must be between -2.0 and 2.0")]
#[case::zoom_with_plus_sign("/?x=0&y=0&zoom=%2B5&res=small", "400: invalid zoom")]
#[case::zoom_zero("/?x=0&y=0&zoom=0&res=small", "400: zoom must be at least 1")]
#[case::bad_res("/?x=0&y=0&zoom=1&res=huge", "400: invalid res")]
#[case::missing_everything("/", "400: failed to parse x")]
#[case::x_checked_before_zoom(
    "/?x=9&y=0&zoom=abc&res=small",
    "400: x must be between -2.0 and 2.0"
)]
#[tokio::test]
async fn test_validation_messages(#[case] uri: &str, #[case] expected: &str) {
    let app = light_app();

    let response = app.server.get(uri).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_text(expected);
}

#[tokio::test]
async fn test_boundary_coordinates_are_accepted() {
    let app = light_app();

    let response = app.server.get("/?x=-2.0&y=2.0&zoom=1&res=small").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_admission_ceiling_limits_concurrent_work() {
    let engine = InstrumentedEngine {
        hold: Duration::from_millis(50),
        ..InstrumentedEngine::default()
    };
    let app = spawn_app(engine, 2, Duration::ZERO);

    let (a, b, c, d) = tokio::join!(
        async { app.server.get("/?x=0&y=0&zoom=1&res=small").await },
        async { app.server.get("/?x=0&y=0&zoom=2&res=small").await },
        async { app.server.get("/?x=0&y=0&zoom=3&res=small").await },
        async { app.server.get("/?x=0&y=0&zoom=4&res=small").await },
    );
    for response in [a, b, c, d] {
        response.assert_status_ok();
    }

    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 4);
    assert!(app.engine.max_active.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_heavy_requests_are_served_one_at_a_time() {
    let engine = InstrumentedEngine {
        hold: Duration::from_millis(20),
        ..InstrumentedEngine::default()
    };
    let app = spawn_app(engine, 20, Duration::from_millis(20));

    let (a, b, c) = tokio::join!(
        async { app.server.get("/?x=0&y=0&zoom=1&res=big").await },
        async { app.server.get("/?x=0&y=0&zoom=2&res=ultra").await },
        async { app.server.get("/?x=0&y=0&zoom=3&res=big").await },
    );
    for response in [a, b, c] {
        response.assert_status_ok();
    }

    assert_eq!(app.engine.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_health_reports_components() {
    let app = light_app();

    app.server
        .get("/?x=0&y=0&zoom=1&res=small")
        .await
        .assert_status_ok();
    wait_for_file(&app.cache_dir.join("0E+00-0E+00-1-64.png")).await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"]["entries"], 1);
    assert_eq!(body["scheduler"]["state"], "idle");
    assert_eq!(body["admission"]["max_connections"], 20);
}

#[test]
fn test_resolution_names_are_lowercase_only() {
    assert_eq!("ultra".parse::<Resolution>().unwrap(), Resolution::Ultra);
    assert!("ULTRA".parse::<Resolution>().is_err());
}
