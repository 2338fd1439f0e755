use super::*;
use crate::acquisition::{FormatInfo, MediaFormat, MediaInfo, MockMediaAcquirer};
use crate::staging::StagedFile;
use crate::FetchError;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot()

const PAYLOAD: &[u8] = b"not really a media file, but not empty either";

/// Writes a fixed payload into the staging area the way yt-dlp would
struct FileAcquirer {
    staging: StagingArea,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl FileAcquirer {
    fn new(staging: StagingArea) -> Self {
        Self {
            staging,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl MediaAcquirer for FileAcquirer {
    async fn acquire(&self, _url: &str, format: MediaFormat) -> Result<StagedFile> {
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let reservation = self.staging.reserve();
        let path = reservation.path_with_extension(format.as_str());
        fs_err::write(&path, PAYLOAD)?;
        Ok(reservation.commit(path))
    }

    async fn probe(&self, _url: &str) -> Result<MediaInfo> {
        Ok(MediaInfo::default())
    }
}

fn staging() -> (TempDir, StagingArea) {
    let temp = TempDir::new().unwrap();
    let area = StagingArea::new(temp.path().join("downloads"));
    area.ensure().unwrap();
    (temp, area)
}

fn router(acquirer: Arc<dyn MediaAcquirer>, max_concurrent_jobs: usize) -> Router {
    create_router(AppState::new(acquirer, max_concurrent_jobs), &[])
}

fn post_download(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/download")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).expect("Response should be valid JSON")
}

fn rejecting_mock() -> Arc<dyn MediaAcquirer> {
    let mut mock = MockMediaAcquirer::new();
    mock.expect_acquire().never();
    mock.expect_probe().never();
    Arc::new(mock)
}

#[tokio::test]
async fn test_mp3_download_streams_file_then_deletes_it() {
    let (_temp, area) = staging();
    let app = router(Arc::new(FileAcquirer::new(area.clone())), 3);

    let response = app
        .oneshot(post_download(
            r#"{"url": "https://example.com/video", "format": "mp3"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(headers[header::CONTENT_LENGTH], PAYLOAD.len().to_string().as_str());

    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains(".mp3\""));

    // File exists until the body has been consumed
    assert_eq!(area.list().unwrap().len(), 1);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], PAYLOAD);
    assert!(area.list().unwrap().is_empty(), "staged file must be gone after send");
}

#[tokio::test]
async fn test_format_defaults_to_mp4() {
    let (_temp, area) = staging();
    let app = router(Arc::new(FileAcquirer::new(area.clone())), 3);

    let response = app
        .oneshot(post_download(r#"{"url": "https://example.com/video"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(".mp4\""));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!body.is_empty());
    assert!(area.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_acquisition() {
    let bodies = [
        r#"{}"#,
        r#"{"format": "mp3"}"#,
        r#"{"url": ""}"#,
        r#"{"url": "   ", "format": "mp4"}"#,
        r#"{"url": "https://example.com/video", "format": "wav"}"#,
        r#"{"url": "https://example.com/video", "format": "MP4"}"#,
        r#"{"url": "https://example.com/video", "format": null}"#,
        r#"{"url": "https://example.com/video", "format": ""}"#,
        r#"{"url": 42}"#,
        "not json at all",
        "",
    ];

    for body in bodies {
        let (_temp, area) = staging();
        let app = router(rejecting_mock(), 3);

        let response = app.oneshot(post_download(body)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "body {:?} should be rejected",
            body
        );
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "error": "invalid request" })
        );
        assert!(area.list().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_acquisition_failure_returns_500_with_message() {
    let (_temp, area) = staging();
    let mut mock = MockMediaAcquirer::new();
    mock.expect_acquire()
        .withf(|url, format| url.ends_with("example.com/gone") && *format == MediaFormat::Mp3)
        .times(1)
        .returning(|_, _| {
            Err(FetchError::AcquisitionFailed(
                "ERROR: [generic] Unable to download webpage: HTTP Error 404".to_string(),
            )
            .into())
        });
    let app = router(Arc::new(mock), 3);

    let response = app
        .oneshot(post_download(
            r#"{"url": "https://example.com/gone", "format": "mp3"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({
            "error": "ERROR: [generic] Unable to download webpage: HTTP Error 404"
        })
    );
    assert!(area.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_sequential_requests_use_independent_files() {
    let (_temp, area) = staging();
    let app = router(Arc::new(FileAcquirer::new(area.clone())), 3);
    let mut names = Vec::new();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_download(
                r#"{"url": "https://example.com/video", "format": "mp4"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        names.push(
            response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .to_string(),
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], PAYLOAD);
        assert!(area.list().unwrap().is_empty());
    }

    assert_ne!(names[0], names[1]);
}

#[tokio::test]
async fn test_dropped_response_still_deletes_file() {
    let (_temp, area) = staging();
    let app = router(Arc::new(FileAcquirer::new(area.clone())), 3);

    let response = app
        .oneshot(post_download(r#"{"url": "https://example.com/video"}"#))
        .await
        .unwrap();
    assert_eq!(area.list().unwrap().len(), 1);

    // Client went away before reading anything
    drop(response);
    assert!(area.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_acquisitions_are_bounded_by_permits() {
    let (_temp, area) = staging();
    let acquirer = Arc::new(FileAcquirer {
        delay: Duration::from_millis(50),
        ..FileAcquirer::new(area.clone())
    });
    let app = router(acquirer.clone(), 2);

    let requests = (0..5).map(|_| {
        let app = app.clone();
        async move {
            let response = app
                .oneshot(post_download(r#"{"url": "https://example.com/video"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            to_bytes(response.into_body(), usize::MAX).await.unwrap()
        }
    });
    let bodies = futures_util::future::join_all(requests).await;

    assert_eq!(bodies.len(), 5);
    assert_eq!(acquirer.peak.load(Ordering::SeqCst), 2);
    assert!(area.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_info_endpoint() {
    let mut mock = MockMediaAcquirer::new();
    mock.expect_probe()
        .withf(|url| url.ends_with("example.com/video"))
        .times(1)
        .returning(|_| {
            Ok(MediaInfo {
                title: Some("Example".to_string()),
                duration: Some(61.0),
                view_count: Some(1500),
                description: Some("An example".to_string()),
                ..MediaInfo::default()
            })
        });
    let app = router(Arc::new(mock), 3);

    let request = Request::builder()
        .uri("/info?url=https%3A%2F%2Fexample.com%2Fvideo")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let info = json_body(response).await;
    assert_eq!(info["title"], "Example");
    assert_eq!(info["duration"], 61.0);
    assert_eq!(info["view_count"], 1500);
    assert_eq!(info["description"], "An example");
    assert!(info["formats"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_formats_endpoint_lists_probed_formats() {
    let mut mock = MockMediaAcquirer::new();
    mock.expect_acquire().never();
    mock.expect_probe()
        .withf(|url| url.ends_with("example.com/video"))
        .times(1)
        .returning(|_| {
            Ok(MediaInfo {
                title: Some("Example".to_string()),
                formats: vec![FormatInfo {
                    format_id: Some("22".to_string()),
                    quality: Some("720p".to_string()),
                    container: Some("mp4".to_string()),
                    size: Some("5.0 MB".to_string()),
                    fps: Some(30.0),
                    height: Some(720),
                }],
                ..MediaInfo::default()
            })
        });
    let app = router(Arc::new(mock), 3);

    let request = Request::builder()
        .uri("/formats?url=https%3A%2F%2Fexample.com%2Fvideo")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({
            "formats": [{
                "format_id": "22",
                "quality": "720p",
                "container": "mp4",
                "size": "5.0 MB",
                "fps": 30.0
            }]
        })
    );
}

#[tokio::test]
async fn test_formats_requires_url() {
    let app = router(rejecting_mock(), 3);

    let request = Request::builder()
        .uri("/formats?url=%20")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "invalid request" })
    );
}

#[tokio::test]
async fn test_info_requires_url() {
    let app = router(rejecting_mock(), 3);

    let request = Request::builder().uri("/info").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_index_and_not_found() {
    let app = router(rejecting_mock(), 3);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["endpoints"]["POST /download"].is_string());

    let response = app
        .oneshot(Request::builder().uri("/api/video/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": "endpoint not found" })
    );
}

#[tokio::test]
async fn test_get_on_download_is_not_allowed() {
    let app = router(rejecting_mock(), 3);

    let response = app
        .oneshot(Request::builder().uri("/download").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = create_router(
        AppState::new(rejecting_mock(), 1),
        &["http://localhost:5500".to_string()],
    );

    let request = Request::builder()
        .uri("/")
        .header("Origin", "http://localhost:5500")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5500"
    );
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (_temp, area) = staging();
    let app = router(Arc::new(FileAcquirer::new(area)), 3);

    let requests = [
        Request::builder().uri("/").body(Body::empty()).unwrap(),
        Request::builder().uri("/missing").body(Body::empty()).unwrap(),
        post_download(r#"{"url": "https://example.com/video", "format": "mp3"}"#),
    ];

    for request in requests {
        let response = app.clone().oneshot(request).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
    }
}
