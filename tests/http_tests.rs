// HTTP control API tests, driven through the router with tower's oneshot

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{MockConnector, MockDevice};
use emotion_stream::capture::CaptureDevice;
use emotion_stream::config::StreamConfig;
use emotion_stream::http::{DeviceProvider, EmotionsResponse, RecordingResponse};
use emotion_stream::session::{SessionState, SessionStats};
use emotion_stream::{create_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn stream_config() -> StreamConfig {
    StreamConfig {
        endpoint: "ws://inference.test/ws/emotion".to_string(),
        frame_interval_ms: 200,
        connect_timeout_ms: 1000,
        quality: 0.5,
        history_capacity: 10,
    }
}

fn app(connector: &Arc<MockConnector>) -> (Router, AppState) {
    let devices: DeviceProvider = Arc::new(|| {
        let device: Arc<dyn CaptureDevice> = MockDevice::denied();
        Ok(device)
    });
    let state = AppState::new(stream_config(), connector.clone(), devices);
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Result<(StatusCode, Vec<u8>)> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))?;

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let (app, _) = app(&MockConnector::new());

    let (status, body) = send(&app, "GET", "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    Ok(())
}

#[tokio::test]
async fn test_recording_creates_session_per_screen() -> Result<()> {
    let connector = MockConnector::new();
    let (app, state) = app(&connector);

    let (status, body) = send(&app, "POST", "/screens/home/recording", Some(r#"{"recording":true}"#)).await?;
    assert_eq!(status, StatusCode::OK);

    let response: RecordingResponse = serde_json::from_slice(&body)?;
    assert_eq!(response.screen_id, "home");
    assert!(response.is_recording);
    assert!(response.permission_granted, "permission requested on creation");

    send(&app, "POST", "/screens/detection/recording", Some(r#"{"recording":true}"#)).await?;
    assert_eq!(state.sessions.read().await.len(), 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(connector.connects(), 2);

    state.shutdown_all().await;
    assert_eq!(connector.closes(), 2);
    Ok(())
}

#[tokio::test]
async fn test_status_and_emotions() -> Result<()> {
    let connector = MockConnector::new();
    let (app, state) = app(&connector);

    send(&app, "POST", "/screens/home/recording", Some(r#"{"recording":true}"#)).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    connector.push_inbound(r#"{"most_common":{"name":"happy","index":3}}"#);
    connector.push_inbound(r#"{"most_common":{"name":"sad","index":1}}"#);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, body) = send(&app, "GET", "/screens/home/emotions", None).await?;
    assert_eq!(status, StatusCode::OK);
    let emotions: EmotionsResponse = serde_json::from_slice(&body)?;
    assert!(emotions.current.unwrap().same_classification("sad", Some(1)));
    assert_eq!(emotions.history.len(), 2);
    assert_eq!(emotions.history[1].label, "happy");

    let (status, body) = send(&app, "GET", "/screens/home/status", None).await?;
    assert_eq!(status, StatusCode::OK);
    let stats: SessionStats = serde_json::from_slice(&body)?;
    assert_eq!(stats.state, SessionState::Streaming);
    assert_eq!(stats.results_received, 2);
    assert_eq!(stats.connect_attempts, 1);

    state.shutdown_all().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_and_close_session() -> Result<()> {
    let connector = MockConnector::new();
    let (app, state) = app(&connector);

    send(&app, "POST", "/screens/home/recording", Some(r#"{"recording":true}"#)).await?;

    let (status, body) = send(&app, "POST", "/screens/home/recording", Some(r#"{"recording":false}"#)).await?;
    assert_eq!(status, StatusCode::OK);
    let response: RecordingResponse = serde_json::from_slice(&body)?;
    assert_eq!(response.state, SessionState::Idle);
    assert!(!response.is_recording);
    assert_eq!(connector.closes(), 1);

    let (status, _) = send(&app, "POST", "/screens/home/capture", None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/screens/home", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(state.sessions.read().await.is_empty());
    assert_eq!(connector.closes(), 1, "teardown of a stopped session is a no-op");
    Ok(())
}

#[tokio::test]
async fn test_unknown_screen_is_not_found() -> Result<()> {
    let (app, state) = app(&MockConnector::new());

    for (method, uri, body) in [
        ("GET", "/screens/nope/status", None),
        ("GET", "/screens/nope/emotions", None),
        ("POST", "/screens/nope/capture", None),
        ("DELETE", "/screens/nope", None),
        ("POST", "/screens/nope/recording", Some(r#"{"recording":false}"#)),
    ] {
        let (status, body) = send(&app, method, uri, body).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert!(String::from_utf8(body)?.contains("nope"));
    }

    assert!(state.sessions.read().await.is_empty(), "stopping never creates a session");
    Ok(())
}
