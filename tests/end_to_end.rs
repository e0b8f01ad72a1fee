//! Exercises spec.md §8's end-to-end scenarios against an in-process
//! Instance + control router, using `/bin/true`/`/bin/false` as stand-ins
//! for the external encoder (they satisfy the `-version` probe contract
//! loosely enough for these tests, which call `Instance` directly and
//! never invoke the real CLI probe).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use relay::control;
use relay::instance::Instance;
use relay::rtsp_handler::RtspHandler;

fn fixed_port(offset: u16) -> u16 {
    20000 + offset
}

async fn test_instance(rtsp_port: u16) -> Arc<Instance> {
    let token = CancellationToken::new();
    let rtsp = Arc::new(RtspHandler::new(rtsp_port, false, token.clone()));
    let instance = Instance::new(rtsp, "/bin/true".into(), rtsp_port, 0, token);
    instance.start().expect("instance should start");
    instance
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn happy_path_create_then_status() {
    let instance = test_instance(fixed_port(1)).await;
    let app = control::router(Arc::clone(&instance), CancellationToken::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/create")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"id": "cam1", "source": "rtsp://example/in"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["source"], "rtsp://0.0.0.0:20001/cam1");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/cam1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_id_rejected() {
    let instance = test_instance(fixed_port(2)).await;
    let app = control::router(Arc::clone(&instance), CancellationToken::new());

    let create = |id: &'static str, source: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/create")
            .header("content-type", "application/json")
            .body(Body::from(json!({"id": id, "source": source}).to_string()))
            .unwrap()
    };

    let first = app
        .clone()
        .oneshot(create("cam1", "rtsp://example/in"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(create("cam1", "rtsp://example/in2"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    let status = instance.unit_status("cam1").await.unwrap();
    assert_eq!(status.original, "rtsp://example/in");
}

#[tokio::test]
async fn stop_then_status_404() {
    let instance = test_instance(fixed_port(3)).await;
    let app = control::router(Arc::clone(&instance), CancellationToken::new());

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/create")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"id": "cam1", "source": "rtsp://example/in"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let stop = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cam1/stop")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stop.status(), StatusCode::OK);

    let status = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/cam1/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::NOT_FOUND);

    let all = app
        .oneshot(
            Request::builder()
                .uri("/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(all.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_id_rejected() {
    let instance = test_instance(fixed_port(4)).await;
    let app = control::router(Arc::clone(&instance), CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/create")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"id": "/bad", "source": "rtsp://x"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
