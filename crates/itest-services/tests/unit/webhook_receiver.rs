//! The webhook receiver over real sockets.

use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use itest_services::WebhookReceiver;
use itest_services::webhook::DEFAULT_BODY;

#[tokio::test]
async fn test_default_answer_is_unavailable() {
    let receiver = WebhookReceiver::launch("127.0.0.1:0").await.unwrap();
    assert!(receiver.url().starts_with("http://127.0.0.1:"));

    let res = reqwest::get(format!("{}/anything", receiver.url())).await.unwrap();
    assert_eq!(res.status().as_u16(), 503);
    assert_eq!(res.text().await.unwrap(), DEFAULT_BODY);

    receiver.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_set_handler_receives_requests() {
    let receiver = WebhookReceiver::launch("127.0.0.1:0").await.unwrap();
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::default();

    let sink = Arc::clone(&seen);
    receiver.set_handler(move |req: Request| {
        let sink = Arc::clone(&sink);
        async move {
            let path = req.uri().path().to_string();
            let body = to_bytes(req.into_body(), usize::MAX).await.unwrap_or_default();
            sink.lock()
                .unwrap()
                .push((path, String::from_utf8_lossy(&body).into_owned()));
            StatusCode::NO_CONTENT.into_response()
        }
    });

    let res = reqwest::Client::new()
        .post(format!("{}/notify", receiver.url()))
        .body(r#"{"text":"host down"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![("/notify".to_string(), r#"{"text":"host down"}"#.to_string())]
    );

    receiver.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_cleanup_stops_listening() {
    let receiver = WebhookReceiver::launch("127.0.0.1:0").await.unwrap();
    let url = receiver.url();

    receiver.cleanup().await.unwrap();
    receiver.cleanup().await.unwrap();

    assert!(reqwest::get(&url).await.is_err());
}

#[tokio::test]
async fn test_launch_fails_on_taken_address() {
    let first = WebhookReceiver::launch("127.0.0.1:0").await.unwrap();
    let taken = first.local_addr();

    assert!(WebhookReceiver::launch(taken).await.is_err());

    first.cleanup().await.unwrap();
}
