//! Shared fixtures for itest-services tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use itest_docker::ContainerRuntime;
use itest_docker::mock::MockRuntime;
use itest_services::{DatabaseInfo, DatabaseKind, RelationalDatabase, Result};

/// A database that only carries connection data.
#[derive(Debug)]
pub struct FakeDatabase {
    pub info: DatabaseInfo,
    pub kind: DatabaseKind,
    pub cleanups: Mutex<usize>,
}

impl FakeDatabase {
    pub fn new(kind: DatabaseKind) -> Arc<Self> {
        Arc::new(Self {
            info: DatabaseInfo {
                host: "172.18.0.3".to_string(),
                port: match kind {
                    DatabaseKind::Mysql => 3306,
                    DatabaseKind::Postgresql => 5432,
                },
                username: "u1".to_string(),
                password: "secret".to_string(),
                database: "d1".to_string(),
            },
            kind,
            cleanups: Mutex::new(0),
        })
    }
}

#[async_trait]
impl RelationalDatabase for FakeDatabase {
    fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    fn kind(&self) -> DatabaseKind {
        self.kind
    }

    fn dsn(&self) -> String {
        format!("{}://fake", self.kind.driver())
    }

    async fn import_icingadb_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn import_notifications_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        *self.cleanups.lock().unwrap() += 1;
        Ok(())
    }
}

/// A mock runtime with one network, returned as both the concrete mock and
/// the trait object creators take.
pub async fn mock_with_network() -> (Arc<MockRuntime>, Arc<dyn ContainerRuntime>, String) {
    let mock = Arc::new(MockRuntime::new());
    for image in [
        "mysql:latest",
        "postgres:latest",
        "redis:latest",
        "icinga/icinga2:master",
        "icinga-notifications:latest",
        "alpine:latest",
    ] {
        mock.add_image(image);
    }
    let net = mock
        .create_network("icinga-testing-test", &HashMap::new())
        .await
        .unwrap();
    let runtime: Arc<dyn ContainerRuntime> = mock.clone();
    (mock, runtime, net)
}

/// A request as the fake API saw it.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

/// An HTTP server that records requests and answers with scripted statuses,
/// falling back to `200 {}`. Once program start times are queued, the
/// `IcingaApplication` status endpoint reports them in order and keeps
/// repeating the last one.
#[derive(Clone, Default)]
pub struct FakeApi {
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    pub statuses: Arc<Mutex<VecDeque<u16>>>,
    pub program_starts: Arc<Mutex<VecDeque<f64>>>,
}

impl FakeApi {
    /// Queues status codes for the next requests.
    pub fn script(&self, statuses: &[u16]) {
        self.statuses.lock().unwrap().extend(statuses.iter().copied());
    }

    /// Queues start times for the `IcingaApplication` status endpoint.
    pub fn program_starts(&self, starts: &[f64]) {
        self.program_starts
            .lock()
            .unwrap()
            .extend(starts.iter().copied());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Serves on an ephemeral local port and returns its base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let api = self.clone();
        let app = Router::new().fallback(move |req: Request| {
            let api = api.clone();
            async move { api.handle(req).await }
        });
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    async fn handle(&self, req: Request) -> Response {
        let mut recorded = {
            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            Recorded {
                method: req.method().to_string(),
                uri: req.uri().to_string(),
                accept: header("accept"),
                content_type: header("content-type"),
                authorization: header("authorization"),
                body: String::new(),
            }
        };
        let body: Body = req.into_body();
        let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
        recorded.body = String::from_utf8_lossy(&bytes).into_owned();
        let is_status = recorded.uri == "/v1/status/IcingaApplication";
        self.requests.lock().unwrap().push(recorded);

        if is_status {
            let mut starts = self.program_starts.lock().unwrap();
            let start = if starts.len() > 1 {
                starts.pop_front()
            } else {
                starts.front().copied()
            };
            if let Some(start) = start {
                let body = format!(
                    r#"{{"results":[{{"name":"IcingaApplication","status":{{"icingaapplication":{{"app":{{"program_start":{start}}}}}}}}}]}}"#
                );
                return (StatusCode::OK, body).into_response();
            }
        }

        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
        let status = StatusCode::from_u16(status).unwrap();
        (status, "{}").into_response()
    }
}
