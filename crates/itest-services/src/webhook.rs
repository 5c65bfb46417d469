//! A tiny HTTP server standing in for a webhook endpoint.
//!
//! Icinga Notifications delivers webhook notifications to a URL. Tests
//! launch this receiver on the Docker network gateway, point a channel at it
//! and swap in a handler that records or asserts on incoming requests.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Time granted to in-flight requests on shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Body of the default answer.
pub const DEFAULT_BODY: &str = "¯\\_(ツ)_/¯";

type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;
type Handler = Arc<dyn Fn(Request) -> ResponseFuture + Send + Sync>;

fn default_handler() -> Handler {
    Arc::new(|_req: Request| {
        Box::pin(async { (StatusCode::SERVICE_UNAVAILABLE, DEFAULT_BODY).into_response() })
            as ResponseFuture
    })
}

fn router(handler: Arc<RwLock<Handler>>) -> Router {
    Router::new().fallback(move |req: Request| {
        let current = Arc::clone(&handler.read().unwrap_or_else(|e| e.into_inner()));
        async move { current(req).await }
    })
}

/// A running webhook receiver.
pub struct WebhookReceiver {
    local_addr: SocketAddr,
    handler: Arc<RwLock<Handler>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl WebhookReceiver {
    /// Binds `listen` and starts serving. Every request is answered by the
    /// current handler, initially a `503`.
    pub async fn launch(listen: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        let local_addr = listener.local_addr()?;
        let handler = Arc::new(RwLock::new(default_handler()));
        let (tx, rx) = oneshot::channel::<()>();

        let app = router(Arc::clone(&handler));
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
        });
        debug!(%local_addr, "webhook receiver listening");

        Ok(Self {
            local_addr,
            handler,
            shutdown: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        })
    }

    /// Address the receiver is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://<local_addr>`
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Replaces the request handler.
    pub fn set_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let boxed: Handler = Arc::new(move |req: Request| Box::pin(handler(req)) as ResponseFuture);
        *self.handler.write().unwrap_or_else(|e| e.into_inner()) = boxed;
    }

    /// Stops the server, giving open requests [`SHUTDOWN_TIMEOUT`] to
    /// finish. Safe to call more than once.
    pub async fn cleanup(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(mut task) = task else {
            return Ok(());
        };
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => warn!(error = %join, "webhook receiver task failed"),
            Err(_) => {
                warn!(local_addr = %self.local_addr, "webhook receiver did not stop in time");
                task.abort();
            }
        }
        debug!(local_addr = %self.local_addr, "webhook receiver stopped");
        Ok(())
    }
}

impl std::fmt::Debug for WebhookReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReceiver")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
