//! Client for the Icinga 2 REST API.
//!
//! The API is served over TLS with a self-signed certificate, so
//! verification is disabled. While Icinga 2 reloads it answers `503`; such
//! answers are retried at a fixed interval before they are handed back.

use std::collections::HashMap;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};

/// API user created in every Icinga 2 node.
pub const DEFAULT_USERNAME: &str = "root";
/// Password of [`DEFAULT_USERNAME`].
pub const DEFAULT_PASSWORD: &str = "root";

/// Attempts made while the API answers `503`.
pub const UNAVAILABLE_ATTEMPTS: usize = 300;
/// Pause between those attempts.
pub const UNAVAILABLE_DELAY: Duration = Duration::from_secs(1);

enum Attempt {
    Unavailable(Response),
    Failed(reqwest::Error),
}

/// Authenticated Icinga 2 API client.
#[derive(Clone, Debug)]
pub struct Icinga2Client {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    retry_delay: Duration,
    retry_attempts: usize,
}

impl Icinga2Client {
    /// Creates a client for the API at `address` (`host:port`) over HTTPS.
    pub fn new(address: &str, username: &str, password: &str) -> Result<Self> {
        Self::with_base_url(format!("https://{address}"), username, password)
    }

    /// Creates a client for an explicit base URL such as `http://127.0.0.1:8080`.
    pub fn with_base_url(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            retry_delay: UNAVAILABLE_DELAY,
            retry_attempts: UNAVAILABLE_ATTEMPTS,
        })
    }

    /// Overrides how `503` answers are retried.
    pub fn with_retry(mut self, delay: Duration, attempts: usize) -> Self {
        self.retry_delay = delay;
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Succeeds as soon as the API answers at all, whatever the status.
    pub async fn ping(&self) -> Result<()> {
        self.http
            .get(format!("{}/v1", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(())
    }

    /// Sends a request, retrying while the API answers `503`.
    ///
    /// Non-GET requests carry `Accept: application/json`; requests with a
    /// body carry `Content-Type: application/json`. When every attempt got a
    /// `503`, the last such response is returned.
    pub async fn request(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let send = || {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .basic_auth(&self.username, Some(&self.password));
            if method != Method::GET {
                req = req.header(ACCEPT, "application/json");
            }
            if let Some(body) = &body {
                req = req.header(CONTENT_TYPE, "application/json").body(body.clone());
            }
            async move {
                match req.send().await {
                    Ok(res) if res.status() == StatusCode::SERVICE_UNAVAILABLE => {
                        Err(Attempt::Unavailable(res))
                    }
                    Ok(res) => Ok(res),
                    Err(e) => Err(Attempt::Failed(e)),
                }
            }
        };

        let backoff = ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(self.retry_attempts - 1);

        let result = send
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(|a| matches!(a, Attempt::Unavailable(_)))
            .notify(|_, delay| debug!(path, retry_in = ?delay, "icinga2 api unavailable"))
            .await;

        match result {
            Ok(res) | Err(Attempt::Unavailable(res)) => Ok(res),
            Err(Attempt::Failed(e)) => Err(e.into()),
        }
    }

    /// Start time of the running Icinga 2 process, in seconds since the
    /// epoch. A new process gets a new start time, so this tells a finished
    /// reload apart from the old process still answering.
    ///
    /// Not retried: a `503` during a reload is an error here.
    pub async fn program_start(&self) -> Result<f64> {
        let path = "/v1/status/IcingaApplication";
        let res = self
            .http
            .get(format!("{}{path}", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        if res.status() != StatusCode::OK {
            return Err(unexpected("GET", path, res).await);
        }
        let status: Value = res.json().await?;
        status
            .pointer("/results/0/status/icingaapplication/app/program_start")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::MalformedResponse {
                path: path.to_string(),
                message: "no program_start in IcingaApplication status".to_string(),
            })
    }

    /// `GET path`
    pub async fn get_json(&self, path: &str) -> Result<Response> {
        self.request(Method::GET, path, None).await
    }

    /// `PUT path` with a JSON body.
    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.request(Method::PUT, path, Some(serde_json::to_vec(body)?))
            .await
    }

    /// `POST path` with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.request(Method::POST, path, Some(serde_json::to_vec(body)?))
            .await
    }

    /// `DELETE path`
    pub async fn delete_json(&self, path: &str) -> Result<Response> {
        self.request(Method::DELETE, path, None).await
    }

    /// Creates a config object of type `typ`.
    pub async fn create_object<B: Serialize + ?Sized>(&self, typ: &str, name: &str, body: &B) -> Result<()> {
        let path = format!("/v1/objects/{typ}/{name}");
        let res = self.put_json(&path, body).await?;
        expect_ok("PUT", &path, res).await
    }

    /// Modifies attributes of an existing object.
    pub async fn update_object<B: Serialize + ?Sized>(&self, typ: &str, name: &str, body: &B) -> Result<()> {
        let path = format!("/v1/objects/{typ}/{name}");
        let res = self.post_json(&path, body).await?;
        expect_ok("POST", &path, res).await
    }

    /// Deletes an object, and with `cascade` everything depending on it.
    pub async fn delete_object(&self, typ: &str, name: &str, cascade: bool) -> Result<()> {
        let params = if cascade { "?cascade=1" } else { "" };
        let path = format!("/v1/objects/{typ}/{name}{params}");
        let res = self.delete_json(&path).await?;
        expect_ok("DELETE", &path, res).await
    }

    /// Creates a host; `None` gives it the `dummy` check command.
    pub async fn create_host(&self, name: &str, body: Option<Value>) -> Result<()> {
        let body = body.unwrap_or_else(default_checkable);
        self.create_object("hosts", name, &body).await
    }

    /// Deletes a host.
    pub async fn delete_host(&self, name: &str, cascade: bool) -> Result<()> {
        self.delete_object("hosts", name, cascade).await
    }

    /// Creates service `service` on `host`; `None` gives it the `dummy`
    /// check command.
    pub async fn create_service(&self, host: &str, service: &str, body: Option<Value>) -> Result<()> {
        let body = body.unwrap_or_else(default_checkable);
        self.create_object("services", &service_name(host, service), &body)
            .await
    }

    /// Deletes service `service` of `host`.
    pub async fn delete_service(&self, host: &str, service: &str, cascade: bool) -> Result<()> {
        self.delete_object("services", &service_name(host, service), cascade)
            .await
    }

    /// Creates an empty config package.
    pub async fn create_config_package(&self, name: &str) -> Result<()> {
        let path = format!("/v1/config/packages/{name}");
        let res = self.request(Method::POST, &path, None).await?;
        expect_ok("POST", &path, res).await
    }

    /// Uploads `files` (path to Icinga 2 DSL) as a new stage of package
    /// `name`. Icinga 2 reloads and validates the stage after this returns.
    pub async fn create_config_package_stage(&self, name: &str, files: &HashMap<String, String>) -> Result<()> {
        let path = format!("/v1/config/stages/{name}");
        let res = self.post_json(&path, &json!({ "files": files })).await?;
        expect_ok("POST", &path, res).await
    }

    /// Deletes a config package. This does not trigger a reload.
    pub async fn delete_config_package(&self, name: &str) -> Result<()> {
        let path = format!("/v1/config/packages/{name}");
        let res = self.delete_json(&path).await?;
        expect_ok("DELETE", &path, res).await
    }
}

/// `host!service`
pub fn service_name(host: &str, service: &str) -> String {
    format!("{host}!{service}")
}

fn default_checkable() -> Value {
    json!({ "attrs": { "check_command": "dummy" } })
}

async fn expect_ok(method: &str, path: &str, res: Response) -> Result<()> {
    if res.status() == StatusCode::OK {
        return Ok(());
    }
    Err(unexpected(method, path, res).await)
}

async fn unexpected(method: &str, path: &str, res: Response) -> Error {
    let status = res.status().as_u16();
    let body = match res.text().await {
        Ok(body) => body,
        Err(e) => format!("<unreadable body: {e}>"),
    };
    Error::UnexpectedStatus {
        method: method.to_string(),
        path: path.to_string(),
        status,
        body,
    }
}
