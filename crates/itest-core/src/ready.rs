//! Fixed-interval readiness polling for freshly started services.
//!
//! A container reports "running" long before its service accepts
//! connections. [`wait_until_ready`] bridges that gap by probing at a fixed
//! interval for a bounded number of attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tracing::debug;

use crate::error::{Error, Result};

/// How often and how many times a readiness probe runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Pause before every probe.
    pub interval: Duration,
    /// Maximum number of probes.
    pub attempts: usize,
}

impl ReadinessPolicy {
    /// MySQL/MariaDB: 1s × 60.
    pub const MYSQL: Self = Self::new(Duration::from_secs(1), 60);
    /// PostgreSQL: 1s × 60.
    pub const POSTGRESQL: Self = Self::new(Duration::from_secs(1), 60);
    /// Redis: 1s × 20.
    pub const REDIS: Self = Self::new(Duration::from_secs(1), 20);
    /// Icinga 2 API: 100ms × 100.
    pub const ICINGA2: Self = Self::new(Duration::from_millis(100), 100);

    /// Creates a policy.
    pub const fn new(interval: Duration, attempts: usize) -> Self {
        Self { interval, attempts }
    }

    /// Upper bound of time spent sleeping between probes.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts as u32
    }
}

/// Polls `probe` until it succeeds, following `policy`.
///
/// Sleeps one interval before the first probe, then retries failures at the
/// same interval until `policy.attempts` probes have been made. Returns the
/// first successful value, or [`Error::NotReady`] carrying the last probe
/// error.
pub async fn wait_until_ready<F, Fut, T, E>(
    what: &str,
    policy: ReadinessPolicy,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let backoff = ConstantBuilder::default()
        .with_delay(policy.interval)
        .with_max_times(attempts - 1);

    tokio::time::sleep(policy.interval).await;

    let mut made = 0usize;
    let result = (|| {
        made += 1;
        probe()
    })
    .retry(backoff)
    .sleep(tokio::time::sleep)
    .notify(|err: &E, delay: Duration| {
        debug!(service = what, error = %err, retry_in = ?delay, "service not ready yet");
    })
    .await;

    match result {
        Ok(value) => {
            debug!(service = what, attempts = made, "service ready");
            Ok(value)
        }
        Err(err) => Err(Error::NotReady {
            what: what.to_string(),
            attempts: made,
            last_error: err.to_string(),
        }),
    }
}
