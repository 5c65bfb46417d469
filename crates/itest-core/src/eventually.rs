//! Assertions that are allowed to fail until a deadline.
//!
//! Monitoring data propagates asynchronously, so tests typically poll:
//!
//! ```rust
//! use std::time::Duration;
//! use itest_core::eventually;
//!
//! # tokio_test::block_on(async {
//! let result = eventually::check(Duration::from_millis(50), Duration::from_millis(5), || async {
//!     Ok::<_, String>(())
//! })
//! .await;
//! assert!(result.is_ok());
//! # });
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

enum Step<T, E> {
    Deadline,
    Attempt(Result<T, E>),
}

/// Calls `f` every `interval` until it returns `Ok`.
///
/// Once `timeout` has elapsed, a pending attempt is abandoned and one final
/// attempt is made; its result is returned as is.
pub async fn check<F, Fut, T, E>(timeout: Duration, interval: Duration, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        let attempt = async {
            tokio::time::sleep(interval).await;
            f().await
        };

        let step = tokio::select! {
            _ = &mut deadline => Step::Deadline,
            result = attempt => Step::Attempt(result),
        };

        match step {
            Step::Attempt(Ok(value)) => return Ok(value),
            Step::Attempt(Err(_)) => continue,
            Step::Deadline => return f().await,
        }
    }
}

/// Like [`check`], but panics with the final error.
///
/// Meant for test bodies, where a panic fails the test.
#[allow(clippy::panic)]
pub async fn require<F, Fut, T, E>(timeout: Duration, interval: Duration, f: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Debug,
{
    match check(timeout, interval, f).await {
        Ok(value) => value,
        Err(err) => panic!("condition not met within {timeout:?}: {err:?}"),
    }
}
