//! Small async building blocks shared by the stages: fixed-delay retry,
//! per-stage timeouts and running blocking staging I/O off the runtime.

use std::future::Future;
use std::time::Duration;

use sourcesense_utils::error::Error;
use sourcesense_utils::SourceSenseResult;
use tokio::io::Error as TokioIoError;
use tokio::task;

use crate::pipeline::Stage;

/// Run `op` up to `max_attempts` times, sleeping `delay` between attempts,
/// but only while `should_retry` accepts the error. Any other error is
/// returned immediately.
///
/// `op` receives the 1-based attempt number.
pub async fn retry_when<T, E, F, Fut, P>(
    max_attempts: u32,
    delay: Duration,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if should_retry(&e) && attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %e, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Bound a stage by its hard timeout.
pub async fn with_timeout<T, Fut>(stage: Stage, limit: Duration, fut: Fut) -> SourceSenseResult<T>
where
    Fut: Future<Output = SourceSenseResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            stage: stage.name().to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

/// Run blocking work (Parquet staging) on the blocking pool.
pub async fn blocking<T, F>(f: F) -> SourceSenseResult<T>
where
    F: FnOnce() -> SourceSenseResult<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_err) => Err(Error::TokioError(TokioIoError::new(
            std::io::ErrorKind::Other,
            join_err.to_string(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Missing,
        Broken,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_attempts_run_out() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry_when(5, Duration::from_secs(2), |e| matches!(e, TestError::Missing), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Missing) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Missing)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry_when(5, Duration::from_secs(2), |e| matches!(e, TestError::Missing), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Broken) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Broken)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_a_later_attempt() {
        let result: Result<u32, TestError> = retry_when(5, Duration::from_secs(2), |_| true, |attempt| async move {
            if attempt < 3 { Err(TestError::Missing) } else { Ok(attempt) }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_names_the_stage() {
        let err = with_timeout(Stage::Fetch, Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { ref stage, seconds: 1 } if stage == "fetch"));
    }

    #[tokio::test]
    async fn blocking_propagates_errors() {
        let err = blocking(|| -> SourceSenseResult<()> { Err(Error::NotFound("x".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
