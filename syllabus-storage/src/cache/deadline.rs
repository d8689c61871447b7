//! Request deadline enforcement for store round trips.

use std::future::Future;

use syllabus_core::{CacheError, CacheResult, RequestContext};

/// Run `fut`, failing with `CacheError::Timeout` if the deadline of the
/// current request (see [`RequestContext::scope`]) passes first.
pub(crate) async fn within_deadline<T, F>(operation: &'static str, fut: F) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    let deadline = RequestContext::try_current().and_then(|ctx| ctx.deadline());
    within(deadline, operation, fut).await
}

/// Run `fut` against an explicit deadline. `None` means unbounded.
pub(crate) async fn within<T, F>(
    deadline: Option<tokio::time::Instant>,
    operation: &'static str,
    fut: F,
) -> CacheResult<T>
where
    F: Future<Output = CacheResult<T>>,
{
    match deadline {
        // timeout_at polls the inner future once before checking the timer.
        Some(at) if tokio::time::Instant::now() >= at => Err(CacheError::Timeout { operation }),
        Some(at) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| CacheError::Timeout { operation })?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_times_out() {
        let ctx = RequestContext::anonymous().with_timeout(Duration::from_millis(10));
        let result: CacheResult<()> = ctx
            .scope(within_deadline("get", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            }))
            .await;
        assert_eq!(result, Err(CacheError::Timeout { operation: "get" }));
    }

    #[tokio::test]
    async fn test_no_deadline_runs_to_completion() {
        let result = within_deadline("get", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
