use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

/// How a unit or AI module invocation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    Error(String),
    TimedOut(u64),
    Panicked(String),
    ChangeRejected(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {msg}"),
            Self::TimedOut(ms) => write!(f, "timed out after {ms}ms"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
            Self::ChangeRejected(msg) => write!(f, "change rejected: {msg}"),
        }
    }
}

/// Run one invocation under a time budget, catching errors and panics.
///
/// Partial output of a timed-out or panicking invocation is dropped.
pub async fn guarded<T, F>(budget: Duration, fut: F) -> Result<T, FailureKind>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let caught = AssertUnwindSafe(fut).catch_unwind();
    match tokio::time::timeout(budget, caught).await {
        Err(_) => Err(FailureKind::TimedOut(budget.as_millis() as u64)),
        Ok(Err(panic)) => Err(FailureKind::Panicked(panic_message(panic.as_ref()))),
        Ok(Ok(Err(err))) => Err(FailureKind::Error(format!("{err:#}"))),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn errors_and_panics_are_contained() {
        let budget = Duration::from_millis(100);

        let ok = guarded(budget, async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err = guarded(budget, async { Err::<u8, _>(anyhow::anyhow!("boom")) }).await;
        assert_eq!(err, Err(FailureKind::Error("boom".into())));

        let panicked = guarded(budget, async {
            if budget.as_millis() > 0 {
                panic!("kaput");
            }
            Ok::<u8, anyhow::Error>(0)
        })
        .await;
        assert_eq!(panicked, Err(FailureKind::Panicked("kaput".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_invocations_time_out() {
        let result = guarded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await;
        assert_eq!(result, Err(FailureKind::TimedOut(50)));
    }
}
