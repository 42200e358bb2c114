//! Single outbound read with a hard deadline.
//!
//! `timed_request` resolves to one of three outcomes within the given timeout.
//! On expiry the inner future is dropped, which tears down the underlying
//! request, so nothing it would have done can be observed afterwards.
//! No retries here; callers decide whether to try something else.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Tri-state result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome<T> {
    /// The backend answered and vouched for the session.
    Ok(T),
    /// The backend answered cleanly and said no.
    Negative(String),
    /// The backend could not answer (timeout, unreachable, garbage).
    Failed(FailCause),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailCause {
    Timeout(Duration),
    Error(AppError),
}

impl std::fmt::Display for FailCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailCause::Timeout(d) => write!(f, "timed out after {}ms", d.as_millis()),
            FailCause::Error(e) => write!(f, "{}", e),
        }
    }
}

impl<T> ProbeOutcome<T> {
    /// Classify a transport result: authorization refusals are a clean "no",
    /// everything else that went wrong means the backend could not answer.
    pub fn from_result(res: Result<T, AppError>) -> Self {
        match res {
            Ok(v) => ProbeOutcome::Ok(v),
            Err(e) if e.is_auth() => ProbeOutcome::Negative(e.message().to_string()),
            Err(e) => ProbeOutcome::Failed(FailCause::Error(e)),
        }
    }

    pub fn is_ok(&self) -> bool { matches!(self, ProbeOutcome::Ok(_)) }
    pub fn is_negative(&self) -> bool { matches!(self, ProbeOutcome::Negative(_)) }
    pub fn is_failed(&self) -> bool { matches!(self, ProbeOutcome::Failed(_)) }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Ok(_) => "ok",
            ProbeOutcome::Negative(_) => "negative",
            ProbeOutcome::Failed(FailCause::Timeout(_)) => "timeout",
            ProbeOutcome::Failed(FailCause::Error(_)) => "failed",
        }
    }
}

/// Run `request` with a hard `timeout`.
pub async fn timed_request<T, F>(timeout: Duration, request: F) -> ProbeOutcome<T>
where
    F: Future<Output = ProbeOutcome<T>>,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => ProbeOutcome::Failed(FailCause::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let out = timed_request(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ProbeOutcome::Ok(7u32)
        })
        .await;
        assert_eq!(out, ProbeOutcome::Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_resolves_failed_timeout() {
        let out: ProbeOutcome<u32> = timed_request(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            ProbeOutcome::Ok(1)
        })
        .await;
        assert_eq!(out, ProbeOutcome::Failed(FailCause::Timeout(Duration::from_millis(50))));
        assert_eq!(out.label(), "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn no_late_effect_after_timeout() {
        let touched = Arc::new(AtomicBool::new(false));
        let flag = touched.clone();
        let out: ProbeOutcome<()> = timed_request(Duration::from_millis(10), async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
            ProbeOutcome::Ok(())
        })
        .await;
        assert!(out.is_failed());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!touched.load(Ordering::SeqCst));
    }

    #[test]
    fn classifies_transport_results() {
        let neg: ProbeOutcome<()> = ProbeOutcome::from_result(Err(AppError::from_status(401, "")));
        assert!(neg.is_negative());
        let failed: ProbeOutcome<()> = ProbeOutcome::from_result(Err(AppError::from_status(500, "")));
        assert!(failed.is_failed());
        let ok = ProbeOutcome::from_result(Ok::<_, AppError>(3));
        assert!(ok.is_ok());
    }
}
