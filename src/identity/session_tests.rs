use super::*;
use crate::error::AppError;
use crate::identity::backend::IdentityBackend;
use crate::identity::probe::{FailCause, ProbeOutcome};
use futures_util::future::BoxFuture;
use reqwest::Url;
use std::collections::VecDeque;

/// Each probe pops the next scripted (delay, outcome) pair; the last entry repeats.
struct QueueProbe {
    script: Mutex<VecDeque<(Duration, ProbeOutcome<UserSummary>)>>,
}

impl QueueProbe {
    fn new(script: Vec<(u64, ProbeOutcome<UserSummary>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(|(ms, o)| (Duration::from_millis(ms), o)).collect()),
        })
    }
}

impl SessionProbe for QueueProbe {
    fn probe<'a>(&'a self, _backend: &'a IdentityBackend) -> BoxFuture<'a, ProbeOutcome<UserSummary>> {
        let next = {
            let mut q = self.script.lock();
            if q.len() > 1 { q.pop_front() } else { q.front().cloned() }
        };
        Box::pin(async move {
            let (delay, outcome) = next.unwrap_or((Duration::ZERO, ProbeOutcome::Negative("empty script".into())));
            tokio::time::sleep(delay).await;
            outcome
        })
    }
}

fn yes(id: &str) -> ProbeOutcome<UserSummary> { ProbeOutcome::Ok(UserSummary::new(id, id)) }
fn no() -> ProbeOutcome<UserSummary> { ProbeOutcome::Negative("not authenticated".into()) }
fn down() -> ProbeOutcome<UserSummary> { ProbeOutcome::Failed(FailCause::Error(AppError::transport("refused", "down"))) }

fn state(probe: Arc<QueueProbe>, revalidate_ms: u64) -> SessionState<QueueProbe> {
    let backend = IdentityBackend::new("only", 1, Url::parse("http://only/api/session/validate").unwrap(), Duration::from_secs(5));
    SessionState::new(AuthProbeChain::new(vec![backend], probe), Duration::from_millis(revalidate_ms))
}

// Paused clock: sleeping lets every runnable task finish before time moves on.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn starts_loading_then_resolves() {
    let s = state(QueueProbe::new(vec![(100, yes("ann"))]), 60_000);
    assert!(s.verdict().is_loading());
    s.mount();
    let mut rx = s.subscribe();
    let v = rx.wait_for(|v| !v.is_loading()).await.unwrap().clone();
    assert_eq!(v.user().map(|u| u.id.as_str()), Some("ann"));
}

#[tokio::test(start_paused = true)]
async fn revalidation_catches_expiry_and_late_login() {
    let s = state(QueueProbe::new(vec![(0, yes("ann")), (0, no()), (0, yes("bob"))]), 1_000);
    s.mount();
    let mut rx = s.subscribe();
    rx.wait_for(|v| v.is_authenticated()).await.unwrap();
    rx.wait_for(|v| *v == SessionVerdict::Unauthenticated).await.unwrap();
    let v = rx.wait_for(|v| v.is_authenticated()).await.unwrap().clone();
    assert_eq!(v.user().map(|u| u.id.as_str()), Some("bob"));
}

#[tokio::test(start_paused = true)]
async fn all_failed_yields_error_verdict() {
    let s = state(QueueProbe::new(vec![(0, down())]), 60_000);
    s.mount();
    let mut rx = s.subscribe();
    let v = rx.wait_for(|v| !v.is_loading()).await.unwrap().clone();
    assert!(matches!(v, SessionVerdict::Error { .. }));
    assert!(v.auth_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn older_slow_probe_never_overwrites_newer_verdict() {
    // Mount probe is slow and says "no"; the manual re-probe is fast and says "yes".
    let s = state(QueueProbe::new(vec![(500, no()), (10, yes("fresh"))]), 60_000);
    s.mount();
    settle().await;
    s.force_reauth().expect("mounted");
    let mut rx = s.subscribe();
    rx.wait_for(|v| v.is_authenticated()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(s.verdict().user().map(|u| u.id.as_str()), Some("fresh"));
    let stats = s.stats();
    assert_eq!(stats.started, 2);
    assert_eq!(stats.stale_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_suppresses_in_flight_and_blocks_manual() {
    let s = state(QueueProbe::new(vec![(200, yes("ann"))]), 60_000);
    s.mount();
    settle().await;
    s.teardown();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(s.verdict().is_loading());
    assert!(s.force_reauth().is_none());
}

#[tokio::test(start_paused = true)]
async fn unchanged_verdict_does_not_notify() {
    let s = state(QueueProbe::new(vec![(0, yes("ann"))]), 1_000);
    s.mount();
    let mut rx = s.subscribe();
    rx.wait_for(|v| v.is_authenticated()).await.unwrap();
    let _ = rx.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert!(!rx.has_changed().unwrap());
    assert!(s.stats().applied >= 3);
}

// Real threads: force_reauth and teardown race on different workers. Once
// teardown returns, no cycle may publish.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nothing_publishes_after_teardown_returns() {
    let probe = QueueProbe::new(vec![(2, yes("ann"))]);
    let mut late = 0;
    for _ in 0..300 {
        let s = Arc::new(state(probe.clone(), 60_000));
        s.mount();
        let gate = Arc::new(std::sync::Barrier::new(2));

        let reprober = {
            let (s, gate, rt) = (s.clone(), gate.clone(), tokio::runtime::Handle::current());
            std::thread::spawn(move || {
                let _rt = rt.enter();
                gate.wait();
                for _ in 0..100 {
                    s.force_reauth();
                }
            })
        };
        let stopper = {
            let (s, gate) = (s.clone(), gate.clone());
            std::thread::spawn(move || {
                gate.wait();
                s.teardown();
                s.stats().applied
            })
        };
        let applied_at_teardown = tokio::task::spawn_blocking(move || {
            reprober.join().unwrap();
            stopper.join().unwrap()
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        if s.stats().applied != applied_at_teardown {
            late += 1;
        }
        assert!(s.force_reauth().is_none());
    }
    assert_eq!(late, 0, "verdicts published after teardown returned");
}
