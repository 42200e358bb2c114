//! Session verdict state machine.
//!
//! `Loading` on mount, then one of the three terminal verdicts after every
//! probe cycle. The chain is re-run on a fixed interval regardless of the
//! current verdict (expiry while signed in, late login while signed out), and
//! on demand via `force_reauth`. Overlapping cycles are resolved with a
//! generation clock: only the most recently started cycle may publish.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::chain::AuthProbeChain;
use super::principal::UserSummary;
use super::provider::SessionProbe;
use crate::sync::{ApplyOutcome, Generation, GenerationClock, SyncCounters, SyncStats};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionVerdict {
    Loading,
    Authenticated { user: UserSummary },
    Unauthenticated,
    Error { message: String },
}

impl SessionVerdict {
    pub fn is_authenticated(&self) -> bool { matches!(self, SessionVerdict::Authenticated { .. }) }

    pub fn is_loading(&self) -> bool { matches!(self, SessionVerdict::Loading) }

    pub fn user(&self) -> Option<&UserSummary> {
        match self {
            SessionVerdict::Authenticated { user } => Some(user),
            _ => None,
        }
    }

    /// Text for the login prompt when the gate is closed.
    pub fn auth_error(&self) -> Option<&str> {
        match self {
            SessionVerdict::Unauthenticated => Some("Not authenticated"),
            SessionVerdict::Error { message } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionVerdict::Loading => "loading",
            SessionVerdict::Authenticated { .. } => "authenticated",
            SessionVerdict::Unauthenticated => "unauthenticated",
            SessionVerdict::Error { .. } => "error",
        }
    }
}

struct SessionInner<P: SessionProbe> {
    chain: AuthProbeChain<P>,
    clock: GenerationClock,
    tx: watch::Sender<SessionVerdict>,
    /// Checked and held while a cycle's generation is issued.
    mounted: Mutex<bool>,
    counters: SyncCounters,
}

impl<P: SessionProbe> SessionInner<P> {
    fn spawn_cycle(self: &Arc<Self>, reason: &'static str) -> Option<Generation> {
        let gen = {
            let mounted = self.mounted.lock();
            if !*mounted {
                return None;
            }
            self.clock.issue()
        };
        self.counters.inc_started();
        debug!(target: "projdash::session", %gen, reason, "probe cycle started");
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let report = inner.chain.run().await;
            inner.publish(gen, report.verdict);
        });
        Some(gen)
    }

    fn publish(&self, gen: Generation, verdict: SessionVerdict) -> ApplyOutcome {
        let label = verdict.label();
        let outcome = self.clock.apply_if_current(gen, || {
            // counted under the clock lock
            self.counters.inc_applied();
            if label == "error" { self.counters.inc_failed(); }
            self.tx.send_if_modified(|cur| {
                if *cur == verdict {
                    return false;
                }
                info!(target: "projdash::session", from = cur.label(), to = verdict.label(), "session verdict changed");
                *cur = verdict;
                true
            });
        });
        match outcome {
            ApplyOutcome::Applied => {}
            ApplyOutcome::Stale => {
                self.counters.inc_stale();
                debug!(target: "projdash::session", %gen, outcome = "stale", "superseded probe result dropped");
            }
        }
        outcome
    }
}

/// Owner of the current `SessionVerdict`.
pub struct SessionState<P: SessionProbe> {
    inner: Arc<SessionInner<P>>,
    revalidate: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<P: SessionProbe> SessionState<P> {
    pub fn new(chain: AuthProbeChain<P>, revalidate: Duration) -> Self {
        let (tx, _rx) = watch::channel(SessionVerdict::Loading);
        Self {
            inner: Arc::new(SessionInner {
                chain,
                clock: GenerationClock::new(),
                tx,
                mounted: Mutex::new(false),
                counters: SyncCounters::default(),
            }),
            revalidate,
            ticker: Mutex::new(None),
        }
    }

    /// Enter `Loading`, probe immediately, then re-probe every interval.
    /// Mounting an already mounted session is a no-op.
    pub fn mount(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }
        *self.inner.mounted.lock() = true;
        self.inner.tx.send_replace(SessionVerdict::Loading);
        let inner = Arc::clone(&self.inner);
        let period = self.revalidate;
        *ticker = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut first = true;
            loop {
                tick.tick().await;
                if inner.spawn_cycle(if first { "mount" } else { "revalidate" }).is_none() {
                    break;
                }
                first = false;
            }
        }));
    }

    /// Re-probe now, outside the regular interval. Ignored once torn down.
    pub fn force_reauth(&self) -> Option<Generation> {
        let gen = self.inner.spawn_cycle("manual");
        if gen.is_none() {
            warn!(target: "projdash::session", "force_reauth ignored: session not mounted");
        }
        gen
    }

    /// Stop re-validating; any probe still in flight is ignored on arrival.
    pub fn teardown(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
        let mut mounted = self.inner.mounted.lock();
        *mounted = false;
        self.inner.clock.supersede();
    }

    pub fn verdict(&self) -> SessionVerdict { self.inner.tx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<SessionVerdict> { self.inner.tx.subscribe() }

    pub fn stats(&self) -> SyncStats { self.inner.counters.snapshot() }

    pub fn chain(&self) -> &AuthProbeChain<P> { &self.inner.chain }
}

impl<P: SessionProbe> Drop for SessionState<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
