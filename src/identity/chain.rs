//! Ordered identity probing with short-circuit on the first positive session.
//!
//! Backends are tried one after another in ascending priority. The first one
//! that vouches for the session decides; later backends are never contacted.
//! Without a positive answer, any clean "no" makes the verdict
//! `Unauthenticated`. Only when no backend could answer at all does the chain
//! report `Error`.

use std::sync::Arc;

use tracing::{debug, info};

use super::backend::{order_backends, IdentityBackend};
use super::probe::{timed_request, ProbeOutcome};
use super::provider::SessionProbe;
use super::session::SessionVerdict;

/// What one backend said during a chain run.
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub backend: String,
    pub priority: u32,
    pub outcome: &'static str,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChainReport {
    pub verdict: SessionVerdict,
    /// Name of the backend that vouched for the session, if any.
    pub source: Option<String>,
    pub attempts: Vec<ProbeAttempt>,
}

pub struct AuthProbeChain<P: SessionProbe> {
    backends: Vec<IdentityBackend>,
    probe: Arc<P>,
}

impl<P: SessionProbe> AuthProbeChain<P> {
    pub fn new(mut backends: Vec<IdentityBackend>, probe: Arc<P>) -> Self {
        order_backends(&mut backends);
        Self { backends, probe }
    }

    pub fn backends(&self) -> &[IdentityBackend] { &self.backends }

    pub async fn run(&self) -> ChainReport {
        let mut attempts = Vec::with_capacity(self.backends.len());
        let mut negatives = 0usize;
        let mut failures: Vec<String> = Vec::new();

        for backend in &self.backends {
            let outcome = timed_request(backend.timeout, self.probe.probe(backend)).await;
            let label = outcome.label();
            match outcome {
                ProbeOutcome::Ok(user) => {
                    attempts.push(ProbeAttempt { backend: backend.name.clone(), priority: backend.priority, outcome: label, detail: None });
                    info!(target: "projdash::session", backend = %backend.name, user = %user.display_name(), "session confirmed");
                    return ChainReport {
                        verdict: SessionVerdict::Authenticated { user },
                        source: Some(backend.name.clone()),
                        attempts,
                    };
                }
                ProbeOutcome::Negative(reason) => {
                    debug!(target: "projdash::session", backend = %backend.name, reason = %reason, "backend has no session, trying next");
                    negatives += 1;
                    attempts.push(ProbeAttempt { backend: backend.name.clone(), priority: backend.priority, outcome: label, detail: Some(reason) });
                }
                ProbeOutcome::Failed(cause) => {
                    debug!(target: "projdash::session", backend = %backend.name, cause = %cause, "backend could not answer, trying next");
                    failures.push(format!("{}: {}", backend.name, cause));
                    attempts.push(ProbeAttempt { backend: backend.name.clone(), priority: backend.priority, outcome: label, detail: Some(cause.to_string()) });
                }
            }
        }

        let verdict = if negatives > 0 {
            SessionVerdict::Unauthenticated
        } else if failures.is_empty() {
            SessionVerdict::Error { message: "no identity backends configured".into() }
        } else {
            SessionVerdict::Error { message: format!("no identity backend reachable ({})", failures.join("; ")) }
        };
        ChainReport { verdict, source: None, attempts }
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod chain_tests;
