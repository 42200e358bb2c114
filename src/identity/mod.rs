//! Session reconciliation across several independent identity backends.
//! Keep the public surface thin and split implementation across sub-modules.

mod backend;
mod principal;
mod probe;
mod provider;
mod chain;
mod session;

pub use backend::{IdentityBackend, order_backends};
pub use principal::UserSummary;
pub use probe::{ProbeOutcome, FailCause, timed_request};
pub use provider::{SessionProbe, ProbeReply};
pub use chain::{AuthProbeChain, ChainReport, ProbeAttempt};
pub use session::{SessionState, SessionVerdict};
