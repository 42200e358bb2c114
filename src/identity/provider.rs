use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::backend::IdentityBackend;
use super::principal::UserSummary;
use super::probe::ProbeOutcome;

/// Body of an identity backend's "is there a valid session" endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeReply {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
}

impl ProbeReply {
    /// A positive session needs both the flag and a user payload.
    pub fn into_outcome(self) -> ProbeOutcome<UserSummary> {
        match (self.authenticated, self.user) {
            (true, Some(user)) => ProbeOutcome::Ok(user),
            (true, None) => ProbeOutcome::Negative("authenticated without user payload".into()),
            (false, _) => ProbeOutcome::Negative("not authenticated".into()),
        }
    }
}

/// Transport seam for session probes. Implementations classify the response
/// into a `ProbeOutcome`; the deadline is enforced by the caller.
pub trait SessionProbe: Send + Sync + 'static {
    fn probe<'a>(&'a self, backend: &'a IdentityBackend) -> BoxFuture<'a, ProbeOutcome<UserSummary>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_classification() {
        let ok: ProbeReply = serde_json::from_value(serde_json::json!({
            "authenticated": true, "user": {"id": 3, "name": "Ann"}, "source_system": "laravel11"
        })).unwrap();
        assert_eq!(ok.clone().into_outcome(), ProbeOutcome::Ok(UserSummary::new("3", "Ann")));
        assert_eq!(ok.source_system.as_deref(), Some("laravel11"));

        let no: ProbeReply = serde_json::from_value(serde_json::json!({"authenticated": false})).unwrap();
        assert!(no.into_outcome().is_negative());

        let hollow = ProbeReply { authenticated: true, user: None, source_system: None };
        assert!(hollow.into_outcome().is_negative());

        let empty: ProbeReply = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!empty.authenticated);
    }
}
