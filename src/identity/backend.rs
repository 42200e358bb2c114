use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// One identity system that can confirm or deny the caller's session.
///
/// Ordered by ascending `priority`; immutable once the dashboard is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityBackend {
    pub name: String,
    pub priority: u32,
    #[serde(with = "crate::config::serde_url")]
    pub probe_endpoint: Url,
    #[serde(rename = "timeout_ms", with = "crate::config::serde_ms")]
    pub timeout: Duration,
    /// Where a user without a session is sent to sign in to this backend.
    #[serde(default, with = "crate::config::serde_opt_url", skip_serializing_if = "Option::is_none")]
    pub login_url: Option<Url>,
}

impl IdentityBackend {
    pub fn new(name: &str, priority: u32, probe_endpoint: Url, timeout: Duration) -> Self {
        Self { name: name.to_string(), priority, probe_endpoint, timeout, login_url: None }
    }

    pub fn with_login_url(mut self, url: Url) -> Self {
        self.login_url = Some(url);
        self
    }
}

/// Sort by ascending priority. Stable, so equal priorities keep configuration order.
pub fn order_backends(backends: &mut [IdentityBackend]) {
    backends.sort_by_key(|b| b.priority);
}
