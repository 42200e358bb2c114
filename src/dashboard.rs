//! The assembled client: session gate, project polling, selection sync and
//! post-write relay behind one handle.
//!
//! While the verdict is anything but `Authenticated` neither sync component
//! runs. A gate task follows the verdict and starts or stops them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::HttpClient;
use crate::config::DashboardConfig;
use crate::error::AppResult;
use crate::identity::{AuthProbeChain, IdentityBackend, SessionProbe, SessionState, SessionVerdict};
use crate::models::{ChecklistItem, Comment, Project};
use crate::sync::{
    CollectionSource, EntityId, Generation, MutationRelay, MutationScope, NestedSource, RelayReceipt, ResourceKind,
    ResourceSync, SelectionKey, SelectionSync, SyncSnapshot, SyncStats, View,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub session: SyncStats,
    pub collection: SyncStats,
    pub selection: SyncStats,
}

pub struct Dashboard<P: SessionProbe, C: CollectionSource, N: NestedSource> {
    session: Arc<SessionState<P>>,
    collection: Arc<ResourceSync<C>>,
    selection: Arc<SelectionSync<N>>,
    relay: MutationRelay<C, N>,
    gate: Mutex<Option<JoinHandle<()>>>,
}

impl<P: SessionProbe, C: CollectionSource, N: NestedSource> Dashboard<P, C, N> {
    pub fn new(chain: AuthProbeChain<P>, collection: Arc<C>, nested: Arc<N>, revalidate: Duration, poll: Duration) -> Self {
        let session = Arc::new(SessionState::new(chain, revalidate));
        let collection = Arc::new(ResourceSync::new(collection, poll));
        let selection = Arc::new(SelectionSync::new(nested));
        let relay = MutationRelay::new(Arc::clone(&collection), Arc::clone(&selection));
        Self { session, collection, selection, relay, gate: Mutex::new(None) }
    }

    /// Mount the session and begin following its verdict. No-op if started.
    pub fn start(&self) {
        let mut gate = self.gate.lock();
        if gate.is_some() {
            return;
        }
        let mut rx = self.session.subscribe();
        let collection = Arc::clone(&self.collection);
        let selection = Arc::clone(&self.selection);
        self.session.mount();
        *gate = Some(tokio::spawn(async move {
            let mut open = false;
            loop {
                let authed = rx.borrow_and_update().is_authenticated();
                if authed && !open {
                    info!(target: "projdash::sync", "session confirmed; sync started");
                    collection.start();
                    selection.start();
                } else if !authed && open {
                    info!(target: "projdash::sync", "session lost; sync stopped");
                    collection.stop();
                    selection.stop();
                }
                open = authed;
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Stop everything. In-flight probes and fetches are discarded on arrival.
    pub fn shutdown(&self) {
        if let Some(handle) = self.gate.lock().take() {
            handle.abort();
        }
        self.session.teardown();
        self.collection.stop();
        self.selection.stop();
        info!(target: "projdash::sync", "dashboard shut down");
    }

    pub fn set_selection(&self, key: SelectionKey) -> bool { self.selection.set_selection(key) }

    pub fn open_project(&self, id: EntityId) -> bool { self.set_selection(SelectionKey::detail(id)) }

    pub fn back_to_dashboard(&self) -> bool { self.set_selection(SelectionKey::dashboard()) }

    pub fn current_selection(&self) -> SelectionKey { self.selection.current() }

    pub fn after_mutation(&self, scope: MutationScope) -> RelayReceipt { self.relay.after_mutation(scope) }

    pub fn force_reauth(&self) -> Option<Generation> { self.session.force_reauth() }

    /// Run a write. Success triggers the relay for `scope`; failure is
    /// returned untouched and refreshes nothing. An authorization failure
    /// also forces a session re-probe.
    pub async fn write<T, F>(&self, scope: MutationScope, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match fut.await {
            Ok(v) => {
                self.after_mutation(scope);
                Ok(v)
            }
            Err(e) => {
                if e.is_auth() {
                    warn!(target: "projdash::relay", error = %e, "write rejected as unauthorized; re-probing session");
                    self.force_reauth();
                } else {
                    warn!(target: "projdash::relay", error = %e, "write failed; no refresh");
                }
                Err(e)
            }
        }
    }

    pub fn session(&self) -> SessionVerdict { self.session.verdict() }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionVerdict> { self.session.subscribe() }

    pub fn backends(&self) -> &[IdentityBackend] { self.session.chain().backends() }

    pub fn projects(&self) -> SyncSnapshot<C::Item> { self.collection.snapshot() }

    pub fn subscribe_projects(&self) -> watch::Receiver<SyncSnapshot<C::Item>> { self.collection.subscribe() }

    pub fn nested(&self, kind: ResourceKind) -> SyncSnapshot<N::Item> { self.selection.snapshot(kind) }

    pub fn subscribe_nested(&self, kind: ResourceKind) -> watch::Receiver<SyncSnapshot<N::Item>> { self.selection.subscribe(kind) }

    pub fn is_syncing(&self) -> bool { self.collection.is_running() && self.selection.is_active() }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats { session: self.session.stats(), collection: self.collection.stats(), selection: self.selection.stats() }
    }
}

impl<P: SessionProbe, C: CollectionSource, N: NestedSource> Drop for Dashboard<P, C, N> {
    fn drop(&mut self) {
        if let Some(handle) = self.gate.get_mut().take() {
            handle.abort();
        }
    }
}

/// Dashboard wired to the real identity backends and project API.
pub type HttpDashboard = Dashboard<HttpClient, HttpClient, HttpClient>;

impl Dashboard<HttpClient, HttpClient, HttpClient> {
    /// One shared cookie-carrying client for probes, reads and writes.
    pub fn connect(cfg: &DashboardConfig) -> AppResult<Self> {
        cfg.validate()?;
        let client = Arc::new(HttpClient::from_config(cfg)?);
        let chain = AuthProbeChain::new(cfg.backends.clone(), Arc::clone(&client));
        Ok(Self::new(chain, Arc::clone(&client), client, cfg.revalidate_interval, cfg.poll_interval))
    }

    pub fn client(&self) -> &HttpClient { self.collection.source() }

    pub async fn create_project(&self, project: &Project) -> AppResult<Project> {
        self.write(MutationScope::Collection, self.client().create_project(project)).await
    }

    pub async fn update_project(&self, id: EntityId, project: &Project) -> AppResult<Project> {
        self.write(MutationScope::Collection, self.client().update_project(id, project)).await
    }

    /// Deleting the open project also leaves its detail view.
    pub async fn delete_project(&self, id: EntityId) -> AppResult<()> {
        self.write(MutationScope::Collection, self.client().delete_project(id)).await?;
        let cur = self.current_selection();
        if cur.entity_id == Some(id) && cur.view == View::Detail {
            self.back_to_dashboard();
        }
        Ok(())
    }

    pub async fn add_checklist_item(&self, project_id: EntityId, title: &str) -> AppResult<ChecklistItem> {
        self.write(MutationScope::Both, self.client().add_checklist_item(project_id, title)).await
    }

    pub async fn toggle_checklist_item(&self, item_id: EntityId, completed: bool) -> AppResult<()> {
        self.write(MutationScope::Both, self.client().toggle_checklist_item(item_id, completed)).await
    }

    pub async fn add_comment(&self, project_id: EntityId, user_name: Option<&str>, content: &str) -> AppResult<Comment> {
        self.write(MutationScope::Both, self.client().add_comment(project_id, user_name, content)).await
    }
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod dashboard_tests;
