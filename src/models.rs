//! Records exchanged with the project API and the summaries derived from them.
//! Only what synchronisation needs to key, diff and display is modelled; any
//! other fields a server sends are ignored.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::sync::{EntityId, ResourceKind};

pub const PROJECT_STATUSES: [&str; 4] = ["active", "completed", "cancelled", "on-hold"];
pub const DEFAULT_USER_NAME: &str = "Demo User";

/// Records with a stable server-side id.
pub trait Keyed {
    fn key(&self) -> EntityId;
}

/// One row of `GET /projects/stats`: the project plus its rolled-up counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub campaign_id: Option<EntityId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub comment_count: u32,
}

fn default_status() -> String { "active".to_string() }

fn default_user_name() -> String { DEFAULT_USER_NAME.to_string() }

fn default_access_level() -> String { "viewer".to_string() }

/// A project as written: `id` and `created_at` are assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub campaign_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self { id: None, name: name.to_string(), description: None, status: default_status(), campaign_id: None, created_at: None }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    /// Local guard run before any request is made.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::user("blank_name", "project name must not be blank"));
        }
        if !PROJECT_STATUSES.contains(&self.status.as_str()) {
            return Err(AppError::user(
                "bad_status",
                format!("status must be one of: {}", PROJECT_STATUSES.join(", ")).as_str(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub id: EntityId,
    pub project_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: EntityId,
    pub project_id: EntityId,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    #[serde(default)]
    pub id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_access_level")]
    pub access_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Any of the per-project nested records, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NestedRecord {
    Checklist(ChecklistItem),
    Comment(Comment),
    Stakeholder(Stakeholder),
}

impl NestedRecord {
    pub fn kind(&self) -> ResourceKind {
        match self {
            NestedRecord::Checklist(_) => ResourceKind::Checklist,
            NestedRecord::Comment(_) => ResourceKind::Comments,
            NestedRecord::Stakeholder(_) => ResourceKind::Stakeholders,
        }
    }

    pub fn as_checklist(&self) -> Option<&ChecklistItem> {
        match self {
            NestedRecord::Checklist(c) => Some(c),
            _ => None,
        }
    }

    /// One-line rendering for tables.
    pub fn summary(&self) -> String {
        match self {
            NestedRecord::Checklist(c) => format!("[{}] {}", if c.completed { "x" } else { " " }, c.title),
            NestedRecord::Comment(c) => format!("{}: {}", c.user_name, c.content),
            NestedRecord::Stakeholder(s) => match &s.role {
                Some(role) => format!("{} <{}> {} ({})", s.name, s.email, role, s.access_level),
                None => format!("{} <{}> ({})", s.name, s.email, s.access_level),
            },
        }
    }
}

impl Keyed for ProjectStats {
    fn key(&self) -> EntityId { self.id }
}

impl Keyed for ChecklistItem {
    fn key(&self) -> EntityId { self.id }
}

impl Keyed for Comment {
    fn key(&self) -> EntityId { self.id }
}

impl Keyed for Stakeholder {
    fn key(&self) -> EntityId { self.id }
}

impl Keyed for NestedRecord {
    fn key(&self) -> EntityId {
        match self {
            NestedRecord::Checklist(c) => c.id,
            NestedRecord::Comment(c) => c.id,
            NestedRecord::Stakeholder(s) => s.id,
        }
    }
}

/// What changed between two snapshots, by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub changed: Vec<EntityId>,
}

impl KeyDiff {
    pub fn is_empty(&self) -> bool { self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty() }
}

pub fn diff_by_key<T: Keyed + PartialEq>(old: &[T], new: &[T]) -> KeyDiff {
    let mut diff = KeyDiff::default();
    for n in new {
        match old.iter().find(|o| o.key() == n.key()) {
            None => diff.added.push(n.key()),
            Some(o) if o != n => diff.changed.push(n.key()),
            Some(_) => {}
        }
    }
    for o in old {
        if !new.iter().any(|n| n.key() == o.key()) {
            diff.removed.push(o.key());
        }
    }
    diff
}

/// Header figures for the project list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub active: usize,
    pub average_progress: u32,
}

impl DashboardSummary {
    pub fn from_projects(projects: &[ProjectStats]) -> Self {
        if projects.is_empty() {
            return Self::default();
        }
        let sum: u64 = projects.iter().map(|p| p.progress as u64).sum();
        Self {
            total: projects.len(),
            active: projects.iter().filter(|p| p.status == "active").count(),
            average_progress: (sum as f64 / projects.len() as f64).round() as u32,
        }
    }
}

/// Completion percentage of a checklist, rounded; 0 when empty.
pub fn checklist_progress(items: &[ChecklistItem]) -> u32 {
    if items.is_empty() {
        return 0;
    }
    let done = items.iter().filter(|i| i.completed).count();
    ((done as f64 / items.len() as f64) * 100.0).round() as u32
}

/// Search box plus status dropdown over the project list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFilter {
    pub query: String,
    /// A status name, or `all`.
    pub status: String,
}

impl Default for ProjectFilter {
    fn default() -> Self { Self { query: String::new(), status: "all".to_string() } }
}

impl ProjectFilter {
    pub fn matches(&self, p: &ProjectStats) -> bool {
        let q = self.query.to_lowercase();
        let text_hit = p.name.to_lowercase().contains(&q)
            || p.description.as_deref().map(|d| d.to_lowercase().contains(&q)).unwrap_or(false);
        let status_hit = self.status == "all" || p.status == self.status;
        text_hit && status_hit
    }

    pub fn apply<'a>(&self, projects: &'a [ProjectStats]) -> Vec<&'a ProjectStats> {
        projects.iter().filter(|p| self.matches(p)).collect()
    }
}
