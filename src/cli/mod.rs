//! Plain-text rendering for the headless dashboard: ASCII tables for the
//! project list and nested records, and the sign-in prompt.

use crate::identity::{IdentityBackend, SessionVerdict};
use crate::models::{checklist_progress, ChecklistItem, DashboardSummary, Keyed, NestedRecord, ProjectFilter, ProjectStats};
use crate::sync::{ResourceKind, SyncSnapshot};

const MAX_COL_WIDTH: usize = 60;

/// Render rows under a header as an ASCII table. Columns are sized to their
/// widest cell, capped so one long description cannot swamp the terminal.
/// Counts, percentages and ratios are right-aligned.
pub fn render_table(cols: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..cols.len())
        .map(|i| {
            std::iter::once(&cols[i])
                .chain(rows.iter().filter_map(|r| r.get(i)))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
                .min(MAX_COL_WIDTH)
        })
        .collect();
    let rule = widths.iter().fold(String::from("+"), |mut acc, w| {
        acc.push_str(&"-".repeat(w + 2));
        acc.push('+');
        acc
    });
    let line = |cells: &[String]| {
        widths.iter().enumerate().fold(String::from("|"), |mut acc, (i, &w)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let text = clip(cell, w);
            if right_aligned(cell) {
                acc.push_str(&format!(" {:>w$} |", text, w = w));
            } else {
                acc.push_str(&format!(" {:<w$} |", text, w = w));
            }
            acc
        })
    };

    let mut out = vec![rule.clone(), line(cols), rule.clone()];
    out.extend(rows.iter().map(|r| line(r.as_slice())));
    out.push(rule);
    out.join("\n")
}

/// Freshness line shared by every snapshot view.
fn snapshot_status<T>(snap: &SyncSnapshot<T>) -> String {
    let mut s = match snap.fetched_at {
        Some(at) => format!("updated {} ({})", at.format("%H:%M:%S"), snap.generation),
        None => "loading…".to_string(),
    };
    if let Some(err) = &snap.error {
        s.push_str(&format!(" [stale: {}]", err));
    }
    s
}

pub fn render_projects(snap: &SyncSnapshot<ProjectStats>, filter: &ProjectFilter) -> String {
    let summary = DashboardSummary::from_projects(&snap.items);
    let mut out = format!(
        "projects: {}  active: {}  avg progress: {}%  {}\n",
        summary.total,
        summary.active,
        summary.average_progress,
        snapshot_status(snap)
    );
    let shown = filter.apply(&snap.items);
    if shown.is_empty() {
        out.push_str("no projects found");
        return out;
    }
    let cols: Vec<String> = ["id", "name", "status", "progress", "tasks", "comments"].iter().map(|s| s.to_string()).collect();
    let rows: Vec<Vec<String>> = shown
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.status.clone(),
                format!("{}%", p.progress),
                format!("{}/{}", p.completed_tasks, p.total_tasks),
                p.comment_count.to_string(),
            ]
        })
        .collect();
    out.push_str(&render_table(&cols, &rows));
    out
}

pub fn render_nested(kind: ResourceKind, snap: &SyncSnapshot<NestedRecord>) -> String {
    let mut out = format!("{}: {}  {}", kind.as_str(), snap.len(), snapshot_status(snap));
    if kind == ResourceKind::Checklist {
        let items: Vec<ChecklistItem> = snap.items.iter().filter_map(|r| r.as_checklist().cloned()).collect();
        out.push_str(&format!("  done: {}%", checklist_progress(&items)));
    }
    out.push('\n');
    if snap.items.is_empty() {
        return out;
    }
    let cols = vec!["id".to_string(), kind.as_str().to_string()];
    let rows: Vec<Vec<String>> = snap.items.iter().map(|r| vec![r.key().to_string(), r.summary()]).collect();
    out.push_str(&render_table(&cols, &rows));
    out
}

/// Sign-in prompt listing every backend with a login page, plus the reason
/// the session check failed.
pub fn render_login_prompt(verdict: &SessionVerdict, backends: &[IdentityBackend]) -> String {
    let mut out = String::from("Authentication Required\nPlease login to access the project dashboard.\n");
    if let Some(err) = verdict.auth_error() {
        out.push_str(&format!("  ! {}\n", err));
    }
    for b in backends {
        if let Some(url) = &b.login_url {
            out.push_str(&format!("  - {}: {}\n", b.name, url));
        }
    }
    out.push_str("After logging in, the dashboard picks up the session on its next check.");
    out
}

// Keep `max` characters, marking the cut with an ellipsis.
fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn right_aligned(s: &str) -> bool {
    let s = s.trim();
    s.chars().any(|c| c.is_ascii_digit()) && s.chars().all(|c| c.is_ascii_digit() || ".-+%/".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Comment;
    use crate::sync::Generation;
    use reqwest::Url;
    use std::sync::Arc;
    use std::time::Duration;

    fn project(id: i64, name: &str, status: &str, progress: u32) -> ProjectStats {
        ProjectStats {
            id,
            name: name.into(),
            description: None,
            status: status.into(),
            campaign_id: None,
            created_at: None,
            total_tasks: 4,
            completed_tasks: 2,
            progress,
            comment_count: 1,
        }
    }

    fn snap<T>(items: Vec<T>) -> SyncSnapshot<T> {
        SyncSnapshot { items: Arc::new(items), fetched_at: Some(chrono::Utc::now()), generation: Generation(3), error: None }
    }

    #[test]
    fn table_layout() {
        let t = render_table(&["a".into(), "bb".into()], &[vec!["xyz".into(), "12".into()]]);
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[0], "+-----+----+");
        assert_eq!(lines[1], "| a   | bb |");
        assert_eq!(lines[3], "| xyz | 12 |");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn clips_long_cells_and_aligns_figures() {
        assert_eq!(clip("abcdef", 4), "abc…");
        assert_eq!(clip("abc", 4), "abc");
        assert_eq!(clip("abc", 1), "…");
        assert!(right_aligned("50%"));
        assert!(right_aligned("3/6"));
        assert!(!right_aligned("active"));
        assert!(!right_aligned("%"));

        let long = "x".repeat(MAX_COL_WIDTH + 10);
        let t = render_table(&["n".into()], &[vec!["7".into()], vec![long]]);
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[3].chars().count(), MAX_COL_WIDTH + 4);
        assert!(lines[3].ends_with("7 |"));
        assert!(lines[4].ends_with("… |"));
    }

    #[test]
    fn projects_view_has_summary_and_rows() {
        let s = snap(vec![project(1, "Office Renovation", "active", 50), project(2, "App", "completed", 100)]);
        let out = render_projects(&s, &ProjectFilter::default());
        assert!(out.starts_with("projects: 2  active: 1  avg progress: 75%"));
        assert!(out.contains("| Office Renovation |"));
        assert!(out.contains("2/4"));

        let none = render_projects(&s, &ProjectFilter { query: "zzz".into(), status: "all".into() });
        assert!(none.ends_with("no projects found"));
    }

    #[test]
    fn stale_flag_is_visible() {
        let mut s = snap(vec![project(1, "A", "active", 0)]);
        s.error = Some("server_error: HTTP 500".into());
        assert!(render_projects(&s, &ProjectFilter::default()).contains("[stale: server_error: HTTP 500]"));
        let pending: SyncSnapshot<ProjectStats> = SyncSnapshot::default();
        assert!(render_projects(&pending, &ProjectFilter::default()).contains("loading…"));
    }

    #[test]
    fn nested_view_checklist_progress() {
        let items = vec![
            NestedRecord::Checklist(ChecklistItem { id: 1, project_id: 1, title: "Permits".into(), completed: true, created_at: None }),
            NestedRecord::Checklist(ChecklistItem { id: 2, project_id: 1, title: "Demolition".into(), completed: false, created_at: None }),
        ];
        let out = render_nested(ResourceKind::Checklist, &snap(items));
        assert!(out.starts_with("checklist: 2"));
        assert!(out.contains("done: 50%"));
        assert!(out.contains("[x] Permits"));

        let c = NestedRecord::Comment(Comment { id: 9, project_id: 1, user_name: "Sam".into(), content: "hi".into(), created_at: None });
        assert!(render_nested(ResourceKind::Comments, &snap(vec![c])).contains("Sam: hi"));
    }

    #[test]
    fn login_prompt_lists_backends_and_reason() {
        let b = IdentityBackend::new("laravel11", 1, Url::parse("http://localhost/v2/api/session/validate").unwrap(), Duration::from_secs(5))
            .with_login_url(Url::parse("http://localhost/v2/login").unwrap());
        let no_login = IdentityBackend::new("other", 2, Url::parse("http://other/validate").unwrap(), Duration::from_secs(5));
        let out = render_login_prompt(&SessionVerdict::Unauthenticated, &[b.clone(), no_login]);
        assert!(out.contains("! Not authenticated"));
        assert!(out.contains("- laravel11: http://localhost/v2/login"));
        assert!(!out.contains("other"));

        let out = render_login_prompt(&SessionVerdict::Error { message: "no identity backend reachable".into() }, &[b]);
        assert!(out.contains("! no identity backend reachable"));
    }
}
