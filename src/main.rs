//!
//! projdash binary
//! ---------------
//! Headless project dashboard. Resolves the session against the configured
//! identity backends, then keeps the project list (and, with `--project`, one
//! project's checklist, comments and stakeholders) fresh in the terminal.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use projdash::cli::{render_login_prompt, render_nested, render_projects};
use projdash::config::{arg_value, has_flag, DashboardConfig};
use projdash::models::{diff_by_key, ProjectFilter, ProjectStats};
use projdash::sync::{ResourceKind, SyncSnapshot};
use projdash::HttpDashboard;

const HELP: &str = "projdash\n\nUSAGE:\n  projdash [--config PATH] [--api URL] [--host HOST] [--poll-ms N] [--revalidate-ms N]\n           [--probe-timeout-ms N] [--project ID] [--search TEXT] [--status NAME] [--once]\n\nOPTIONS:\n  --config PATH          JSON config file (env: PROJDASH_CONFIG)\n  --api URL              Project API base (env: PROJDASH_API_URL, default http://localhost:8000/api)\n  --host HOST            Host serving the identity backends (env: PROJDASH_HOST, default localhost)\n  --poll-ms N            Project list poll interval (env: PROJDASH_POLL_MS, default 5000)\n  --revalidate-ms N      Session re-check interval (env: PROJDASH_REVALIDATE_MS, default 300000)\n  --probe-timeout-ms N   Per-backend probe timeout (env: PROJDASH_PROBE_TIMEOUT_MS, default 5000)\n  --project ID           Also follow one project's checklist, comments and stakeholders\n  --search TEXT          Only list projects whose name or description contains TEXT\n  --status NAME          Only list projects with this status (default all)\n  --once                 Print one snapshot and exit\n";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("building log filter")?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", HELP);
        return Ok(());
    }

    let cfg = DashboardConfig::load(&args).context("loading configuration")?;
    let project = match arg_value(&args, "--project") {
        Some(v) => Some(v.parse::<i64>().with_context(|| format!("--project expects a numeric id, got '{}'", v))?),
        None => None,
    };
    let list_filter = ProjectFilter {
        query: arg_value(&args, "--search").unwrap_or_default(),
        status: arg_value(&args, "--status").unwrap_or_else(|| "all".to_string()),
    };

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let backends: Vec<&str> = cfg.backends.iter().map(|b| b.name.as_str()).collect();
    info!(
        target: "startup",
        "projdash starting: RUST_LOG='{}', api='{}', backends={:?}, poll_ms={}, revalidate_ms={}",
        rust_log,
        cfg.api_base,
        backends,
        cfg.poll_interval.as_millis(),
        cfg.revalidate_interval.as_millis()
    );

    let dash = HttpDashboard::connect(&cfg).context("building dashboard")?;
    dash.start();
    if let Some(id) = project {
        dash.open_project(id);
    }

    let result = if has_flag(&args, "--once") {
        run_once(&dash, &cfg, project.is_some(), &list_filter).await
    } else {
        run_follow(&dash, &list_filter).await
    };
    dash.shutdown();
    result
}

/// Upper bound for one full chain run plus slack.
fn chain_deadline(cfg: &DashboardConfig) -> Duration {
    cfg.backends.iter().map(|b| b.timeout).sum::<Duration>() + Duration::from_secs(1)
}

async fn wait_loaded<T: Clone>(rx: &mut watch::Receiver<SyncSnapshot<T>>, limit: Duration) -> Result<SyncSnapshot<T>> {
    let snap = tokio::time::timeout(limit, rx.wait_for(|s| !s.is_pending()))
        .await
        .context("timed out waiting for data")?
        .context("dashboard stopped")?;
    Ok(snap.clone())
}

async fn run_once(dash: &HttpDashboard, cfg: &DashboardConfig, with_project: bool, list_filter: &ProjectFilter) -> Result<()> {
    let mut session_rx = dash.subscribe_session();
    let verdict = tokio::time::timeout(chain_deadline(cfg), session_rx.wait_for(|v| !v.is_loading()))
        .await
        .context("timed out waiting for a session verdict")?
        .context("session state dropped")?
        .clone();
    if !verdict.is_authenticated() {
        println!("{}", render_login_prompt(&verdict, dash.backends()));
        return Ok(());
    }
    if let Some(user) = verdict.user() {
        println!("signed in as {}", user.display_name());
    }
    let limit = cfg.request_timeout;
    let projects = wait_loaded(&mut dash.subscribe_projects(), limit).await?;
    println!("{}", render_projects(&projects, list_filter));
    if with_project {
        for kind in ResourceKind::ALL {
            let snap = wait_loaded(&mut dash.subscribe_nested(kind), limit).await?;
            println!("{}", render_nested(kind, &snap));
        }
    }
    Ok(())
}

async fn run_follow(dash: &HttpDashboard, list_filter: &ProjectFilter) -> Result<()> {
    let mut session_rx = dash.subscribe_session();
    let mut projects_rx = dash.subscribe_projects();
    let mut checklist_rx = dash.subscribe_nested(ResourceKind::Checklist);
    let mut comments_rx = dash.subscribe_nested(ResourceKind::Comments);
    let mut stakeholders_rx = dash.subscribe_nested(ResourceKind::Stakeholders);
    let mut last: Vec<ProjectStats> = Vec::new();

    loop {
        tokio::select! {
            changed = session_rx.changed() => {
                if changed.is_err() { break; }
                let verdict = session_rx.borrow_and_update().clone();
                match verdict.user() {
                    Some(user) => println!("signed in as {}", user.display_name()),
                    None if !verdict.is_loading() => println!("{}", render_login_prompt(&verdict, dash.backends())),
                    None => {}
                }
            }
            changed = projects_rx.changed() => {
                if changed.is_err() { break; }
                let snap = projects_rx.borrow_and_update().clone();
                let diff = diff_by_key(&last, &snap.items);
                if !diff.is_empty() {
                    info!(target: "projdash::sync", added = ?diff.added, removed = ?diff.removed, changed = ?diff.changed, "project list changed");
                }
                last = snap.items.to_vec();
                println!("{}", render_projects(&snap, list_filter));
            }
            changed = checklist_rx.changed() => {
                if changed.is_err() { break; }
                let snap = checklist_rx.borrow_and_update().clone();
                println!("{}", render_nested(ResourceKind::Checklist, &snap));
            }
            changed = comments_rx.changed() => {
                if changed.is_err() { break; }
                let snap = comments_rx.borrow_and_update().clone();
                println!("{}", render_nested(ResourceKind::Comments, &snap));
            }
            changed = stakeholders_rx.changed() => {
                if changed.is_err() { break; }
                let snap = stakeholders_rx.borrow_and_update().clone();
                println!("{}", render_nested(ResourceKind::Stakeholders, &snap));
            }
            _ = tokio::signal::ctrl_c() => {
                info!(target: "startup", "interrupt received, shutting down");
                break;
            }
        }
    }
    Ok(())
}
