//! ecp-review - terminal review panel for one project
//!
//! Watches a project's result rows, validates rows flagged for
//! verification and sends single rows back for reprocessing.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ecp_common::models::{ActivityCategory, ResultRow, VerificationStatus};
use ecp_review::{
    Filters, HttpReviewApi, Phase, ReviewSession, ReviewState, SortDirection, SortKey, SortState,
};
use tokio::signal;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "ecp-review")]
#[command(about = "Review and reprocess carbon estimation results")]
#[command(version)]
struct Args {
    /// Base URL of ecp-api
    #[arg(long, env = "ECP_API_URL", default_value = "http://127.0.0.1:5740")]
    api_url: String,

    /// Bearer access token
    #[arg(long, env = "ECP_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the rows and refresh while the project is being processed
    Watch {
        project: Uuid,
        /// Only rows of this category (label or slug)
        #[arg(long)]
        category: Option<ActivityCategory>,
        /// Only rows with this verification status (unverified, validated)
        #[arg(long)]
        status: Option<VerificationStatus>,
        /// Sort column: price or emission
        #[arg(long)]
        sort: Option<SortKey>,
        /// Ascending instead of descending
        #[arg(long, requires = "sort")]
        asc: bool,
        /// Exit once no row is being processed
        #[arg(long)]
        until_idle: bool,
    },
    /// Validate rows flagged for verification
    Validate {
        project: Uuid,
        #[arg(long, value_delimiter = ',', conflicts_with = "all", required_unless_present = "all")]
        ids: Vec<i64>,
        /// Every row still awaiting validation
        #[arg(long)]
        all: bool,
    },
    /// Send one row back to the automation with a corrected category
    Reprocess {
        project: Uuid,
        row: i64,
        #[arg(long)]
        category: ActivityCategory,
        /// Free-text hint for the automation
        #[arg(long, default_value = "")]
        hint: String,
        /// Wait until the automation answered
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting ECP review client (ecp-review) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let api = HttpReviewApi::new(&args.api_url, &args.token).context("Failed to build HTTP client")?;

    match args.command {
        Command::Watch {
            project,
            category,
            status,
            sort,
            asc,
            until_idle,
        } => {
            let mut state = ReviewState::default();
            state.filters = Filters { category, status };
            if let Some(key) = sort {
                let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
                state.sort = SortState::new(key, direction);
            }
            let session = ReviewSession::new(Arc::new(api), project, state);
            watch(&session, until_idle).await
        }
        Command::Validate { project, ids, all } => {
            let session = ReviewSession::new(Arc::new(api), project, ReviewState::default());
            load(&session).await?;

            let ids = if all {
                session
                    .view()
                    .await
                    .rows
                    .iter()
                    .filter(|r| r.is_pending_verification())
                    .map(|r| r.id)
                    .collect()
            } else {
                ids
            };
            if ids.is_empty() {
                println!("Aucune ligne à valider");
                return Ok(());
            }

            let updated = session.validate(ids).await?;
            load(&session).await?;
            let view = session.view().await;
            println!("{} ligne(s) validée(s)", updated);
            print_gate(&view);
            Ok(())
        }
        Command::Reprocess {
            project,
            row,
            category,
            hint,
            wait,
        } => {
            let session = ReviewSession::new(Arc::new(api), project, ReviewState::default());
            load(&session).await?;

            let queued = session.submit_reprocess(row, category, &hint).await?;
            println!("{} ligne(s) envoyée(s) en retraitement", queued);

            if wait {
                watch(&session, true).await?;
            }
            Ok(())
        }
    }
}

/// First snapshot; fails if the project cannot be read at all
async fn load(session: &ReviewSession) -> Result<()> {
    session.poll_once().await;
    let view = session.view().await;
    if view.phase == Phase::Loading {
        bail!("Could not load project {}", session.project_id());
    }
    Ok(())
}

async fn watch(session: &ReviewSession, until_idle: bool) -> Result<()> {
    let mut changes = session.changes();
    let poller = session.spawn_poller();

    let mut last_rendered = None;
    loop {
        let view = session.view().await;
        if last_rendered != Some(view.revision) {
            render(&view);
            last_rendered = Some(view.revision);
        }
        if until_idle && view.phase == Phase::Ready && view.awaiting_count() == 0 {
            break;
        }

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    warn!("Review session closed");
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }

    session.shutdown();
    if let Err(e) = poller.await {
        warn!("Poller task ended abnormally: {}", e);
    }
    Ok(())
}

fn render(view: &ReviewState) {
    println!();
    let Some(project) = &view.project else {
        println!("Chargement...");
        return;
    };

    println!("{} [{}]", project.name, project.status.label());
    if view.last_poll_failed() {
        println!("(dernière actualisation en échec, nouvelle tentative)");
    }

    if view.phase == Phase::WaitingForReady {
        for event in &view.events {
            println!(
                "  {} {:<8} {}",
                event.created_at.format("%H:%M:%S"),
                event.kind.as_str(),
                event.message
            );
        }
        return;
    }

    if view.filters.is_active() {
        println!("Filtres: {}", view.filters);
    }
    println!(
        "{:>6}  {:<20} {:<28} {:>12} {:>14}  {:<10} {}",
        "id", "catégorie", "activité", "prix (€)", "émission", "statut", "retraitement"
    );
    for row in view.visible_rows() {
        println!("{}", format_row(row, view.is_awaiting(row.id)));
    }

    print_gate(view);
}

fn format_row(row: &ResultRow, awaiting: bool) -> String {
    let mark = if row.is_pending_verification() { "!" } else { " " };
    let reprocess = if awaiting {
        "En attente"
    } else {
        row.reprocess_status.label()
    };
    format!(
        "{}{:>5}  {:<20} {:<28} {:>12} {:>14}  {:<10} {}",
        mark,
        row.id,
        row.category.map(|c| c.label()).unwrap_or("-"),
        truncate(row.activity.as_deref().unwrap_or("-"), 28),
        number(row.total_price_eur),
        number(row.total_emission),
        row.effective_verification().label(),
        reprocess
    )
}

fn number(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn print_gate(view: &ReviewState) {
    if view.completion_gate() {
        println!("Toutes les lignes sont validées, résultats consultables");
    } else {
        println!("{} ligne(s) à valider", view.pending_verification());
    }
}
