//! Listing Sentinel: Binary Entrypoint
//! Loads the pipeline config, wires collaborators, runs the Supervisor until
//! Ctrl-C and prints the final unit status.
//!
//! See `README.md` for quickstart and config layout.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listing_sentinel::api::{self, AppState};
use listing_sentinel::archive::JsonlArchive;
use listing_sentinel::config::PipelineConfig;
use listing_sentinel::extract::http::HttpExtractor;
use listing_sentinel::extract::ExtractorRegistry;
use listing_sentinel::ledger::{FileLedger, Ledger};
use listing_sentinel::metrics::Metrics;
use listing_sentinel::notify::log::LogChannel;
use listing_sentinel::notify::telegram::TelegramChannel;
use listing_sentinel::notify::NotificationChannel;
use listing_sentinel::stop::stop_pair;
use listing_sentinel::subscribers::store::JsonConfigStore;
use listing_sentinel::{PipelineParts, PipelineSettings, Supervisor};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_sentinel=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_channel(cfg: &PipelineConfig) -> Arc<dyn NotificationChannel> {
    match &cfg.telegram {
        Some(tg) => {
            let mut ch = TelegramChannel::new(tg.token.clone());
            if let Some(secs) = tg.timeout_secs {
                ch = ch.with_timeout(secs);
            }
            if let Some(n) = tg.retries {
                ch = ch.with_retries(n);
            }
            Arc::new(ch)
        }
        None => {
            warn!("no telegram section configured; notifications are only logged");
            Arc::new(LogChannel)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let cfg = PipelineConfig::load_default(explicit.as_deref())?;

    let mut registry = ExtractorRegistry::new();
    for ex in &cfg.extractors {
        let extractor = HttpExtractor::new(ex.clone())
            .with_context(|| format!("building extractor `{}`", ex.name))?;
        registry.register(Arc::new(extractor));
    }
    let sources = cfg.source_list();
    let extractors = registry.resolve(
        sources
            .iter()
            .zip(&cfg.sources)
            .map(|(s, entry)| (&s.id, entry.extractor.as_str())),
    );

    let ledger = FileLedger::open(&cfg.ledger_path)?;
    info!(path = %cfg.ledger_path.display(), entries = ledger.len(), "ledger opened");
    let archive = JsonlArchive::open(&cfg.archive_dir, &cfg.archive_prefix)?;
    let store = JsonConfigStore::open(
        cfg.subscribers.settings_file.clone(),
        cfg.subscribers.configs_dir.clone(),
    )
    .await?;
    let channel = build_channel(&cfg);

    // Recorder goes in before any unit touches a counter.
    let metrics = match cfg.status_addr {
        Some(_) => match Metrics::install() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = ?e, "metrics recorder unavailable");
                None
            }
        },
        None => None,
    };

    let supervisor = Supervisor::start(PipelineParts {
        sources,
        extractors,
        ledger: Arc::new(ledger),
        archive: Arc::new(archive),
        store: Arc::new(store),
        channel,
        maintenance_subscriber: cfg.maintenance_subscriber,
        settings: PipelineSettings {
            poll_interval_secs: cfg.poll_interval_secs,
            backlog_step: cfg.backlog_step,
            archive_ceiling: cfg.archive_ceiling,
        },
    })?;

    let (api_trigger, api_stop) = stop_pair();
    let api_task = match &cfg.status_addr {
        Some(addr) => {
            let state = AppState {
                status: supervisor.status(),
                metrics,
            };
            let addr = addr.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = api::serve(&addr, state, api_stop).await {
                    warn!(error = ?e, "status API stopped");
                }
            }))
        }
        None => None,
    };

    let report_every = Duration::from_secs(cfg.status_report_secs.max(1));
    let status = supervisor.status();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = ?e, "ctrl-c handler failed; shutting down");
                }
                break;
            }
            _ = tokio::time::sleep(report_every) => {
                info!(status = %status.render_row(), "pipeline status");
            }
        }
    }

    let final_status = supervisor.shutdown(report_every).await;
    api_trigger.stop();
    if let Some(task) = api_task {
        let _ = task.await;
    }

    println!("final unit status:");
    for (unit, state) in &final_status {
        println!("  {unit:<24} {state}");
    }
    Ok(())
}
