//! Repricer: marketplace price reconciliation service.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the Sheet Store, scraper and pricing clients together, and runs
//! the fetch→scrape→merge→decide→submit→write loop over all configured
//! seller ranges until externally terminated.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use repricer::config::AppConfig;
use repricer::engine::orchestrator::{PipelineOrchestrator, TokioSleeper};
use repricer::engine::range::RangeProcessor;
use repricer::pricing::MarketplaceApiClient;
use repricer::scraper::browser::BrowserScraper;
use repricer::sheets::GoogleSheetsClient;
use repricer::snapshot::DebugSink;

const BANNER: &str = r#"
 ____  _____ ____  ____  ___ ____ _____ ____
|  _ \| ____|  _ \|  _ \|_ _/ ___| ____|  _ \
| |_) |  _| | |_) | |_) || | |   |  _| | |_) |
|  _ <| |___|  __/|  _ < | | |___| |___|  _ <
|_| \_\_____|_|   |_| \_\___\____|_____|_| \_\

  Marketplace Price Reconciliation Service
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        ranges = cfg.ranges.len(),
        pause_window_mins = format!(
            "{}–{}",
            cfg.pacing.min_pause_secs / 60,
            cfg.pacing.max_pause_secs / 60
        ),
        pricing_debug = cfg.pricing.debug,
        "Repricer starting up"
    );

    // -- Wire up components ----------------------------------------------

    // Fail fast on missing credentials before the first cycle starts
    let ranges = cfg.range_specs()?;
    let store = GoogleSheetsClient::new(cfg.sheets_token()?)?;
    let scraper = BrowserScraper::new(cfg.scraper.clone());
    let submitter = MarketplaceApiClient::new(cfg.pricing.debug)?;
    let sink = DebugSink::new(cfg.snapshots.enabled, cfg.snapshots.dir.clone());

    let processor = RangeProcessor::new(
        Arc::new(store),
        Arc::new(scraper),
        Arc::new(submitter),
        Arc::new(sink),
        cfg.sheets.spreadsheet_id.clone(),
    );

    let orchestrator = PipelineOrchestrator::new(
        processor,
        ranges,
        (cfg.pacing.min_pause_secs, cfg.pacing.max_pause_secs),
        Box::new(TokioSleeper),
    );

    // -- Main loop ---------------------------------------------------------

    info!("Entering reconciliation loop. Press Ctrl+C to stop.");
    tokio::select! {
        _ = orchestrator.run_forever() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    info!("Repricer shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("repricer=info"));

    let json_logging = std::env::var("REPRICER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
