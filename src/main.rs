use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use qos_monitor::{CodeFeature, EntryConfig, Monitor, MonitorConfig};
use tracing_subscriber::EnvFilter;

mod load_generator;

const DEMO_CYCLE_MS: u64 = 5_000;
const DEMO_WORKERS: u32 = 8;
const DEMO_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the JSON stats lines; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── 1. Load config ───────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => MonitorConfig::from_json_file(&path)
            .with_context(|| format!("loading monitor config from {path}"))?,
        None => {
            let mut cfg = MonitorConfig::new("demo");
            cfg.statistical_cycle_ms = DEMO_CYCLE_MS;
            cfg
        }
    };

    // ── 2. Register ──────────────────────────────────────────────
    let codes = HashMap::from([
        (200, CodeFeature::success()),
        (201, CodeFeature::success()),
        (500, CodeFeature::failure("internal error")),
        (503, CodeFeature::failure("unavailable")),
    ]);
    let monitor = Monitor::builder(config)
        .code_table(codes)
        .start()
        .context("starting monitor")?;

    monitor
        .add_entry_config(
            "POST /api/sessions",
            EntryConfig {
                fast_less_than_ms: 400,
                bucket_split: 12,
                bucket_min_ms: 100,
                bucket_max_ms: 1_100,
            },
        )
        .context("configuring POST /api/sessions")?;

    // ── 3. Drive load ────────────────────────────────────────────
    tracing::info!(
        workers = DEMO_WORKERS,
        duration_secs = DEMO_DURATION.as_secs(),
        "generating load"
    );
    load_generator::run(monitor.clone(), DEMO_WORKERS, DEMO_DURATION).await;

    // ── 4. Close the last partial window ─────────────────────────
    monitor.flush().await.context("final flush")?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    tracing::info!("done");
    Ok(())
}
