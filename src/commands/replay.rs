use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::BufReader;
use tracing::info;

use trackline::EngineConfig;
use trackline::metrics::init_metrics;
use trackline::replay::replay;

/// Replay a recorded session file, writing session outputs to stdout as JSON lines
#[tracing::instrument(skip_all)]
pub async fn handle_replay(
    config: EngineConfig,
    input: &Path,
    tick_ms: Option<u64>,
    print_metrics: bool,
) -> Result<()> {
    let metrics_handle = if print_metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let tick_ms = tick_ms.unwrap_or(config.estimator.tick_interval_ms);
    info!("Replaying {:?} with a {} ms render tick", input, tick_ms);

    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open {:?}", input))?;

    let summary = replay(config, tick_ms, BufReader::new(file), tokio::io::stdout()).await?;
    info!(
        "{} gauge frames and {} route updates written",
        summary.gauge_frames, summary.route_updates
    );

    // Exposition goes to stderr so stdout stays JSON lines
    if let Some(handle) = metrics_handle {
        eprint!("{}", handle.render());
    }

    Ok(())
}
