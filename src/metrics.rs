use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per process and return its handle.
/// Later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    initialize_metrics();

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

/// Register every metric at zero so the exposition lists them before first use
pub fn initialize_metrics() {
    metrics::counter!("ingest.batches_accepted_total").absolute(0);
    metrics::counter!("ingest.batches_rejected_total").absolute(0);
    metrics::counter!("ingest.snapshots_accepted_total").absolute(0);
    metrics::counter!("ingest.snapshots_stale_total").absolute(0);
    metrics::counter!("ingest.snapshots_discarded_total").absolute(0);
    metrics::counter!("ingest.entities_added_total").absolute(0);
    metrics::counter!("ingest.entities_evicted_total").absolute(0);
    metrics::gauge!("ingest.tracked_entities").set(0.0);

    metrics::counter!("focus.changes_total").absolute(0);
    metrics::counter!("focus.fetches_dropped_total").absolute(0);

    metrics::counter!("geometry.route_builds_total").absolute(0);
    metrics::counter!("geometry.backfill_points_total").absolute(0);
}
