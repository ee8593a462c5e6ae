use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use trackline::{EngineConfig, FiledRoute, RoutePoint, build_renderable_route};

/// Input of a one-off route build
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    #[serde(default)]
    pub history: Vec<RoutePoint>,
    pub current_position: RoutePoint,
    #[serde(default)]
    pub filed_route: Option<FiledRoute>,
}

/// Build the renderable route for one request file and print the segments
#[tracing::instrument(skip_all)]
pub async fn handle_route(config: EngineConfig, input: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {:?}", input))?;
    let request: RouteRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse route request {:?}", input))?;

    let waypoints = request.filed_route.as_ref().map(FiledRoute::waypoints);
    info!(
        "Building route from {} history points and {} filed waypoints",
        request.history.len(),
        waypoints.as_ref().map_or(0, Vec::len)
    );

    let segments = build_renderable_route(
        &request.history,
        &request.current_position,
        waypoints.as_deref(),
        &config.geometry,
    );

    let output =
        serde_json::to_string_pretty(&segments).context("Failed to encode route segments")?;
    println!("{}", output);

    info!("Emitted {} segments", segments.len());
    Ok(())
}
