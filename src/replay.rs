//! Recorded-session replay.
//!
//! A replay file is JSON lines, one session event per line, tagged by `type`.
//! The driver feeds events into a [`LiveSession`] in order and synthesizes
//! render ticks on a virtual clock that follows the batch timestamps, so the
//! estimator sees the same cadence it would live.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::flight_plan::{FiledRoute, FiledRouteNode};
use crate::focus::{FetchCompletion, FetchTicket};
use crate::live_tracker::EntityEvent;
use crate::session::{GaugeFrame, LiveSession, RouteUpdate};
use crate::telemetry::{MalformedBatch, RoutePoint, TelemetryBatch};

/// One input line of a replay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    Batch(TelemetryBatch),
    #[serde(rename_all = "camelCase")]
    Focus { entity_id: String },
    Defocus,
    #[serde(rename_all = "camelCase")]
    History {
        entity_id: String,
        points: Vec<RoutePoint>,
    },
    #[serde(rename_all = "camelCase")]
    FiledRoute {
        entity_id: String,
        legs: Vec<FiledRouteNode>,
    },
    #[serde(rename_all = "camelCase")]
    HistoryFailed { entity_id: String, reason: String },
    #[serde(rename_all = "camelCase")]
    FiledRouteFailed { entity_id: String, reason: String },
    Tick { at: DateTime<Utc> },
}

/// One output line of a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplayOutput {
    Entity { event: EntityEvent },
    Route(RouteUpdate),
    Gauge(GaugeFrame),
    FetchStarted { ticket: FetchTicket },
    #[serde(rename_all = "camelCase")]
    FocusCleared { entity_id: String },
    Rejected { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub lines: usize,
    pub batches: usize,
    pub rejected: usize,
    pub gauge_frames: usize,
    pub route_updates: usize,
}

/// Drives a session from recorded events
pub struct ReplayDriver {
    session: LiveSession,
    tick_interval: Duration,
    clock: Option<DateTime<Utc>>,
    /// Latest fetch ticket handed out per entity
    tickets: HashMap<String, FetchTicket>,
}

impl ReplayDriver {
    pub fn new(config: EngineConfig, tick_interval_ms: u64) -> Self {
        let tick_interval = Duration::milliseconds(tick_interval_ms.max(1) as i64);
        Self {
            session: LiveSession::new(config),
            tick_interval,
            clock: None,
            tickets: HashMap::new(),
        }
    }

    pub fn session(&self) -> &LiveSession {
        &self.session
    }

    /// Apply one event and return what the session produced
    pub fn handle(&mut self, event: SessionEvent) -> Vec<ReplayOutput> {
        let mut outputs = Vec::new();

        match event {
            SessionEvent::Batch(batch) => {
                if let Some(as_of) = batch.as_of_timestamp {
                    self.advance_to(as_of, &mut outputs);
                }
                match self.session.apply_batch(batch) {
                    Ok(update) => {
                        outputs.extend(
                            update
                                .events
                                .into_iter()
                                .map(|event| ReplayOutput::Entity { event }),
                        );
                        if let Some(entity_id) = update.focus_cleared {
                            outputs.push(ReplayOutput::FocusCleared { entity_id });
                        }
                        if let Some(route) = update.route {
                            outputs.push(ReplayOutput::Route(route));
                        }
                    }
                    Err(e) => outputs.push(ReplayOutput::Rejected {
                        reason: e.to_string(),
                    }),
                }
            }
            SessionEvent::Focus { entity_id } => {
                if let Some(ticket) = self.session.set_focus(&entity_id) {
                    self.tickets.insert(entity_id, ticket.clone());
                    outputs.push(ReplayOutput::FetchStarted { ticket });
                }
                if let Some(route) = self.session.focused_route() {
                    outputs.push(ReplayOutput::Route(route));
                }
            }
            SessionEvent::Defocus => self.session.clear_focus(),
            SessionEvent::History { entity_id, points } => {
                self.complete(entity_id, FetchCompletion::History(points), &mut outputs);
            }
            SessionEvent::FiledRoute { entity_id, legs } => {
                let route = FiledRoute { legs };
                self.complete(entity_id, FetchCompletion::FiledRoute(route), &mut outputs);
            }
            SessionEvent::HistoryFailed { entity_id, reason } => {
                self.complete(entity_id, FetchCompletion::HistoryFailed(reason), &mut outputs);
            }
            SessionEvent::FiledRouteFailed { entity_id, reason } => {
                self.complete(entity_id, FetchCompletion::FiledRouteFailed(reason), &mut outputs);
            }
            SessionEvent::Tick { at } => self.advance_to(at, &mut outputs),
        }

        outputs
    }

    fn complete(
        &mut self,
        entity_id: String,
        completion: FetchCompletion,
        outputs: &mut Vec<ReplayOutput>,
    ) {
        let Some(ticket) = self.tickets.get(&entity_id).cloned() else {
            debug!("No fetch was started for {}, ignoring result", entity_id);
            return;
        };
        if let Some(route) = self.session.complete_fetch(&ticket, completion) {
            outputs.push(ReplayOutput::Route(route));
        }
    }

    /// Run render ticks from the current clock up to `at`
    fn advance_to(&mut self, at: DateTime<Utc>, outputs: &mut Vec<ReplayOutput>) {
        let Some(mut now) = self.clock else {
            self.clock = Some(at);
            return;
        };

        while now + self.tick_interval <= at {
            now += self.tick_interval;
            if let Some(frame) = self.session.tick(now) {
                outputs.push(ReplayOutput::Gauge(frame));
            }
        }
        self.clock = Some(now);
    }
}

/// Replay a JSON-lines event stream, writing outputs as JSON lines
pub async fn replay<R, W>(
    config: EngineConfig,
    tick_interval_ms: u64,
    reader: R,
    mut writer: W,
) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut driver = ReplayDriver::new(config, tick_interval_ms);
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read replay input")? {
        summary.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let outputs = match serde_json::from_str::<SessionEvent>(line) {
            Ok(event) => {
                if matches!(event, SessionEvent::Batch(_)) {
                    summary.batches += 1;
                }
                driver.handle(event)
            }
            Err(e) => {
                let rejection = MalformedBatch::Undecodable(e.to_string());
                warn!("Skipping line {}: {}", summary.lines, rejection);
                vec![ReplayOutput::Rejected {
                    reason: rejection.to_string(),
                }]
            }
        };

        for output in outputs {
            match &output {
                ReplayOutput::Rejected { .. } => summary.rejected += 1,
                ReplayOutput::Gauge(_) => summary.gauge_frames += 1,
                ReplayOutput::Route(_) => summary.route_updates += 1,
                _ => {}
            }
            let mut encoded =
                serde_json::to_vec(&output).context("Failed to encode replay output")?;
            encoded.push(b'\n');
            writer
                .write_all(&encoded)
                .await
                .context("Failed to write replay output")?;
        }
    }

    writer.flush().await.context("Failed to flush replay output")?;
    info!(
        "Replay finished: {} lines, {} batches ({} rejected), {} gauge frames, {} route updates",
        summary.lines, summary.batches, summary.rejected, summary.gauge_frames, summary.route_updates
    );

    Ok(summary)
}
