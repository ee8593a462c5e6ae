//! Single-threaded session tying ingestion, focus and the render tick together.
//!
//! Three triggers drive a session: telemetry batches, focus changes and the
//! fixed-rate render tick. They are applied one at a time through `&mut self`,
//! so no two handlers ever touch the state at once.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::focus::{FetchCompletion, FetchRegistry, FetchTicket, FocusContext, apply_completion};
use crate::geometry::RenderableRouteSegment;
use crate::kinematics::SignalState;
use crate::live_tracker::{EntityEvent, LiveTracker, TrackedEntityState};
use crate::telemetry::{FlightPhase, MalformedBatch, TelemetryBatch};

/// Freshly built path for the focused entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteUpdate {
    pub entity_id: String,
    pub segments: Vec<RenderableRouteSegment>,
}

/// Everything a batch produced for the UI layer
#[derive(Debug, Clone, Default)]
pub struct BatchUpdate {
    pub events: Vec<EntityEvent>,
    pub route: Option<RouteUpdate>,
    /// Set when the focused entity was evicted by this batch
    pub focus_cleared: Option<String>,
}

/// Per-tick gauge values for the focused entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeFrame {
    pub entity_id: String,
    pub at: DateTime<Utc>,
    pub displayed_bank_deg: f64,
    pub pitch_deg: f64,
    pub turn_rate_deg_per_sec: f64,
    pub turning: bool,
    pub signal_state: SignalState,
    pub heading_deg: f64,
    pub ground_speed_kt: f64,
    pub altitude_ft: f64,
    pub vertical_speed_fpm: f64,
    pub phase: FlightPhase,
}

pub struct LiveSession {
    config: EngineConfig,
    tracker: LiveTracker,
    fetches: FetchRegistry,
    focus: Option<FocusContext>,
}

impl LiveSession {
    pub fn new(config: EngineConfig) -> Self {
        let tracker = LiveTracker::new(config.ingest.clone());
        Self {
            config,
            tracker,
            fetches: FetchRegistry::new(),
            focus: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &LiveTracker {
        &self.tracker
    }

    pub fn focused_entity(&self) -> Option<&str> {
        self.focus.as_ref().map(|focus| focus.entity_id())
    }

    pub fn focus(&self) -> Option<&FocusContext> {
        self.focus.as_ref()
    }

    pub fn fetches(&self) -> &FetchRegistry {
        &self.fetches
    }

    /// Apply a telemetry batch. A malformed batch changes nothing.
    pub fn apply_batch(&mut self, batch: TelemetryBatch) -> Result<BatchUpdate, MalformedBatch> {
        let outcome = self.tracker.apply_batch(batch)?;

        let mut update = BatchUpdate::default();

        for event in &outcome.events {
            if let EntityEvent::Removed { entity_id } = event {
                self.fetches.forget(entity_id);
            }
        }

        if let Some(focused) = self.focused_entity().map(str::to_string) {
            if outcome.was_removed(&focused) {
                info!("Focused entity {} disappeared, clearing focus", focused);
                self.focus = None;
                update.focus_cleared = Some(focused);
            } else if outcome.position_changed(&focused) {
                update.route = self.rebuild_focused_route();
            }
        }

        update.events = outcome.events;
        Ok(update)
    }

    /// Focus an entity.
    ///
    /// Resets the estimator and drops the previous focus's geometry. Returns
    /// the ticket for the detail fetches the caller should start, or `None`
    /// when no new fetch is needed (unknown entity, already focused, or a
    /// fetch for it is still running).
    pub fn set_focus(&mut self, entity_id: &str) -> Option<FetchTicket> {
        if self.focused_entity() == Some(entity_id) {
            debug!("{} is already focused", entity_id);
            return None;
        }

        if !self.tracker.contains(entity_id) {
            debug!("Ignoring focus on unknown entity {}", entity_id);
            return None;
        }

        let start = self.fetches.begin(entity_id);
        let mut focus =
            FocusContext::new(entity_id, start.request_id, self.config.estimator.clone());
        // Results of a reused request that arrived while focus was elsewhere
        for completion in start.parked {
            focus.apply(completion);
        }
        self.focus = Some(focus);
        counter!("focus.changes_total").increment(1);
        info!("Focused {} (request {})", entity_id, start.request_id);

        start.ticket
    }

    /// Drop the focus and everything that belongs to it
    pub fn clear_focus(&mut self) {
        if let Some(previous) = self.focus.take() {
            info!("Cleared focus on {}", previous.entity_id());
        }
    }

    /// Hand a detail fetch result to the session.
    ///
    /// Results for an entity that is no longer focused are kept on its request
    /// until it is focused again; results for a request that is gone are
    /// dropped. Returns the rebuilt route when the result applied.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        completion: FetchCompletion,
    ) -> Option<RouteUpdate> {
        if apply_completion(&mut self.fetches, self.focus.as_mut(), ticket, completion) {
            self.rebuild_focused_route()
        } else {
            None
        }
    }

    /// Current route of the focused entity, building it on first use
    pub fn focused_route(&mut self) -> Option<RouteUpdate> {
        let focus = self.focus.as_ref()?;
        if let Some(segments) = focus.cached_route() {
            return Some(RouteUpdate {
                entity_id: focus.entity_id().to_string(),
                segments: segments.to_vec(),
            });
        }
        self.rebuild_focused_route()
    }

    /// Advance the render tick. Emits nothing while nothing is focused.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<GaugeFrame> {
        let focus = self.focus.as_mut()?;
        let entity = self.tracker.get(focus.entity_id())?;

        let sample = entity.kinematic_sample();
        let estimate = focus.estimator_mut().tick(&sample, now);

        Some(GaugeFrame {
            entity_id: focus.entity_id().to_string(),
            at: now,
            displayed_bank_deg: estimate.displayed_bank_deg,
            pitch_deg: estimate.pitch_deg,
            turn_rate_deg_per_sec: estimate.turn_rate_deg_per_sec,
            turning: estimate.turning,
            signal_state: estimate.signal_state,
            heading_deg: sample.heading_deg,
            ground_speed_kt: sample.ground_speed_kt,
            altitude_ft: sample.altitude_ft,
            vertical_speed_fpm: sample.vertical_speed_fpm,
            phase: entity.derived_phase,
        })
    }

    fn rebuild_focused_route(&mut self) -> Option<RouteUpdate> {
        let focus = self.focus.as_mut()?;
        let entity: &TrackedEntityState = self.tracker.get(focus.entity_id())?;

        let segments = focus.rebuild_route(entity, &self.config.geometry).to_vec();
        Some(RouteUpdate {
            entity_id: focus.entity_id().to_string(),
            segments,
        })
    }
}
