//! Per-focus state and detail fetch bookkeeping.
//!
//! Focusing an entity starts two detail fetches (position history and filed
//! route) that complete asynchronously and possibly out of order. Each focus
//! request is identified by a [`FetchTicket`]. Completions for a request that
//! is still running but no longer focused are kept until the entity is focused
//! again; completions for a request that is gone are dropped.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{EstimatorConfig, GeometryConfig};
use crate::flight_plan::{FiledRoute, FlightPlanWaypoint};
use crate::geometry::{RenderableRouteSegment, build_renderable_route};
use crate::kinematics::KinematicEstimator;
use crate::live_tracker::TrackedEntityState;
use crate::telemetry::RoutePoint;

/// Identifies the detail fetches started for one focus request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTicket {
    pub entity_id: String,
    pub request_id: u64,
}

/// Result of one detail fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchCompletion {
    History(Vec<RoutePoint>),
    FiledRoute(FiledRoute),
    HistoryFailed(String),
    FiledRouteFailed(String),
}

impl FetchCompletion {
    fn kind(&self) -> FetchKind {
        match self {
            FetchCompletion::History(_) | FetchCompletion::HistoryFailed(_) => FetchKind::History,
            FetchCompletion::FiledRoute(_) | FetchCompletion::FiledRouteFailed(_) => {
                FetchKind::FiledRoute
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    History,
    FiledRoute,
}

#[derive(Debug, Clone)]
struct InFlight {
    request_id: u64,
    history_pending: bool,
    route_pending: bool,
    /// Results that arrived while another entity was focused
    parked: Vec<FetchCompletion>,
}

impl InFlight {
    fn settled(&self) -> bool {
        !self.history_pending && !self.route_pending && self.parked.is_empty()
    }
}

/// What focusing an entity gets back from the registry
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStart {
    pub request_id: u64,
    /// Present only when new fetches have to be started
    pub ticket: Option<FetchTicket>,
    /// Results of a reused request that landed while the entity was not focused
    pub parked: Vec<FetchCompletion>,
}

/// Tracks which entities have detail fetches outstanding.
///
/// At most one set of fetches runs per entity. Re-selecting an entity whose
/// fetches are still running reuses that request instead of starting another,
/// so results that complete while focus is elsewhere are parked on the request
/// and handed back when the entity is focused again.
#[derive(Debug, Default)]
pub struct FetchRegistry {
    next_request_id: u64,
    in_flight: HashMap<String, InFlight>,
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start fetches for `entity_id`, or pick up the request already running
    pub fn begin(&mut self, entity_id: &str) -> FetchStart {
        if let Some(existing) = self.in_flight.get_mut(entity_id) {
            let request_id = existing.request_id;
            let parked = std::mem::take(&mut existing.parked);
            debug!(
                "Fetch for {} already in flight (request {}), reusing it with {} parked results",
                entity_id,
                request_id,
                parked.len()
            );
            if existing.settled() {
                self.in_flight.remove(entity_id);
            }
            return FetchStart {
                request_id,
                ticket: None,
                parked,
            };
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.in_flight.insert(
            entity_id.to_string(),
            InFlight {
                request_id,
                history_pending: true,
                route_pending: true,
                parked: Vec::new(),
            },
        );

        FetchStart {
            request_id,
            ticket: Some(FetchTicket {
                entity_id: entity_id.to_string(),
                request_id,
            }),
            parked: Vec::new(),
        }
    }

    /// Record that one half of a request finished, keeping its result when
    /// `park` is given. Returns false for a ticket matching no running request.
    fn finish(
        &mut self,
        ticket: &FetchTicket,
        kind: FetchKind,
        park: Option<FetchCompletion>,
    ) -> bool {
        let Some(entry) = self.in_flight.get_mut(&ticket.entity_id) else {
            return false;
        };
        if entry.request_id != ticket.request_id {
            return false;
        }

        match kind {
            FetchKind::History => entry.history_pending = false,
            FetchKind::FiledRoute => entry.route_pending = false,
        }
        entry.parked.extend(park);

        if entry.settled() {
            self.in_flight.remove(&ticket.entity_id);
        }
        true
    }

    /// Drop all bookkeeping for an entity that is no longer tracked
    pub fn forget(&mut self, entity_id: &str) {
        if let Some(entry) = self.in_flight.remove(entity_id) {
            debug!(
                "Forgetting fetch request {} for evicted {}",
                entry.request_id, entity_id
            );
        }
    }

    pub fn is_in_flight(&self, entity_id: &str) -> bool {
        self.in_flight.contains_key(entity_id)
    }
}

/// Everything owned by the current focus. Dropped wholesale on focus change.
#[derive(Debug)]
pub struct FocusContext {
    entity_id: String,
    request_id: u64,
    estimator: KinematicEstimator,
    fetched_history: Vec<RoutePoint>,
    filed_route: Option<Vec<FlightPlanWaypoint>>,
    cached_route: Option<Vec<RenderableRouteSegment>>,
}

impl FocusContext {
    pub fn new(entity_id: &str, request_id: u64, estimator_config: EstimatorConfig) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            request_id,
            estimator: KinematicEstimator::new(estimator_config),
            fetched_history: Vec::new(),
            filed_route: None,
            cached_route: None,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn estimator(&self) -> &KinematicEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut KinematicEstimator {
        &mut self.estimator
    }

    pub fn filed_route(&self) -> Option<&[FlightPlanWaypoint]> {
        self.filed_route.as_deref()
    }

    pub fn cached_route(&self) -> Option<&[RenderableRouteSegment]> {
        self.cached_route.as_deref()
    }

    /// Whether a completion for `ticket` belongs to this focus
    pub fn accepts(&self, ticket: &FetchTicket) -> bool {
        ticket.entity_id == self.entity_id && ticket.request_id == self.request_id
    }

    pub fn apply(&mut self, completion: FetchCompletion) {
        match completion {
            FetchCompletion::History(points) => {
                info!("Loaded {} history points for {}", points.len(), self.entity_id);
                self.fetched_history = points;
            }
            FetchCompletion::FiledRoute(route) => {
                let waypoints = route.waypoints();
                info!("Loaded filed route with {} waypoints for {}", waypoints.len(), self.entity_id);
                self.filed_route = Some(waypoints);
            }
            FetchCompletion::HistoryFailed(reason) => {
                info!("History fetch failed for {}: {}", self.entity_id, reason);
            }
            FetchCompletion::FiledRouteFailed(reason) => {
                info!("Filed route fetch failed for {}: {}", self.entity_id, reason);
            }
        }
    }

    /// Fetched history followed by live positions newer than its last point
    pub fn merged_history<'a>(
        &self,
        live: impl Iterator<Item = &'a RoutePoint>,
    ) -> Vec<RoutePoint> {
        let mut merged = self.fetched_history.clone();
        let cutoff = merged.last().map(|point| point.timestamp);

        merged.extend(
            live.filter(|point| cutoff.is_none_or(|cutoff| point.timestamp > cutoff))
                .copied(),
        );
        merged
    }

    /// Re-run the geometry pipeline for the focused entity and cache the result
    pub fn rebuild_route(
        &mut self,
        entity: &TrackedEntityState,
        config: &GeometryConfig,
    ) -> &[RenderableRouteSegment] {
        let mut history = self.merged_history(entity.recent_positions());
        // The live position itself is drawn as the nose, not as history
        if history
            .last()
            .is_some_and(|point| point.timestamp == entity.latest_position.timestamp)
        {
            history.pop();
        }

        let segments = build_renderable_route(
            &history,
            &entity.latest_position,
            self.filed_route.as_deref(),
            config,
        );
        self.cached_route.insert(segments)
    }
}

/// Route a completion to the focus it belongs to, if any.
///
/// A result for an entity that is not focused right now is parked on its
/// request when that request is still current, otherwise it is dropped.
/// Returns true when the completion was applied to `focus`.
pub fn apply_completion(
    registry: &mut FetchRegistry,
    focus: Option<&mut FocusContext>,
    ticket: &FetchTicket,
    completion: FetchCompletion,
) -> bool {
    let kind = completion.kind();

    match focus {
        Some(focus) if focus.accepts(ticket) => {
            registry.finish(ticket, kind, None);
            focus.apply(completion);
            true
        }
        _ => {
            if registry.finish(ticket, kind, Some(completion)) {
                debug!(
                    "Parking fetch result for {} (request {}) until it is focused again",
                    ticket.entity_id, ticket.request_id
                );
            } else {
                counter!("focus.fetches_dropped_total").increment(1);
                debug!(
                    "Dropping fetch result for {} (request {}): request is gone",
                    ticket.entity_id, ticket.request_id
                );
            }
            false
        }
    }
}
