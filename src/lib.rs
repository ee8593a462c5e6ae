//! Trackline - live flight kinematics and path rendering
//!
//! Ingests batched aircraft telemetry, estimates a display attitude for the
//! focused aircraft and turns position history plus an optional filed route
//! into drawable great-circle path segments.

pub mod config;
pub mod flight_plan;
pub mod focus;
pub mod geo;
pub mod geometry;
pub mod kinematics;
pub mod live_tracker;
pub mod log_format;
pub mod metrics;
pub mod replay;
pub mod session;
pub mod telemetry;

pub use config::EngineConfig;
pub use flight_plan::{FiledRoute, FiledRouteNode, FlightPlanWaypoint, flatten_filed_route};
pub use focus::{FetchCompletion, FetchTicket};
pub use geometry::{Coordinate, RenderableRouteSegment, build_renderable_route};
pub use kinematics::{AttitudeEstimate, KinematicEstimator, KinematicSample, SignalState};
pub use live_tracker::{EntityEvent, LiveTracker, TrackedEntityState};
pub use session::{GaugeFrame, LiveSession, RouteUpdate};
pub use telemetry::{FlightPhase, MalformedBatch, RoutePoint, TelemetryBatch, TelemetrySnapshot};
