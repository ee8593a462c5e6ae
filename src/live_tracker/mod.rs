mod entity_state;
mod phase;

pub use entity_state::TrackedEntityState;
pub use phase::derive_phase;

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

use crate::config::IngestConfig;
use crate::geo::is_valid_coordinate;
use crate::telemetry::{MalformedBatch, TelemetryBatch};

/// Entity lifecycle notification for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityEvent {
    #[serde(rename_all = "camelCase")]
    Added { entity_id: String },
    #[serde(rename_all = "camelCase")]
    Updated { entity_id: String },
    #[serde(rename_all = "camelCase")]
    Removed { entity_id: String },
}

impl EntityEvent {
    pub fn entity_id(&self) -> &str {
        match self {
            EntityEvent::Added { entity_id }
            | EntityEvent::Updated { entity_id }
            | EntityEvent::Removed { entity_id } => entity_id,
        }
    }
}

/// What a single batch did to the live entity set
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub events: Vec<EntityEvent>,
    pub accepted: usize,
    pub stale: usize,
    pub discarded: usize,
}

impl BatchOutcome {
    /// True when the entity got a new position in this batch
    pub fn position_changed(&self, entity_id: &str) -> bool {
        self.events.iter().any(|event| {
            matches!(event, EntityEvent::Added { .. } | EntityEvent::Updated { .. })
                && event.entity_id() == entity_id
        })
    }

    pub fn was_removed(&self, entity_id: &str) -> bool {
        self.events.iter().any(|event| {
            matches!(event, EntityEvent::Removed { .. }) && event.entity_id() == entity_id
        })
    }
}

/// Live set of tracked entities with per-entity staleness control
#[derive(Debug, Clone, Default)]
pub struct LiveTracker {
    config: IngestConfig,
    entities: HashMap<String, TrackedEntityState>,
}

impl LiveTracker {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            entities: HashMap::new(),
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<&TrackedEntityState> {
        self.entities.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entities.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Sorted ids of all tracked entities
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Apply one telemetry batch.
    ///
    /// A batch missing its timestamp or snapshot list is rejected whole and leaves
    /// every entity untouched. Otherwise snapshots are applied in order, and any
    /// entity not seen in the batch is evicted afterwards.
    pub fn apply_batch(&mut self, batch: TelemetryBatch) -> Result<BatchOutcome, MalformedBatch> {
        let batch = match batch.validate() {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Rejected telemetry batch: {}", e);
                counter!("ingest.batches_rejected_total").increment(1);
                return Err(e);
            }
        };

        let mut outcome = BatchOutcome::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(batch.snapshots.len());

        for snapshot in &batch.snapshots {
            if !is_valid_coordinate(snapshot.lat, snapshot.lon) {
                trace!(
                    "Discarding snapshot for {} with invalid position ({}, {})",
                    snapshot.entity_id, snapshot.lat, snapshot.lon
                );
                outcome.discarded += 1;
                continue;
            }

            let effective_timestamp = snapshot.report_timestamp.unwrap_or(batch.as_of);
            let phase = derive_phase(
                snapshot.altitude_ft,
                snapshot.vertical_speed_fpm,
                snapshot.ground_speed_kt,
                &self.config,
            );
            seen.insert(snapshot.entity_id.clone());

            match self.entities.get_mut(&snapshot.entity_id) {
                None => {
                    debug!("New entity {} ({})", snapshot.entity_id, phase);
                    self.entities.insert(
                        snapshot.entity_id.clone(),
                        TrackedEntityState::new(
                            snapshot,
                            effective_timestamp,
                            phase,
                            self.config.live_history_capacity,
                        ),
                    );
                    outcome.accepted += 1;
                    counter!("ingest.entities_added_total").increment(1);
                    outcome.events.push(EntityEvent::Added {
                        entity_id: snapshot.entity_id.clone(),
                    });
                }
                Some(state) if state.is_newer(effective_timestamp) => {
                    state.accept(snapshot, effective_timestamp, phase);
                    outcome.accepted += 1;
                    // Several accepted snapshots for one entity still produce one update
                    if !outcome.position_changed(&snapshot.entity_id) {
                        outcome.events.push(EntityEvent::Updated {
                            entity_id: snapshot.entity_id.clone(),
                        });
                    }
                }
                Some(state) => {
                    trace!(
                        "Ignoring stale snapshot for {}: {} is not after {}",
                        snapshot.entity_id, effective_timestamp, state.last_accepted_timestamp
                    );
                    outcome.stale += 1;
                }
            }
        }

        let mut evicted: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        evicted.sort_unstable();

        for entity_id in evicted {
            self.entities.remove(&entity_id);
            debug!("Evicted entity {}", entity_id);
            counter!("ingest.entities_evicted_total").increment(1);
            outcome.events.push(EntityEvent::Removed { entity_id });
        }

        counter!("ingest.batches_accepted_total").increment(1);
        counter!("ingest.snapshots_accepted_total").increment(outcome.accepted as u64);
        counter!("ingest.snapshots_stale_total").increment(outcome.stale as u64);
        counter!("ingest.snapshots_discarded_total").increment(outcome.discarded as u64);
        gauge!("ingest.tracked_entities").set(self.entities.len() as f64);

        Ok(outcome)
    }
}
