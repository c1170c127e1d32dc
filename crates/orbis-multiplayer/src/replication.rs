//! Registry replication: the authoritative simulation's orbit and trajectory
//! records, diffed per client and applied to replica simulations.
//!
//! The server serializes every spacecraft's [`SpacecraftState`] each
//! replication tick and compares the bytes against per-client shadow state,
//! emitting only new or changed states plus removals. Each update names the
//! spacecraft sharing the record, so the client rebuilds the same shared
//! entries (convoys, docked groups) without relying on entry order.

use std::collections::{BTreeMap, HashMap};

use orbis_orbital::{OrbitalSimulation, SpacecraftId, SpacecraftState};
use serde::{Deserialize, Serialize};

use crate::compression::{CompressionConfig, frame, unframe};
use crate::error::ReplicationError;

// ---------------------------------------------------------------------------
// Wire messages
// ---------------------------------------------------------------------------

/// New or changed record of one spacecraft.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// The spacecraft.
    pub spacecraft: SpacecraftId,
    /// Postcard-encoded [`SpacecraftState`].
    pub state: Vec<u8>,
    /// Other spacecraft holding the same record on the server, sorted.
    pub shared_with: Vec<SpacecraftId>,
}

impl StateUpdate {
    /// Decodes the carried state.
    pub fn decode_state(&self) -> Result<SpacecraftState, ReplicationError> {
        postcard::from_bytes(&self.state).map_err(ReplicationError::Decode)
    }
}

/// Output of one replication tick for one client.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ReplicationMessages {
    /// Server tick the batch was produced on.
    pub tick: u64,
    /// Server simulation time (minutes) at that tick.
    pub current_time: f64,
    /// States the client does not have yet, or has stale.
    pub updates: Vec<StateUpdate>,
    /// Spacecraft that no longer have any record.
    pub removals: Vec<SpacecraftId>,
}

impl ReplicationMessages {
    /// Whether the batch carries no registry change.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.removals.is_empty()
    }

    /// Serializes and frames the batch.
    pub fn encode(&self, config: &CompressionConfig) -> Result<Vec<u8>, ReplicationError> {
        let body = postcard::to_allocvec(self).map_err(ReplicationError::Encode)?;
        Ok(frame(&body, config))
    }

    /// Unframes and deserializes a batch.
    pub fn decode(bytes: &[u8]) -> Result<Self, ReplicationError> {
        let body = unframe(bytes)?;
        postcard::from_bytes(&body).map_err(ReplicationError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Per-client shadow state
// ---------------------------------------------------------------------------

/// Last record sent for one spacecraft.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ShadowRecord {
    pub(crate) state: Vec<u8>,
    pub(crate) shared_with: Vec<SpacecraftId>,
}

/// What one client was last sent, per spacecraft.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClientShadow {
    pub(crate) spacecraft: HashMap<SpacecraftId, ShadowRecord>,
}

// ---------------------------------------------------------------------------
// ReplicationServer
// ---------------------------------------------------------------------------

/// Server side. Diffs the authoritative registries against per-client shadow
/// state and produces minimal batches.
pub struct ReplicationServer {
    shadows: HashMap<u64, ClientShadow>,
}

impl ReplicationServer {
    /// Creates a server with no clients.
    pub fn new() -> Self {
        Self {
            shadows: HashMap::new(),
        }
    }

    /// Starts tracking a client. Its first batch is a full snapshot.
    pub fn add_client(&mut self, client_id: u64) {
        self.shadows.entry(client_id).or_default();
        tracing::info!(client_id, "Replication client added");
    }

    /// Stops tracking a client.
    pub fn remove_client(&mut self, client_id: u64) {
        if self.shadows.remove(&client_id).is_some() {
            tracing::info!(client_id, "Replication client removed");
        }
    }

    /// Number of tracked clients.
    pub fn client_count(&self) -> usize {
        self.shadows.len()
    }

    /// Runs one replication tick against `simulation`.
    pub fn replicate(
        &mut self,
        simulation: &OrbitalSimulation,
    ) -> Result<HashMap<u64, ReplicationMessages>, ReplicationError> {
        if !simulation.is_authoritative() {
            return Err(ReplicationError::NotAuthority);
        }

        // Sorted so every client sees updates in the same order.
        let mut current: BTreeMap<SpacecraftId, ShadowRecord> = BTreeMap::new();
        for entry in simulation.orbits().entries() {
            let state = postcard::to_allocvec(&SpacecraftState::Parked(entry.record))
                .map_err(ReplicationError::Encode)?;
            collect_entry(&mut current, &entry.identifiers, state);
        }
        for entry in simulation.trajectories().entries() {
            let state = postcard::to_allocvec(&SpacecraftState::InTransfer(entry.record))
                .map_err(ReplicationError::Encode)?;
            collect_entry(&mut current, &entry.identifiers, state);
        }

        let mut result = HashMap::with_capacity(self.shadows.len());
        for (client_id, shadow) in &mut self.shadows {
            let mut msgs = ReplicationMessages {
                tick: simulation.tick_count(),
                current_time: simulation.current_time(),
                ..Default::default()
            };

            let mut removed: Vec<SpacecraftId> = shadow
                .spacecraft
                .keys()
                .filter(|identifier| !current.contains_key(identifier))
                .copied()
                .collect();
            removed.sort();
            for identifier in &removed {
                shadow.spacecraft.remove(identifier);
            }
            msgs.removals = removed;

            for (identifier, record) in &current {
                if shadow.spacecraft.get(identifier) != Some(record) {
                    msgs.updates.push(StateUpdate {
                        spacecraft: *identifier,
                        state: record.state.clone(),
                        shared_with: record.shared_with.clone(),
                    });
                    shadow.spacecraft.insert(*identifier, record.clone());
                }
            }

            if !msgs.is_empty() {
                tracing::trace!(
                    client_id,
                    updates = msgs.updates.len(),
                    removals = msgs.removals.len(),
                    "Replication batch"
                );
            }
            result.insert(*client_id, msgs);
        }

        Ok(result)
    }
}

/// Adds one shadow record per member of a registry entry.
fn collect_entry(
    current: &mut BTreeMap<SpacecraftId, ShadowRecord>,
    members: &[SpacecraftId],
    state: Vec<u8>,
) {
    for identifier in members {
        let mut shared_with: Vec<SpacecraftId> = members
            .iter()
            .copied()
            .filter(|member| member != identifier)
            .collect();
        shared_with.sort();
        current.insert(
            *identifier,
            ShadowRecord {
                state: state.clone(),
                shared_with,
            },
        );
    }
}

impl Default for ReplicationServer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ReplicationClient
// ---------------------------------------------------------------------------

/// Client side. Applies batches to a replica simulation.
pub struct ReplicationClient {
    last_tick: Option<u64>,
    server_time: f64,
}

impl ReplicationClient {
    /// Creates a client that has applied nothing yet.
    pub fn new() -> Self {
        Self {
            last_tick: None,
            server_time: 0.0,
        }
    }

    /// Tick of the last applied batch.
    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Server simulation time carried by the last applied batch.
    pub fn server_time(&self) -> f64 {
        self.server_time
    }

    /// Applies `msgs` to `simulation`. Batches older than the last applied
    /// one are skipped and `Ok(false)` is returned; replaying a batch is
    /// harmless.
    pub fn apply(
        &mut self,
        simulation: &mut OrbitalSimulation,
        msgs: &ReplicationMessages,
    ) -> Result<bool, ReplicationError> {
        if let Some(last) = self.last_tick
            && msgs.tick < last
        {
            tracing::debug!(tick = msgs.tick, last, "Skipping stale replication batch");
            return Ok(false);
        }

        // Decode everything first so a corrupt batch leaves the replica untouched.
        let mut decoded = Vec::with_capacity(msgs.updates.len());
        for update in &msgs.updates {
            decoded.push((update, update.decode_state()?));
        }

        for (update, state) in decoded {
            simulation.apply_replicated_state(update.spacecraft, Some(state), &update.shared_with)?;
        }
        for identifier in &msgs.removals {
            simulation.apply_replicated_state(*identifier, None, &[])?;
        }

        self.last_tick = Some(msgs.tick);
        self.server_time = self.server_time.max(msgs.current_time);
        Ok(true)
    }
}

impl Default for ReplicationClient {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "replication_tests.rs"]
mod tests;
