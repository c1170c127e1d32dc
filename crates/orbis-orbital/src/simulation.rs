//! The orbital simulation engine.
//!
//! One instance runs with [`Role::Authority`] and owns the canonical orbit and
//! trajectory registries. Every other instance is a [`Role::Replica`] that
//! receives registry contents through replication and re-evaluates the same
//! closed-form time → location functions locally. Only parameters travel,
//! never integrated state, so all instances agree given the same clock.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Area, AreaCatalog, AreaId};
use crate::error::{InfeasibleTrajectory, OrbitalError};
use crate::geometry::{SECONDS_PER_MINUTE, area_phase};
use crate::orbit::{Orbit, OrbitGeometry, OrbitalLocation};
use crate::propulsion::PropulsionProvider;
use crate::registry::{SpacecraftId, SpacecraftRegistry};
use crate::trajectory::{Trajectory, TrajectoryParameters};

// ---------------------------------------------------------------------------
// Role & settings
// ---------------------------------------------------------------------------

/// Whether this instance may write the registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The single writer (server).
    Authority,
    /// A read-only replicated copy (client).
    Replica,
}

/// Tunables of the simulation engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// How long (seconds) a finished trajectory lingers before it is
    /// force-completed into its final orbit.
    pub orbit_gc_delay_secs: f64,
}

impl SimulationSettings {
    /// Garbage-collection delay in simulation minutes.
    pub fn orbit_gc_delay_minutes(&self) -> f64 {
        self.orbit_gc_delay_secs / SECONDS_PER_MINUTE
    }

    /// Returns settings safe to run with. A negative delay becomes zero and a
    /// non-finite one falls back to the default, since either would expire
    /// trajectories before they arrive.
    pub fn sanitized(self) -> Self {
        let delay = self.orbit_gc_delay_secs;
        let orbit_gc_delay_secs = if !delay.is_finite() {
            Self::default().orbit_gc_delay_secs
        } else {
            delay.max(0.0)
        };
        if orbit_gc_delay_secs != delay {
            tracing::warn!(
                requested = delay,
                used = orbit_gc_delay_secs,
                "Invalid orbit garbage-collection delay"
            );
        }
        Self {
            orbit_gc_delay_secs,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            orbit_gc_delay_secs: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SpacecraftState
// ---------------------------------------------------------------------------

/// The registry record a spacecraft currently has.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpacecraftState {
    /// Parked on a circular orbit.
    Parked(Orbit),
    /// Flying a transfer.
    InTransfer(Trajectory),
}

impl SpacecraftState {
    /// Location at simulation time `time`.
    pub fn location_at(&self, time: f64) -> OrbitalLocation {
        match self {
            Self::Parked(orbit) => orbit.location_at(time),
            Self::InTransfer(trajectory) => trajectory.location_at(time),
        }
    }
}

// ---------------------------------------------------------------------------
// OrbitalSimulation
// ---------------------------------------------------------------------------

/// Tracks every area and spacecraft against a single simulation clock.
pub struct OrbitalSimulation {
    role: Role,
    catalog: Arc<AreaCatalog>,
    propulsion: Arc<dyn PropulsionProvider>,
    settings: SimulationSettings,

    current_time: f64,
    tick: u64,

    orbits: SpacecraftRegistry<Orbit>,
    trajectories: SpacecraftRegistry<Trajectory>,

    area_locations: HashMap<AreaId, OrbitalLocation>,
    spacecraft_locations: HashMap<SpacecraftId, OrbitalLocation>,
}

impl OrbitalSimulation {
    /// Creates an engine at simulation time zero.
    pub fn new(
        catalog: Arc<AreaCatalog>,
        propulsion: Arc<dyn PropulsionProvider>,
        role: Role,
        settings: SimulationSettings,
    ) -> Self {
        let mut simulation = Self {
            role,
            catalog,
            propulsion,
            settings: settings.sanitized(),
            current_time: 0.0,
            tick: 0,
            orbits: SpacecraftRegistry::new(),
            trajectories: SpacecraftRegistry::new(),
            area_locations: HashMap::new(),
            spacecraft_locations: HashMap::new(),
        };
        simulation.process_areas();
        tracing::info!(
            ?role,
            areas = simulation.catalog.areas().len(),
            "Orbital simulation created"
        );
        simulation
    }

    // -- Accessors ----------------------------------------------------------

    /// This instance's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this instance may mutate the registries.
    pub fn is_authoritative(&self) -> bool {
        self.role == Role::Authority
    }

    /// Engine settings.
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// The area catalog.
    pub fn catalog(&self) -> &AreaCatalog {
        &self.catalog
    }

    /// Simulation time of the last tick, in minutes.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Number of ticks processed.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    // -- Tick ---------------------------------------------------------------

    /// Advances the simulation to `current_time` (minutes).
    ///
    /// Arbitrarily large steps are fine: every location is a closed-form
    /// function of time. Time never moves backwards; an earlier time is
    /// ignored with a warning.
    pub fn tick(&mut self, current_time: f64) {
        if current_time.is_finite() && current_time >= self.current_time {
            self.current_time = current_time;
        } else {
            tracing::warn!(
                requested = current_time,
                current = self.current_time,
                "Ignoring non-monotonic simulation time"
            );
        }

        self.process_areas();
        self.process_spacecraft_locations();
        if self.is_authoritative() {
            self.process_orbit_cleanup();
        }

        self.tick += 1;
    }

    /// Recomputes every area's location.
    fn process_areas(&mut self) {
        let time = self.current_time;
        self.area_locations.clear();
        for area in self.catalog.areas() {
            self.area_locations.insert(
                area.id,
                OrbitalLocation {
                    planet: area.planet,
                    altitude: area.altitude,
                    phase: area_phase(area, time),
                },
            );
        }
    }

    /// Recomputes every spacecraft's location from its orbit or trajectory.
    fn process_spacecraft_locations(&mut self) {
        let time = self.current_time;
        self.spacecraft_locations.clear();
        for (identifier, orbit) in self.orbits.iter() {
            self.spacecraft_locations
                .insert(identifier, orbit.location_at(time));
        }
        for (identifier, trajectory) in self.trajectories.iter() {
            self.spacecraft_locations
                .insert(identifier, trajectory.location_at(time));
        }
    }

    /// Force-completes trajectories that ended more than the grace delay ago.
    fn process_orbit_cleanup(&mut self) {
        let now = self.current_time;
        let grace = self.settings.orbit_gc_delay_minutes();

        let expired: Vec<(Vec<SpacecraftId>, Orbit)> = self
            .trajectories
            .entries()
            .iter()
            .filter(|entry| entry.record.is_expired(now, grace))
            .map(|entry| {
                (
                    entry.identifiers.clone(),
                    entry.record.final_orbit().rebased(now),
                )
            })
            .collect();

        for (identifiers, orbit) in expired {
            tracing::info!(
                spacecraft = ?identifiers,
                altitude = orbit.geometry.altitude,
                "Force-completing stale trajectory"
            );
            self.trajectories.remove_all(&identifiers);
            for identifier in &identifiers {
                self.spacecraft_locations
                    .insert(*identifier, orbit.location_at(now));
            }
            self.orbits.insert(identifiers, orbit);
        }
    }

    // -- Trajectory planning ------------------------------------------------

    /// Snapshots the source and destination areas as they will be
    /// `delta_time` minutes from now.
    pub fn prepare_trajectory_parameters(
        &self,
        source: AreaId,
        destination: AreaId,
        delta_time: f64,
    ) -> Result<TrajectoryParameters, OrbitalError> {
        let source_area = self
            .catalog
            .area(source)
            .ok_or(OrbitalError::UnknownArea(source))?;
        let destination_area = self
            .catalog
            .area(destination)
            .ok_or(OrbitalError::UnknownArea(destination))?;

        if source_area.planet.id != destination_area.planet.id {
            return Err(OrbitalError::PlanetMismatch {
                source_planet: source_area.planet.id,
                destination_planet: destination_area.planet.id,
            });
        }

        let start_time = self.current_time + delta_time.max(0.0);
        Ok(TrajectoryParameters {
            start_time,
            source_altitude: source_area.altitude,
            source_phase: area_phase(source_area, start_time),
            destination_altitude: destination_area.altitude,
            destination_phase: area_phase(destination_area, start_time),
            planet: source_area.planet,
        })
    }

    /// Computes a trajectory phasing at `phasing_altitude` kilometers.
    pub fn compute_trajectory(
        &self,
        parameters: &TrajectoryParameters,
        phasing_altitude: f64,
    ) -> Result<Trajectory, OrbitalError> {
        Trajectory::compute(parameters, phasing_altitude)
    }

    /// Checks a trajectory against the Δv budget of every listed spacecraft.
    pub fn check_trajectory(
        &self,
        trajectory: &Trajectory,
        spacecraft: &[SpacecraftId],
    ) -> Result<(), InfeasibleTrajectory> {
        let required = trajectory.total_delta_v();
        let duration = trajectory.total_duration();
        if !duration.is_finite() || duration <= 0.0 || !required.is_finite() {
            return Err(InfeasibleTrajectory::NonFiniteDuration);
        }
        if spacecraft.is_empty() {
            return Err(InfeasibleTrajectory::NoSpacecraft);
        }

        for identifier in spacecraft {
            let available = self
                .propulsion
                .maximum_delta_v(*identifier)
                .ok_or(InfeasibleTrajectory::UnknownSpacecraft(*identifier))?;
            if available < required {
                return Err(InfeasibleTrajectory::InsufficientDeltaV {
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Whether `spacecraft` can fly `trajectory`. Never fails: infeasibility
    /// is a normal planning outcome.
    pub fn can_commit_trajectory(&self, trajectory: &Trajectory, spacecraft: &[SpacecraftId]) -> bool {
        match self.check_trajectory(trajectory, spacecraft) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(%reason, "Trajectory cannot be committed");
                false
            }
        }
    }

    // -- Registry commands (authority only) ---------------------------------

    /// Puts `spacecraft` on `trajectory`, as one shared record.
    pub fn commit_trajectory(
        &mut self,
        trajectory: Trajectory,
        spacecraft: &[SpacecraftId],
    ) -> Result<(), OrbitalError> {
        self.require_authority("commit_trajectory")?;

        self.orbits.remove_all(spacecraft);
        self.trajectories.insert(spacecraft.to_vec(), trajectory);
        for identifier in spacecraft {
            self.spacecraft_locations
                .insert(*identifier, trajectory.location_at(self.current_time));
        }

        tracing::info!(
            spacecraft = ?spacecraft,
            start = trajectory.start_time,
            arrival = trajectory.arrival_time(),
            delta_v = trajectory.total_delta_v(),
            "Trajectory committed"
        );
        Ok(())
    }

    /// Converts the trajectories of `spacecraft` into their destination
    /// orbits, with the completion time as epoch. Spacecraft without a
    /// trajectory are skipped, so repeated calls are harmless. So are
    /// spacecraft that have not arrived yet; they stay in transfer.
    pub fn complete_trajectory(&mut self, spacecraft: &[SpacecraftId]) -> Result<(), OrbitalError> {
        self.require_authority("complete_trajectory")?;
        let now = self.current_time;

        // Spacecraft that shared a trajectory keep sharing the resulting orbit.
        let mut groups: Vec<(Orbit, Vec<SpacecraftId>)> = Vec::new();
        for identifier in spacecraft {
            let Some(trajectory) = self.trajectories.get(*identifier) else {
                tracing::debug!(id = identifier.0, "No trajectory to complete");
                continue;
            };
            if trajectory.arrival_time() > now {
                tracing::debug!(
                    id = identifier.0,
                    arrival = trajectory.arrival_time(),
                    now,
                    "Trajectory still under way"
                );
                continue;
            }
            let orbit = trajectory.final_orbit().rebased(now);
            match groups.iter_mut().find(|(existing, _)| *existing == orbit) {
                Some((_, members)) => members.push(*identifier),
                None => groups.push((orbit, vec![*identifier])),
            }
        }

        for (orbit, members) in groups {
            tracing::info!(spacecraft = ?members, "Trajectory completed");
            self.trajectories.remove_all(&members);
            for identifier in &members {
                self.spacecraft_locations
                    .insert(*identifier, orbit.location_at(now));
            }
            self.orbits.insert(members, orbit);
        }
        Ok(())
    }

    /// Parks each spacecraft on its own copy of `orbit`, dropping any
    /// trajectory.
    pub fn set_orbit(&mut self, spacecraft: &[SpacecraftId], orbit: Orbit) -> Result<(), OrbitalError> {
        self.require_authority("set_orbit")?;
        let orbit = self.clamp_epoch(orbit);

        for identifier in spacecraft {
            self.trajectories.remove(*identifier);
            self.orbits.insert(vec![*identifier], orbit);
            self.spacecraft_locations
                .insert(*identifier, orbit.location_at(self.current_time));
        }
        tracing::debug!(spacecraft = ?spacecraft, "Orbit set");
        Ok(())
    }

    /// Parks all `spacecraft` on one shared `orbit` record (docked groups).
    pub fn merge_orbit(&mut self, spacecraft: &[SpacecraftId], orbit: Orbit) -> Result<(), OrbitalError> {
        self.require_authority("merge_orbit")?;
        let orbit = self.clamp_epoch(orbit);

        self.trajectories.remove_all(spacecraft);
        self.orbits.insert(spacecraft.to_vec(), orbit);
        for identifier in spacecraft {
            self.spacecraft_locations
                .insert(*identifier, orbit.location_at(self.current_time));
        }
        tracing::debug!(spacecraft = ?spacecraft, "Orbit merged");
        Ok(())
    }

    /// Applies one replicated registry record on a replica. `shared_with`
    /// lists the other spacecraft holding the same record on the authority.
    /// `None` removes the spacecraft from both registries.
    pub fn apply_replicated_state(
        &mut self,
        identifier: SpacecraftId,
        state: Option<SpacecraftState>,
        shared_with: &[SpacecraftId],
    ) -> Result<(), OrbitalError> {
        if self.is_authoritative() {
            tracing::error!(id = identifier.0, "Replicated state offered to the authority");
            return Err(OrbitalError::NotReplica);
        }

        match state {
            Some(SpacecraftState::Parked(orbit)) => {
                self.trajectories.remove(identifier);
                self.orbits.upsert_grouped(identifier, shared_with, orbit);
                self.spacecraft_locations
                    .insert(identifier, orbit.location_at(self.current_time));
            }
            Some(SpacecraftState::InTransfer(trajectory)) => {
                self.orbits.remove(identifier);
                self.trajectories.upsert_grouped(identifier, shared_with, trajectory);
                self.spacecraft_locations
                    .insert(identifier, trajectory.location_at(self.current_time));
            }
            None => {
                self.orbits.remove(identifier);
                self.trajectories.remove(identifier);
                self.spacecraft_locations.remove(&identifier);
            }
        }
        Ok(())
    }

    fn require_authority(&self, operation: &'static str) -> Result<(), OrbitalError> {
        if self.is_authoritative() {
            Ok(())
        } else {
            tracing::error!(operation, "Registry mutation attempted without authority");
            Err(OrbitalError::NotAuthoritative { operation })
        }
    }

    /// Orbits may not start in the future.
    fn clamp_epoch(&self, orbit: Orbit) -> Orbit {
        if orbit.epoch > self.current_time {
            orbit.rebased(self.current_time)
        } else {
            orbit
        }
    }

    // -- Queries ------------------------------------------------------------

    /// Orbit of an area, with epoch zero.
    pub fn area_orbit(&self, area: &Area) -> Orbit {
        Orbit::new(OrbitGeometry::new(area.planet, area.altitude, area.phase), 0.0)
    }

    /// Location of one area at the last tick.
    pub fn area_location(&self, area: AreaId) -> Option<&OrbitalLocation> {
        self.area_locations.get(&area)
    }

    /// Locations of every area at the last tick.
    pub fn area_locations(&self) -> &HashMap<AreaId, OrbitalLocation> {
        &self.area_locations
    }

    /// The area closest to `location`, with the distance in kilometers.
    pub fn closest_area_and_distance(&self, location: &OrbitalLocation) -> Option<(&Area, f64)> {
        self.catalog
            .areas()
            .iter()
            .filter_map(|area| {
                self.area_locations
                    .get(&area.id)
                    .map(|area_location| (area, area_location.distance_to(location)))
            })
            .filter(|(_, distance)| distance.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Orbit record of a spacecraft, if it is parked (or known yet).
    pub fn spacecraft_orbit(&self, identifier: SpacecraftId) -> Option<&Orbit> {
        self.orbits.get(identifier)
    }

    /// Trajectory record of a spacecraft, if it is in transfer.
    pub fn spacecraft_trajectory(&self, identifier: SpacecraftId) -> Option<&Trajectory> {
        self.trajectories.get(identifier)
    }

    /// Current record of a spacecraft, whichever registry holds it.
    pub fn spacecraft_state(&self, identifier: SpacecraftId) -> Option<SpacecraftState> {
        self.orbits
            .get(identifier)
            .map(|orbit| SpacecraftState::Parked(*orbit))
            .or_else(|| {
                self.trajectories
                    .get(identifier)
                    .map(|trajectory| SpacecraftState::InTransfer(*trajectory))
            })
    }

    /// Other spacecraft sharing this spacecraft's registry record.
    pub fn shared_with(&self, identifier: SpacecraftId) -> Vec<SpacecraftId> {
        let members = self
            .orbits
            .entry(identifier)
            .map(|entry| &entry.identifiers)
            .or_else(|| self.trajectories.entry(identifier).map(|entry| &entry.identifiers));
        let mut others: Vec<SpacecraftId> = members
            .into_iter()
            .flatten()
            .copied()
            .filter(|member| *member != identifier)
            .collect();
        others.sort();
        others
    }

    /// Location of a spacecraft at the last tick. `None` means no data yet.
    pub fn spacecraft_location(&self, identifier: SpacecraftId) -> Option<&OrbitalLocation> {
        self.spacecraft_locations.get(&identifier)
    }

    /// Locations of every spacecraft at the last tick.
    pub fn spacecraft_locations(&self) -> &HashMap<SpacecraftId, OrbitalLocation> {
        &self.spacecraft_locations
    }

    /// Orbit registry.
    pub fn orbits(&self) -> &SpacecraftRegistry<Orbit> {
        &self.orbits
    }

    /// Trajectory registry.
    pub fn trajectories(&self) -> &SpacecraftRegistry<Trajectory> {
        &self.trajectories
    }

    /// Earliest pending arrival at or after the current time. Fast-forward
    /// jumps here.
    pub fn next_event_time(&self) -> Option<f64> {
        self.trajectories
            .entries()
            .iter()
            .map(|entry| entry.record.arrival_time())
            .filter(|arrival| *arrival >= self.current_time)
            .min_by(f64::total_cmp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
