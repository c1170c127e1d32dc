//! Orbital simulation core: circular orbits around planets, phasing plus
//! Hohmann transfer trajectories, and the shared spacecraft registries an
//! authoritative server replicates to its clients.

pub mod catalog;
pub mod clock;
pub mod error;
pub mod geometry;
pub mod orbit;
pub mod propulsion;
pub mod registry;
pub mod simulation;
pub mod trajectory;

pub use catalog::{Area, AreaCatalog, AreaDescription, AreaId, CatalogDescription, PlanetDescription};
pub use clock::{
    FAST_FORWARD_STEP_MINUTES, GameClock, MAX_CATCH_UP_SECS, SERVER_TICK_RATE, ServerTickSchedule,
    TICK_DURATION_SECS, TimeDilation,
};
pub use error::{CatalogError, InfeasibleTrajectory, OrbitalError, SpacecraftValidationError};
pub use geometry::{
    HohmannTransfer, Planet, PlanetId, area_phase, circular_orbit_period, normalize_phase,
    phase_difference,
};
pub use orbit::{Orbit, OrbitGeometry, OrbitalLocation};
pub use propulsion::{
    Compartment, Fleet, Part, PartKind, PropulsionMetrics, PropulsionProvider, Spacecraft,
};
pub use registry::{RegistryEntry, SpacecraftId, SpacecraftRegistry};
pub use simulation::{OrbitalSimulation, Role, SimulationSettings, SpacecraftState};
pub use trajectory::{
    ARRIVAL_PHASE_TOLERANCE_DEG, PhasingLeg, TransferLeg, Trajectory, TrajectoryParameters,
};
