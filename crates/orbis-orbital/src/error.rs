//! Error types for the orbital simulation core.

use crate::catalog::AreaId;
use crate::geometry::PlanetId;
use crate::registry::SpacecraftId;

/// Errors raised by simulation commands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrbitalError {
    /// A mutating command ran on an instance without write authority.
    #[error("{operation} requires authority over the orbital registries")]
    NotAuthoritative {
        /// The rejected command.
        operation: &'static str,
    },

    /// A replication update was offered to the authoritative instance.
    #[error("replicated state cannot be applied on the authoritative instance")]
    NotReplica,

    /// Source and destination orbit different planets.
    #[error("areas orbit different planets ({source_planet:?} and {destination_planet:?})")]
    PlanetMismatch {
        /// Planet of the source area.
        source_planet: PlanetId,
        /// Planet of the destination area.
        destination_planet: PlanetId,
    },

    /// The area is not part of the catalog.
    #[error("unknown area {0:?}")]
    UnknownArea(AreaId),

    /// Altitude below the surface or not finite.
    #[error("invalid altitude {0} km")]
    InvalidAltitude(f64),

    /// The requested trajectory cannot be flown.
    #[error("infeasible trajectory: {0}")]
    Infeasible(#[from] InfeasibleTrajectory),
}

/// Reasons a trajectory is rejected. These are normal planning outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InfeasibleTrajectory {
    /// The phasing orbit moves at the destination's angular rate, so the
    /// departure window never comes.
    #[error("phasing orbit has no motion relative to the destination")]
    NoRelativeMotion,

    /// Not enough Δv on board.
    #[error("requires {required:.1} m/s of delta-v, only {available:.1} m/s available")]
    InsufficientDeltaV {
        /// Δv needed by the trajectory.
        required: f64,
        /// Δv the spacecraft can deliver.
        available: f64,
    },

    /// Duration or Δv came out NaN, infinite or non-positive.
    #[error("trajectory duration or delta-v is not finite and positive")]
    NonFiniteDuration,

    /// No propulsion data for this spacecraft.
    #[error("no propulsion data for spacecraft {0:?}")]
    UnknownSpacecraft(SpacecraftId),

    /// No spacecraft were named.
    #[error("no spacecraft given")]
    NoSpacecraft,
}

/// Errors that can occur when loading the area catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Failed to read the catalog file.
    #[error("failed to read catalog: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse catalog: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// An area references a planet that does not exist.
    #[error("area {area} references unknown planet {planet}")]
    UnknownPlanet {
        /// Area name.
        area: String,
        /// Missing planet name.
        planet: String,
    },

    /// Two planets or two areas share a name.
    #[error("duplicate catalog entry {0}")]
    Duplicate(String),

    /// A numeric field is out of range.
    #[error("invalid catalog entry {name}: {reason}")]
    InvalidValue {
        /// Entry name.
        name: String,
        /// What is wrong.
        reason: &'static str,
    },
}

/// Reasons a spacecraft assembly cannot fly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpacecraftValidationError {
    /// No engine equipment.
    #[error("this spacecraft has no engine")]
    NoEngine,

    /// No propellant tank module.
    #[error("this spacecraft has no propellant tank")]
    NoPropellantTank,

    /// Maximum Δv below the flight minimum.
    #[error("this spacecraft does not have enough delta-v ({0:.1} m/s)")]
    InsufficientDeltaV(f64),
}
