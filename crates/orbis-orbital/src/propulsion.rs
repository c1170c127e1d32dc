//! Spacecraft assemblies and their propulsion metrics, plus the
//! [`PropulsionProvider`] seam the simulation uses for feasibility checks.
//!
//! Masses are in tonnes, thrust in kN, specific impulse in seconds.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::SpacecraftValidationError;
use crate::registry::SpacecraftId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Standard gravity in m/s², converts specific impulse to exhaust velocity.
pub const STANDARD_GRAVITY: f64 = 9.807;

/// Propellant bonus for a tank that continues into the next compartment's
/// skirt.
pub const SKIRT_PROPELLANT_MULTIPLIER: f64 = 1.1;

/// Minimum Δv (m/s) for a spacecraft to be flight-worthy.
pub const MINIMUM_FLIGHT_DELTA_V: f64 = 100.0;

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// What a part does. The set is closed; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartKind {
    /// Inert structure, only adds dry mass.
    Structure,
    /// Propellant storage.
    PropellantTank {
        /// Propellant capacity in tonnes.
        propellant_mass: f64,
    },
    /// Cargo storage.
    CargoHold {
        /// Cargo capacity in tonnes.
        cargo_mass: f64,
    },
    /// Rocket engine.
    Engine {
        /// Thrust in kN.
        thrust: f64,
        /// Specific impulse in seconds.
        specific_impulse: f64,
    },
}

/// A module or piece of equipment mounted in a compartment slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Asset name; identical names mean identical parts.
    pub name: String,
    /// Dry mass in tonnes.
    pub mass: f64,
    /// Function of the part.
    pub kind: PartKind,
}

/// A compartment: a hull section with slots. Empty slots are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compartment {
    /// Hull dry mass in tonnes.
    pub mass: f64,
    /// Slot contents, in slot order.
    pub slots: Vec<Option<Part>>,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Aggregated figures of one compartment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompartmentMetrics {
    /// Installed parts.
    pub part_count: usize,
    /// Dry mass in tonnes.
    pub dry_mass: f64,
    /// Propellant capacity in tonnes.
    pub propellant_mass_capacity: f64,
    /// Cargo capacity in tonnes.
    pub cargo_mass_capacity: f64,
    /// Thrust in kN.
    pub thrust: f64,
    /// Σ (Isp · thrust), for the thrust-weighted mean Isp.
    pub total_engine_isp_times_thrust: f64,
}

/// Whole-spacecraft propulsion figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropulsionMetrics {
    /// Dry mass in tonnes.
    pub dry_mass: f64,
    /// Propellant capacity in tonnes.
    pub propellant_mass_capacity: f64,
    /// Cargo capacity in tonnes.
    pub cargo_mass_capacity: f64,
    /// Fully loaded mass in tonnes.
    pub maximum_mass: f64,
    /// Total thrust in kN.
    pub thrust: f64,
    /// Thrust-weighted specific impulse in seconds.
    pub specific_impulse: f64,
    /// Exhaust velocity in m/s.
    pub exhaust_velocity: f64,
    /// Propellant flow in tonnes per second.
    pub propellant_rate: f64,
    /// Rocket-equation Δv at full load, in m/s.
    pub maximum_delta_v: f64,
    /// Burn time to empty the tanks, in seconds.
    pub maximum_burn_time: f64,
}

// ---------------------------------------------------------------------------
// Spacecraft
// ---------------------------------------------------------------------------

/// A spacecraft assembly: compartments stacked front to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spacecraft {
    /// Identifier.
    pub identifier: SpacecraftId,
    /// Compartments in stacking order.
    pub compartments: Vec<Compartment>,
}

impl Spacecraft {
    /// Whether the next compartment carries the same part in the same slot.
    pub fn is_same_part_in_next_compartment(&self, compartment: usize, slot: usize) -> bool {
        let current = self
            .compartments
            .get(compartment)
            .and_then(|c| c.slots.get(slot))
            .and_then(Option::as_ref);
        let next = self
            .compartments
            .get(compartment + 1)
            .and_then(|c| c.slots.get(slot))
            .and_then(Option::as_ref);
        matches!((current, next), (Some(a), Some(b)) if a.name == b.name)
    }

    /// Figures for one compartment.
    pub fn compartment_metrics(&self, index: usize) -> CompartmentMetrics {
        let Some(compartment) = self.compartments.get(index) else {
            return CompartmentMetrics::default();
        };

        let mut metrics = CompartmentMetrics {
            dry_mass: compartment.mass,
            ..CompartmentMetrics::default()
        };

        for (slot, part) in compartment.slots.iter().enumerate() {
            let Some(part) = part else { continue };
            metrics.part_count += 1;
            metrics.dry_mass += part.mass;

            match &part.kind {
                PartKind::Structure => {}
                PartKind::PropellantTank { propellant_mass } => {
                    let mut capacity = *propellant_mass;
                    if self.is_same_part_in_next_compartment(index, slot) {
                        capacity *= SKIRT_PROPELLANT_MULTIPLIER;
                    }
                    metrics.propellant_mass_capacity += capacity;
                }
                PartKind::CargoHold { cargo_mass } => {
                    metrics.cargo_mass_capacity += cargo_mass;
                }
                PartKind::Engine {
                    thrust,
                    specific_impulse,
                } => {
                    metrics.thrust += thrust;
                    metrics.total_engine_isp_times_thrust += specific_impulse * thrust;
                }
            }
        }

        metrics
    }

    /// Whole-spacecraft propulsion figures.
    pub fn propulsion_metrics(&self) -> PropulsionMetrics {
        let mut metrics = PropulsionMetrics::default();
        let mut total_isp_times_thrust = 0.0;

        for index in 0..self.compartments.len() {
            let compartment = self.compartment_metrics(index);
            metrics.dry_mass += compartment.dry_mass;
            metrics.propellant_mass_capacity += compartment.propellant_mass_capacity;
            metrics.cargo_mass_capacity += compartment.cargo_mass_capacity;
            metrics.thrust += compartment.thrust;
            total_isp_times_thrust += compartment.total_engine_isp_times_thrust;
        }

        metrics.maximum_mass =
            metrics.dry_mass + metrics.propellant_mass_capacity + metrics.cargo_mass_capacity;

        if metrics.thrust > 0.0 && metrics.dry_mass > 0.0 {
            metrics.specific_impulse = total_isp_times_thrust / metrics.thrust;
            metrics.exhaust_velocity = STANDARD_GRAVITY * metrics.specific_impulse;
            metrics.propellant_rate = metrics.thrust / metrics.exhaust_velocity;
            metrics.maximum_delta_v =
                metrics.exhaust_velocity * (metrics.maximum_mass / metrics.dry_mass).ln();
            metrics.maximum_burn_time = metrics.propellant_mass_capacity / metrics.propellant_rate;
        }

        metrics
    }

    /// Checks the assembly can fly at all.
    pub fn validate(&self) -> Result<(), SpacecraftValidationError> {
        let metrics = self.propulsion_metrics();
        if metrics.thrust <= 0.0 {
            Err(SpacecraftValidationError::NoEngine)
        } else if metrics.propellant_mass_capacity <= 0.0 {
            Err(SpacecraftValidationError::NoPropellantTank)
        } else if metrics.maximum_delta_v < MINIMUM_FLIGHT_DELTA_V {
            Err(SpacecraftValidationError::InsufficientDeltaV(
                metrics.maximum_delta_v,
            ))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// PropulsionProvider
// ---------------------------------------------------------------------------

/// Source of per-spacecraft Δv budgets, injected into the simulation.
pub trait PropulsionProvider: Send + Sync {
    /// Maximum Δv in m/s, or `None` when the spacecraft is unknown.
    fn maximum_delta_v(&self, identifier: SpacecraftId) -> Option<f64>;
}

/// Concurrent fleet of spacecraft assemblies with cached metrics.
///
/// Shared between the game layer (which edits assemblies) and the simulation
/// (which reads Δv budgets).
#[derive(Debug, Default)]
pub struct Fleet {
    spacecraft: DashMap<SpacecraftId, (Spacecraft, PropulsionMetrics)>,
}

impl Fleet {
    /// Creates an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a spacecraft and recomputes its metrics.
    pub fn upsert(&self, spacecraft: Spacecraft) -> PropulsionMetrics {
        let metrics = spacecraft.propulsion_metrics();
        tracing::debug!(
            id = spacecraft.identifier.0,
            dry_mass = metrics.dry_mass,
            thrust = metrics.thrust,
            delta_v = metrics.maximum_delta_v,
            "Spacecraft propulsion updated"
        );
        self.spacecraft
            .insert(spacecraft.identifier, (spacecraft, metrics));
        metrics
    }

    /// Removes a spacecraft.
    pub fn remove(&self, identifier: SpacecraftId) -> Option<Spacecraft> {
        self.spacecraft
            .remove(&identifier)
            .map(|(_, (spacecraft, _))| spacecraft)
    }

    /// Cached metrics for a spacecraft.
    pub fn metrics(&self, identifier: SpacecraftId) -> Option<PropulsionMetrics> {
        self.spacecraft.get(&identifier).map(|entry| entry.1)
    }

    /// Number of spacecraft.
    pub fn len(&self) -> usize {
        self.spacecraft.len()
    }

    /// Whether the fleet is empty.
    pub fn is_empty(&self) -> bool {
        self.spacecraft.is_empty()
    }
}

impl PropulsionProvider for Fleet {
    fn maximum_delta_v(&self, identifier: SpacecraftId) -> Option<f64> {
        self.metrics(identifier).map(|m| m.maximum_delta_v)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn tank(name: &str, propellant: f64) -> Option<Part> {
        Some(Part {
            name: name.to_string(),
            mass: 2.0,
            kind: PartKind::PropellantTank {
                propellant_mass: propellant,
            },
        })
    }

    pub(crate) fn engine(thrust: f64, isp: f64) -> Option<Part> {
        Some(Part {
            name: "Engine".to_string(),
            mass: 3.0,
            kind: PartKind::Engine {
                thrust,
                specific_impulse: isp,
            },
        })
    }

    /// A two-compartment tug: tank + tank, then tank + engine.
    pub(crate) fn tug(identifier: u64) -> Spacecraft {
        Spacecraft {
            identifier: SpacecraftId(identifier),
            compartments: vec![
                Compartment {
                    mass: 5.0,
                    slots: vec![tank("Tank", 20.0), None],
                },
                Compartment {
                    mass: 5.0,
                    slots: vec![tank("Tank", 20.0), engine(500.0, 350.0)],
                },
            ],
        }
    }

    #[test]
    fn test_skirt_tank_bonus() {
        let ship = tug(1);
        assert!(ship.is_same_part_in_next_compartment(0, 0));
        assert!(!ship.is_same_part_in_next_compartment(1, 0));
        assert!(!ship.is_same_part_in_next_compartment(0, 1));

        let front = ship.compartment_metrics(0);
        assert_relative_eq!(front.propellant_mass_capacity, 22.0);
        let back = ship.compartment_metrics(1);
        assert_relative_eq!(back.propellant_mass_capacity, 20.0);
        assert_eq!(back.part_count, 2);
    }

    #[test]
    fn test_propulsion_metrics_rocket_equation() {
        let metrics = tug(1).propulsion_metrics();
        // 5 + 2 + 5 + 2 + 3
        assert_relative_eq!(metrics.dry_mass, 17.0);
        assert_relative_eq!(metrics.propellant_mass_capacity, 42.0);
        assert_relative_eq!(metrics.maximum_mass, 59.0);
        assert_relative_eq!(metrics.specific_impulse, 350.0);
        assert_relative_eq!(metrics.exhaust_velocity, 350.0 * STANDARD_GRAVITY);
        assert_relative_eq!(
            metrics.maximum_delta_v,
            350.0 * STANDARD_GRAVITY * (59.0_f64 / 17.0).ln(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            metrics.maximum_burn_time,
            42.0 / (500.0 / (350.0 * STANDARD_GRAVITY)),
            max_relative = 1e-12
        );
        assert!(tug(1).validate().is_ok());
    }

    #[test]
    fn test_thrust_weighted_isp() {
        let ship = Spacecraft {
            identifier: SpacecraftId(2),
            compartments: vec![Compartment {
                mass: 1.0,
                slots: vec![tank("T", 10.0), engine(100.0, 300.0), engine(300.0, 400.0)],
            }],
        };
        assert_relative_eq!(ship.propulsion_metrics().specific_impulse, 375.0);
    }

    #[test]
    fn test_validation_failures() {
        let no_engine = Spacecraft {
            identifier: SpacecraftId(3),
            compartments: vec![Compartment {
                mass: 1.0,
                slots: vec![tank("T", 10.0)],
            }],
        };
        assert_eq!(no_engine.validate(), Err(SpacecraftValidationError::NoEngine));

        let no_tank = Spacecraft {
            identifier: SpacecraftId(4),
            compartments: vec![Compartment {
                mass: 1.0,
                slots: vec![engine(100.0, 300.0)],
            }],
        };
        assert_eq!(
            no_tank.validate(),
            Err(SpacecraftValidationError::NoPropellantTank)
        );

        let heavy = Spacecraft {
            identifier: SpacecraftId(5),
            compartments: vec![Compartment {
                mass: 1_000.0,
                slots: vec![tank("T", 0.01), engine(100.0, 300.0)],
            }],
        };
        assert!(matches!(
            heavy.validate(),
            Err(SpacecraftValidationError::InsufficientDeltaV(_))
        ));
    }

    #[test]
    fn test_fleet_provides_delta_v() {
        let fleet = Fleet::new();
        let metrics = fleet.upsert(tug(10));
        assert_eq!(fleet.len(), 1);
        assert_eq!(
            fleet.maximum_delta_v(SpacecraftId(10)),
            Some(metrics.maximum_delta_v)
        );
        assert_eq!(fleet.maximum_delta_v(SpacecraftId(11)), None);

        assert!(fleet.remove(SpacecraftId(10)).is_some());
        assert!(fleet.is_empty());
    }
}
