//! Starting fleet of the demo server.

use orbis_orbital::{Compartment, Fleet, Part, PartKind, Spacecraft, SpacecraftId};

fn tank() -> Option<Part> {
    Some(Part {
        name: "Tank-25".to_string(),
        mass: 2.0,
        kind: PartKind::PropellantTank {
            propellant_mass: 25.0,
        },
    })
}

fn hold() -> Option<Part> {
    Some(Part {
        name: "Hold-10".to_string(),
        mass: 1.5,
        kind: PartKind::CargoHold { cargo_mass: 10.0 },
    })
}

fn engine() -> Option<Part> {
    Some(Part {
        name: "Engine-400".to_string(),
        mass: 3.0,
        kind: PartKind::Engine {
            thrust: 400.0,
            specific_impulse: 340.0,
        },
    })
}

/// Two-compartment cargo tug; the front tank sits over a matching one.
pub fn tug(identifier: u64) -> Spacecraft {
    Spacecraft {
        identifier: SpacecraftId(identifier),
        compartments: vec![
            Compartment {
                mass: 4.0,
                slots: vec![tank(), hold()],
            },
            Compartment {
                mass: 4.0,
                slots: vec![tank(), engine()],
            },
        ],
    }
}

/// Builds the fleet, skipping assemblies that cannot fly.
pub fn demo_fleet(identifiers: &[u64]) -> Fleet {
    let fleet = Fleet::new();
    for identifier in identifiers {
        let spacecraft = tug(*identifier);
        if let Err(e) = spacecraft.validate() {
            tracing::warn!(id = identifier, "Spacecraft rejected: {e}");
            continue;
        }
        let metrics = fleet.upsert(spacecraft);
        tracing::info!(
            id = identifier,
            delta_v = metrics.maximum_delta_v.round(),
            "Spacecraft ready"
        );
    }
    fleet
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_orbital::PropulsionProvider;

    #[test]
    fn test_tug_is_flightworthy() {
        let tug = tug(1);
        assert!(tug.validate().is_ok());
        let metrics = tug.propulsion_metrics();
        // 25 × 1.1 skirt + 25.
        assert!((metrics.propellant_mass_capacity - 52.5).abs() < 1e-9);
        assert!(metrics.maximum_delta_v > 5000.0);
    }

    #[test]
    fn test_demo_fleet_registers_every_tug() {
        let fleet = demo_fleet(&[1, 2, 3]);
        assert_eq!(fleet.len(), 3);
        assert!(fleet.maximum_delta_v(SpacecraftId(2)).is_some());
        assert!(fleet.maximum_delta_v(SpacecraftId(4)).is_none());
    }
}
