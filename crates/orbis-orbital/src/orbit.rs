//! Parked circular orbits and the derived location they project to.

use serde::{Deserialize, Serialize};

use crate::geometry::{FULL_TURN_DEG, Planet, normalize_phase};

// ---------------------------------------------------------------------------
// OrbitGeometry
// ---------------------------------------------------------------------------

/// A circular orbit around a planet, with the phase it had at some epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitGeometry {
    /// Central body.
    pub planet: Planet,
    /// Altitude above the surface in kilometers.
    pub altitude: f64,
    /// Phase in degrees at the owning orbit's epoch.
    pub phase: f64,
}

impl OrbitGeometry {
    /// Creates a geometry, normalizing the phase to `[0, 360)`.
    pub fn new(planet: Planet, altitude: f64, phase: f64) -> Self {
        Self {
            planet,
            altitude,
            phase: normalize_phase(phase),
        }
    }

    /// Orbital radius in meters.
    pub fn radius(&self) -> f64 {
        self.planet.orbital_radius(self.altitude)
    }

    /// Orbital period in minutes.
    pub fn period(&self) -> f64 {
        self.planet.orbital_period(self.altitude)
    }

    /// Angular rate in degrees per minute.
    pub fn angular_rate(&self) -> f64 {
        FULL_TURN_DEG / self.period()
    }

    /// Phase after `elapsed` minutes on this orbit.
    pub fn phase_after(&self, elapsed: f64) -> f64 {
        normalize_phase(self.phase + elapsed * self.angular_rate())
    }
}

// ---------------------------------------------------------------------------
// Orbit
// ---------------------------------------------------------------------------

/// A body parked on a circular orbit since `epoch` (simulation minutes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    /// Shape of the orbit and the phase held at `epoch`.
    pub geometry: OrbitGeometry,
    /// Simulation time the orbit was entered.
    pub epoch: f64,
}

impl Orbit {
    /// Creates an orbit entered at `epoch`.
    pub fn new(geometry: OrbitGeometry, epoch: f64) -> Self {
        Self { geometry, epoch }
    }

    /// Location at simulation time `time`.
    ///
    /// Valid for any `time`, including very large jumps: the phase is a
    /// closed-form function of elapsed time.
    pub fn location_at(&self, time: f64) -> OrbitalLocation {
        OrbitalLocation {
            planet: self.geometry.planet,
            altitude: self.geometry.altitude,
            phase: self.geometry.phase_after(time - self.epoch),
        }
    }

    /// The same motion expressed with `time` as its epoch.
    pub fn rebased(&self, time: f64) -> Self {
        Self {
            geometry: OrbitGeometry {
                phase: self.geometry.phase_after(time - self.epoch),
                ..self.geometry
            },
            epoch: time,
        }
    }
}

// ---------------------------------------------------------------------------
// OrbitalLocation
// ---------------------------------------------------------------------------

/// Where a body is at a given instant. Derived every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalLocation {
    /// Central body.
    pub planet: Planet,
    /// Altitude above the surface in kilometers.
    pub altitude: f64,
    /// Phase angle in degrees, in `[0, 360)`.
    pub phase: f64,
}

impl OrbitalLocation {
    /// Planar position in kilometers relative to the planet center.
    pub fn cartesian(&self) -> (f64, f64) {
        let radius = self.planet.radius_km + self.altitude;
        let angle = self.phase.to_radians();
        (radius * angle.cos(), radius * angle.sin())
    }

    /// Straight-line distance in kilometers. Locations around different
    /// planets are infinitely far apart.
    pub fn distance_to(&self, other: &OrbitalLocation) -> f64 {
        if self.planet.id != other.planet.id {
            return f64::INFINITY;
        }
        let (x0, y0) = self.cartesian();
        let (x1, y1) = other.cartesian();
        ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanetId;
    use approx::assert_relative_eq;

    fn planet() -> Planet {
        Planet {
            id: PlanetId(0),
            radius_km: 6371.0,
            gravitational_parameter: 3.986_004_418e14,
        }
    }

    #[test]
    fn test_location_at_epoch_matches_geometry() {
        let orbit = Orbit::new(OrbitGeometry::new(planet(), 500.0, 123.5), 42.0);
        let location = orbit.location_at(42.0);
        assert_eq!(location.altitude, 500.0);
        assert_eq!(location.phase, 123.5);
    }

    #[test]
    fn test_half_period_advances_half_turn() {
        let geometry = OrbitGeometry::new(planet(), 400.0, 10.0);
        let orbit = Orbit::new(geometry, 0.0);
        let location = orbit.location_at(geometry.period() / 2.0);
        assert_relative_eq!(location.phase, 190.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rebased_orbit_is_the_same_motion() {
        let orbit = Orbit::new(OrbitGeometry::new(planet(), 700.0, 300.0), 5.0);
        let rebased = orbit.rebased(1_000.0);
        assert_eq!(rebased.epoch, 1_000.0);
        for t in [1_000.0, 1_500.0, 10_000.0] {
            let drift = crate::geometry::phase_difference(
                orbit.location_at(t).phase,
                rebased.location_at(t).phase,
            );
            assert!(drift.abs() < 1e-6, "drift {drift} at t={t}");
        }
    }

    #[test]
    fn test_negative_phase_is_normalized() {
        let geometry = OrbitGeometry::new(planet(), 400.0, -45.0);
        assert_eq!(geometry.phase, 315.0);
    }

    #[test]
    fn test_distance_between_opposite_points() {
        let a = OrbitalLocation {
            planet: planet(),
            altitude: 400.0,
            phase: 0.0,
        };
        let b = OrbitalLocation { phase: 180.0, ..a };
        assert_relative_eq!(a.distance_to(&b), 2.0 * 6771.0, epsilon = 1e-6);
        assert_relative_eq!(a.distance_to(&a), 0.0);

        let elsewhere = OrbitalLocation {
            planet: Planet {
                id: PlanetId(1),
                ..planet()
            },
            ..a
        };
        assert!(a.distance_to(&elsewhere).is_infinite());
    }
}
