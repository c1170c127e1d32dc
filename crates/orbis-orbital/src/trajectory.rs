//! Transfer trajectories between two circular orbits: an optional injection
//! burn to a phasing altitude, a phasing coast that waits for the departure
//! window, and a final Hohmann transfer to the destination.
//!
//! The phasing wait is solved in closed form. Both bodies keep moving during
//! the wait and the transfers, so the solve matches the spacecraft's arrival
//! phase against the destination's *predicted* phase at arrival time.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{InfeasibleTrajectory, OrbitalError};
use crate::geometry::{
    FULL_TURN_DEG, HOHMANN_PHASE_ADVANCE_DEG, HohmannTransfer, Planet, normalize_phase,
};
use crate::orbit::{Orbit, OrbitGeometry, OrbitalLocation};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Altitudes closer than this (km) are considered the same orbit.
pub const ALTITUDE_EPSILON_KM: f64 = 1e-6;

/// Below this relative angular rate (deg/min) the departure window never
/// comes around.
pub const MIN_RELATIVE_RATE_DEG_PER_MIN: f64 = 1e-9;

/// Maximum arrival phase error (degrees) a computed trajectory may have
/// against the destination's phase at arrival.
pub const ARRIVAL_PHASE_TOLERANCE_DEG: f64 = 1e-3;

/// Newton iterations allowed when solving Kepler's equation on a transfer leg.
const KEPLER_MAX_ITERATIONS: usize = 16;

/// Convergence threshold for Kepler's equation, in radians.
const KEPLER_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// TrajectoryParameters
// ---------------------------------------------------------------------------

/// Snapshot of a trajectory request: where the source and destination are at
/// the planned start time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryParameters {
    /// Planned departure time in simulation minutes.
    pub start_time: f64,
    /// Source orbit altitude in kilometers.
    pub source_altitude: f64,
    /// Source phase at `start_time`, in degrees.
    pub source_phase: f64,
    /// Destination orbit altitude in kilometers.
    pub destination_altitude: f64,
    /// Destination phase at `start_time`, in degrees.
    pub destination_phase: f64,
    /// Shared central body.
    pub planet: Planet,
}

impl TrajectoryParameters {
    /// Gravitational parameter of the shared planet in m³/s².
    pub fn gravitational_parameter(&self) -> f64 {
        self.planet.gravitational_parameter
    }
}

// ---------------------------------------------------------------------------
// TransferLeg
// ---------------------------------------------------------------------------

/// Half of a Hohmann ellipse between two circular altitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferLeg {
    /// Central body.
    pub planet: Planet,
    /// Departure burn time in simulation minutes.
    pub start_time: f64,
    /// Phase at the departure burn, in degrees.
    pub start_phase: f64,
    /// Altitude the leg departs from, in kilometers.
    pub source_altitude: f64,
    /// Altitude the leg circularizes at, in kilometers.
    pub destination_altitude: f64,
    /// Burn and duration figures.
    pub transfer: HohmannTransfer,
}

impl TransferLeg {
    /// Builds the leg departing at `start_time` from `start_phase`.
    pub fn new(
        planet: Planet,
        start_time: f64,
        start_phase: f64,
        source_altitude: f64,
        destination_altitude: f64,
    ) -> Self {
        let transfer = HohmannTransfer::compute(
            planet.gravitational_parameter,
            planet.orbital_radius(source_altitude),
            planet.orbital_radius(destination_altitude),
        );
        Self {
            planet,
            start_time,
            start_phase: normalize_phase(start_phase),
            source_altitude,
            destination_altitude,
            transfer,
        }
    }

    /// Circularization time.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.transfer.duration
    }

    /// Phase at circularization.
    pub fn end_phase(&self) -> f64 {
        normalize_phase(self.start_phase + HOHMANN_PHASE_ADVANCE_DEG)
    }

    /// Location on the ellipse at `time`, clamped to the leg's endpoints.
    pub fn location_at(&self, time: f64) -> OrbitalLocation {
        let fraction = if self.transfer.duration > 0.0 {
            ((time - self.start_time) / self.transfer.duration).clamp(0.0, 1.0)
        } else {
            1.0
        };

        if fraction <= 0.0 {
            return OrbitalLocation {
                planet: self.planet,
                altitude: self.source_altitude,
                phase: self.start_phase,
            };
        }
        if fraction >= 1.0 {
            return OrbitalLocation {
                planet: self.planet,
                altitude: self.destination_altitude,
                phase: self.end_phase(),
            };
        }

        let r_source = self.planet.orbital_radius(self.source_altitude);
        let r_destination = self.planet.orbital_radius(self.destination_altitude);
        let semi_major_axis = 0.5 * (r_source + r_destination);
        let eccentricity = (r_destination - r_source).abs() / (r_source + r_destination);

        // Outbound legs start at periapsis, inbound legs at apoapsis.
        let outbound = r_destination >= r_source;
        let mean_anomaly = if outbound {
            PI * fraction
        } else {
            PI + PI * fraction
        };

        let eccentric_anomaly = solve_kepler(mean_anomaly, eccentricity);
        let true_anomaly = 2.0
            * ((1.0 + eccentricity).sqrt() * (eccentric_anomaly / 2.0).sin())
                .atan2((1.0 - eccentricity).sqrt() * (eccentric_anomaly / 2.0).cos());
        let swept = if outbound { true_anomaly } else { true_anomaly - PI };

        let radius = semi_major_axis * (1.0 - eccentricity * eccentric_anomaly.cos());

        OrbitalLocation {
            planet: self.planet,
            altitude: radius / 1000.0 - self.planet.radius_km,
            phase: normalize_phase(self.start_phase + swept.to_degrees()),
        }
    }
}

/// Solves `E - e sin E = M` with a bounded Newton iteration.
fn solve_kepler(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut eccentric_anomaly = if eccentricity < 0.8 { mean_anomaly } else { PI };
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let residual = eccentric_anomaly - eccentricity * eccentric_anomaly.sin() - mean_anomaly;
        if residual.abs() < KEPLER_TOLERANCE {
            break;
        }
        eccentric_anomaly -= residual / (1.0 - eccentricity * eccentric_anomaly.cos());
    }
    eccentric_anomaly
}

// ---------------------------------------------------------------------------
// PhasingLeg
// ---------------------------------------------------------------------------

/// Coast on the phasing orbit until the departure window opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasingLeg {
    /// Phasing orbit, with its epoch at the start of the coast.
    pub orbit: Orbit,
    /// Wait in minutes.
    pub duration: f64,
}

impl PhasingLeg {
    /// End of the coast.
    pub fn end_time(&self) -> f64 {
        self.orbit.epoch + self.duration
    }
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// A complete transfer between two circular orbits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Departure time in simulation minutes.
    pub start_time: f64,
    /// Source circular orbit at `start_time`.
    pub source: Orbit,
    /// Transfer to the phasing altitude, when it differs from the source.
    pub injection: Option<TransferLeg>,
    /// Coast waiting for the departure window.
    pub phasing: PhasingLeg,
    /// Final Hohmann transfer to the destination altitude.
    pub transfer: TransferLeg,
}

impl Trajectory {
    /// Computes a trajectory from `parameters`, phasing at `phasing_altitude`
    /// (kilometers).
    pub fn compute(
        parameters: &TrajectoryParameters,
        phasing_altitude: f64,
    ) -> Result<Self, OrbitalError> {
        for altitude in [
            phasing_altitude,
            parameters.source_altitude,
            parameters.destination_altitude,
        ] {
            if !altitude.is_finite() || altitude < 0.0 {
                return Err(OrbitalError::InvalidAltitude(altitude));
            }
        }

        let planet = parameters.planet;
        let start_time = parameters.start_time;
        let source = Orbit::new(
            OrbitGeometry::new(planet, parameters.source_altitude, parameters.source_phase),
            start_time,
        );

        let injection = ((phasing_altitude - parameters.source_altitude).abs()
            > ALTITUDE_EPSILON_KM)
            .then(|| {
                TransferLeg::new(
                    planet,
                    start_time,
                    parameters.source_phase,
                    parameters.source_altitude,
                    phasing_altitude,
                )
            });

        let (phasing_start, phasing_phase) = match &injection {
            Some(leg) => (leg.end_time(), leg.end_phase()),
            None => (start_time, normalize_phase(parameters.source_phase)),
        };
        let phasing_geometry = OrbitGeometry::new(planet, phasing_altitude, phasing_phase);

        let final_transfer = HohmannTransfer::compute(
            planet.gravitational_parameter,
            planet.orbital_radius(phasing_altitude),
            planet.orbital_radius(parameters.destination_altitude),
        );

        // Rates in degrees per minute.
        let phasing_rate = phasing_geometry.angular_rate();
        let destination_rate =
            FULL_TURN_DEG / planet.orbital_period(parameters.destination_altitude);
        let relative_rate = phasing_rate - destination_rate;
        if relative_rate.abs() < MIN_RELATIVE_RATE_DEG_PER_MIN {
            return Err(InfeasibleTrajectory::NoRelativeMotion.into());
        }

        // The spacecraft must lead the destination's arrival phase by the
        // transfer's half turn; the wait is the smallest non-negative solution.
        let fixed_flight = (phasing_start - start_time) + final_transfer.duration;
        let required_lead = parameters.destination_phase + destination_rate * fixed_flight
            - phasing_phase
            - HOHMANN_PHASE_ADVANCE_DEG;
        let signed_lead = if relative_rate > 0.0 {
            required_lead
        } else {
            -required_lead
        };
        let wait = normalize_phase(signed_lead) / relative_rate.abs();

        let phasing = PhasingLeg {
            orbit: Orbit::new(phasing_geometry, phasing_start),
            duration: wait,
        };
        let transfer = TransferLeg::new(
            planet,
            phasing.end_time(),
            phasing_geometry.phase_after(wait),
            phasing_altitude,
            parameters.destination_altitude,
        );

        let trajectory = Self {
            start_time,
            source,
            injection,
            phasing,
            transfer,
        };

        if !trajectory.total_duration().is_finite()
            || trajectory.total_duration() <= 0.0
            || !trajectory.total_delta_v().is_finite()
        {
            return Err(InfeasibleTrajectory::NonFiniteDuration.into());
        }

        tracing::debug!(
            start = start_time,
            phasing_altitude,
            wait,
            delta_v = trajectory.total_delta_v(),
            arrival = trajectory.arrival_time(),
            "Computed trajectory"
        );

        Ok(trajectory)
    }

    /// Central body.
    pub fn planet(&self) -> Planet {
        self.transfer.planet
    }

    /// Altitude the trajectory ends at, in kilometers.
    pub fn destination_altitude(&self) -> f64 {
        self.transfer.destination_altitude
    }

    /// Arrival time in simulation minutes.
    pub fn arrival_time(&self) -> f64 {
        self.transfer.end_time()
    }

    /// Total time from departure to arrival, in minutes.
    pub fn total_duration(&self) -> f64 {
        self.arrival_time() - self.start_time
    }

    /// Total Δv of every burn, in m/s.
    pub fn total_delta_v(&self) -> f64 {
        self.injection
            .map_or(0.0, |leg| leg.transfer.total_delta_v)
            + self.transfer.transfer.total_delta_v
    }

    /// Circular orbit the spacecraft ends on, with its epoch at arrival.
    pub fn final_orbit(&self) -> Orbit {
        Orbit::new(
            OrbitGeometry::new(
                self.planet(),
                self.destination_altitude(),
                self.transfer.end_phase(),
            ),
            self.arrival_time(),
        )
    }

    /// Whether the trajectory ended more than `grace` minutes before `now`.
    pub fn is_expired(&self, now: f64, grace: f64) -> bool {
        now > self.arrival_time() + grace
    }

    /// Location at simulation time `time`. Before departure the spacecraft is
    /// on the source orbit; after arrival it is on the final orbit.
    pub fn location_at(&self, time: f64) -> OrbitalLocation {
        if time < self.start_time {
            return self.source.location_at(time);
        }
        if let Some(leg) = &self.injection
            && time < leg.end_time()
        {
            return leg.location_at(time);
        }
        if time < self.phasing.end_time() {
            return self.phasing.orbit.location_at(time);
        }
        if time < self.transfer.end_time() {
            return self.transfer.location_at(time);
        }
        self.final_orbit().location_at(time)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PlanetId, phase_difference};
    use approx::assert_relative_eq;

    fn planet() -> Planet {
        Planet {
            id: PlanetId(0),
            radius_km: 6371.0,
            gravitational_parameter: 3.986_004_418e14,
        }
    }

    fn parameters(source: (f64, f64), destination: (f64, f64), start: f64) -> TrajectoryParameters {
        TrajectoryParameters {
            start_time: start,
            source_altitude: source.0,
            source_phase: source.1,
            destination_altitude: destination.0,
            destination_phase: destination.1,
            planet: planet(),
        }
    }

    /// Destination phase at `time`, given its phase at the request start.
    fn destination_phase_at(p: &TrajectoryParameters, time: f64) -> f64 {
        let rate = FULL_TURN_DEG / p.planet.orbital_period(p.destination_altitude);
        normalize_phase(p.destination_phase + rate * (time - p.start_time))
    }

    fn assert_meets_destination(p: &TrajectoryParameters, trajectory: &Trajectory) {
        let arrival = trajectory.arrival_time();
        let spacecraft = trajectory.transfer.end_phase();
        let target = destination_phase_at(p, arrival);
        let miss = phase_difference(spacecraft, target);
        assert!(
            miss.abs() < ARRIVAL_PHASE_TOLERANCE_DEG,
            "missed destination by {miss} degrees"
        );
    }

    #[test]
    fn test_outbound_without_injection_meets_destination() {
        let p = parameters((400.0, 0.0), (800.0, 90.0), 0.0);
        let trajectory = Trajectory::compute(&p, 400.0).unwrap();
        assert!(trajectory.injection.is_none());
        assert!(trajectory.phasing.duration >= 0.0);
        assert_meets_destination(&p, &trajectory);
    }

    #[test]
    fn test_inbound_transfer_meets_destination() {
        let p = parameters((2000.0, 10.0), (400.0, 300.0), 50.0);
        let trajectory = Trajectory::compute(&p, 2000.0).unwrap();
        assert_meets_destination(&p, &trajectory);
    }

    #[test]
    fn test_injection_to_phasing_altitude() {
        // Phasing above the destination makes the spacecraft slower than it.
        let p = parameters((400.0, 0.0), (800.0, 10.0), 0.0);
        let trajectory = Trajectory::compute(&p, 1500.0).unwrap();
        let injection = trajectory.injection.expect("phasing differs from source");
        assert_relative_eq!(injection.end_time(), trajectory.phasing.orbit.epoch);
        assert_relative_eq!(
            trajectory.total_delta_v(),
            injection.transfer.total_delta_v + trajectory.transfer.transfer.total_delta_v
        );
        assert_meets_destination(&p, &trajectory);
    }

    #[test]
    fn test_phasing_at_destination_altitude_is_infeasible() {
        let p = parameters((400.0, 0.0), (800.0, 90.0), 0.0);
        let err = Trajectory::compute(&p, 800.0).unwrap_err();
        assert_eq!(
            err,
            OrbitalError::Infeasible(InfeasibleTrajectory::NoRelativeMotion)
        );
    }

    #[test]
    fn test_negative_phasing_altitude_rejected() {
        let p = parameters((400.0, 0.0), (800.0, 90.0), 0.0);
        let err = Trajectory::compute(&p, -1.0).unwrap_err();
        assert!(matches!(err, OrbitalError::InvalidAltitude(_)));
    }

    #[test]
    fn test_transfer_leg_endpoints_and_monotonic_altitude() {
        let leg = TransferLeg::new(planet(), 10.0, 350.0, 400.0, 800.0);
        let start = leg.location_at(10.0);
        assert_eq!(start.altitude, 400.0);
        assert_eq!(start.phase, 350.0);

        let end = leg.location_at(leg.end_time());
        assert_eq!(end.altitude, 800.0);
        assert_relative_eq!(end.phase, 170.0);

        let mut previous = start.altitude;
        for step in 1..20 {
            let t = 10.0 + leg.transfer.duration * step as f64 / 20.0;
            let location = leg.location_at(t);
            assert!(location.altitude >= previous - 1e-9);
            assert!(location.altitude <= 800.0 + 1e-6);
            previous = location.altitude;
        }
    }

    #[test]
    fn test_inbound_leg_midpoint_is_between_altitudes() {
        let leg = TransferLeg::new(planet(), 0.0, 0.0, 2000.0, 400.0);
        let mid = leg.location_at(leg.transfer.duration / 2.0);
        assert!(mid.altitude < 2000.0 && mid.altitude > 400.0);
        // Half the time from apoapsis covers less than half the angle.
        assert!(mid.phase < 90.0, "phase {}", mid.phase);
    }

    #[test]
    fn test_location_before_start_and_after_arrival() {
        let p = parameters((400.0, 0.0), (800.0, 90.0), 100.0);
        let trajectory = Trajectory::compute(&p, 400.0).unwrap();

        let before = trajectory.location_at(100.0);
        assert_eq!(before.altitude, 400.0);
        assert_eq!(before.phase, 0.0);

        let later = trajectory.arrival_time() + 1_000.0;
        let after = trajectory.location_at(later);
        assert_eq!(after.altitude, 800.0);
        let expected = destination_phase_at(&p, later);
        assert!(phase_difference(after.phase, expected).abs() < ARRIVAL_PHASE_TOLERANCE_DEG);
    }

    #[test]
    fn test_is_expired_boundary() {
        let p = parameters((400.0, 0.0), (800.0, 90.0), 0.0);
        let trajectory = Trajectory::compute(&p, 400.0).unwrap();
        let arrival = trajectory.arrival_time();
        assert!(!trajectory.is_expired(arrival, 0.5));
        assert!(!trajectory.is_expired(arrival + 0.5, 0.5));
        assert!(trajectory.is_expired(arrival + 0.5001, 0.5));
    }

    #[test]
    fn test_trajectory_serializes() {
        let p = parameters((400.0, 0.0), (800.0, 90.0), 0.0);
        let trajectory = Trajectory::compute(&p, 600.0).unwrap();
        let bytes = postcard::to_allocvec(&trajectory).unwrap();
        let decoded: Trajectory = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(trajectory, decoded);
    }
}
