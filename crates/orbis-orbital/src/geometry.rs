//! Pure circular-orbit mathematics: Hohmann transfers, orbital periods and
//! phase propagation. Nothing in here holds state.
//!
//! Radii are in meters, gravitational parameters in m³/s², and every duration
//! leaving this module is in minutes (the simulation clock unit).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::catalog::Area;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Seconds per simulation minute.
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Full revolution in degrees.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Phase advance of a Hohmann transfer: the spacecraft travels half an ellipse.
pub const HOHMANN_PHASE_ADVANCE_DEG: f64 = 180.0;

// ---------------------------------------------------------------------------
// Planet
// ---------------------------------------------------------------------------

/// Catalog-assigned planet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanetId(pub u16);

/// The central body every orbit is defined around.
///
/// Kept `Copy` and embedded in every geometry so that replicated records never
/// need a catalog lookup to be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    /// Identifier within the catalog.
    pub id: PlanetId,
    /// Surface radius in kilometers.
    pub radius_km: f64,
    /// Standard gravitational parameter in m³/s².
    pub gravitational_parameter: f64,
}

impl Planet {
    /// Distance from the planet center, in meters, of an orbit at `altitude_km`.
    pub fn orbital_radius(&self, altitude_km: f64) -> f64 {
        (self.radius_km + altitude_km) * 1000.0
    }

    /// Period in minutes of a circular orbit at `altitude_km`.
    pub fn orbital_period(&self, altitude_km: f64) -> f64 {
        circular_orbit_period(self.gravitational_parameter, self.orbital_radius(altitude_km))
    }
}

// ---------------------------------------------------------------------------
// HohmannTransfer
// ---------------------------------------------------------------------------

/// Parameters of a two-burn Hohmann transfer between two circular orbits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HohmannTransfer {
    /// Magnitude of the departure burn in m/s.
    pub start_delta_v: f64,
    /// Magnitude of the circularization burn in m/s.
    pub end_delta_v: f64,
    /// Sum of both burns in m/s.
    pub total_delta_v: f64,
    /// Time of flight in minutes.
    pub duration: f64,
}

impl HohmannTransfer {
    /// Computes the transfer from a circular orbit of radius `source_radius`
    /// to one of radius `destination_radius` (both in meters).
    ///
    /// Both burns are reported as magnitudes, so the result is the same shape
    /// for inbound and outbound transfers.
    pub fn compute(gravitational_parameter: f64, source_radius: f64, destination_radius: f64) -> Self {
        let mu = gravitational_parameter;
        let sum = source_radius + destination_radius;

        let start_delta_v =
            ((mu / source_radius).sqrt() * ((2.0 * destination_radius / sum).sqrt() - 1.0)).abs();
        let end_delta_v =
            ((mu / destination_radius).sqrt() * (1.0 - (2.0 * source_radius / sum).sqrt())).abs();

        let duration = PI * (sum.powi(3) / (8.0 * mu)).sqrt() / SECONDS_PER_MINUTE;

        Self {
            start_delta_v,
            end_delta_v,
            total_delta_v: start_delta_v + end_delta_v,
            duration,
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Period in minutes of a circular orbit of radius `radius` meters.
pub fn circular_orbit_period(gravitational_parameter: f64, radius: f64) -> f64 {
    2.0 * PI * (radius.powi(3) / gravitational_parameter).sqrt() / SECONDS_PER_MINUTE
}

/// Reduces an angle in degrees to `[0, 360)`.
///
/// `rem_euclid` alone can return exactly 360.0 for tiny negative inputs
/// because of rounding, so that case is folded back to zero.
pub fn normalize_phase(phase_deg: f64) -> f64 {
    let reduced = phase_deg.rem_euclid(FULL_TURN_DEG);
    if reduced >= FULL_TURN_DEG { 0.0 } else { reduced }
}

/// Signed shortest angular difference `a - b` in degrees, in `(-180, 180]`.
pub fn phase_difference(a_deg: f64, b_deg: f64) -> f64 {
    let diff = normalize_phase(a_deg - b_deg);
    if diff > 180.0 { diff - FULL_TURN_DEG } else { diff }
}

/// Phase in degrees of an area at simulation time `current_time` (minutes).
///
/// Areas sit on fixed circular orbits whose phase is given at time zero.
pub fn area_phase(area: &Area, current_time: f64) -> f64 {
    let period = area.planet.orbital_period(area.altitude);
    normalize_phase(area.phase + (current_time / period) * FULL_TURN_DEG)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
