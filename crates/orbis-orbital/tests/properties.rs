//! Property-based tests for the orbit geometry using proptest.

use orbis_orbital::{
    Area, AreaId, HohmannTransfer, Planet, PlanetId, area_phase, phase_difference,
};
use proptest::prelude::*;

const EARTH_MU: f64 = 3.986_004_418e14;

fn area(altitude: f64, phase: f64) -> Area {
    Area {
        id: AreaId(0),
        name: "Probe".to_string(),
        planet: Planet {
            id: PlanetId(0),
            radius_km: 6371.0,
            gravitational_parameter: EARTH_MU,
        },
        altitude,
        phase,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Both burns are magnitudes and the flight takes time.
    #[test]
    fn prop_hohmann_terms_non_negative(
        mu in 1.0e10f64..1.0e17,
        source in 1.0e5f64..1.0e9,
        destination in 1.0e5f64..1.0e9,
    ) {
        let transfer = HohmannTransfer::compute(mu, source, destination);
        prop_assert!(transfer.start_delta_v >= 0.0);
        prop_assert!(transfer.end_delta_v >= 0.0);
        prop_assert!(transfer.total_delta_v >= 0.0);
        prop_assert!(transfer.duration > 0.0);
    }

    /// Transfer cost shrinks as the destination radius approaches the source.
    #[test]
    fn prop_hohmann_cost_vanishes_as_radii_converge(
        source in 6.5e6f64..5.0e7,
        ratio in 1.05f64..10.0,
        outbound in any::<bool>(),
    ) {
        let far = if outbound { source * ratio } else { source / ratio };
        let near = source + (far - source) * 0.5;

        let far_cost = HohmannTransfer::compute(EARTH_MU, source, far).total_delta_v;
        let near_cost = HohmannTransfer::compute(EARTH_MU, source, near).total_delta_v;
        let same = HohmannTransfer::compute(EARTH_MU, source, source).total_delta_v;

        prop_assert!(near_cost < far_cost, "near {near_cost} far {far_cost}");
        prop_assert!(same < near_cost);
        prop_assert!(same.abs() < 1e-9);
    }

    /// Area phases stay in range and repeat every period.
    #[test]
    fn prop_area_phase_in_range_and_periodic(
        altitude in 0.0f64..40_000.0,
        phase in -720.0f64..720.0,
        time in 0.0f64..1.0e6,
    ) {
        let area = area(altitude, phase);
        let period = area.planet.orbital_period(altitude);

        let now = area_phase(&area, time);
        let later = area_phase(&area, time + period);

        prop_assert!((0.0..360.0).contains(&now));
        prop_assert!((0.0..360.0).contains(&later));
        prop_assert!(phase_difference(now, later).abs() < 1e-6, "{now} vs {later}");
    }
}
