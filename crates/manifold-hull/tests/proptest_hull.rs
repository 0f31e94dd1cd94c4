//! Property-based tests for hull construction.
//!
//! Random point clouds must either report a degeneracy (and build no
//! hull) or produce a closed, Euler-consistent manifold that contains
//! every input point.

use manifold_hull::{Degeneracy, HullParams, Manifold, EPSILON_SQUARED};
use nalgebra::Point3;
use proptest::prelude::*;

fn arb_point() -> impl Strategy<Value = Point3<f64>> {
    (-50.0..50.0f64, -50.0..50.0f64, -50.0..50.0f64)
        .prop_map(|(x, y, z)| Point3::new(x, y, z))
}

fn arb_cloud(max: usize) -> impl Strategy<Value = Vec<Point3<f64>>> {
    prop::collection::vec(arb_point(), 4..=max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hull_is_closed_and_contains_inputs(points in arb_cloud(24)) {
        let mut hull = Manifold::new();
        let pred = hull.find_convex_hull(&points, &HullParams::default());

        if pred == Degeneracy::None {
            let report = hull.validate(EPSILON_SQUARED);
            prop_assert!(report.cycles_closed, "{report}");
            prop_assert!(report.buddies_involutive, "{report}");
            prop_assert_eq!(report.euler_characteristic, 2);
            prop_assert!(report.short_cycle_faces == 0);
            prop_assert!(report.degree_deficient_vertices == 0);
            prop_assert!(
                hull.contains_points(&points, 1e-6),
                "input point escaped the hull"
            );
        }
    }

    #[test]
    fn duplicated_inputs_never_break_closure(points in arb_cloud(12)) {
        // Double every point; duplicates must be absorbed.
        let mut doubled = points.clone();
        doubled.extend(points.iter().copied());

        let mut hull = Manifold::new();
        let pred = hull.find_convex_hull(&doubled, &HullParams::default());

        if pred == Degeneracy::None {
            let report = hull.validate(EPSILON_SQUARED);
            prop_assert!(report.cycles_closed);
            prop_assert!(report.buddies_involutive);
            prop_assert_eq!(report.euler_characteristic, 2);
        }
    }

    #[test]
    fn text_round_trip_is_lossless(points in arb_cloud(16)) {
        let mut hull = Manifold::new();
        if hull.find_convex_hull(&points, &HullParams::default()) != Degeneracy::None {
            return Ok(());
        }

        let marshalled = hull.export_data();
        let mut buf = Vec::new();
        manifold_hull::emit_text(&marshalled, &mut buf).unwrap();
        let parsed = manifold_hull::parse_text(buf.as_slice()).unwrap();
        prop_assert_eq!(parsed, marshalled);
    }
}
