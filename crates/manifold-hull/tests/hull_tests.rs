//! End-to-end tests for convex hull construction.
//!
//! These exercise the full pipeline — extremal point selection, initial
//! simplex, incremental incorporation, degeneracy repair, finalization —
//! against the invariants a clean convex manifold must satisfy.

use manifold_hull::{find_obb_3d, Degeneracy, HullParams, Manifold, EPSILON_SQUARED};
use nalgebra::Point3;

fn regular_tetrahedron() -> Vec<Point3<f64>> {
    vec![
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(1.0, -1.0, -1.0),
        Point3::new(-1.0, 1.0, -1.0),
        Point3::new(-1.0, -1.0, 1.0),
    ]
}

fn unit_cube_corners() -> Vec<Point3<f64>> {
    let mut points = Vec::new();
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                points.push(Point3::new(x, y, z));
            }
        }
    }
    points
}

/// Deterministic pseudo-random points in a cube, via a small LCG.
fn scattered_points(n: usize, seed: u64) -> Vec<Point3<f64>> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) * 20.0 - 10.0
    };
    (0..n)
        .map(|_| Point3::new(next(), next(), next()))
        .collect()
}

#[test]
fn tetrahedron_hull() {
    let points = regular_tetrahedron();
    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());

    assert_eq!(pred, Degeneracy::None);
    assert_eq!(hull.vertex_count(), 4);
    assert_eq!(hull.edge_count(), 6);
    assert_eq!(hull.face_count(), 4);
    for f in hull.face_ids() {
        assert_eq!(hull.face(f).unwrap().half_edges().len(), 3);
    }
    assert!(hull.validate(EPSILON_SQUARED).is_sound());
    assert!(hull.contains_points(&points, EPSILON_SQUARED));
}

#[test]
fn too_few_points_reports_flat() {
    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(
        &[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        &HullParams::default(),
    );
    assert_eq!(pred, Degeneracy::MaybeFlat);
}

#[test]
fn colinear_points_report_colinear() {
    let points: Vec<Point3<f64>> = (0..5)
        .map(|i| Point3::new(i as f64, 2.0 * i as f64, -i as f64))
        .collect();
    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());
    assert_eq!(pred, Degeneracy::MaybeColinear);
}

#[test]
fn coplanar_points_report_coplanar() {
    let points = vec![
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(4.0, 0.0, 1.0),
        Point3::new(4.0, 3.0, 1.0),
        Point3::new(0.0, 3.0, 1.0),
        Point3::new(2.0, 1.0, 1.0),
        Point3::new(1.0, 2.0, 1.0),
    ];
    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());
    assert_eq!(pred, Degeneracy::MaybeCoplanar);
}

#[test]
fn cube_with_interior_centroid() {
    let mut points = unit_cube_corners();
    points.push(Point3::new(0.5, 0.5, 0.5));

    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());

    assert_eq!(pred, Degeneracy::None);
    // The centroid is dropped, and coplanar triangle pairs merge into
    // quads: the cube itself comes back.
    assert_eq!(hull.vertex_count(), 8);
    assert_eq!(hull.edge_count(), 12);
    assert_eq!(hull.face_count(), 6);
    for f in hull.face_ids() {
        assert_eq!(hull.face(f).unwrap().half_edges().len(), 4);
    }
    assert!(hull.validate(EPSILON_SQUARED).is_sound());
    assert!(hull.contains_points(&points, EPSILON_SQUARED));
}

#[test]
fn duplicate_of_hull_vertex_is_skipped() {
    let mut points = regular_tetrahedron();
    points.push(points[0]);

    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());

    assert_eq!(pred, Degeneracy::None);
    assert_eq!(hull.vertex_count(), 4);
    assert_eq!(hull.edge_count(), 6);
    assert_eq!(hull.face_count(), 4);
    assert!(hull.validate(EPSILON_SQUARED).is_sound());
}

#[test]
fn octahedron_hull() {
    let points = vec![
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(-1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, -1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(0.0, 0.0, -1.0),
    ];
    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());

    assert_eq!(pred, Degeneracy::None);
    assert_eq!(hull.vertex_count(), 6);
    assert_eq!(hull.edge_count(), 12);
    assert_eq!(hull.face_count(), 8);
    assert!(hull.validate(EPSILON_SQUARED).is_sound());
}

#[test]
fn interior_points_are_dropped() {
    let mut points = regular_tetrahedron();
    // A handful of strictly interior points.
    points.push(Point3::new(0.0, 0.0, 0.0));
    points.push(Point3::new(0.1, 0.1, 0.1));
    points.push(Point3::new(-0.2, 0.05, 0.0));

    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull(&points, &HullParams::default());

    assert_eq!(pred, Degeneracy::None);
    assert_eq!(hull.vertex_count(), 4);
    assert!(hull.contains_points(&points, EPSILON_SQUARED));
}

#[test]
fn rehulling_a_hull_is_combinatorially_stable() {
    let points = scattered_points(64, 7);
    let mut hull = Manifold::new();
    assert_eq!(
        hull.find_convex_hull(&points, &HullParams::default()),
        Degeneracy::None
    );
    let report = hull.validate(EPSILON_SQUARED);
    assert!(report.is_sound(), "{report}");

    let hull_points = hull.points();
    let mut rehull = Manifold::new();
    assert_eq!(
        rehull.find_convex_hull(&hull_points, &HullParams::default()),
        Degeneracy::None
    );

    assert_eq!(rehull.vertex_count(), hull.vertex_count());
    assert_eq!(rehull.edge_count(), hull.edge_count());
    assert_eq!(rehull.face_count(), hull.face_count());
    assert!(rehull.validate(EPSILON_SQUARED).is_sound());
}

#[test]
fn scattered_cloud_invariants() {
    for seed in [1, 2, 3, 11] {
        let points = scattered_points(48, seed);
        let mut hull = Manifold::new();
        let pred = hull.find_convex_hull(&points, &HullParams::default());
        assert_eq!(pred, Degeneracy::None, "seed {seed}");

        let report = hull.validate(EPSILON_SQUARED);
        assert!(report.is_sound(), "seed {seed}: {report}");
        assert!(
            hull.contains_points(&points, 1e-6),
            "seed {seed}: input point escaped the hull"
        );
    }
}

#[test]
fn indexed_hull_preserves_caller_ids() {
    let points = regular_tetrahedron();
    let indices = [10, 20, 30, 40];
    let mut hull = Manifold::new();
    let pred = hull.find_convex_hull_indexed(&points, &indices, &HullParams::default());

    assert_eq!(pred, Degeneracy::None);
    let mut ids: Vec<i64> = hull.export_data().points.keys().copied().collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![10, 20, 30, 40]);
    for id in ids {
        assert!(hull.vertex_by_id(id).is_some());
    }
}

#[test]
fn hull_normals_point_outward() {
    let points = scattered_points(32, 5);
    let mut hull = Manifold::new();
    assert_eq!(
        hull.find_convex_hull(&points, &HullParams::default()),
        Degeneracy::None
    );

    let pts = hull.points();
    let centroid = Point3::from(
        pts.iter().map(|p| p.coords).sum::<nalgebra::Vector3<f64>>() / pts.len() as f64,
    );
    for f in hull.face_ids() {
        let face = hull.face(f).unwrap();
        let anchor = hull
            .half_edge(face.half_edges()[0])
            .map(|he| *hull.vertex(he.src()).unwrap().point())
            .unwrap();
        assert!((anchor - centroid).dot(face.normal()) > 0.0);
    }

    // Vertex normals are finalized too: unit length, outward.
    for v in hull.vertex_ids() {
        let vertex = hull.vertex(v).unwrap();
        assert!((vertex.normal().norm() - 1.0).abs() < 1e-9);
        assert!((vertex.point() - centroid).dot(vertex.normal()) > 0.0);
    }
}

#[test]
fn hull_feeds_obb() {
    let points = unit_cube_corners();
    let mut hull = Manifold::new();
    assert_eq!(
        hull.find_convex_hull(&points, &HullParams::default()),
        Degeneracy::None
    );

    let obb = find_obb_3d(&hull).unwrap();
    assert!((obb.volume - 1.0).abs() < 1e-9);
    assert!(obb.box_manifold.contains_points(&points, 1e-6));
}
