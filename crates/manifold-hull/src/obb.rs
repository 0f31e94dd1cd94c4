//! Oriented bounding boxes for convex hull manifolds.
//!
//! For each hull face normal, the point set is rotated into a frame with
//! that normal along X, reduced to its 2D convex hull in the YZ plane,
//! and scanned with a rotating-edge 2D bounding box; the frame with the
//! smallest box volume wins. The winning box is emitted as a six-face
//! cuboid manifold alongside its axes, center, extents, and volume.

use nalgebra::{Matrix3, Point3, Vector3};
use tracing::debug;

use crate::hull2d::convex_hull_2d_yz;
use crate::manifold::{normalized_safe, Manifold};
use crate::types::EPSILON_SQUARED;

/// Result of an oriented-bounding-box search.
#[derive(Debug)]
pub struct OrientedBoundingBox {
    /// The box itself, as a six-face cuboid manifold.
    pub box_manifold: Manifold,

    /// Box axes as matrix columns, in the hull's coordinate system.
    pub axes: Matrix3<f64>,

    /// Center of the box.
    pub center: Point3<f64>,

    /// Side lengths along the three axes.
    pub extents: Vector3<f64>,

    /// Box volume.
    pub volume: f64,
}

/// Minimal 2D bounding rectangle of a convex polygon in the YZ plane,
/// found by rotating a frame along each polygon edge.
struct Obb2d {
    axis1: Vector3<f64>,
    axis2: Vector3<f64>,
    lower_left: Vector3<f64>,
    upper_left: Vector3<f64>,
    upper_right: Vector3<f64>,
    lower_right: Vector3<f64>,
    extent1: f64,
    extent2: f64,
    area: f64,
}

fn find_obb_2d(ch: &[Vector3<f64>]) -> Option<Obb2d> {
    let mut best: Option<Obb2d> = None;

    for i in 0..ch.len() {
        let j = (i + 1) % ch.len();
        let ax0 = Vector3::x();
        let mut ax1 = ch[i] - ch[j];
        ax1.x = 0.0;
        if ax1.norm_squared() < EPSILON_SQUARED {
            continue;
        }
        ax1 = normalized_safe(ax1);
        let ax2 = Vector3::new(0.0, -ax1.z, ax1.y);
        let m_inv = Matrix3::from_columns(&[ax0, ax1, ax2]);
        let m_rot = m_inv.transpose();

        let mut p_min = m_rot * ch[0];
        let mut p_max = p_min;
        for p in &ch[1..] {
            let rot = m_rot * *p;
            p_min.y = p_min.y.min(rot.y);
            p_min.z = p_min.z.min(rot.z);
            p_max.y = p_max.y.max(rot.y);
            p_max.z = p_max.z.max(rot.z);
        }

        let area = (p_max.y - p_min.y) * (p_max.z - p_min.z);
        if best.as_ref().is_none_or(|b| area < b.area) {
            best = Some(Obb2d {
                axis1: ax1,
                axis2: ax2,
                lower_left: m_inv * Vector3::new(0.0, p_max.y, p_min.z),
                upper_left: m_inv * Vector3::new(0.0, p_max.y, p_max.z),
                upper_right: m_inv * Vector3::new(0.0, p_min.y, p_max.z),
                lower_right: m_inv * Vector3::new(0.0, p_min.y, p_min.z),
                extent1: p_max.y - p_min.y,
                extent2: p_max.z - p_min.z,
                area,
            });
        }
    }
    best
}

/// Orthonormal frame with `n` along X, chosen against the world axis
/// that crosses `n` most stably.
fn rotation_frame_from_normal(n: &Vector3<f64>) -> Matrix3<f64> {
    let crosses = [
        Vector3::x().cross(n),
        Vector3::y().cross(n),
        Vector3::z().cross(n),
    ];
    let mut pick = 0;
    for (i, c) in crosses.iter().enumerate() {
        if c.norm_squared() > crosses[pick].norm_squared() {
            pick = i;
        }
    }
    let a = normalized_safe(crosses[pick]);
    let b = normalized_safe(n.cross(&a));
    Matrix3::from_columns(&[*n, a, b]).transpose()
}

/// Finds the oriented bounding box of a convex hull manifold.
///
/// Candidate orientations are the hull's face normals; the best (least
/// volume) candidate is returned. `None` when the hull has no vertices.
pub fn find_obb_3d(convex_hull: &Manifold) -> Option<OrientedBoundingBox> {
    let points = convex_hull.points();
    if points.is_empty() {
        return None;
    }
    let face_normals = convex_hull.face_normals();

    struct Candidate {
        volume: f64,
        axes: Matrix3<f64>,
        extents: Vector3<f64>,
        corners: [Vector3<f64>; 8],
    }
    let mut best: Option<Candidate> = None;

    for n in &face_normals {
        let m_rot = rotation_frame_from_normal(n);
        let rotated: Vec<Point3<f64>> =
            points.iter().map(|p| Point3::from(m_rot * p.coords)).collect();

        let mut x_min = rotated[0].x;
        let mut x_max = rotated[0].x;
        for p in &rotated[1..] {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
        }

        let hull_yz: Vec<Vector3<f64>> = convex_hull_2d_yz(&rotated)
            .into_iter()
            .map(|i| rotated[i].coords)
            .collect();
        let Some(obb2d) = find_obb_2d(&hull_yz) else {
            continue;
        };

        let volume = obb2d.area * (x_max - x_min);
        if best.as_ref().is_none_or(|b| volume < b.volume) {
            let m_inv = m_rot.transpose();

            let with_x = |corner: Vector3<f64>, x: f64| {
                let mut c = corner;
                c.x = x;
                m_inv * c
            };
            let corners = [
                with_x(obb2d.lower_right, x_min), // front lower left
                with_x(obb2d.upper_right, x_min), // front upper left
                with_x(obb2d.upper_right, x_max), // front upper right
                with_x(obb2d.lower_right, x_max), // front lower right
                with_x(obb2d.lower_left, x_min),  // back lower left
                with_x(obb2d.upper_left, x_min),  // back upper left
                with_x(obb2d.upper_left, x_max),  // back upper right
                with_x(obb2d.lower_left, x_max),  // back lower right
            ];

            best = Some(Candidate {
                volume,
                axes: Matrix3::from_columns(&[*n, m_inv * obb2d.axis1, m_inv * obb2d.axis2]),
                extents: Vector3::new(x_max - x_min, obb2d.extent1, obb2d.extent2),
                corners,
            });
        }
    }

    let best = best?;
    debug!(volume = best.volume, "oriented bounding box selected");

    let mut box_manifold = Manifold::new();
    box_manifold.construct_cuboid(best.corners.map(Point3::from));

    let mut center = Vector3::zeros();
    for c in &best.corners {
        center += c;
    }
    center /= 8.0;

    Some(OrientedBoundingBox {
        box_manifold,
        axes: best.axes,
        center: Point3::from(center),
        extents: best.extents,
        volume: best.volume,
    })
}
