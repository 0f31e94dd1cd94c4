//! Manifold validation and reporting.

use nalgebra::Point3;
use slotmap::Key;
use tracing::debug;

use crate::manifold::Manifold;
use crate::types::Degeneracy;

/// Validation report for a finished hull manifold.
///
/// Captures the invariants a clean convex manifold must satisfy: every
/// face cycle closed, buddy pointers involutive, every surviving edge
/// convex, no 2-cycle faces, no vertex below degree 3.
#[derive(Debug, Clone)]
pub struct HullReport {
    /// Total vertex count.
    pub vertex_count: usize,

    /// Total edge count.
    pub edge_count: usize,

    /// Total face count.
    pub face_count: usize,

    /// Every face's `next` walk returns to its start after exactly the
    /// cycle length, and every half-edge's face pointer agrees.
    pub cycles_closed: bool,

    /// `buddy(buddy(h)) == h` and `src(h) == dst(buddy(h))` for all `h`.
    pub buddies_involutive: bool,

    /// `(v2 - v1) · (n1 × n2) > -ε` holds at every edge.
    pub is_convex: bool,

    /// Faces bounded by fewer than three edges.
    pub short_cycle_faces: usize,

    /// Vertices of undirected degree below three.
    pub degree_deficient_vertices: usize,

    /// `V - E + F`; 2 for a sphere-topology boundary.
    pub euler_characteristic: i64,
}

impl HullReport {
    /// Whether every checked invariant holds.
    pub fn is_sound(&self) -> bool {
        self.cycles_closed
            && self.buddies_involutive
            && self.is_convex
            && self.short_cycle_faces == 0
            && self.degree_deficient_vertices == 0
            && self.euler_characteristic == 2
    }
}

impl std::fmt::Display for HullReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Hull Report:")?;
        writeln!(
            f,
            "  Vertices: {}  Edges: {}  Faces: {}",
            self.vertex_count, self.edge_count, self.face_count
        )?;
        writeln!(f, "  Euler characteristic: {}", self.euler_characteristic)?;
        writeln!(
            f,
            "  Cycles closed: {}",
            if self.cycles_closed { "yes" } else { "NO" }
        )?;
        writeln!(
            f,
            "  Buddies involutive: {}",
            if self.buddies_involutive { "yes" } else { "NO" }
        )?;
        writeln!(
            f,
            "  Convex: {}",
            if self.is_convex { "yes" } else { "NO" }
        )?;
        writeln!(f, "  Short-cycle faces: {}", self.short_cycle_faces)?;
        writeln!(
            f,
            "  Degree-deficient vertices: {}",
            self.degree_deficient_vertices
        )
    }
}

impl Manifold {
    /// Checks the clean-convex-manifold invariants and returns a report.
    pub fn validate(&self, epsilon: f64) -> HullReport {
        let mut cycles_closed = true;
        for (f, face) in &self.faces {
            if face.half_edges.is_empty() {
                cycles_closed = false;
                continue;
            }
            let mut h = face.half_edges[0];
            for _ in 0..face.half_edges.len() {
                let Some(he) = self.half_edges.get(h) else {
                    cycles_closed = false;
                    break;
                };
                if he.face != f {
                    cycles_closed = false;
                }
                h = he.next;
            }
            if h != face.half_edges[0] {
                cycles_closed = false;
            }
        }

        let mut buddies_involutive = true;
        for (h, he) in &self.half_edges {
            match self.half_edges.get(he.buddy) {
                Some(buddy) if buddy.buddy == h && buddy.src == he.dst && buddy.dst == he.src => {}
                _ => buddies_involutive = false,
            }
        }

        let mut is_convex = true;
        for edge in self.edges.values() {
            let he1 = &self.half_edges[edge.he1];
            let he2 = &self.half_edges[edge.he2];
            if he1.face.is_null() || he2.face.is_null() {
                is_convex = false;
                continue;
            }
            let n1 = self.faces[he1.face].normal;
            let n2 = self.faces[he2.face].normal;
            let v12 = self.vertices[he2.src].point - self.vertices[he1.src].point;
            if v12.dot(&n1.cross(&n2)) <= -epsilon {
                is_convex = false;
            }
        }

        let short_cycle_faces = self
            .faces
            .values()
            .filter(|f| f.half_edges.len() < 3)
            .count();
        let degree_deficient_vertices = self
            .vertices
            .values()
            .filter(|v| v.incident.len() < 6)
            .count();

        let report = HullReport {
            vertex_count: self.vertex_count(),
            edge_count: self.edge_count(),
            face_count: self.face_count(),
            cycles_closed,
            buddies_involutive,
            is_convex,
            short_cycle_faces,
            degree_deficient_vertices,
            euler_characteristic: self.vertex_count() as i64 - self.edge_count() as i64
                + self.face_count() as i64,
        };
        if !report.is_sound() {
            debug!(%report, "manifold failed validation");
        }
        report
    }

    /// Convex-hull containment: `true` when no point of `points` lies
    /// strictly in front of any face beyond the coplanar tolerance.
    pub fn contains_points(&self, points: &[Point3<f64>], epsilon: f64) -> bool {
        for p in points {
            for f in self.faces.keys() {
                let (facing, pred) = self.face_is_facing(f, p, epsilon);
                if facing && pred == Degeneracy::None {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_SQUARED;

    #[test]
    fn cuboid_is_sound() {
        let mut m = Manifold::new();
        m.construct_cuboid([
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(0.0, 1.0, 2.0),
            Point3::new(3.0, 1.0, 2.0),
            Point3::new(3.0, 0.0, 2.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ]);
        let report = m.validate(EPSILON_SQUARED);
        assert!(report.is_sound(), "{report}");
        assert_eq!(report.euler_characteristic, 2);
        assert!(m.contains_points(&m.points(), EPSILON_SQUARED));
    }

    #[test]
    fn report_flags_outside_point() {
        let mut m = Manifold::new();
        m.construct_cuboid([
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ]);
        assert!(!m.contains_points(&[Point3::new(5.0, 5.0, 5.0)], EPSILON_SQUARED));
    }
}
