//! Incremental randomized convex hull construction.
//!
//! The algorithm follows de Berg et al., "Computational Geometry:
//! Algorithms and Applications", ch. 11: seed a tetrahedron from four
//! extremal points, track point/face visibility in a conflict graph, and
//! incorporate one point at a time by excising its visible faces and
//! fanning new triangles around the hole, repairing coplanar/concave
//! degeneracies after every step.

use nalgebra::Point3;
use tracing::{debug, trace};

use crate::conflict::ConflictGraph;
use crate::graph::NodeId;
use crate::manifold::Manifold;
use crate::types::{Degeneracy, EdgeId, FaceId, HalfEdgeId, HullParams, VertexId, EPSILON_SQUARED};

/// Per-frontier-edge snapshot of the points that were visible to either
/// face adjacent to the edge before the excision. This is a superset of
/// the points visible to the new triangle built over that edge, so the
/// conflict graph never re-tests the full remaining point set.
pub(crate) struct FrontierElem {
    pub he: HalfEdgeId,
    pub facing: Vec<NodeId>,
}

/// Driver state for one hull-finding run: the manifold being built, the
/// conflict graph, and the repair worklists.
pub(crate) struct HullDriver<'a> {
    pub m: &'a mut Manifold,
    pub conflicts: ConflictGraph,
    pub epsilon: f64,
    pub edge_queue: Vec<EdgeId>,
    pub vertex_queue: Vec<VertexId>,
}

impl Manifold {
    /// Computes the convex hull of `points` into this manifold.
    ///
    /// Returns [`Degeneracy::None`] on success; any other value means no
    /// hull was built and the manifold holds whatever partial state
    /// existed at abort. Points are assigned ids `0..len`.
    ///
    /// # Example
    ///
    /// ```
    /// use manifold_hull::{Degeneracy, HullParams, Manifold};
    /// use nalgebra::Point3;
    ///
    /// let points = vec![
    ///     Point3::new(1.0, 1.0, 1.0),
    ///     Point3::new(1.0, -1.0, -1.0),
    ///     Point3::new(-1.0, 1.0, -1.0),
    ///     Point3::new(-1.0, -1.0, 1.0),
    /// ];
    /// let mut hull = Manifold::new();
    /// let pred = hull.find_convex_hull(&points, &HullParams::default());
    /// assert_eq!(pred, Degeneracy::None);
    /// assert_eq!(hull.face_count(), 4);
    /// ```
    pub fn find_convex_hull(&mut self, points: &[Point3<f64>], params: &HullParams) -> Degeneracy {
        let indices: Vec<i64> = (0..points.len() as i64).collect();
        self.find_convex_hull_indexed(points, &indices, params)
    }

    /// Like [`Manifold::find_convex_hull`], with caller-supplied ids for
    /// the input points.
    pub fn find_convex_hull_indexed(
        &mut self,
        points: &[Point3<f64>],
        indices: &[i64],
        params: &HullParams,
    ) -> Degeneracy {
        assert_eq!(
            points.len(),
            indices.len(),
            "every point needs exactly one id"
        );
        debug!(points = points.len(), "finding convex hull");
        self.clear();

        if points.len() < 4 {
            return Degeneracy::MaybeFlat;
        }

        let picks = match analyze_points(points, params.epsilon) {
            Ok(picks) => picks,
            Err(pred) => return pred,
        };
        let [i1, i2, i3, i4] = picks;

        self.construct_3_simplex(
            &points[i1],
            &points[i2],
            &points[i3],
            &points[i4],
            [indices[i1], indices[i2], indices[i3], indices[i4]],
        );
        trace!(
            v = self.vertex_count(),
            e = self.edge_count(),
            f = self.face_count(),
            "initial 3-simplex"
        );

        let mut reduced_points = Vec::with_capacity(points.len() - 4);
        let mut reduced_indices = Vec::with_capacity(points.len() - 4);
        for i in 0..points.len() {
            if i != i1 && i != i2 && i != i3 && i != i4 {
                reduced_points.push(points[i]);
                reduced_indices.push(indices[i]);
            }
        }

        let mut driver = HullDriver {
            m: self,
            conflicts: ConflictGraph::new(),
            epsilon: params.epsilon,
            edge_queue: Vec::new(),
            vertex_queue: Vec::new(),
        };

        let vertices = driver.create_initial_conflict_graph(&reduced_points, &reduced_indices);

        for vc in vertices {
            if driver.conflicts.degree_in(vc) > 0 {
                if let Some(visible) = driver.find_visible_faces(vc) {
                    let (p, id) = {
                        let pc = driver.conflicts.point(vc);
                        (pc.point, pc.id)
                    };
                    if let Some((apex, frontier)) = driver.update_faces(&p, id, &visible) {
                        driver.update_conflict_graph(&frontier);
                        driver.check_and_merge_faces_ccw(apex);
                    }
                }
            } else {
                trace!("point inside the current hull, dropped");
            }
            driver.conflicts.remove_node(vc);
        }

        driver.conflicts.clear();

        self.set_normals_from_faces();
        self.construct_helper_maps();
        debug!(
            v = self.vertex_count(),
            e = self.edge_count(),
            f = self.face_count(),
            "convex hull finished"
        );
        Degeneracy::None
    }
}

/// Principal-component-style extremal point selection for the initial
/// simplex.
///
/// The axis is the normalized per-axis variance direction of the point
/// cloud; the four picks are the two extremal points along it, the point
/// furthest from their joining line, and the point furthest from the
/// plane of the first three. Colinear and coplanar inputs are reported
/// as such when the respective furthest distance is within tolerance.
pub(crate) fn analyze_points(
    points: &[Point3<f64>],
    epsilon: f64,
) -> Result<[usize; 4], Degeneracy> {
    let mut mean = nalgebra::Vector3::zeros();
    for p in points {
        mean += p.coords;
    }
    mean /= points.len() as f64;
    let mut variance = nalgebra::Vector3::zeros();
    for p in points {
        let d = p.coords - mean;
        variance += nalgebra::Vector3::new(d.x * d.x, d.y * d.y, d.z * d.z);
    }
    let ax1 = crate::manifold::normalized_safe(variance);

    // Two extremal points along the variance axis.
    let mut x_min = ax1.dot(&points[0].coords);
    let mut x_max = x_min;
    let mut x_min_index = 0usize;
    let mut x_max_index = 0usize;
    for (i, p) in points.iter().enumerate().skip(1) {
        let dot = ax1.dot(&p.coords);
        if dot < x_min {
            x_min = dot;
            x_min_index = i;
        }
        if dot > x_max {
            x_max = dot;
            x_max_index = i;
        }
    }

    let p1 = points[x_min_index];
    let p2 = points[x_max_index];
    let ax2 = p2 - p1;
    if ax2.norm_squared() < EPSILON_SQUARED {
        debug!("all points coincident within tolerance");
        return Err(Degeneracy::MaybeColinear);
    }

    // The point furthest from the line (p1, p2).
    let mut y_abs_max = 0.0;
    let mut y_abs_max_index = None;
    for (i, p) in points.iter().enumerate() {
        if i == x_min_index || i == x_max_index {
            continue;
        }
        let v1 = p - p1;
        let v2 = p - p2;
        if v1.norm_squared() < EPSILON_SQUARED || v2.norm_squared() < EPSILON_SQUARED {
            continue;
        }
        let sin_dist = ax2.cross(&v1).norm_squared();
        if y_abs_max_index.is_none() || sin_dist > y_abs_max {
            y_abs_max = sin_dist;
            y_abs_max_index = Some(i);
        }
    }
    let line_dist_sq = y_abs_max / ax2.norm_squared();
    let Some(y_abs_max_index) = y_abs_max_index.filter(|_| line_dist_sq >= epsilon) else {
        debug!("all points on an edge");
        return Err(Degeneracy::MaybeColinear);
    };

    // The point furthest from the plane (p1, p2, p3).
    let p3 = points[y_abs_max_index];
    let ax3 = ax2.cross(&(p3 - p1));
    let mut z_abs_max = 0.0;
    let mut z_abs_max_index = None;
    for (i, p) in points.iter().enumerate() {
        if i == x_min_index || i == x_max_index || i == y_abs_max_index {
            continue;
        }
        let v1 = p - p1;
        let v2 = p - p2;
        let v3 = p - p3;
        if v1.norm_squared() < EPSILON_SQUARED
            || v2.norm_squared() < EPSILON_SQUARED
            || v3.norm_squared() < EPSILON_SQUARED
        {
            continue;
        }
        let dot = ax3.dot(&v1).abs();
        if z_abs_max_index.is_none() || dot > z_abs_max {
            z_abs_max = dot;
            z_abs_max_index = Some(i);
        }
    }
    let plane_dist_sq = (z_abs_max * z_abs_max) / ax3.norm_squared();
    let Some(z_abs_max_index) = z_abs_max_index.filter(|_| plane_dist_sq >= epsilon) else {
        debug!("all points on a plane");
        return Err(Degeneracy::MaybeCoplanar);
    };

    Ok([x_min_index, x_max_index, y_abs_max_index, z_abs_max_index])
}

impl HullDriver<'_> {
    /// Seeds the conflict graph: one node per initial face, and for each
    /// remaining point a node (created lazily, only if some face sees
    /// it) plus one visibility arc per strictly-facing face.
    pub(crate) fn create_initial_conflict_graph(
        &mut self,
        points: &[Point3<f64>],
        indices: &[i64],
    ) -> Vec<NodeId> {
        let face_ids: Vec<FaceId> = self.m.face_ids().collect();
        for &f in &face_ids {
            self.conflicts.insert_face(f);
        }

        let mut vertices = Vec::new();
        for (i, p) in points.iter().enumerate() {
            let mut point_node = None;
            for &f in &face_ids {
                let (facing, pred) = self.m.face_is_facing(f, p, self.epsilon);
                if facing && pred == Degeneracy::None {
                    let vc = match point_node {
                        Some(vc) => vc,
                        None => {
                            let vc = self.conflicts.insert_point(*p, indices[i]);
                            vertices.push(vc);
                            point_node = Some(vc);
                            vc
                        }
                    };
                    let fnode = self
                        .conflicts
                        .face_node(f)
                        .expect("initial faces all have conflict nodes");
                    self.conflicts.link_visible(fnode, vc);
                }
            }
        }
        vertices
    }

    /// The faces currently visible from a point, from its in-arcs.
    ///
    /// Returns `None` when the point sits within tolerance of a vertex
    /// or boundary edge of a visible face; such a point cannot be
    /// incorporated cleanly and is dropped as coincident.
    pub(crate) fn find_visible_faces(&mut self, vc: NodeId) -> Option<Vec<FaceId>> {
        let p = self.conflicts.point(vc).point;
        let mut faces = Vec::new();
        for fnode in self.conflicts.visible_faces(vc) {
            let f = self.conflicts.face_of(fnode);
            if self.vertex_is_too_close_to_face(&p, f) {
                debug!(face = self.m.face(f).map(|f| f.id()), "point too close to a visible face, dropped");
                return None;
            }
            faces.push(f);
        }
        Some(faces)
    }

    /// Whether `p` is within tolerance of a vertex of `f`, or lies
    /// near-colinearly within one of `f`'s boundary segments.
    fn vertex_is_too_close_to_face(&self, p: &Point3<f64>, f: FaceId) -> bool {
        let face = &self.m.faces[f];
        for &h in &face.half_edges {
            let he = &self.m.half_edges[h];
            let p_src = self.m.vertices[he.src].point;
            let p_dst = self.m.vertices[he.dst].point;

            if (p - p_src).norm_squared() < self.epsilon {
                return true;
            }

            let v12 = p_dst - p_src;
            let v1t = p - p_src;
            let cr = crate::manifold::normalized_safe(v12).cross(&crate::manifold::normalized_safe(v1t));
            if cr.norm_squared() < self.epsilon
                && v12.dot(&v1t) > 0.0
                && v1t.norm_squared() < v12.norm_squared()
            {
                return true;
            }
        }
        false
    }

    /// Excises the visible faces and fans new triangles from the hole
    /// boundary to the new point.
    ///
    /// Returns the apex vertex and the per-frontier-edge visibility
    /// snapshots, or `None` (mesh untouched) when the visible set is not
    /// a simply-connected disk.
    pub(crate) fn update_faces(
        &mut self,
        p: &Point3<f64>,
        id: i64,
        visible: &[FaceId],
    ) -> Option<(VertexId, Vec<FrontierElem>)> {
        let frontier_half_edges = self.m.find_circumference(visible)?;

        // Snapshot conflict info of the dying faces before removing them.
        let frontier = self.make_frontier(&frontier_half_edges);

        for &f in visible {
            self.conflicts.remove_face(f);
        }
        self.m.remove_faces(visible);

        let apex = self.m.make_circular_fan(&frontier_half_edges, p, Some(id));
        Some((apex, frontier))
    }

    /// For each frontier half-edge, gathers the union of points visible
    /// to its two adjacent faces, deduplicated through the transient
    /// `found` flag.
    fn make_frontier(&mut self, half_edges: &[HalfEdgeId]) -> Vec<FrontierElem> {
        let mut elements = Vec::with_capacity(half_edges.len());

        for &he in half_edges {
            let mut facing = Vec::new();

            let f1 = self.m.half_edges[he].face;
            let fc1 = self
                .conflicts
                .face_node(f1)
                .expect("visible faces have conflict nodes");
            let inner = self.conflicts.visible_points(fc1);
            for &vc in &inner {
                self.conflicts.point_mut(vc).found = true;
                facing.push(vc);
            }

            let buddy = self.m.half_edges[he].buddy;
            let f2 = self.m.half_edges[buddy].face;
            let fc2 = self
                .conflicts
                .face_node(f2)
                .expect("hull faces have conflict nodes");
            for vc in self.conflicts.visible_points(fc2) {
                if !self.conflicts.point(vc).found {
                    facing.push(vc);
                }
            }

            for &vc in &inner {
                self.conflicts.point_mut(vc).found = false;
            }

            elements.push(FrontierElem { he, facing });
        }
        elements
    }

    /// Creates conflict nodes for the freshly fanned faces and re-tests
    /// only each frontier element's saved superset of candidate points.
    pub(crate) fn update_conflict_graph(&mut self, frontier: &[FrontierElem]) {
        for fe in frontier {
            let f = self.m.half_edges[fe.he].face;
            let fnode = self.conflicts.insert_face(f);

            for &vc in &fe.facing {
                if !self.conflicts.contains(vc) {
                    continue;
                }
                let p = self.conflicts.point(vc).point;
                let (facing, pred) = self.m.face_is_facing(f, &p, self.epsilon);
                if facing && pred == Degeneracy::None {
                    self.conflicts.link_visible(fnode, vc);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_rejects_colinear() {
        let points: Vec<Point3<f64>> = (0..6).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        assert_eq!(
            analyze_points(&points, EPSILON_SQUARED),
            Err(Degeneracy::MaybeColinear)
        );
    }

    #[test]
    fn analyze_rejects_coplanar() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.3, 0.7, 0.0),
        ];
        assert_eq!(
            analyze_points(&points, EPSILON_SQUARED),
            Err(Degeneracy::MaybeCoplanar)
        );
    }

    #[test]
    fn analyze_rejects_coincident_cloud() {
        let points = vec![Point3::new(0.5, 0.5, 0.5); 8];
        assert!(analyze_points(&points, EPSILON_SQUARED).is_err());
    }

    #[test]
    fn analyze_picks_four_distinct_spanning_points() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
            Point3::new(1.0, 1.0, 4.0),
            Point3::new(1.0, 0.5, 0.5),
        ];
        let picks = analyze_points(&points, EPSILON_SQUARED).unwrap();
        let mut sorted = picks.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4, "picks must be distinct");
        // The interior-ish point must not be picked.
        assert!(!picks.contains(&4));
    }
}
