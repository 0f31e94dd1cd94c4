//! Half-edge manifold: the doubly-connected edge list for a closed
//! polytope boundary.
//!
//! A [`Manifold`] owns every [`Vertex`], [`HalfEdge`], [`Edge`], and
//! [`Face`] it contains. Entities are stored in arenas and referenced by
//! generation-checked keys; a handle held across a structural mutation
//! stops resolving rather than dangling.
//!
//! Orientation conventions, everywhere:
//!
//! - A face's half-edge cycle is counter-clockwise when viewed from
//!   outside the manifold, so face normals point outward.
//! - A vertex's incident half-edge list is counter-clockwise when the
//!   vertex is viewed from outside, with two entries per incident edge
//!   (incoming half-edge first, then its outgoing buddy).

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use slotmap::{Key, SlotMap};
use tracing::warn;

use crate::types::{
    Degeneracy, EdgeId, FaceId, HalfEdgeId, VertexId, EPSILON_ANGLE, EPSILON_SQUARED,
};

/// Normalizes a vector unless it is shorter than the coincidence
/// tolerance, in which case it is returned unchanged.
#[inline]
pub(crate) fn normalized_safe(v: Vector3<f64>) -> Vector3<f64> {
    let s = v.norm_squared();
    if s >= EPSILON_SQUARED {
        v / s.sqrt()
    } else {
        v
    }
}

/// Normal of the triangle `p1 → p2 → p3` (counter-clockwise seen from the
/// normal side), with a colinearity predicate when the cross product is
/// too short to trust.
pub(crate) fn triangle_normal(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
) -> (Vector3<f64>, Degeneracy) {
    let n = (p3 - p2).cross(&(p1 - p2));
    let pred = if n.norm_squared() < EPSILON_ANGLE {
        Degeneracy::MaybeColinear
    } else {
        Degeneracy::None
    };
    (normalized_safe(n), pred)
}

/// A vertex of the manifold: a 3D point plus its ordered incidence.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) point: Point3<f64>,
    pub(crate) normal: Vector3<f64>,
    /// Incident half-edges, CCW seen from outside; two entries per edge.
    pub(crate) incident: Vec<HalfEdgeId>,
    pub(crate) id: i64,
    pub(crate) generation: u64,
    /// Scratch map face-id → count, used to locate a face from vertices.
    pub(crate) face_counts: HashMap<i64, i64>,
    /// Queued on the degree-2 removal worklist.
    pub(crate) pending_removal: bool,
}

impl Vertex {
    fn new(point: Point3<f64>) -> Self {
        Self {
            point,
            normal: Vector3::zeros(),
            incident: Vec::new(),
            id: -1,
            generation: 0,
            face_counts: HashMap::new(),
            pending_removal: false,
        }
    }

    /// Position in the manifold's local coordinate system.
    #[inline]
    pub fn point(&self) -> &Point3<f64> {
        &self.point
    }

    /// Outward normal, averaged from incident faces at finalization.
    #[inline]
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Integer id of this vertex.
    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Incident half-edges, counter-clockwise seen from outside. Each
    /// incident edge contributes two consecutive entries.
    #[inline]
    pub fn half_edges(&self) -> &[HalfEdgeId] {
        &self.incident
    }

    /// Undirected degree of this vertex.
    #[inline]
    pub fn degree(&self) -> usize {
        self.incident.len() / 2
    }

    /// Generation stamp (caller-managed scratch).
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Updates the generation stamp.
    #[inline]
    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }
}

/// One directed traversal of an [`Edge`].
#[derive(Debug, Clone)]
pub struct HalfEdge {
    pub(crate) src: VertexId,
    pub(crate) dst: VertexId,
    pub(crate) buddy: HalfEdgeId,
    pub(crate) prev: HalfEdgeId,
    pub(crate) next: HalfEdgeId,
    /// Incident face; null while detached.
    pub(crate) face: FaceId,
    /// Owning edge.
    pub(crate) edge: EdgeId,
    /// Transient marker used by circumference walks.
    pub(crate) in_removal_set: bool,
}

impl HalfEdge {
    /// Source vertex.
    #[inline]
    pub fn src(&self) -> VertexId {
        self.src
    }

    /// Destination vertex.
    #[inline]
    pub fn dst(&self) -> VertexId {
        self.dst
    }

    /// The reverse traversal of the same edge.
    #[inline]
    pub fn buddy(&self) -> HalfEdgeId {
        self.buddy
    }

    /// Previous half-edge around the incident face.
    #[inline]
    pub fn prev(&self) -> HalfEdgeId {
        self.prev
    }

    /// Next half-edge around the incident face.
    #[inline]
    pub fn next(&self) -> HalfEdgeId {
        self.next
    }

    /// Incident face, or `None` while detached.
    #[inline]
    pub fn face(&self) -> Option<FaceId> {
        if self.face.is_null() {
            None
        } else {
            Some(self.face)
        }
    }

    /// Owning edge.
    #[inline]
    pub fn edge(&self) -> EdgeId {
        self.edge
    }
}

/// An undirected edge owning its two half-edges.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) he1: HalfEdgeId,
    pub(crate) he2: HalfEdgeId,
    pub(crate) normal: Vector3<f64>,
    /// `MaybeCoincident` when the endpoints are closer than tolerance.
    pub(crate) vertex_pred: Degeneracy,
    /// Coplanarity classification between the two incident faces.
    pub(crate) face_pred: Degeneracy,
    /// Queued on the merge/removal worklist.
    pub(crate) pending_removal: bool,
    /// Transient marker for dedup scans.
    pub(crate) found: bool,
}

impl Edge {
    fn new() -> Self {
        Self {
            he1: HalfEdgeId::null(),
            he2: HalfEdgeId::null(),
            normal: Vector3::zeros(),
            vertex_pred: Degeneracy::None,
            face_pred: Degeneracy::None,
            pending_removal: false,
            found: false,
        }
    }

    /// The two half-edges of this edge.
    #[inline]
    pub fn half_edges(&self) -> (HalfEdgeId, HalfEdgeId) {
        (self.he1, self.he2)
    }

    /// Bisector normal of the two incident face normals.
    #[inline]
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Degeneracy classification of the endpoint pair.
    #[inline]
    pub fn vertex_predicate(&self) -> Degeneracy {
        self.vertex_pred
    }

    /// Coplanarity classification of the incident face pair.
    #[inline]
    pub fn face_predicate(&self) -> Degeneracy {
        self.face_pred
    }
}

/// A face: a closed CCW cycle of half-edges with an outward normal.
#[derive(Debug, Clone)]
pub struct Face {
    pub(crate) id: i64,
    pub(crate) normal: Vector3<f64>,
    pub(crate) half_edges: Vec<HalfEdgeId>,
    /// `MaybeFlat` when normal finding detected a degenerate shape.
    pub(crate) pred: Degeneracy,
}

impl Face {
    /// Integer id of this face.
    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Outward unit normal.
    #[inline]
    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    /// Boundary half-edges, counter-clockwise seen from outside.
    #[inline]
    pub fn half_edges(&self) -> &[HalfEdgeId] {
        &self.half_edges
    }

    /// Shape degeneracy classification.
    #[inline]
    pub fn predicate(&self) -> Degeneracy {
        self.pred
    }
}

/// Owning container for a closed polytope boundary.
#[derive(Debug, Default)]
pub struct Manifold {
    pub(crate) id: i64,
    pub(crate) vertices: SlotMap<VertexId, Vertex>,
    pub(crate) half_edges: SlotMap<HalfEdgeId, HalfEdge>,
    pub(crate) edges: SlotMap<EdgeId, Edge>,
    pub(crate) faces: SlotMap<FaceId, Face>,
    /// Next integer id handed to a created feature.
    pub(crate) next_feature_id: i64,
    pub(crate) vertex_by_id: HashMap<i64, VertexId>,
    pub(crate) edge_by_vertex_ids: HashMap<(i64, i64), EdgeId>,
    pub(crate) face_by_id: HashMap<i64, FaceId>,
}

impl Manifold {
    /// Creates an empty manifold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets this manifold to the initial empty state.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.half_edges.clear();
        self.edges.clear();
        self.faces.clear();
        self.next_feature_id = 0;
        self.vertex_by_id.clear();
        self.edge_by_vertex_ids.clear();
        self.face_by_id.clear();
    }

    /// Integer id of this manifold.
    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Sets the integer id of this manifold.
    #[inline]
    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Number of live vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of live faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Borrow a vertex.
    pub fn vertex(&self, v: VertexId) -> Option<&Vertex> {
        self.vertices.get(v)
    }

    /// Borrow a half-edge.
    pub fn half_edge(&self, h: HalfEdgeId) -> Option<&HalfEdge> {
        self.half_edges.get(h)
    }

    /// Borrow an edge.
    pub fn edge(&self, e: EdgeId) -> Option<&Edge> {
        self.edges.get(e)
    }

    /// Borrow a face.
    pub fn face(&self, f: FaceId) -> Option<&Face> {
        self.faces.get(f)
    }

    /// Iterator over live vertex handles.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys()
    }

    /// Iterator over live edge handles.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    /// Iterator over live face handles.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys()
    }

    /// All vertex positions, in arena order.
    pub fn points(&self) -> Vec<Point3<f64>> {
        self.vertices.values().map(|v| v.point).collect()
    }

    /// All face normals, in arena order.
    pub fn face_normals(&self) -> Vec<Vector3<f64>> {
        self.faces.values().map(|f| f.normal).collect()
    }

    /// Vertices around a face, in the boundary cycle order.
    pub fn face_vertices(&self, f: FaceId) -> Vec<VertexId> {
        self.faces
            .get(f)
            .map(|face| {
                face.half_edges
                    .iter()
                    .map(|&h| self.half_edges[h].src)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Endpoint ids of an edge, smaller id first.
    pub fn edge_vertex_ids(&self, e: EdgeId) -> Option<(i64, i64)> {
        let edge = self.edges.get(e)?;
        let he = self.half_edges.get(edge.he1)?;
        let id1 = self.vertices[he.src].id;
        let id2 = self.vertices[he.dst].id;
        Some(if id1 < id2 { (id1, id2) } else { (id2, id1) })
    }

    /// Resets every vertex generation stamp to zero.
    pub fn reset_generations(&mut self) {
        for v in self.vertices.values_mut() {
            v.generation = 0;
        }
    }

    /// Looks a vertex up by integer id. Requires helper maps to be
    /// current (see [`Manifold::construct_helper_maps`]).
    pub fn vertex_by_id(&self, id: i64) -> Option<VertexId> {
        self.vertex_by_id.get(&id).copied()
    }

    /// Looks an edge up by its sorted endpoint-id pair.
    pub fn edge_by_vertex_ids(&self, ids: (i64, i64)) -> Option<EdgeId> {
        self.edge_by_vertex_ids.get(&ids).copied()
    }

    /// Looks a face up by integer id.
    pub fn face_by_id(&self, id: i64) -> Option<FaceId> {
        self.face_by_id.get(&id).copied()
    }

    // ------------------------------------------------------------------
    // Construction primitives
    // ------------------------------------------------------------------

    /// Allocates a vertex for `point`. Ids are auto-assigned when `id`
    /// is `None`.
    pub fn make_vertex(&mut self, point: Point3<f64>, id: Option<i64>) -> VertexId {
        let mut vertex = Vertex::new(point);
        vertex.id = match id {
            Some(id) => id,
            None => {
                let id = self.next_feature_id;
                self.next_feature_id += 1;
                id
            }
        };
        self.vertices.insert(vertex)
    }

    /// Allocates an edge and its two half-edges (`v1 → v2` and `v2 → v1`).
    ///
    /// The edge is flagged maybe-coincident, not rejected, when the
    /// endpoints are closer than the coincidence tolerance; the flag
    /// steers later repair.
    pub fn make_edge(&mut self, v1: VertexId, v2: VertexId) -> EdgeId {
        let eid = self.edges.insert(Edge::new());

        let he1 = self.half_edges.insert(HalfEdge {
            src: v1,
            dst: v2,
            buddy: HalfEdgeId::null(),
            prev: HalfEdgeId::null(),
            next: HalfEdgeId::null(),
            face: FaceId::null(),
            edge: eid,
            in_removal_set: false,
        });
        let he2 = self.half_edges.insert(HalfEdge {
            src: v2,
            dst: v1,
            buddy: he1,
            prev: HalfEdgeId::null(),
            next: HalfEdgeId::null(),
            face: FaceId::null(),
            edge: eid,
            in_removal_set: false,
        });
        self.half_edges[he1].buddy = he2;

        let edge = &mut self.edges[eid];
        edge.he1 = he1;
        edge.he2 = he2;

        let d = self.vertices[v1].point - self.vertices[v2].point;
        if d.norm_squared() < EPSILON_SQUARED {
            self.edges[eid].vertex_pred = Degeneracy::MaybeCoincident;
        }
        eid
    }

    /// Resolves a circular list of edges to the half-edges traversing
    /// them consistently, by chaining shared vertices.
    pub(crate) fn half_edges_from_edges(&self, edges: &[EdgeId]) -> Vec<HalfEdgeId> {
        match edges {
            [] => Vec::new(),
            [only] => {
                let e = &self.edges[*only];
                vec![e.he1, e.he2]
            }
            [first, second, ..] => {
                // The start vertex is the endpoint of the first edge not
                // shared with the second.
                let he11_src = self.half_edges[self.edges[*first].he1].src;
                let he12_src = self.half_edges[self.edges[*first].he2].src;
                let he21_src = self.half_edges[self.edges[*second].he1].src;
                let he22_src = self.half_edges[self.edges[*second].he2].src;

                let mut v_src = if he11_src == he21_src || he11_src == he22_src {
                    he12_src
                } else {
                    he11_src
                };

                let mut half_edges = Vec::with_capacity(edges.len());
                for &eid in edges {
                    let e = &self.edges[eid];
                    let he = if self.half_edges[e.he1].src == v_src {
                        e.he1
                    } else {
                        e.he2
                    };
                    half_edges.push(he);
                    v_src = self.half_edges[he].dst;
                }
                half_edges
            }
        }
    }

    /// Creates a face from a CCW-ordered cycle of half-edges: wires
    /// `prev`/`next`/`face` and derives the outward normal.
    ///
    /// Triangles use a plain cross product. Larger polygons pick three
    /// well-separated vertices by extremal search along a variance axis
    /// first, so near-colinear runs of boundary points cannot produce a
    /// junk normal. The face is flagged maybe-flat when even that fails.
    pub(crate) fn make_polygon(&mut self, half_edges: &[HalfEdgeId]) -> FaceId {
        let id = self.next_feature_id;
        self.next_feature_id += 1;
        let fid = self.faces.insert(Face {
            id,
            normal: Vector3::zeros(),
            half_edges: half_edges.to_vec(),
            pred: Degeneracy::None,
        });

        if half_edges.len() < 2 {
            return fid;
        }

        let mut points = Vec::with_capacity(half_edges.len());
        for (i, &h) in half_edges.iter().enumerate() {
            points.push(self.vertices[self.half_edges[h].src].point);
            self.half_edges[h].face = fid;

            let prev = half_edges[(i + half_edges.len() - 1) % half_edges.len()];
            self.half_edges[h].prev = prev;
            self.half_edges[prev].next = h;
        }

        let (normal, pred) = self.polygon_normal(&points);
        let face = &mut self.faces[fid];
        face.normal = normal;
        if pred.is_degenerate() {
            face.pred = Degeneracy::MaybeFlat;
        }
        fid
    }

    /// Derives a polygon normal from its boundary points.
    fn polygon_normal(&self, points: &[Point3<f64>]) -> (Vector3<f64>, Degeneracy) {
        if points.len() == 3 {
            return triangle_normal(&points[0], &points[1], &points[2]);
        }

        let mut mean = Vector3::zeros();
        for p in points {
            mean += p.coords;
        }
        mean /= points.len() as f64;
        let mut variance = Vector3::zeros();
        for p in points {
            let d = p.coords - mean;
            variance += Vector3::new(d.x * d.x, d.y * d.y, d.z * d.z);
        }
        let ax1 = normalized_safe(variance);

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

        // The point furthest from the line (p1, p2).
        let ax2 = p2 - p1;
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

        let Some(y_abs_max_index) = y_abs_max_index else {
            warn!("polygon normal: all boundary points lie on one edge");
            return triangle_normal(&points[0], &points[1], &points[2]);
        };

        // Keep the three picks in cycle order.
        let mut ind = [x_min_index, x_max_index, y_abs_max_index];
        ind.sort_unstable();
        triangle_normal(&points[ind[0]], &points[ind[1]], &points[ind[2]])
    }

    /// Creates a triangular face from three CCW-ordered half-edges.
    pub(crate) fn make_triangle_from_half_edges(
        &mut self,
        h1: HalfEdgeId,
        h2: HalfEdgeId,
        h3: HalfEdgeId,
    ) -> FaceId {
        self.make_polygon(&[h1, h2, h3])
    }

    /// Creates a triangular face from three CCW-ordered edges.
    pub(crate) fn make_triangle(&mut self, e1: EdgeId, e2: EdgeId, e3: EdgeId) -> FaceId {
        let half_edges = self.half_edges_from_edges(&[e1, e2, e3]);
        self.make_polygon(&half_edges)
    }

    /// Creates a quadrilateral face from four CCW-ordered edges.
    pub(crate) fn make_quad(&mut self, e1: EdgeId, e2: EdgeId, e3: EdgeId, e4: EdgeId) -> FaceId {
        let half_edges = self.half_edges_from_edges(&[e1, e2, e3, e4]);
        self.make_polygon(&half_edges)
    }

    /// Appends the two half-edges of `e` to `v`'s incidence list in CCW
    /// order: incoming half-edge first, then its outgoing buddy.
    pub(crate) fn push_half_edges_ccw(&mut self, v: VertexId, e: EdgeId) {
        let (he1, he2) = {
            let edge = &self.edges[e];
            (edge.he1, edge.he2)
        };
        if self.half_edges[he1].src == v {
            self.vertices[v].incident.push(he2);
            self.vertices[v].incident.push(he1);
        } else {
            self.vertices[v].incident.push(he1);
            self.vertices[v].incident.push(he2);
        }
    }

    /// Builds the initial tetrahedron from four points.
    ///
    /// The orientation is fixed with a scalar triple product: when the
    /// fourth point lies on the wrong side of the first three, two
    /// vertices are swapped so every face winds outward.
    pub fn construct_3_simplex(
        &mut self,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        p3: &Point3<f64>,
        p4: &Point3<f64>,
        ids: [i64; 4],
    ) {
        let v12 = p2 - p1;
        let v13 = p3 - p1;
        let v14 = p4 - p1;
        let reversed = v14.dot(&v12.cross(&v13)) < 0.0;

        let v1 = self.make_vertex(*p1, Some(ids[0]));
        let v2 = self.make_vertex(
            if reversed { *p3 } else { *p2 },
            Some(if reversed { ids[2] } else { ids[1] }),
        );
        let v3 = self.make_vertex(
            if reversed { *p2 } else { *p3 },
            Some(if reversed { ids[1] } else { ids[2] }),
        );
        let v4 = self.make_vertex(*p4, Some(ids[3]));

        let e12 = self.make_edge(v1, v2);
        let e13 = self.make_edge(v1, v3);
        let e14 = self.make_edge(v1, v4);
        let e23 = self.make_edge(v2, v3);
        let e24 = self.make_edge(v2, v4);
        let e34 = self.make_edge(v3, v4);

        let f132 = self.make_triangle(e13, e23, e12);
        let f143 = self.make_triangle(e14, e34, e13);
        let f124 = self.make_triangle(e12, e24, e14);
        let f234 = self.make_triangle(e23, e34, e24);

        self.push_half_edges_ccw(v1, e12);
        self.push_half_edges_ccw(v1, e14);
        self.push_half_edges_ccw(v1, e13);

        self.push_half_edges_ccw(v2, e23);
        self.push_half_edges_ccw(v2, e24);
        self.push_half_edges_ccw(v2, e12);

        self.push_half_edges_ccw(v3, e13);
        self.push_half_edges_ccw(v3, e34);
        self.push_half_edges_ccw(v3, e23);

        self.push_half_edges_ccw(v4, e14);
        self.push_half_edges_ccw(v4, e24);
        self.push_half_edges_ccw(v4, e34);

        self.edges[e12].face_pred = self.face_coplanarity(f132, f124);
        self.edges[e13].face_pred = self.face_coplanarity(f132, f143);
        self.edges[e14].face_pred = self.face_coplanarity(f124, f143);
        self.edges[e23].face_pred = self.face_coplanarity(f132, f234);
        self.edges[e24].face_pred = self.face_coplanarity(f124, f234);
        self.edges[e34].face_pred = self.face_coplanarity(f234, f143);

        self.set_normals_from_faces();
        self.construct_helper_maps();
    }

    /// Builds a six-face box from its eight corners.
    ///
    /// Corner order: front lower-left, front upper-left, front
    /// upper-right, front lower-right, then the same four on the back
    /// face. Used for oriented-bounding-box output, not by hull
    /// construction.
    pub fn construct_cuboid(&mut self, corners: [Point3<f64>; 8]) {
        let [p_fll, p_ful, p_fur, p_flr, p_bll, p_bul, p_bur, p_blr] = corners;

        let v_fll = self.make_vertex(p_fll, None);
        let v_ful = self.make_vertex(p_ful, None);
        let v_fur = self.make_vertex(p_fur, None);
        let v_flr = self.make_vertex(p_flr, None);
        let v_bll = self.make_vertex(p_bll, None);
        let v_bul = self.make_vertex(p_bul, None);
        let v_bur = self.make_vertex(p_bur, None);
        let v_blr = self.make_vertex(p_blr, None);

        let e_flx = self.make_edge(v_fll, v_flr);
        let e_fxr = self.make_edge(v_flr, v_fur);
        let e_fux = self.make_edge(v_fur, v_ful);
        let e_fxl = self.make_edge(v_ful, v_fll);

        let e_xlr = self.make_edge(v_flr, v_blr);
        let e_xur = self.make_edge(v_fur, v_bur);
        let e_xul = self.make_edge(v_ful, v_bul);
        let e_xll = self.make_edge(v_fll, v_bll);

        let e_blx = self.make_edge(v_bll, v_blr);
        let e_bxr = self.make_edge(v_blr, v_bur);
        let e_bux = self.make_edge(v_bur, v_bul);
        let e_bxl = self.make_edge(v_bul, v_bll);

        self.make_quad(e_flx, e_fxr, e_fux, e_fxl);
        self.make_quad(e_blx, e_bxl, e_bux, e_bxr);
        self.make_quad(e_flx, e_xll, e_blx, e_xlr);
        self.make_quad(e_fux, e_xur, e_bux, e_xul);
        self.make_quad(e_xlr, e_bxr, e_xur, e_fxr);
        self.make_quad(e_xll, e_fxl, e_xul, e_bxl);

        self.push_half_edges_ccw(v_fll, e_flx);
        self.push_half_edges_ccw(v_fll, e_fxl);
        self.push_half_edges_ccw(v_fll, e_xll);

        self.push_half_edges_ccw(v_flr, e_xlr);
        self.push_half_edges_ccw(v_flr, e_fxr);
        self.push_half_edges_ccw(v_flr, e_flx);

        self.push_half_edges_ccw(v_fur, e_fxr);
        self.push_half_edges_ccw(v_fur, e_xur);
        self.push_half_edges_ccw(v_fur, e_fux);

        self.push_half_edges_ccw(v_ful, e_fxl);
        self.push_half_edges_ccw(v_ful, e_fux);
        self.push_half_edges_ccw(v_ful, e_xul);

        self.push_half_edges_ccw(v_bll, e_xll);
        self.push_half_edges_ccw(v_bll, e_bxl);
        self.push_half_edges_ccw(v_bll, e_blx);

        self.push_half_edges_ccw(v_blr, e_xlr);
        self.push_half_edges_ccw(v_blr, e_blx);
        self.push_half_edges_ccw(v_blr, e_bxr);

        self.push_half_edges_ccw(v_bur, e_xur);
        self.push_half_edges_ccw(v_bur, e_bxr);
        self.push_half_edges_ccw(v_bur, e_bux);

        self.push_half_edges_ccw(v_bul, e_xul);
        self.push_half_edges_ccw(v_bul, e_bux);
        self.push_half_edges_ccw(v_bul, e_bxl);

        self.set_normals_from_faces();
        self.construct_helper_maps();
    }

    // ------------------------------------------------------------------
    // Geometric predicates
    // ------------------------------------------------------------------

    /// Coplanarity classification between two faces.
    ///
    /// Returns `MaybeCoincident` when either face is itself flagged flat
    /// (its normal cannot be trusted), `MaybeCoplanar` when the normals
    /// are parallel within the angular tolerance, `None` otherwise.
    pub(crate) fn face_coplanarity(&self, f1: FaceId, f2: FaceId) -> Degeneracy {
        let face1 = &self.faces[f1];
        let face2 = &self.faces[f2];
        if face1.pred == Degeneracy::MaybeFlat || face2.pred == Degeneracy::MaybeFlat {
            return Degeneracy::MaybeCoincident;
        }
        if face1.normal.cross(&face2.normal).norm_squared() < EPSILON_ANGLE {
            Degeneracy::MaybeCoplanar
        } else {
            Degeneracy::None
        }
    }

    /// Whether `p` lies strictly in front of (outside) face `f`.
    ///
    /// The signed distance is anchored at the incident vertex furthest
    /// from `p`; `|distance| < eps` reports `MaybeCoplanar` alongside
    /// the facing result.
    pub fn face_is_facing(&self, f: FaceId, p: &Point3<f64>, eps: f64) -> (bool, Degeneracy) {
        let face = &self.faces[f];
        let mut dist_max = 0.0;
        let mut max_p = Point3::origin();
        for &h in &face.half_edges {
            let cur = self.vertices[self.half_edges[h].src].point;
            let sq = (p - cur).norm_squared();
            if sq > dist_max {
                dist_max = sq;
                max_p = cur;
            }
        }
        let vert_dist = (p - max_p).dot(&face.normal);
        let pred = if vert_dist.abs() < eps {
            Degeneracy::MaybeCoplanar
        } else {
            Degeneracy::None
        };
        (vert_dist > 0.0, pred)
    }

    /// Area of a face under the assumption that it is convex (triangle
    /// fan from the first boundary vertex).
    pub fn face_area(&self, f: FaceId) -> f64 {
        let face = &self.faces[f];
        if face.half_edges.len() < 3 {
            return 0.0;
        }
        let base = self.vertices[self.half_edges[face.half_edges[0]].src].point;
        let mut total = 0.0;
        for &h in &face.half_edges[1..] {
            let he = &self.half_edges[h];
            let a = self.vertices[he.src].point;
            let b = self.vertices[he.dst].point;
            total += 0.5 * (a - base).cross(&(b - base)).norm();
        }
        total
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Finds the edge joining two vertices, scanning `v1`'s incidence.
    pub fn find_edge(&self, v1: VertexId, v2: VertexId) -> Option<EdgeId> {
        let vertex = self.vertices.get(v1)?;
        for &h in &vertex.incident {
            let he = &self.half_edges[h];
            if he.src == v2 || he.dst == v2 {
                return Some(he.edge);
            }
        }
        None
    }

    /// Finds a face incident to both vertices.
    pub fn find_face_of(&self, v1: VertexId, v2: VertexId) -> Option<FaceId> {
        let first = self.vertices.get(v1)?;
        let second = self.vertices.get(v2)?;
        let mut seen: Vec<FaceId> = first
            .incident
            .iter()
            .filter_map(|&h| self.half_edge(h).and_then(HalfEdge::face))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        for &h in &second.incident {
            if let Some(f) = self.half_edges[h].face() {
                if seen.binary_search(&f).is_ok() {
                    return Some(f);
                }
            }
        }
        None
    }

    /// Finds the face incident to all three vertices using the
    /// per-vertex face-count scratch maps.
    ///
    /// Requires [`Manifold::construct_helper_maps`] to have run since the
    /// last topology change.
    pub fn find_face_by_vertices(
        &mut self,
        v1: VertexId,
        v2: VertexId,
        v3: VertexId,
    ) -> Option<FaceId> {
        let size1 = self.vertices.get(v1)?.face_counts.len();
        let size2 = self.vertices.get(v2)?.face_counts.len();
        let size3 = self.vertices.get(v3)?.face_counts.len();

        if size1 > size2 && size1 > size3 {
            self.find_face_ordered(v1, v2, v3)
        } else if size2 > size1 && size2 > size3 {
            self.find_face_ordered(v2, v3, v1)
        } else {
            self.find_face_ordered(v3, v1, v2)
        }
    }

    fn find_face_ordered(&mut self, v1: VertexId, v2: VertexId, v3: VertexId) -> Option<FaceId> {
        let mut counts = std::mem::take(&mut self.vertices[v1].face_counts);
        for count in counts.values_mut() {
            *count = 1;
        }
        for face_id in self.vertices[v2].face_counts.keys() {
            if let Some(count) = counts.get_mut(face_id) {
                *count += 1;
            }
        }
        let mut result = None;
        for face_id in self.vertices[v3].face_counts.keys() {
            if counts.get(face_id) == Some(&2) {
                result = self.face_by_id.get(face_id).copied();
                break;
            }
        }
        self.vertices[v1].face_counts = counts;
        result
    }

    // ------------------------------------------------------------------
    // Derived data
    // ------------------------------------------------------------------

    /// Recomputes vertex and edge normals from incident face normals:
    /// an unweighted average, normalized.
    pub fn set_normals_from_faces(&mut self) {
        let vertex_ids: Vec<VertexId> = self.vertices.keys().collect();
        for v in vertex_ids {
            let mut sum = Vector3::zeros();
            for &h in &self.vertices[v].incident {
                let he = &self.half_edges[h];
                if he.src == v && !he.face.is_null() {
                    sum += self.faces[he.face].normal;
                }
            }
            self.vertices[v].normal = normalized_safe(sum);
        }

        let edge_ids: Vec<EdgeId> = self.edges.keys().collect();
        for e in edge_ids {
            let edge = &self.edges[e];
            let f1 = self.half_edges[edge.he1].face;
            let f2 = self.half_edges[edge.he2].face;
            if f1.is_null() || f2.is_null() {
                continue;
            }
            let n = self.faces[f1].normal + self.faces[f2].normal;
            self.edges[e].normal = normalized_safe(n);
        }
    }

    /// Rebuilds the id→handle lookup maps and the per-vertex face-count
    /// scratch used by [`Manifold::find_face_by_vertices`].
    ///
    /// Must be called again after any structural mutation before the
    /// by-id lookups are used.
    pub fn construct_helper_maps(&mut self) {
        self.vertex_by_id.clear();
        let vertex_ids: Vec<VertexId> = self.vertices.keys().collect();
        for v in vertex_ids {
            let mut counts = HashMap::new();
            for &h in &self.vertices[v].incident {
                let he = &self.half_edges[h];
                if he.dst == v && !he.face.is_null() {
                    counts.insert(self.faces[he.face].id, 1);
                }
            }
            let vertex = &mut self.vertices[v];
            vertex.face_counts = counts;
            self.vertex_by_id.insert(vertex.id, v);
        }

        self.edge_by_vertex_ids.clear();
        let edge_ids: Vec<EdgeId> = self.edges.keys().collect();
        for e in edge_ids {
            if let Some(key) = self.edge_vertex_ids(e) {
                self.edge_by_vertex_ids.insert(key, e);
            }
        }

        self.face_by_id.clear();
        for (f, face) in &self.faces {
            self.face_by_id.insert(face.id, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetra_points() -> [Point3<f64>; 4] {
        [
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(-1.0, -1.0, 1.0),
        ]
    }

    fn centroid(m: &Manifold) -> Point3<f64> {
        let mut sum = Vector3::zeros();
        for v in m.vertices.values() {
            sum += v.point.coords;
        }
        Point3::from(sum / m.vertex_count() as f64)
    }

    #[test]
    fn simplex_counts_and_outward_normals() {
        let [p1, p2, p3, p4] = tetra_points();
        let mut m = Manifold::new();
        m.construct_3_simplex(&p1, &p2, &p3, &p4, [0, 1, 2, 3]);

        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.edge_count(), 6);
        assert_eq!(m.face_count(), 4);

        let c = centroid(&m);
        for f in m.face_ids() {
            let anchor = m.vertices[m.half_edges[m.faces[f].half_edges[0]].src].point;
            assert!(
                (anchor - c).dot(&m.faces[f].normal) > 0.0,
                "face normal must point away from the centroid"
            );
        }
    }

    #[test]
    fn simplex_fixes_reversed_orientation() {
        // Swapping two inputs flips the triple product sign; the result
        // must still wind outward.
        let [p1, p2, p3, p4] = tetra_points();
        let mut m = Manifold::new();
        m.construct_3_simplex(&p1, &p3, &p2, &p4, [0, 1, 2, 3]);

        let c = centroid(&m);
        for f in m.face_ids() {
            let anchor = m.vertices[m.half_edges[m.faces[f].half_edges[0]].src].point;
            assert!((anchor - c).dot(&m.faces[f].normal) > 0.0);
        }
    }

    #[test]
    fn simplex_cycles_are_closed() {
        let [p1, p2, p3, p4] = tetra_points();
        let mut m = Manifold::new();
        m.construct_3_simplex(&p1, &p2, &p3, &p4, [0, 1, 2, 3]);

        for f in m.face_ids() {
            let cycle = &m.faces[f].half_edges;
            let mut h = cycle[0];
            for _ in 0..cycle.len() {
                assert_eq!(m.half_edges[h].face, f);
                h = m.half_edges[h].next;
            }
            assert_eq!(h, cycle[0], "next-walk must return to the start");
        }
        for (h, he) in &m.half_edges {
            assert_eq!(m.half_edges[he.buddy].buddy, h);
            assert_eq!(m.half_edges[he.buddy].src, he.dst);
        }
    }

    #[test]
    fn cuboid_counts_and_quads() {
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
        assert_eq!(m.vertex_count(), 8);
        assert_eq!(m.edge_count(), 12);
        assert_eq!(m.face_count(), 6);
        for f in m.face_ids() {
            assert_eq!(m.faces[f].half_edges.len(), 4);
            assert_relative_eq!(m.face_area(f), 1.0, epsilon = 1e-12);
        }

        let c = centroid(&m);
        for f in m.face_ids() {
            let anchor = m.vertices[m.half_edges[m.faces[f].half_edges[0]].src].point;
            assert!((anchor - c).dot(&m.faces[f].normal) > 0.0);
        }
    }

    #[test]
    fn helper_maps_resolve_features() {
        let [p1, p2, p3, p4] = tetra_points();
        let mut m = Manifold::new();
        m.construct_3_simplex(&p1, &p2, &p3, &p4, [10, 11, 12, 13]);

        let v10 = m.vertex_by_id(10).unwrap();
        let v11 = m.vertex_by_id(11).unwrap();
        let v12 = m.vertex_by_id(12).unwrap();
        assert_eq!(m.vertices[v10].id, 10);

        let e = m.find_edge(v10, v11).unwrap();
        assert_eq!(m.edge_vertex_ids(e), Some((10, 11)));
        assert_eq!(m.edge_by_vertex_ids((10, 11)), Some(e));
        assert!(m.find_face_of(v10, v11).is_some());

        let f = m.find_face_by_vertices(v10, v11, v12).unwrap();
        let ids: Vec<i64> = m
            .face_vertices(f)
            .iter()
            .map(|&v| m.vertices[v].id)
            .collect();
        for want in [10, 11, 12] {
            assert!(ids.contains(&want));
        }
    }

    #[test]
    fn coincident_endpoints_are_flagged_not_rejected() {
        let mut m = Manifold::new();
        let a = m.make_vertex(Point3::origin(), None);
        let b = m.make_vertex(Point3::new(1e-9, 0.0, 0.0), None);
        let e = m.make_edge(a, b);
        assert_eq!(m.edges[e].vertex_pred, Degeneracy::MaybeCoincident);
    }

    #[test]
    fn facing_predicate() {
        let [p1, p2, p3, p4] = tetra_points();
        let mut m = Manifold::new();
        m.construct_3_simplex(&p1, &p2, &p3, &p4, [0, 1, 2, 3]);

        let far = Point3::new(10.0, 10.0, 10.0);
        let facing: Vec<FaceId> = m
            .face_ids()
            .filter(|&f| m.face_is_facing(f, &far, EPSILON_SQUARED).0)
            .collect();
        assert!(!facing.is_empty());

        // The centroid faces nothing.
        let c = centroid(&m);
        for f in m.face_ids() {
            assert!(!m.face_is_facing(f, &c, EPSILON_SQUARED).0);
        }
    }
}
