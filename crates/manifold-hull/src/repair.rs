//! Post-insertion degeneracy repair.
//!
//! Each point incorporation can leave adjacent face pairs coplanar or
//! concave (both must merge: a valid hull is strictly convex), drop a
//! vertex to degree 2 (the vertex must be elided and its edges spliced),
//! or degenerate a face into a 2-cycle (removed with one of its edges).
//!
//! Repair is worklist-driven. Edges flagged for removal and vertices
//! flagged for elision sit on explicit stacks; popping an edge merges
//! the whole connected coplanar/concave component around it into one
//! face and re-checks the merged boundary for freshly exposed concavity
//! (a fixed-point loop), while popping a vertex splices it out and may
//! queue the 2-cycle or cascading degree-1 cleanup that results.
//!
//! Termination: every worklist step strictly removes edges, vertices, or
//! faces of a bounded local neighborhood (the new fan and its immediate
//! surroundings) and never re-creates removed features, so the combined
//! edge+vertex work shrinks monotonically over a finite mesh.

use hashbrown::HashSet;
use tracing::{debug, trace, warn};

use crate::hull::HullDriver;
use crate::manifold::normalized_safe;
use crate::types::{Degeneracy, EdgeId, FaceId, HalfEdgeId, VertexId};

/// Hard cap on the concavity tolerance used when deciding whether a
/// merged boundary is still convex.
const CONCAVITY_CLAMP: f64 = 0.1;

impl HullDriver<'_> {
    #[inline]
    fn concavity_margin(&self) -> f64 {
        CONCAVITY_CLAMP.min(self.epsilon * 100.0)
    }

    fn queue_edge(&mut self, e: EdgeId) {
        let edge = &mut self.m.edges[e];
        if !edge.pending_removal {
            edge.pending_removal = true;
            self.edge_queue.push(e);
        }
    }

    fn unqueue_edge(&mut self, e: EdgeId) {
        // The stack entry stays behind; the pop skips entries whose flag
        // was cleared (or whose edge died) in the meantime.
        self.m.edges[e].pending_removal = false;
    }

    fn pop_edge(&mut self) -> Option<EdgeId> {
        while let Some(e) = self.edge_queue.pop() {
            if let Some(edge) = self.m.edges.get_mut(e) {
                if edge.pending_removal {
                    edge.pending_removal = false;
                    return Some(e);
                }
            }
        }
        None
    }

    fn queue_vertex(&mut self, v: VertexId) {
        let vertex = &mut self.m.vertices[v];
        if !vertex.pending_removal {
            vertex.pending_removal = true;
            self.vertex_queue.push(v);
        }
    }

    fn unqueue_vertex(&mut self, v: VertexId) {
        self.m.vertices[v].pending_removal = false;
    }

    fn pop_vertex(&mut self) -> Option<VertexId> {
        while let Some(v) = self.vertex_queue.pop() {
            if let Some(vertex) = self.m.vertices.get_mut(v) {
                if vertex.pending_removal {
                    vertex.pending_removal = false;
                    return Some(v);
                }
            }
        }
        None
    }

    /// Scans the freshly created fan around `center` for coplanar or
    /// concave face pairs, queues the offending edges, and drains both
    /// worklists until the local neighborhood is a proper convex disk
    /// again: no coplanar pairs, no degree-2 vertices, no 2-cycle faces.
    pub(crate) fn check_and_merge_faces_ccw(&mut self, center: VertexId) {
        self.edge_queue.clear();
        self.vertex_queue.clear();

        let incident = self.m.vertices[center].incident.clone();
        for h in incident {
            if self.m.half_edges[h].src != center {
                continue;
            }
            let he_circum = self.m.half_edges[h].next;
            let e_pillar = self.m.half_edges[h].edge;
            if self.m.edges[e_pillar].face_pred == Degeneracy::MaybeCoplanar
                || self.incident_faces_parallel_or_concave(e_pillar)
            {
                self.queue_edge(e_pillar);
            }

            let e_circum = self.m.half_edges[he_circum].edge;
            if self.m.edges[e_circum].face_pred == Degeneracy::MaybeCoplanar
                || self.incident_faces_parallel_or_concave(e_circum)
            {
                self.queue_edge(e_circum);
            }
        }

        loop {
            let popped_edge = self.pop_edge();
            if let Some(e) = popped_edge {
                if self.remove_edge_and_merge_faces(e) {
                    debug!("edge merge aborted, mesh left as-is");
                }
            }

            let popped_vertex = self.pop_vertex();
            if let Some(v) = popped_vertex {
                self.remove_vertex_and_merge_edges(v);
            }

            if popped_edge.is_none() && popped_vertex.is_none() {
                break;
            }
        }
    }

    /// Sign test of `(v2 - v1) · (n1 × n2)`: positive for a properly
    /// convex dihedral, non-positive (within margin) when the faces are
    /// parallel or facing each other and must merge.
    pub(crate) fn incident_faces_parallel_or_concave(&self, e: EdgeId) -> bool {
        let edge = &self.m.edges[e];
        let he1 = &self.m.half_edges[edge.he1];
        let he2 = &self.m.half_edges[edge.he2];
        let f1 = &self.m.faces[he1.face];
        let f2 = &self.m.faces[he2.face];
        let cr = f1.normal.cross(&f2.normal);
        let v12 = self.m.vertices[he2.src].point - self.m.vertices[he1.src].point;
        v12.dot(&cr) <= self.epsilon
    }

    /// Merges the connected coplanar/concave component around `e` into a
    /// single face. Returns `true` when the merge had to abort (the
    /// region is not a disk, or a dent borders a non-coplanar neighbor);
    /// the mesh is left untouched in that case.
    fn remove_edge_and_merge_faces(&mut self, e: EdgeId) -> bool {
        let mut faces = self.gather_connected_faces(e);
        let half_edges = loop {
            let Some(half_edges) = self.m.find_circumference(&faces) else {
                debug!("merge aborted: region boundary did not close");
                return true;
            };
            let Some(additional) = self.check_for_concavity(&half_edges) else {
                return true;
            };
            if additional.is_empty() {
                break half_edges;
            }
            faces.extend(additional);
        };

        self.clear_pending_inner_edges(&faces, &half_edges);
        self.merge_consecutive_faces(&faces);

        for &h in &half_edges {
            let v = self.m.half_edges[h].src;
            self.check_vertex_for_update(v);
        }
        false
    }

    /// Flood-fills from the two faces incident to `e` across every edge
    /// currently flagged for removal, collecting the connected component
    /// that is about to merge.
    fn gather_connected_faces(&mut self, e: EdgeId) -> Vec<FaceId> {
        let edge = &self.m.edges[e];
        let f1 = self.m.half_edges[edge.he1].face;
        let f2 = self.m.half_edges[edge.he2].face;

        let mut queue = vec![f1, f2];
        let mut seen: HashSet<FaceId> = queue.iter().copied().collect();
        let mut faces = Vec::new();

        while let Some(f) = queue.pop() {
            faces.push(f);
            for i in 0..self.m.faces[f].half_edges.len() {
                let h = self.m.faces[f].half_edges[i];
                let eid = self.m.half_edges[h].edge;
                if self.m.edges[eid].pending_removal {
                    let buddy = self.m.half_edges[h].buddy;
                    let f_buddy = self.m.half_edges[buddy].face;
                    if seen.insert(f_buddy) {
                        queue.push(f_buddy);
                    }
                }
            }
        }
        faces
    }

    /// Walks the merged region's boundary looking for reflex corners.
    ///
    /// A dent whose two edges both border coplanar neighbors pulls those
    /// neighbors into the merge (returned for the fixed-point loop). A
    /// dent next to a genuinely non-coplanar neighbor is an
    /// ill-condition: `None` aborts the merge.
    fn check_for_concavity(&mut self, half_edges: &[HalfEdgeId]) -> Option<Vec<FaceId>> {
        let margin = self.concavity_margin();
        let f0 = self.m.half_edges[half_edges[0]].face;
        let n = self.m.faces[f0].normal;

        let mut additional = Vec::new();
        let mut marked: HashSet<FaceId> = HashSet::new();

        for i in 0..half_edges.len() {
            let he1 = half_edges[i];
            let he2 = half_edges[(i + 1) % half_edges.len()];
            let p1 = self.m.vertices[self.m.half_edges[he1].src].point;
            let p2 = self.m.vertices[self.m.half_edges[he2].src].point;
            let p3 = self.m.vertices[self.m.half_edges[he2].dst].point;
            let v12 = normalized_safe(p2 - p1);
            let v23 = normalized_safe(p3 - p2);
            let cr = v12.cross(&v23);
            if n.dot(&cr) >= -margin {
                continue;
            }

            // Reflex corner on the merged boundary.
            let e1 = self.m.half_edges[he1].edge;
            let e2 = self.m.half_edges[he2].edge;
            let f1 = self.m.half_edges[self.m.half_edges[he1].buddy].face;
            let f2 = self.m.half_edges[self.m.half_edges[he2].buddy].face;

            if self.m.edges[e1].face_pred == Degeneracy::MaybeCoplanar
                && self.m.edges[e2].face_pred == Degeneracy::MaybeCoplanar
            {
                if marked.insert(f1) {
                    additional.push(f1);
                }
                if marked.insert(f2) {
                    additional.push(f2);
                }
            } else {
                debug!(
                    face = self.m.faces[f0].id,
                    "merge aborted: dented boundary next to a non-coplanar face"
                );
                return None;
            }
        }
        Some(additional)
    }

    /// Unqueues region-interior edges: they are destroyed wholesale when
    /// the faces are replaced, so their pending entries must not survive.
    fn clear_pending_inner_edges(&mut self, faces: &[FaceId], boundary: &[HalfEdgeId]) {
        for &h in boundary {
            let e = self.m.half_edges[h].edge;
            self.m.edges[e].found = true;
        }

        for &f in faces {
            for i in 0..self.m.faces[f].half_edges.len() {
                let h = self.m.faces[f].half_edges[i];
                let e = self.m.half_edges[h].edge;
                if !self.m.edges[e].found && self.m.edges[e].pending_removal {
                    self.unqueue_edge(e);
                }
            }
        }

        for &h in boundary {
            let e = self.m.half_edges[h].edge;
            self.m.edges[e].found = false;
        }
    }

    /// Replaces a connected run of faces with one polygon, carrying the
    /// union of their conflict-graph visibility over to the new face.
    fn merge_consecutive_faces(&mut self, faces: &[FaceId]) {
        // Union of points visible to any of the dying faces.
        let mut vertices = Vec::new();
        for &f in faces {
            let fnode = self
                .conflicts
                .face_node(f)
                .expect("hull faces have conflict nodes");
            for vc in self.conflicts.visible_points(fnode) {
                let pc = self.conflicts.point_mut(vc);
                if !pc.found {
                    pc.found = true;
                    vertices.push(vc);
                }
            }
            self.conflicts.remove_face(f);
        }
        for &vc in &vertices {
            self.conflicts.point_mut(vc).found = false;
        }

        let half_edges = self
            .m
            .find_circumference(faces)
            .expect("merged face region must have a closed boundary");
        self.m.remove_faces(faces);

        let fid = self.m.make_polygon(&half_edges);
        trace!(
            face = self.m.faces[fid].id,
            sides = half_edges.len(),
            "merged coplanar faces"
        );

        for &h in &half_edges {
            let f = self.m.half_edges[h].face;
            let buddy = self.m.half_edges[h].buddy;
            let f_buddy = self.m.half_edges[buddy].face;
            let e = self.m.half_edges[h].edge;
            self.m.edges[e].face_pred = self.m.face_coplanarity(f, f_buddy);
        }

        let fnode = self.conflicts.insert_face(fid);
        for vc in vertices {
            let p = self.conflicts.point(vc).point;
            let (facing, pred) = self.m.face_is_facing(fid, &p, self.epsilon);
            if facing && pred == Degeneracy::None {
                self.conflicts.link_visible(fnode, vc);
            }
        }
    }

    /// Classifies a boundary vertex after a merge removed edges around
    /// it: degree 2 queues it for elision; degree 1 starts an immediate
    /// cascading removal along the chain until a stable vertex.
    fn check_vertex_for_update(&mut self, v: VertexId) {
        let incidence = self.m.vertices[v].incident.len();
        if incidence == 4 {
            // Degree 2: elide later, via the vertex worklist.
            self.queue_vertex(v);
        } else if incidence == 2 {
            // Degree 1: the dangling chain is removed immediately.
            let mut v_cur = v;
            loop {
                let he_cur = self.m.vertices[v_cur].incident[0];
                let e_cur = self.m.half_edges[he_cur].edge;
                let he = &self.m.half_edges[he_cur];
                let v_adj = if he.src == v_cur { he.dst } else { he.src };

                let deg_adj = self.m.vertices[v_adj].incident.len();
                let need_update = match deg_adj {
                    6 => {
                        // Becomes degree 2 once this edge goes away.
                        self.queue_vertex(v_adj);
                        false
                    }
                    4 => {
                        // Was queued as degree 2; it becomes degree 1
                        // instead, so the cascade continues through it.
                        if !self.m.vertices[v_adj].pending_removal {
                            warn!(
                                vertex = self.m.vertices[v_adj].id,
                                "degree-2 vertex was not queued before cascading removal"
                            );
                        }
                        self.unqueue_vertex(v_adj);
                        true
                    }
                    _ => false,
                };

                if self.m.edges[e_cur].pending_removal {
                    self.unqueue_edge(e_cur);
                }
                self.m.remove_edge(e_cur);

                if !need_update {
                    break;
                }
                v_cur = v_adj;
            }
        }
    }

    /// Elides a degree-2 vertex, splicing its two edges into one.
    ///
    /// ```text
    ///                  f1                                f1
    ///       he1       he2       he3                he1       he3
    ///     ------->  =======>  ------->           ------->  ------->
    ///   v1       (v2)       v3          ===>   v1        v3
    ///     <-------  <=======  <-------           <------   <-------
    ///       he6  deg2 he5       he4                he6       he4
    ///                  f2                                f2
    /// ```
    ///
    /// When the two neighbors are the same vertex the face is a 2-cycle:
    /// the redundant edge is queued instead and the vertex left alone.
    /// A face reduced to two sides by the splice queues one of its edges
    /// for the same 2-cycle cleanup.
    fn remove_vertex_and_merge_edges(&mut self, v2: VertexId) {
        let heit = self.m.vertices[v2].incident[0];
        let he2 = if self.m.half_edges[heit].src == v2 {
            heit
        } else {
            self.m.half_edges[heit].buddy
        };
        let he1 = self.m.half_edges[he2].prev;
        let he3 = self.m.half_edges[he2].next;
        let he5 = self.m.half_edges[he2].buddy;
        let he4 = self.m.half_edges[he5].prev;
        let he6 = self.m.half_edges[he5].next;
        let v1 = self.m.half_edges[he1].src;
        let v3 = self.m.half_edges[he2].dst;
        let f1 = self.m.half_edges[he2].face;
        let f2 = self.m.half_edges[he5].face;

        if v1 == v3 {
            // One of the incident faces is a 2-cycle; removing its
            // redundant edge subsumes the vertex removal.
            let e = self.m.half_edges[he1].edge;
            self.queue_edge(e);
            self.m.vertices[v2].pending_removal = false;
            return;
        }

        // Remove v2 with he2/he5, extending he1 and he6 to reach v3.
        self.m.faces[f2].half_edges.retain(|&h| h != he5);
        self.m.faces[f1].half_edges.retain(|&h| h != he2);
        self.m.vertices[v3].incident.retain(|&h| h != he5 && h != he2);

        let e_removed = self.m.half_edges[he5].edge;
        self.m.half_edges.remove(he5);
        self.m.half_edges.remove(he2);
        self.m.edges.remove(e_removed);

        let pos = self.m.vertices[v3]
            .incident
            .iter()
            .position(|&h| h == he4)
            .expect("splice anchor must be incident to the surviving vertex");
        self.m.vertices[v3].incident.insert(pos, he1);
        self.m.vertices[v3].incident.insert(pos + 1, he6);
        self.m.half_edges[he1].dst = v3;
        self.m.half_edges[he6].src = v3;
        self.m.vertices.remove(v2);

        self.m.half_edges[he6].prev = he4;
        self.m.half_edges[he4].next = he6;
        self.m.half_edges[he1].next = he3;
        self.m.half_edges[he3].prev = he1;

        if self.m.faces[f1].half_edges.len() == 2 {
            let e1 = self.m.half_edges[he1].edge;
            let e2 = self.m.half_edges[he3].edge;
            if !self.m.edges[e2].pending_removal {
                self.queue_edge(e2);
            } else if !self.m.edges[e1].pending_removal {
                self.queue_edge(e1);
            } else {
                warn!("both edges of a 2-cycle face already queued");
            }
        }

        if f1 != f2 && self.m.faces[f2].half_edges.len() == 2 {
            let e1 = self.m.half_edges[he4].edge;
            let e2 = self.m.half_edges[he6].edge;
            if !self.m.edges[e2].pending_removal {
                self.queue_edge(e2);
            } else if !self.m.edges[e1].pending_removal {
                self.queue_edge(e1);
            } else {
                warn!("both edges of a 2-cycle face already queued");
            }
        }
    }
}
