//! Topological mutation primitives: face removal, edge removal,
//! circumference walks, and circular-fan construction.
//!
//! These operate on well-formed input and keep the manifold's splicing
//! invariants intact; the one *expected* failure is the circumference
//! walk over a face set that is not a simply-connected disk, which
//! reports `None` and leaves the mesh untouched instead of returning a
//! malformed cycle.

use nalgebra::Point3;
use slotmap::Key;
use tracing::trace;

use crate::manifold::Manifold;
use crate::types::{EdgeId, FaceId, HalfEdgeId, VertexId};

impl Manifold {
    /// Detaches and destroys the given faces.
    ///
    /// Any edge that thereby loses both incident faces is removed as
    /// well, and any vertex that loses its last incident edge with it.
    pub(crate) fn remove_faces(&mut self, faces: &[FaceId]) {
        let mut orphan_edges: Vec<EdgeId> = Vec::new();

        for &fid in faces {
            let Some(face) = self.faces.remove(fid) else {
                continue;
            };
            for h in face.half_edges {
                self.half_edges[h].face = FaceId::null();
                let buddy = self.half_edges[h].buddy;
                if self.half_edges[buddy].face.is_null() {
                    orphan_edges.push(self.half_edges[h].edge);
                }
            }
        }

        for e in orphan_edges {
            self.remove_edge(e);
        }
    }

    /// Removes an edge, splicing its two half-edges out of the
    /// `prev`/`next` chains and out of both endpoint incidence lists.
    ///
    /// An endpoint left without incident half-edges is deleted.
    pub(crate) fn remove_edge(&mut self, e: EdgeId) {
        let (he1, he2) = {
            let edge = &self.edges[e];
            (edge.he1, edge.he2)
        };

        // A spur edge removed out of a live face must leave its cycle
        // list as well as the prev/next chain.
        for h in [he1, he2] {
            let f = self.half_edges[h].face;
            if let Some(face) = self.faces.get_mut(f) {
                face.half_edges.retain(|&fh| fh != h);
            }
        }

        //    ---                             --->
        //       \                           /
        //        \            he2          /
        //         ->    -------------->  --
        //            v2                v1
        //         --    <--------------  <-
        //        /            he1          \
        //       /                           \
        //    <--                             ---
        let v1 = self.half_edges[he1].src;
        if self.half_edges[he1].prev != he2 {
            let he_prev = self.half_edges[he1].prev;
            let he_next = self.half_edges[he2].next;
            self.half_edges[he_prev].next = he_next;
            self.half_edges[he_next].prev = he_prev;
            self.vertices[v1].incident.retain(|&h| h != he1 && h != he2);
        } else {
            self.vertices.remove(v1);
        }

        let v2 = self.half_edges[he1].dst;
        if self.half_edges[he1].next != he2 {
            let he_next = self.half_edges[he1].next;
            let he_prev = self.half_edges[he2].prev;
            self.half_edges[he_next].prev = he_prev;
            self.half_edges[he_prev].next = he_next;
            self.vertices[v2].incident.retain(|&h| h != he1 && h != he2);
        } else {
            self.vertices.remove(v2);
        }

        self.half_edges.remove(he1);
        self.half_edges.remove(he2);
        self.edges.remove(e);
    }

    /// Walks `next`/`buddy` alternation to find the next half-edge whose
    /// buddy lies outside the marked removal set.
    fn find_next_boundary_half_edge(&self, start: HalfEdgeId) -> HalfEdgeId {
        let mut he = self.half_edges[start].next;
        let mut buddy = self.half_edges[he].buddy;
        while self.half_edges[buddy].in_removal_set && he != start {
            he = self.half_edges[buddy].next;
            buddy = self.half_edges[he].buddy;
        }
        he
    }

    /// Finds the ordered cyclic boundary of a connected face set: the
    /// half-edges of the set whose buddies lie outside it.
    ///
    /// Returns `None` when the set is degenerate — fewer than three
    /// boundary half-edges, or a walk that fails to close over the
    /// expected count (the set is not a simply-connected disk). The
    /// caller must treat that as "operation cannot proceed"; the mesh is
    /// left untouched either way.
    pub(crate) fn find_circumference(&mut self, faces: &[FaceId]) -> Option<Vec<HalfEdgeId>> {
        for &f in faces {
            for i in 0..self.faces[f].half_edges.len() {
                let h = self.faces[f].half_edges[i];
                self.half_edges[h].in_removal_set = true;
            }
        }

        let mut boundary_count = 0usize;
        let mut start = HalfEdgeId::null();
        for &f in faces {
            for &h in &self.faces[f].half_edges {
                let buddy = self.half_edges[h].buddy;
                if self.half_edges[h].in_removal_set && !self.half_edges[buddy].in_removal_set {
                    boundary_count += 1;
                    if start.is_null() {
                        start = h;
                    }
                }
            }
        }

        let boundary = if boundary_count < 3 {
            trace!(boundary_count, "circumference walk aborted: not a disk");
            None
        } else {
            let mut boundary = vec![start];
            let mut he = self.find_next_boundary_half_edge(start);
            while he != start && boundary.len() <= boundary_count {
                boundary.push(he);
                he = self.find_next_boundary_half_edge(he);
            }
            if boundary.len() == boundary_count {
                Some(boundary)
            } else {
                trace!(
                    expected = boundary_count,
                    walked = boundary.len(),
                    "circumference walk aborted: boundary did not close"
                );
                None
            }
        };

        for &f in faces {
            for i in 0..self.faces[f].half_edges.len() {
                let h = self.faces[f].half_edges[i];
                self.half_edges[h].in_removal_set = false;
            }
        }
        boundary
    }

    /// Builds a circular fan of triangles around a hole boundary,
    /// centered at a new apex vertex for `p`.
    ///
    /// `frontier` is the cyclic hole boundary — half-edges whose faces
    /// have been removed — ordered clockwise when looking down at the
    /// hole from the apex. One new stem edge per frontier vertex and one
    /// triangle per frontier half-edge are created; stems are spliced
    /// into the frontier vertices' incidence lists at the cyclically
    /// correct position, not appended.
    pub(crate) fn make_circular_fan(
        &mut self,
        frontier: &[HalfEdgeId],
        p: &Point3<f64>,
        id: Option<i64>,
    ) -> VertexId {
        let v_center = self.make_vertex(*p, id);

        let mut h_prev = HalfEdgeId::null();
        let mut h_last = HalfEdgeId::null();

        for (i, &h_base2) in frontier.iter().enumerate() {
            //            vBase
            // *<-----------*<-----------*
            // |  hBase2  /| |  hBase1   ^
            // |           | |           |
            // |     hStem2| |hStem1     |
            //  \          | |          /
            //   \         | |/        /
            //    \_______> * ________/
            //           vCenter  hPrev
            let h_base1 = self.half_edges[h_base2].prev;
            let v_base = self.half_edges[h_base2].src;

            let e_stem = self.make_edge(v_base, v_center);
            let (he1, he2) = {
                let edge = &self.edges[e_stem];
                (edge.he1, edge.he2)
            };
            let (h_stem1, h_stem2) = if self.half_edges[he1].dst == v_center {
                (he1, he2)
            } else {
                (he2, he1)
            };

            if i > 0 {
                let fid = self.make_triangle_from_half_edges(h_base1, h_stem1, h_prev);
                let buddy = self.half_edges[h_base1].buddy;
                let f_buddy = self.half_edges[buddy].face;
                let e_base = self.half_edges[h_base1].edge;
                self.edges[e_base].face_pred = self.face_coplanarity(fid, f_buddy);
            }

            if i == frontier.len() - 1 {
                let fid = self.make_triangle_from_half_edges(h_base2, h_last, h_stem2);

                let buddy = self.half_edges[h_base2].buddy;
                let f_buddy = self.half_edges[buddy].face;
                let e_base = self.half_edges[h_base2].edge;
                self.edges[e_base].face_pred = self.face_coplanarity(fid, f_buddy);

                let buddy = self.half_edges[h_last].buddy;
                let f_buddy = self.half_edges[buddy].face;
                let e_last = self.half_edges[h_last].edge;
                self.edges[e_last].face_pred = self.face_coplanarity(fid, f_buddy);
            }

            // Splice the stems into vBase's incidence just before hBase1,
            // preserving the CCW ordering around the vertex.
            let pos = self.vertices[v_base]
                .incident
                .iter()
                .position(|&h| h == h_base1)
                .expect("frontier half-edge must be incident to its source vertex");
            self.vertices[v_base].incident.insert(pos, h_stem1);
            self.vertices[v_base].incident.insert(pos, h_stem2);

            self.vertices[v_center].incident.push(h_stem1);
            self.vertices[v_center].incident.push(h_stem2);

            h_prev = h_stem2;
            if i == 0 {
                h_last = h_stem1;
            }
        }

        v_center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn unit_cuboid() -> Manifold {
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
        m
    }

    #[test]
    fn circumference_of_single_face_is_its_cycle() {
        let mut m = unit_cuboid();
        let f = m.face_ids().next().unwrap();
        let boundary = m.find_circumference(&[f]).unwrap();
        assert_eq!(boundary.len(), 4);
        for h in &boundary {
            assert_eq!(m.half_edges[*h].face, f);
        }
        // Transient markers must be cleared again.
        assert!(m.half_edges.values().all(|he| !he.in_removal_set));
    }

    #[test]
    fn circumference_of_adjacent_pair_has_six_half_edges() {
        let mut m = unit_cuboid();
        let f1 = m.face_ids().next().unwrap();
        let shared = m.faces[f1].half_edges[0];
        let buddy = m.half_edges[shared].buddy;
        let f2 = m.half_edges[buddy].face;

        let boundary = m.find_circumference(&[f1, f2]).unwrap();
        assert_eq!(boundary.len(), 6);
    }

    #[test]
    fn circumference_of_disjoint_faces_aborts() {
        let mut m = unit_cuboid();
        // Find two faces with opposite normals: never edge-connected.
        let ids: Vec<_> = m.face_ids().collect();
        let mut pair = None;
        'outer: for &a in &ids {
            for &b in &ids {
                if a != b && m.faces[a].normal.dot(&m.faces[b].normal) < -0.9 {
                    pair = Some((a, b));
                    break 'outer;
                }
            }
        }
        let (a, b) = pair.unwrap();
        assert!(m.find_circumference(&[a, b]).is_none());
        assert!(m.half_edges.values().all(|he| !he.in_removal_set));
    }

    #[test]
    fn fan_over_removed_face_restores_closure() {
        let mut m = unit_cuboid();
        // Pick the +z face and raise an apex above it.
        let top = m
            .face_ids()
            .find(|&f| m.faces[f].normal.dot(&Vector3::z()) > 0.9)
            .unwrap();

        let boundary = m.find_circumference(&[top]).unwrap();
        m.remove_faces(&[top]);
        let apex = m.make_circular_fan(&boundary, &Point3::new(0.5, 0.5, 2.0), None);

        assert_eq!(m.vertex_count(), 9);
        assert_eq!(m.edge_count(), 16);
        assert_eq!(m.face_count(), 9);
        assert_eq!(m.vertices[apex].degree(), 4);

        // Every half-edge is attached and every face cycle closes.
        for (h, he) in &m.half_edges {
            assert!(!he.face.is_null());
            assert_eq!(m.half_edges[he.buddy].buddy, h);
        }
        for f in m.face_ids() {
            let cycle = m.faces[f].half_edges.clone();
            let mut h = cycle[0];
            for _ in 0..cycle.len() {
                h = m.half_edges[h].next;
            }
            assert_eq!(h, cycle[0]);
        }

        // Apex incidence alternates stems in CCW order: 8 entries.
        assert_eq!(m.vertices[apex].incident.len(), 8);
    }

    #[test]
    fn remove_faces_drops_orphan_edges_and_vertices() {
        let mut m = unit_cuboid();
        let all: Vec<FaceId> = m.face_ids().collect();
        m.remove_faces(&all);
        assert_eq!(m.face_count(), 0);
        assert_eq!(m.edge_count(), 0);
        assert_eq!(m.vertex_count(), 0);
    }
}
