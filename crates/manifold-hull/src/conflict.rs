//! Bipartite conflict graph for incremental hull construction.
//!
//! Nodes wrap either a current hull face or a still-unprocessed input
//! point; a directed arc face → point records "the point lies strictly
//! outside that face". Face nodes live exactly as long as their face
//! (removed or merged faces drop their node in the same operation), and
//! point nodes are dropped once the point is incorporated or found
//! degenerate.
//!
//! The face ↔ node back-reference is kept out of the manifold entirely:
//! it is a secondary map owned here, updated atomically with node
//! creation and removal, so the two ownership domains cannot drift.

use nalgebra::Point3;
use slotmap::SecondaryMap;

use crate::graph::{DiGraph, NodeId};
use crate::types::FaceId;

/// An unprocessed input point tracked by the conflict graph.
#[derive(Debug, Clone)]
pub(crate) struct PointConflict {
    pub point: Point3<f64>,
    pub id: i64,
    /// Transient dedup marker for frontier/merge scans.
    pub found: bool,
}

/// Payload of a conflict-graph node.
#[derive(Debug, Clone)]
pub(crate) enum ConflictPayload {
    Face(FaceId),
    Point(PointConflict),
}

/// The conflict graph plus the face → node bimap.
#[derive(Debug, Default)]
pub(crate) struct ConflictGraph {
    graph: DiGraph<ConflictPayload>,
    face_nodes: SecondaryMap<FaceId, NodeId>,
}

impl ConflictGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.face_nodes.clear();
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Creates the node for a newly born face.
    pub fn insert_face(&mut self, face: FaceId) -> NodeId {
        let node = self.graph.add_node(ConflictPayload::Face(face));
        self.face_nodes.insert(face, node);
        node
    }

    /// Drops the node of a face being removed or merged, discarding its
    /// visibility arcs.
    pub fn remove_face(&mut self, face: FaceId) {
        if let Some(node) = self.face_nodes.remove(face) {
            self.graph.remove_node(node);
        }
    }

    /// Node of a live face, if it has one.
    pub fn face_node(&self, face: FaceId) -> Option<NodeId> {
        self.face_nodes.get(face).copied()
    }

    /// Creates the node for an unprocessed point.
    pub fn insert_point(&mut self, point: Point3<f64>, id: i64) -> NodeId {
        self.graph.add_node(ConflictPayload::Point(PointConflict {
            point,
            id,
            found: false,
        }))
    }

    /// Drops a node of either kind, discarding its arcs.
    pub fn remove_node(&mut self, node: NodeId) {
        if let Some(ConflictPayload::Face(face)) = self.graph.node(node) {
            self.face_nodes.remove(*face);
        }
        self.graph.remove_node(node);
    }

    /// `true` if the node handle still resolves.
    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.contains(node)
    }

    /// Number of faces currently seeing this point.
    pub fn degree_in(&self, node: NodeId) -> usize {
        self.graph.degree_in(node)
    }

    /// Records that `point` is strictly outside `face`.
    pub fn link_visible(&mut self, face_node: NodeId, point_node: NodeId) {
        self.graph.add_arc(face_node, point_node);
    }

    /// Point payload accessor.
    ///
    /// # Panics
    ///
    /// Panics when the node is not a point node; mixing the two node
    /// kinds up is a driver bug, not a data-dependent outcome.
    pub fn point(&self, node: NodeId) -> &PointConflict {
        match self.graph.node(node) {
            Some(ConflictPayload::Point(p)) => p,
            _ => panic!("conflict node is not a point node"),
        }
    }

    /// Mutable point payload accessor (for the transient `found` flag).
    pub fn point_mut(&mut self, node: NodeId) -> &mut PointConflict {
        match self.graph.node_mut(node) {
            Some(ConflictPayload::Point(p)) => p,
            _ => panic!("conflict node is not a point node"),
        }
    }

    /// Face wrapped by a face node.
    pub fn face_of(&self, node: NodeId) -> FaceId {
        match self.graph.node(node) {
            Some(ConflictPayload::Face(f)) => *f,
            _ => panic!("conflict node is not a face node"),
        }
    }

    /// Face nodes currently seeing this point (its in-arc tails).
    pub fn visible_faces(&self, point_node: NodeId) -> Vec<NodeId> {
        self.graph.in_arcs(point_node).map(|(_, n)| n).collect()
    }

    /// Point nodes this face currently sees (its out-arc heads).
    pub fn visible_points(&self, face_node: NodeId) -> Vec<NodeId> {
        self.graph.out_arcs(face_node).map(|(_, n)| n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn face_bimap_tracks_node_lifetime() {
        let mut faces: SlotMap<FaceId, ()> = SlotMap::with_key();
        let f = faces.insert(());

        let mut cg = ConflictGraph::new();
        let fnode = cg.insert_face(f);
        let pnode = cg.insert_point(Point3::origin(), 7);
        cg.link_visible(fnode, pnode);

        assert_eq!(cg.face_node(f), Some(fnode));
        assert_eq!(cg.degree_in(pnode), 1);
        assert_eq!(cg.visible_faces(pnode), vec![fnode]);

        cg.remove_face(f);
        assert_eq!(cg.face_node(f), None);
        assert_eq!(cg.degree_in(pnode), 0);
        assert!(cg.contains(pnode));
    }

    #[test]
    fn removing_point_node_discards_visibility() {
        let mut faces: SlotMap<FaceId, ()> = SlotMap::with_key();
        let f = faces.insert(());

        let mut cg = ConflictGraph::new();
        let fnode = cg.insert_face(f);
        let pnode = cg.insert_point(Point3::new(1.0, 2.0, 3.0), 0);
        cg.link_visible(fnode, pnode);

        cg.remove_node(pnode);
        assert!(cg.visible_points(fnode).is_empty());
        assert_eq!(cg.node_count(), 1);
    }
}
