//! Incremental 3D convex hulls on an editable half-edge manifold.
//!
//! This crate computes convex hulls of 3D point sets and maintains the
//! result as an explicit half-edge boundary representation that supports
//! topological editing: face merging, edge removal, and elimination of
//! degenerate vertices. The hull algorithm is the incremental randomized
//! construction of de Berg et al., driven by a bipartite conflict graph
//! that tracks which unprocessed points can still see which hull faces.
//!
//! # Features
//!
//! - **Convex hulls**: expected `O(n log n)` incremental construction
//!   with per-point visibility tracking
//! - **Half-edge manifold**: vertices, edges, half-edges, and faces with
//!   ordered incidence, generation-checked handles, and full traversal
//! - **Degeneracy repair**: coplanar and concave face pairs are merged,
//!   degree-2 vertices elided, and 2-cycle faces removed after every
//!   insertion, so finished hulls are clean convex polytopes
//! - **Oriented bounding boxes**: minimal-volume boxes over hull face
//!   normals, with a 2D convex hull helper
//! - **Serialization**: an id-indexed marshalled form with a
//!   tab-separated text layout
//!
//! # Degeneracy handling
//!
//! Geometric degeneracy is an expected input property, never an error.
//! [`Manifold::find_convex_hull`] returns a [`Degeneracy`] predicate:
//! [`Degeneracy::None`] means the manifold now holds the hull; any other
//! value (too few points, colinear input, coplanar input) means no hull
//! was built and the manifold contents must not be trusted. A single
//! point that lands within tolerance of an existing hull feature is
//! dropped as coincident; the hull remains valid without it.
//!
//! Programming-contract violations are the other category: malformed
//! marshalled data surfaces as [`HullError`], and handing the topology
//! kernel an inconsistent structure panics rather than corrupting it.
//!
//! # Handle invalidation
//!
//! Vertex, edge, and face handles are invalidated by any structural
//! mutation of the owning manifold. Handles are generation-checked, so a
//! stale handle fails to resolve instead of aliasing a newer entity;
//! re-query handles after mutating calls rather than caching them.
//!
//! # Quick start
//!
//! ```
//! use manifold_hull::{Degeneracy, HullParams, Manifold};
//! use nalgebra::Point3;
//!
//! // Eight corners of a cube, plus its centroid.
//! let mut points: Vec<Point3<f64>> = Vec::new();
//! for x in [0.0, 1.0] {
//!     for y in [0.0, 1.0] {
//!         for z in [0.0, 1.0] {
//!             points.push(Point3::new(x, y, z));
//!         }
//!     }
//! }
//! points.push(Point3::new(0.5, 0.5, 0.5));
//!
//! let mut hull = Manifold::new();
//! let pred = hull.find_convex_hull(&points, &HullParams::default());
//! assert_eq!(pred, Degeneracy::None);
//!
//! // The interior point is dropped; coplanar triangle pairs merge into
//! // quads, leaving the cube itself.
//! assert_eq!(hull.vertex_count(), 8);
//! assert_eq!(hull.edge_count(), 12);
//! assert_eq!(hull.face_count(), 6);
//! ```

mod conflict;
mod error;
mod graph;
mod hull;
mod hull2d;
mod io;
mod manifold;
mod obb;
mod repair;
mod topology;
mod types;
mod validate;

pub use error::{HullError, HullResult};
pub use hull2d::{convex_hull_2d, convex_hull_2d_yz};
pub use io::{emit_text, parse_text, MarshalledManifold};
pub use manifold::{Edge, Face, HalfEdge, Manifold, Vertex};
pub use obb::{find_obb_3d, OrientedBoundingBox};
pub use types::{
    Degeneracy, EdgeId, FaceId, HalfEdgeId, HullParams, VertexId, EPSILON_ANGLE, EPSILON_LINEAR,
    EPSILON_SQUARED,
};
pub use validate::HullReport;
