//! Shared handle types, degeneracy predicates, and tolerance configuration.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a vertex owned by a [`Manifold`](crate::Manifold).
    pub struct VertexId;

    /// Handle to a half-edge owned by a [`Manifold`](crate::Manifold).
    pub struct HalfEdgeId;

    /// Handle to an edge owned by a [`Manifold`](crate::Manifold).
    pub struct EdgeId;

    /// Handle to a face owned by a [`Manifold`](crate::Manifold).
    pub struct FaceId;
}

/// Default tolerance for squared-distance comparisons.
pub const EPSILON_SQUARED: f64 = 1.0e-8;

/// Default tolerance for plain (linear) distance comparisons.
pub const EPSILON_LINEAR: f64 = 1.0e-8;

/// Default tolerance for cross-product magnitudes (angular degeneracy).
pub const EPSILON_ANGLE: f64 = 1.0e-8;

/// Geometric degeneracy classification.
///
/// These are *expected* outcomes of computing with imperfect input, not
/// errors: coincident points, colinear edges, and coplanar faces are all
/// produced routinely by hull construction and are repaired or reported,
/// never thrown.
///
/// At the top level of [`find_convex_hull`](crate::Manifold::find_convex_hull)
/// a value other than [`Degeneracy::None`] means no hull was built and the
/// manifold must not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Degeneracy {
    /// No degeneracy detected.
    #[default]
    None,

    /// Two features (points, vertices) are closer than the tolerance.
    MaybeCoincident,

    /// Three or more points lie on a common line within the tolerance.
    MaybeColinear,

    /// Four or more points lie on a common plane within the tolerance.
    MaybeCoplanar,

    /// The feature set is too small or too thin to span a 3D volume.
    MaybeFlat,
}

impl Degeneracy {
    /// `true` unless the value is [`Degeneracy::None`].
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !matches!(self, Degeneracy::None)
    }
}

/// Tolerance configuration for convex hull construction.
///
/// All planarity, convexity, and coincidence tests share a single margin,
/// compared against squared distances or cross-product magnitudes so that
/// no test pays for a square root. A result exactly on the boundary is
/// classified as degenerate: ties favour conservative repair over keeping
/// nearly-degenerate features apart.
///
/// # Example
///
/// ```
/// use manifold_hull::HullParams;
///
/// // Defaults are suitable for unit-scale coordinates.
/// let params = HullParams::default();
///
/// // Looser margin, e.g. to force coplanar triangle pairs to merge.
/// let params = HullParams { epsilon: 1e-6 };
/// # let _ = params;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HullParams {
    /// Squared-scale margin used by every predicate during hull finding.
    pub epsilon: f64,
}

impl Default for HullParams {
    fn default() -> Self {
        Self {
            epsilon: EPSILON_SQUARED,
        }
    }
}
