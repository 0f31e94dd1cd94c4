//! 2D convex hull by Andrew's monotone chain.
//!
//! A thin helper over sorted upper/lower boundary stacks, used by the
//! oriented-bounding-box search to reduce each candidate projection to
//! its hull before the rotating-edge scan.

use nalgebra::{Point3, Vector2};

use crate::types::EPSILON_LINEAR;

#[inline]
fn cross2(o: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn hull_indices(points: &[(Vector2<f64>, usize)]) -> Vec<usize> {
    if points.len() < 3 {
        return points.iter().map(|&(_, i)| i).collect();
    }

    let mut sorted: Vec<&(Vector2<f64>, usize)> = points.iter().collect();
    sorted.sort_by(|a, b| {
        a.0.x
            .partial_cmp(&b.0.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.y.partial_cmp(&b.0.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    // Lower boundary, then upper; strictly convex turns only, so
    // colinear runs collapse to their endpoints.
    let mut lower: Vec<&(Vector2<f64>, usize)> = Vec::new();
    for p in &sorted {
        while lower.len() >= 2
            && cross2(&lower[lower.len() - 2].0, &lower[lower.len() - 1].0, &p.0)
                <= EPSILON_LINEAR
        {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<&(Vector2<f64>, usize)> = Vec::new();
    for p in sorted.iter().rev() {
        while upper.len() >= 2
            && cross2(&upper[upper.len() - 2].0, &upper[upper.len() - 1].0, &p.0)
                <= EPSILON_LINEAR
        {
            upper.pop();
        }
        upper.push(p);
    }

    let mut result: Vec<usize> = lower[..lower.len() - 1].iter().map(|p| p.1).collect();
    result.extend(upper[..upper.len() - 1].iter().map(|p| p.1));
    result
}

/// Indices of the convex hull of 2D points, counter-clockwise starting
/// from the lexicographically smallest point. Colinear boundary points
/// are dropped.
pub fn convex_hull_2d(points: &[Vector2<f64>]) -> Vec<usize> {
    let indexed: Vec<(Vector2<f64>, usize)> =
        points.iter().copied().zip(0..points.len()).collect();
    hull_indices(&indexed)
}

/// Convex hull of 3D points projected onto the YZ plane, returning
/// indices into `points`. The X coordinate is ignored.
pub fn convex_hull_2d_yz(points: &[Point3<f64>]) -> Vec<usize> {
    let indexed: Vec<(Vector2<f64>, usize)> = points
        .iter()
        .map(|p| Vector2::new(p.y, p.z))
        .zip(0..points.len())
        .collect();
    hull_indices(&indexed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_with_interior_points() {
        let points = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 2.0),
            Vector2::new(0.0, 2.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.5, 1.2),
        ];
        let hull = convex_hull_2d(&points);
        assert_eq!(hull, vec![0, 1, 2, 3]);
    }

    #[test]
    fn colinear_points_collapse_to_endpoints() {
        let points = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 1.0),
            Vector2::new(1.0, 0.5),
        ];
        let hull = convex_hull_2d(&points);
        assert_eq!(hull, vec![0, 2, 3]);
    }

    #[test]
    fn yz_projection_ignores_x() {
        let points = vec![
            Point3::new(9.0, 0.0, 0.0),
            Point3::new(-3.0, 1.0, 0.0),
            Point3::new(0.5, 1.0, 1.0),
            Point3::new(7.0, 0.0, 1.0),
            Point3::new(0.0, 0.5, 0.5),
        ];
        let hull = convex_hull_2d_yz(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&4));
    }

    #[test]
    fn degenerate_inputs_pass_through() {
        assert_eq!(convex_hull_2d(&[]), Vec::<usize>::new());
        let two = vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0)];
        assert_eq!(convex_hull_2d(&two), vec![0, 1]);
    }
}
