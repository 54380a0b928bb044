//! Shared types for the cellplan decomposition pipeline.
//!
//! Everything geometric in this crate compares coordinates through one
//! fixed tolerance, [`TOLERANCE`]. Node identity in the planar graph is
//! defined by [`Point::key`], which quantizes coordinates to that
//! tolerance so that accumulated floating error cannot split one
//! geometric point into two graph nodes.

use geo::{Coord, LineString, Polygon};
use geo::line_intersection::line_intersection;
use serde::{Deserialize, Serialize};

use crate::adjacency::{AdjacencyGraph, AdjacencyMode};
use crate::faces::Face;
use crate::graph::GraphExport;

/// Fixed coordinate tolerance for all geometric comparisons.
///
/// Two coordinates closer than this are the same coordinate; a vertical
/// segment shorter than this is degenerate and absorbed. Also used as
/// the offset for the free-space probe points in
/// [`crate::vertical::compute_vertical_segments`].
pub const TOLERANCE: f64 = 1e-5;

/// Quantize a coordinate to the tolerance grid.
#[allow(clippy::cast_possible_truncation)]
fn quantize(v: f64) -> i64 {
    (v / TOLERANCE).round() as i64
}

/// A 2D point in workspace coordinates (y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// The tolerance-quantized identity key of this point.
    ///
    /// Two points within [`TOLERANCE`] of each other (up to grid
    /// rounding at the cell boundary) share a key and are treated as
    /// one node by the planar graph builder.
    #[must_use]
    pub fn key(self) -> PointKey {
        PointKey {
            x: quantize(self.x),
            y: quantize(self.y),
        }
    }

    /// Whether both coordinates are within [`TOLERANCE`] of `other`'s.
    #[must_use]
    pub fn close_to(self, other: Self) -> bool {
        (self.x - other.x).abs() < TOLERANCE && (self.y - other.y).abs() < TOLERANCE
    }
}

impl From<Point> for Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl From<Coord<f64>> for Point {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// Hashable identity key for a [`Point`], quantized to [`TOLERANCE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey {
    x: i64,
    y: i64,
}

/// The rectangular workspace: `[0, width] x [0, height]` with the
/// origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Workspace width.
    pub width: f64,
    /// Workspace height.
    pub height: f64,
}

impl Boundary {
    /// Create a new boundary rectangle.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The four corners in counterclockwise order starting at the origin.
    #[must_use]
    pub const fn corners(self) -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(self.width, 0.0),
            Point::new(self.width, self.height),
            Point::new(0.0, self.height),
        ]
    }

    /// Whether `p` lies inside the workspace, within tolerance.
    #[must_use]
    pub fn contains(self, p: Point) -> bool {
        p.x >= -TOLERANCE
            && p.x <= self.width + TOLERANCE
            && p.y >= -TOLERANCE
            && p.y <= self.height + TOLERANCE
    }
}

/// A polygonal obstacle, stored as an ordered vertex ring without the
/// closing duplicate. Winding may be either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Obstacle {
    ring: Vec<Point>,
}

impl Obstacle {
    /// Create an obstacle from an ordered vertex ring.
    ///
    /// Validation happens separately via [`validate`](Self::validate);
    /// construction never fails so that request payloads deserialize
    /// cleanly before being checked.
    #[must_use]
    pub const fn new(ring: Vec<Point>) -> Self {
        Self { ring }
    }

    /// The vertex ring (no closing duplicate).
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.ring
    }

    /// Iterate the cyclic boundary edges `(v[i], v[i+1])`.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.ring.len();
        (0..n).map(move |i| (self.ring[i], self.ring[(i + 1) % n]))
    }

    /// Convert to a `geo::Polygon` for containment and intersection
    /// queries.
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.ring.iter().copied().map(Coord::from).collect();
        Polygon::new(LineString::from(coords), Vec::new())
    }

    /// Check the preconditions the pipeline relies on: at least three
    /// vertices, a non-self-intersecting ring, and every vertex inside
    /// the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidObstacle`] carrying `index` and the
    /// specific [`ObstacleFault`].
    pub fn validate(&self, index: usize, boundary: Boundary) -> Result<(), PlanError> {
        if self.ring.len() < 3 {
            return Err(PlanError::InvalidObstacle {
                index,
                fault: ObstacleFault::TooFewVertices {
                    count: self.ring.len(),
                },
            });
        }

        if self.ring.iter().any(|&v| !boundary.contains(v)) {
            return Err(PlanError::InvalidObstacle {
                index,
                fault: ObstacleFault::OutsideBoundary,
            });
        }

        if self.is_self_intersecting() {
            return Err(PlanError::InvalidObstacle {
                index,
                fault: ObstacleFault::SelfIntersecting,
            });
        }

        Ok(())
    }

    /// Whether any two non-adjacent ring edges intersect.
    ///
    /// Cyclically adjacent edges share a vertex and are exempt; any
    /// contact between the others (crossing, touching, or collinear
    /// overlap) makes the ring non-simple.
    fn is_self_intersecting(&self) -> bool {
        let edges: Vec<geo::Line<f64>> = self
            .edges()
            .filter(|(a, b)| !a.close_to(*b))
            .map(|(a, b)| geo::Line::new(Coord::from(a), Coord::from(b)))
            .collect();
        let n = edges.len();

        for i in 0..n {
            for j in i + 1..n {
                // Skip cyclically adjacent edge pairs.
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                if line_intersection(edges[i], edges[j]).is_some() {
                    return true;
                }
            }
        }
        false
    }
}

/// Faults detected by [`Obstacle::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ObstacleFault {
    /// The ring has fewer than three vertices.
    #[error("ring has {count} vertices, need at least 3")]
    TooFewVertices {
        /// Number of vertices supplied.
        count: usize,
    },
    /// Two non-adjacent ring edges intersect.
    #[error("ring is self-intersecting")]
    SelfIntersecting,
    /// A vertex lies outside the workspace rectangle.
    #[error("ring extends outside the workspace")]
    OutsideBoundary,
}

/// Errors that abort a planning query.
///
/// An absent path is *not* an error — [`crate::query`] returns an empty
/// route for unreachable goals.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PlanError {
    /// An obstacle violates the generator's preconditions.
    #[error("obstacle {index} is invalid: {fault}")]
    InvalidObstacle {
        /// Zero-based index of the offending obstacle in the request.
        index: usize,
        /// What is wrong with it.
        fault: ObstacleFault,
    },

    /// The built graph is not a planar embedding: two edges cross away
    /// from a shared endpoint. Always a construction defect upstream,
    /// never a recoverable condition.
    #[error("planar graph invariant violated: {0}")]
    NonPlanar(String),
}

/// One planning query: workspace, obstacles, and an optional start/goal
/// pair.
///
/// Every structure derived from a request is built fresh for that
/// request and discarded afterwards; nothing persists across queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Workspace width.
    pub width: f64,
    /// Workspace height.
    pub height: f64,
    /// Obstacle polygons as ordered vertex rings. Must be simple,
    /// pairwise non-overlapping, and inside the workspace.
    pub obstacles: Vec<Obstacle>,
    /// Query start point, if a path is wanted.
    #[serde(default)]
    pub start: Option<Point>,
    /// Query goal point, if a path is wanted.
    #[serde(default)]
    pub goal: Option<Point>,
    /// How strictly cell adjacency is decided. The default suits cells
    /// produced by this crate's own decomposition, which share full
    /// edges by construction.
    #[serde(default)]
    pub adjacency: AdjacencyMode,
}

impl PlanRequest {
    /// The workspace rectangle of this request.
    #[must_use]
    pub const fn boundary(&self) -> Boundary {
        Boundary::new(self.width, self.height)
    }
}

/// Everything one query produces, ready for JSON serialization toward
/// the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The validated obstacle rings, echoed back for rendering.
    pub obstacles: Vec<Obstacle>,
    /// The planar free-space graph.
    pub graph: GraphExport,
    /// The bounded free-space cell polygons.
    pub faces: Vec<Face>,
    /// The weighted cell-adjacency graph.
    pub adjacency: AdjacencyGraph,
    /// Cell indices from the start cell to the goal cell. Empty when no
    /// start/goal was given or when the goal is unreachable.
    pub path: Vec<usize>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_keys_merge_within_tolerance() {
        let a = Point::new(100.0, 200.0);
        let b = Point::new(100.0 + TOLERANCE * 0.4, 200.0 - TOLERANCE * 0.4);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn point_keys_differ_beyond_tolerance() {
        let a = Point::new(100.0, 200.0);
        let b = Point::new(100.0 + TOLERANCE * 10.0, 200.0);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn boundary_corners_counterclockwise() {
        let corners = Boundary::new(600.0, 400.0).corners();
        assert_eq!(corners[0], Point::new(0.0, 0.0));
        assert_eq!(corners[1], Point::new(600.0, 0.0));
        assert_eq!(corners[2], Point::new(600.0, 400.0));
        assert_eq!(corners[3], Point::new(0.0, 400.0));
    }

    #[test]
    fn boundary_contains_edge_points() {
        let b = Boundary::new(600.0, 600.0);
        assert!(b.contains(Point::new(0.0, 0.0)));
        assert!(b.contains(Point::new(600.0, 600.0)));
        assert!(!b.contains(Point::new(600.1, 300.0)));
        assert!(!b.contains(Point::new(300.0, -0.1)));
    }

    #[test]
    fn obstacle_edges_are_cyclic() {
        let obstacle = Obstacle::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 10.0),
        ]);
        let edges: Vec<_> = obstacle.edges().collect();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2], (Point::new(5.0, 10.0), Point::new(0.0, 0.0)));
    }

    #[test]
    fn validate_accepts_triangle() {
        let obstacle = Obstacle::new(vec![
            Point::new(100.0, 100.0),
            Point::new(200.0, 100.0),
            Point::new(150.0, 200.0),
        ]);
        assert!(obstacle.validate(0, Boundary::new(600.0, 600.0)).is_ok());
    }

    #[test]
    fn validate_rejects_too_few_vertices() {
        let obstacle = Obstacle::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let err = obstacle
            .validate(3, Boundary::new(600.0, 600.0))
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidObstacle {
                index: 3,
                fault: ObstacleFault::TooFewVertices { count: 2 },
            },
        );
    }

    #[test]
    fn validate_rejects_bowtie() {
        // Self-intersecting "bowtie": edges (0-1) and (2-3) cross.
        let obstacle = Obstacle::new(vec![
            Point::new(100.0, 100.0),
            Point::new(200.0, 200.0),
            Point::new(200.0, 100.0),
            Point::new(100.0, 200.0),
        ]);
        let err = obstacle
            .validate(0, Boundary::new(600.0, 600.0))
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidObstacle {
                fault: ObstacleFault::SelfIntersecting,
                ..
            },
        ));
    }

    #[test]
    fn validate_rejects_out_of_bounds() {
        let obstacle = Obstacle::new(vec![
            Point::new(500.0, 500.0),
            Point::new(700.0, 500.0),
            Point::new(600.0, 550.0),
        ]);
        let err = obstacle
            .validate(0, Boundary::new(600.0, 600.0))
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidObstacle {
                fault: ObstacleFault::OutsideBoundary,
                ..
            },
        ));
    }

    #[test]
    fn plan_error_display() {
        let err = PlanError::InvalidObstacle {
            index: 1,
            fault: ObstacleFault::SelfIntersecting,
        };
        assert_eq!(
            err.to_string(),
            "obstacle 1 is invalid: ring is self-intersecting",
        );
    }

    #[test]
    fn obstacle_serde_is_a_bare_ring() {
        let obstacle = Obstacle::new(vec![
            Point::new(1.0, 2.0),
            Point::new(3.0, 4.0),
            Point::new(5.0, 6.0),
        ]);
        let json = serde_json::to_string(&obstacle).unwrap();
        assert_eq!(json, r#"[{"x":1.0,"y":2.0},{"x":3.0,"y":4.0},{"x":5.0,"y":6.0}]"#);
        let back: Obstacle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obstacle);
    }
}
