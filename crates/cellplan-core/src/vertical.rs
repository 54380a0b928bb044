//! Vertical visibility segments: the maximal free vertical extent above
//! and below every obstacle vertex.
//!
//! For each distinct vertex the computer probes one tolerance step above
//! and below. A free probe casts a ray to the corresponding workspace
//! wall and clips it against every obstacle edge; the nearest hit (or
//! the wall) bounds the segment. A probe inside or on an obstacle
//! yields no segment on that side, so a vertex can contribute zero, one,
//! or two segments.
//!
//! Degenerate results — a vertex sitting on a workspace wall, or an
//! obstacle edge grazing the probe — collapse to segments no longer
//! than the tolerance and are dropped here rather than surfaced.

use std::collections::HashSet;

use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Intersects, Line, Polygon};
use serde::{Deserialize, Serialize};

use crate::types::{Boundary, Obstacle, Point, TOLERANCE};

/// A maximal free vertical segment anchored at an obstacle vertex.
///
/// Invariant: `y_top > y_bottom` and `y_top - y_bottom > TOLERANCE`;
/// `source` is one of the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalSegment {
    /// The shared x coordinate.
    pub x: f64,
    /// Upper endpoint y.
    pub y_top: f64,
    /// Lower endpoint y.
    pub y_bottom: f64,
    /// The obstacle vertex this segment is anchored at.
    pub source: Point,
}

impl VerticalSegment {
    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.y_top - self.y_bottom
    }
}

/// Compute the vertical visibility segments for an obstacle set.
///
/// Vertices shared between obstacles (or repeated within a ring) are
/// probed once. Output order follows obstacle order and ring order,
/// with the upward segment before the downward one, so identical input
/// yields an identical segment list.
#[must_use]
pub fn compute_vertical_segments(
    boundary: Boundary,
    obstacles: &[Obstacle],
) -> Vec<VerticalSegment> {
    let polygons: Vec<Polygon<f64>> = obstacles.iter().map(Obstacle::to_polygon).collect();
    let edges: Vec<Line<f64>> = obstacles
        .iter()
        .flat_map(Obstacle::edges)
        .filter(|(a, b)| !a.close_to(*b))
        .map(|(a, b)| Line::new(Coord::from(a), Coord::from(b)))
        .collect();

    let mut seen = HashSet::new();
    let mut segments = Vec::new();

    for vertex in obstacles.iter().flat_map(|o| o.vertices().iter().copied()) {
        if !seen.insert(vertex.key()) {
            continue;
        }

        // Upward: probe one tolerance step above the vertex, then take
        // the nearest edge hit above it, or the top wall.
        let probe_up = Coord {
            x: vertex.x,
            y: vertex.y + TOLERANCE,
        };
        if !blocked(&polygons, probe_up) {
            let ray = Line::new(
                probe_up,
                Coord {
                    x: vertex.x,
                    y: boundary.height,
                },
            );
            let y_top = hit_ys(&edges, ray)
                .fold(boundary.height, f64::min);
            if y_top - vertex.y > TOLERANCE {
                segments.push(VerticalSegment {
                    x: vertex.x,
                    y_top,
                    y_bottom: vertex.y,
                    source: vertex,
                });
            }
        }

        // Downward: symmetric, toward y = 0, taking the nearest hit
        // below (largest y).
        let probe_down = Coord {
            x: vertex.x,
            y: vertex.y - TOLERANCE,
        };
        if !blocked(&polygons, probe_down) {
            let ray = Line::new(
                probe_down,
                Coord {
                    x: vertex.x,
                    y: 0.0,
                },
            );
            let y_bottom = hit_ys(&edges, ray).fold(0.0, f64::max);
            if vertex.y - y_bottom > TOLERANCE {
                segments.push(VerticalSegment {
                    x: vertex.x,
                    y_top: vertex.y,
                    y_bottom,
                    source: vertex,
                });
            }
        }
    }

    segments
}

/// Whether a probe point lies inside or on any obstacle.
///
/// Boundary-inclusive on purpose: a probe sitting exactly on a vertical
/// obstacle wall must not count as free space, or the sweep would emit
/// tolerance-length segments hugging that wall.
fn blocked(polygons: &[Polygon<f64>], probe: Coord<f64>) -> bool {
    polygons.iter().any(|poly| poly.intersects(&probe))
}

/// The y coordinates where `ray` meets any obstacle edge.
///
/// A collinear overlap with an edge contributes both overlap endpoints,
/// so the nearest-hit fold still sees the closest obstruction.
fn hit_ys<'a>(
    edges: &'a [Line<f64>],
    ray: Line<f64>,
) -> impl Iterator<Item = f64> + 'a {
    edges.iter().flat_map(move |edge| {
        match line_intersection(ray, *edge) {
            Some(LineIntersection::SinglePoint { intersection, .. }) => {
                vec![intersection.y]
            }
            Some(LineIntersection::Collinear { intersection }) => {
                vec![intersection.start.y, intersection.end.y]
            }
            None => Vec::new(),
        }
    })
}
