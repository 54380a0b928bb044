//! Face extraction: walk the planar graph's embedded cycles and return
//! the bounded regions of free space (plus the obstacle interiors their
//! vertical walls seed).
//!
//! Every geometrically vertical edge except the right wall column is a
//! candidate seed, processed right to left and top to bottom. A seed is
//! skipped when its column span is already covered by an accepted face
//! at that x, or when the edge itself is part of an accepted ring. The
//! trace from a seed repeatedly takes the most clockwise turn; a walk
//! that closes on its start node becomes a face, a walk that dead-ends
//! or runs out of fuel is discarded. Accepted rings mark their edges
//! visited in both directions, except vertical edges on the seed's own
//! column, which stay available to seed the neighbouring region.
//!
//! Extraction begins with a geometric planarity check; a crossing means
//! the graph builder produced a broken embedding and extraction refuses
//! to run on it.

use std::collections::{HashMap, HashSet};

use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{Centroid, Coord, Line, LineString, Polygon};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::graph::PlanarGraph;
use crate::types::{PlanError, Point, PointKey, TOLERANCE};

/// A closed region traced from the planar graph.
///
/// The ring lists the boundary nodes in trace order with the first
/// point repeated at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Face {
    ring: Vec<Point>,
}

impl Face {
    pub(crate) fn new(ring: Vec<Point>) -> Self {
        Self { ring }
    }

    /// The closed ring, first point repeated last.
    #[must_use]
    pub fn ring(&self) -> &[Point] {
        &self.ring
    }

    /// Axis-aligned bounding box as `(min corner, max corner)`.
    #[must_use]
    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.ring {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// The ring as a `geo` polygon.
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(
                self.ring.iter().map(|p| Coord::from(*p)).collect::<Vec<_>>(),
            ),
            Vec::new(),
        )
    }

    /// Area centroid of the ring.
    ///
    /// Falls back to the vertex mean for rings whose area degenerates
    /// to zero.
    #[must_use]
    pub fn centroid(&self) -> Point {
        self.to_polygon().centroid().map_or_else(
            || self.vertex_mean(),
            |c| Point::new(c.x(), c.y()),
        )
    }

    fn vertex_mean(&self) -> Point {
        // The closing vertex would double-count.
        let open = &self.ring[..self.ring.len().saturating_sub(1)];
        if open.is_empty() {
            return Point::new(0.0, 0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = open.len() as f64;
        let (sx, sy) = open
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }
}

/// A seed edge: a vertical graph edge normalized top to bottom.
struct Seed {
    top: NodeIndex,
    bottom: NodeIndex,
    x: f64,
    y_top: f64,
    y_bottom: f64,
}

/// Extract all faces of the planar graph, in deterministic order.
///
/// # Errors
///
/// Returns [`PlanError::NonPlanar`] when two edges cross anywhere other
/// than a shared node.
pub fn extract_faces(graph: &PlanarGraph) -> Result<Vec<Face>, PlanError> {
    verify_planarity(graph)?;

    let seeds = collect_seeds(graph);

    let mut faces: Vec<Vec<NodeIndex>> = Vec::new();
    let mut visited: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let mut in_face: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let mut covered: HashMap<PointKey, Vec<(f64, f64)>> = HashMap::new();

    for seed in &seeds {
        let column = Point::new(seed.x, 0.0).key();

        // The column span may already belong to a face accepted at
        // this x.
        let contained = covered.get(&column).is_some_and(|ranges| {
            ranges.iter().any(|&(start, end)| {
                seed.y_top <= start + TOLERANCE && seed.y_bottom >= end - TOLERANCE
            })
        });
        if contained {
            continue;
        }
        if in_face.contains(&(seed.top, seed.bottom)) {
            continue;
        }

        let Some(ring) = trace_face(graph, seed.top, seed.bottom, &visited) else {
            continue;
        };
        // A closed ring needs at least a triangle plus the repeated
        // start node.
        if ring.len() < 4 {
            continue;
        }

        covered
            .entry(column)
            .or_default()
            .push((seed.y_top, seed.y_bottom));

        for pair in ring.windows(2) {
            let (p, q) = (pair[0], pair[1]);
            in_face.insert((p, q));
            in_face.insert((q, p));

            // Vertical edges on the seed column stay unvisited so the
            // region on their other side can still be traced.
            let (pp, pq) = (graph.point(p), graph.point(q));
            if (pp.x - pq.x).abs() < TOLERANCE && (pp.x - seed.x).abs() < TOLERANCE {
                continue;
            }
            visited.insert((p, q));
            visited.insert((q, p));
        }

        faces.push(ring);
    }

    Ok(faces
        .into_iter()
        .map(|ring| Face::new(ring.into_iter().map(|n| graph.point(n)).collect()))
        .collect())
}

/// Collect vertical seed edges, right to left and top to bottom,
/// excluding the right wall column.
fn collect_seeds(graph: &PlanarGraph) -> Vec<Seed> {
    let global_right = graph
        .nodes()
        .map(|(_, p)| p.x)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut seeds: Vec<Seed> = graph
        .edges()
        .filter_map(|(a, b, _)| {
            let (pa, pb) = (graph.point(a), graph.point(b));
            if (pa.x - pb.x).abs() >= TOLERANCE {
                return None;
            }
            let (top, bottom) = if pa.y > pb.y { (a, b) } else { (b, a) };
            let x = graph.point(top).x;
            if (x - global_right).abs() < TOLERANCE {
                return None;
            }
            Some(Seed {
                top,
                bottom,
                x,
                y_top: graph.point(top).y,
                y_bottom: graph.point(bottom).y,
            })
        })
        .collect();

    seeds.sort_by(|a, b| {
        b.x.total_cmp(&a.x)
            .then(b.y_top.total_cmp(&a.y_top))
            .then(b.y_bottom.total_cmp(&a.y_bottom))
    });
    seeds
}

/// Walk from `top -> bottom`, always taking the most clockwise turn,
/// until the walk closes on its start node.
///
/// Returns `None` for walks that dead-end or fail to close within
/// `2 x |nodes|` steps.
fn trace_face(
    graph: &PlanarGraph,
    top: NodeIndex,
    bottom: NodeIndex,
    visited: &HashSet<(NodeIndex, NodeIndex)>,
) -> Option<Vec<NodeIndex>> {
    let mut walk = vec![top, bottom];
    let mut direction = delta(graph, top, bottom);

    let fuse = graph.node_count() * 2;
    for _ in 0..fuse {
        let current = walk[walk.len() - 1];
        let previous = walk[walk.len() - 2];

        let mut best: Option<(f64, NodeIndex)> = None;
        for neighbor in graph.neighbors(current) {
            if neighbor == previous {
                continue;
            }
            if visited.contains(&(current, neighbor))
                || visited.contains(&(neighbor, current))
            {
                continue;
            }
            let angle = clockwise_angle(direction, delta(graph, current, neighbor));
            let better = best.is_none_or(|(best_angle, best_node)| {
                angle < best_angle - f64::EPSILON
                    || ((angle - best_angle).abs() <= f64::EPSILON
                        && neighbor.index() < best_node.index())
            });
            if better {
                best = Some((angle, neighbor));
            }
        }

        let (_, chosen) = best?;
        direction = delta(graph, current, chosen);
        walk.push(chosen);

        if chosen == walk[0] {
            return Some(walk);
        }
    }

    None
}

fn delta(graph: &PlanarGraph, from: NodeIndex, to: NodeIndex) -> (f64, f64) {
    let (a, b) = (graph.point(from), graph.point(to));
    (b.x - a.x, b.y - a.y)
}

/// Clockwise angle in degrees from `reference` to `target`, in
/// `(-180, 180]`. Negative values turn clockwise.
fn clockwise_angle(reference: (f64, f64), target: (f64, f64)) -> f64 {
    let dot = reference.0 * target.0 + reference.1 * target.1;
    let cross = reference.0 * target.1 - reference.1 * target.0;
    let mut angle = -cross.atan2(dot).to_degrees();
    if angle <= -180.0 {
        angle += 360.0;
    }
    angle
}

/// Reject graphs whose edges cross anywhere other than a shared node.
fn verify_planarity(graph: &PlanarGraph) -> Result<(), PlanError> {
    let edges: Vec<(NodeIndex, NodeIndex, Line<f64>)> = graph
        .edges()
        .map(|(a, b, _)| {
            (
                a,
                b,
                Line::new(Coord::from(graph.point(a)), Coord::from(graph.point(b))),
            )
        })
        .collect();

    for (i, &(a1, b1, l1)) in edges.iter().enumerate() {
        for &(a2, b2, l2) in &edges[i + 1..] {
            if a1 == a2 || a1 == b2 || b1 == a2 || b1 == b2 {
                continue;
            }
            let crossing = match line_intersection(l1, l2) {
                None => false,
                Some(LineIntersection::SinglePoint { is_proper: true, .. }) => true,
                Some(LineIntersection::SinglePoint {
                    intersection,
                    is_proper: false,
                }) => {
                    // An endpoint-on-endpoint touch between distinct
                    // nodes is a quantization artifact; an endpoint in
                    // another edge's interior is a missed split.
                    !(near_endpoint(l1, intersection) && near_endpoint(l2, intersection))
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    let dx = intersection.end.x - intersection.start.x;
                    let dy = intersection.end.y - intersection.start.y;
                    dx.hypot(dy) > TOLERANCE
                }
            };
            if crossing {
                return Err(PlanError::NonPlanar(format!(
                    "edges ({:.5}, {:.5})-({:.5}, {:.5}) and ({:.5}, {:.5})-({:.5}, {:.5}) cross",
                    l1.start.x,
                    l1.start.y,
                    l1.end.x,
                    l1.end.y,
                    l2.start.x,
                    l2.start.y,
                    l2.end.x,
                    l2.end.y,
                )));
            }
        }
    }
    Ok(())
}

fn near_endpoint(line: Line<f64>, point: Coord<f64>) -> bool {
    let near = |c: Coord<f64>| (c.x - point.x).abs() < TOLERANCE && (c.y - point.y).abs() < TOLERANCE;
    near(line.start) || near(line.end)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::build_planar_graph;
    use crate::types::{Boundary, Obstacle};
    use crate::vertical::compute_vertical_segments;

    fn pts(pairs: &[(f64, f64)]) -> Vec<Point> {
        pairs.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn clockwise_angle_convention() {
        let down = (0.0, -1.0);
        assert!((clockwise_angle(down, (0.0, -1.0)) - 0.0).abs() < 1e-9);
        // Turning left (counterclockwise) is positive.
        assert!((clockwise_angle(down, (-1.0, 0.0)) - 90.0).abs() < 1e-9);
        // Turning right (clockwise) is negative.
        assert!((clockwise_angle(down, (1.0, 0.0)) + 90.0).abs() < 1e-9);
        // Reversal lands on the positive side of the range.
        assert!((clockwise_angle(down, (0.0, 1.0)) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn empty_workspace_single_face() {
        let boundary = Boundary::new(600.0, 600.0);
        let graph = build_planar_graph(boundary, &[], &[]);
        let faces = extract_faces(&graph).unwrap();

        assert_eq!(faces.len(), 1);
        assert_eq!(
            faces[0].ring(),
            pts(&[(0.0, 600.0), (0.0, 0.0), (600.0, 0.0), (600.0, 600.0), (0.0, 600.0)]),
        );
    }

    #[test]
    fn centered_rectangle_five_faces() {
        let boundary = Boundary::new(600.0, 600.0);
        let obstacles = [Obstacle::new(pts(&[
            (200.0, 200.0),
            (400.0, 200.0),
            (400.0, 400.0),
            (200.0, 400.0),
        ]))];
        let segments = compute_vertical_segments(boundary, &obstacles);
        let graph = build_planar_graph(boundary, &obstacles, &segments);
        let faces = extract_faces(&graph).unwrap();

        let rings: Vec<&[Point]> = faces.iter().map(Face::ring).collect();
        assert_eq!(
            rings,
            vec![
                // Right of the obstacle.
                pts(&[
                    (400.0, 600.0),
                    (400.0, 400.0),
                    (400.0, 200.0),
                    (400.0, 0.0),
                    (600.0, 0.0),
                    (600.0, 600.0),
                    (400.0, 600.0),
                ]),
                // Above it.
                pts(&[
                    (200.0, 600.0),
                    (200.0, 400.0),
                    (400.0, 400.0),
                    (400.0, 600.0),
                    (200.0, 600.0),
                ]),
                // The obstacle interior, seeded by its vertical walls.
                pts(&[
                    (200.0, 400.0),
                    (200.0, 200.0),
                    (400.0, 200.0),
                    (400.0, 400.0),
                    (200.0, 400.0),
                ]),
                // Below it.
                pts(&[
                    (200.0, 200.0),
                    (200.0, 0.0),
                    (400.0, 0.0),
                    (400.0, 200.0),
                    (200.0, 200.0),
                ]),
                // Left of it.
                pts(&[
                    (0.0, 600.0),
                    (0.0, 0.0),
                    (200.0, 0.0),
                    (200.0, 200.0),
                    (200.0, 400.0),
                    (200.0, 600.0),
                    (0.0, 600.0),
                ]),
            ]
            .iter()
            .map(Vec::as_slice)
            .collect::<Vec<_>>(),
        );
    }

    #[test]
    fn interior_edges_bound_exactly_two_faces() {
        let boundary = Boundary::new(600.0, 600.0);
        let obstacles = [Obstacle::new(pts(&[
            (200.0, 200.0),
            (400.0, 200.0),
            (400.0, 400.0),
            (200.0, 400.0),
        ]))];
        let segments = compute_vertical_segments(boundary, &obstacles);
        let graph = build_planar_graph(boundary, &obstacles, &segments);
        let faces = extract_faces(&graph).unwrap();

        let mut counts: HashMap<(PointKey, PointKey), usize> = HashMap::new();
        for face in &faces {
            for pair in face.ring().windows(2) {
                let (a, b) = (pair[0].key(), pair[1].key());
                let key = if (pair[0].x, pair[0].y) <= (pair[1].x, pair[1].y) {
                    (a, b)
                } else {
                    (b, a)
                };
                *counts.entry(key).or_default() += 1;
            }
        }

        for (a, b, _) in graph.edges() {
            let (pa, pb) = (graph.point(a), graph.point(b));
            let key = if (pa.x, pa.y) <= (pb.x, pb.y) {
                (pa.key(), pb.key())
            } else {
                (pb.key(), pa.key())
            };
            let on_wall = |p: Point| {
                p.x.abs() < TOLERANCE
                    || (p.x - 600.0).abs() < TOLERANCE
                    || p.y.abs() < TOLERANCE
                    || (p.y - 600.0).abs() < TOLERANCE
            };
            let expected = if on_wall(pa) && on_wall(pb) { 1 } else { 2 };
            assert_eq!(counts.get(&key).copied().unwrap_or(0), expected);
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let boundary = Boundary::new(600.0, 600.0);
        let obstacles = [Obstacle::new(pts(&[
            (250.0, 250.0),
            (350.0, 250.0),
            (300.0, 350.0),
        ]))];
        let segments = compute_vertical_segments(boundary, &obstacles);
        let graph = build_planar_graph(boundary, &obstacles, &segments);

        let first = extract_faces(&graph).unwrap();
        let second = extract_faces(&graph).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn dangling_edge_walks_are_discarded() {
        let boundary = Boundary::new(600.0, 600.0);
        let segment = crate::vertical::VerticalSegment {
            x: 300.0,
            y_top: 600.0,
            y_bottom: 300.0,
            source: Point::new(300.0, 300.0),
        };
        let graph = build_planar_graph(boundary, &[], &[segment]);
        let faces = extract_faces(&graph).unwrap();

        // Every walk runs into the pendant node and dead-ends; nothing
        // is force-closed.
        assert!(faces.is_empty());
    }

    #[test]
    fn crossing_edges_are_rejected() {
        let mut graph = PlanarGraph::new();
        let a = graph.intern(Point::new(0.0, 0.0));
        let b = graph.intern(Point::new(100.0, 100.0));
        let c = graph.intern(Point::new(0.0, 100.0));
        let d = graph.intern(Point::new(100.0, 0.0));
        let data = crate::graph::EdgeData {
            weight: 1.0,
            kind: crate::graph::EdgeKind::Vertical,
            obstacle_id: None,
        };
        graph.add_edge_dedup(a, b, data);
        graph.add_edge_dedup(c, d, data);

        assert!(matches!(extract_faces(&graph), Err(PlanError::NonPlanar(_))));
    }

    #[test]
    fn centroid_of_square_face() {
        let face = Face::new(pts(&[
            (200.0, 400.0),
            (200.0, 200.0),
            (400.0, 200.0),
            (400.0, 400.0),
            (200.0, 400.0),
        ]));
        assert!(face.centroid().close_to(Point::new(300.0, 300.0)));
        let (min, max) = face.bounding_box();
        assert!(min.close_to(Point::new(200.0, 200.0)));
        assert!(max.close_to(Point::new(400.0, 400.0)));
    }
}
