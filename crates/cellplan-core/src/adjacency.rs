//! Cell adjacency: reduce traced faces to axis-aligned cells and link
//! the pairs whose bounding boxes share a border.
//!
//! Two cells are adjacent when their boxes touch along one axis and
//! overlap along the other. How much overlap counts is the strictness
//! mode: [`AdjacencyMode::Touching`] accepts corner contact,
//! [`AdjacencyMode::PositiveOverlap`] demands a shared border of
//! positive length. A pair touching on both axes still yields a single
//! link. Link weights are centroid distances.

use serde::{Deserialize, Serialize};

use crate::faces::Face;
use crate::types::{Point, TOLERANCE};

/// Axis-aligned summary of one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Position of the source face in the extraction order.
    pub id: usize,
    /// Minimum x of the bounding box.
    pub left: f64,
    /// Maximum x of the bounding box.
    pub right: f64,
    /// Maximum y of the bounding box.
    pub top: f64,
    /// Minimum y of the bounding box.
    pub bottom: f64,
    /// Area centroid of the face ring.
    pub centroid: Point,
}

impl Cell {
    /// Summarize a face.
    #[must_use]
    pub fn from_face(id: usize, face: &Face) -> Self {
        let (min, max) = face.bounding_box();
        Self {
            id,
            left: min.x,
            right: max.x,
            top: max.y,
            bottom: min.y,
            centroid: face.centroid(),
        }
    }
}

/// Summarize every face, ids following the extraction order.
#[must_use]
pub fn cells_from_faces(faces: &[Face]) -> Vec<Cell> {
    faces
        .iter()
        .enumerate()
        .map(|(id, face)| Cell::from_face(id, face))
        .collect()
}

/// How much border two cells must share to count as adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyMode {
    /// Touching boxes are adjacent, corner contact included.
    #[default]
    Touching,
    /// Boxes must share a border of positive length.
    PositiveOverlap,
}

impl AdjacencyMode {
    /// Whether the overlap extent along the non-touching axis counts.
    fn accepts(self, overlap: f64) -> bool {
        match self {
            Self::Touching => overlap > -TOLERANCE,
            Self::PositiveOverlap => overlap > TOLERANCE,
        }
    }
}

/// One node of the [`AdjacencyGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellNode {
    /// Cell id.
    pub id: usize,
    /// Cell centroid.
    pub centroid: Point,
}

/// One undirected link between adjacent cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellLink {
    /// Id of one cell.
    pub source: usize,
    /// Id of the other cell.
    pub target: usize,
    /// Euclidean distance between the two centroids.
    pub weight: f64,
}

/// The cell adjacency graph, as plain id-based lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdjacencyGraph {
    /// One node per cell, in id order.
    pub nodes: Vec<CellNode>,
    /// Links between adjacent cells, each pair listed once with
    /// `source < target`.
    pub edges: Vec<CellLink>,
}

/// Link every pair of cells whose bounding boxes border each other.
#[must_use]
pub fn build_adjacency(cells: &[Cell], mode: AdjacencyMode) -> AdjacencyGraph {
    let nodes = cells
        .iter()
        .map(|c| CellNode {
            id: c.id,
            centroid: c.centroid,
        })
        .collect();

    let mut edges = Vec::new();
    for (i, a) in cells.iter().enumerate() {
        for b in &cells[i + 1..] {
            if adjacent(a, b, mode) {
                edges.push(CellLink {
                    source: a.id,
                    target: b.id,
                    weight: a.centroid.distance(b.centroid),
                });
            }
        }
    }

    AdjacencyGraph { nodes, edges }
}

/// Border test: touching sides on one axis, enough overlap on the
/// other. A pair that qualifies on both axes is still one link.
fn adjacent(a: &Cell, b: &Cell, mode: AdjacencyMode) -> bool {
    let touch = |p: f64, q: f64| (p - q).abs() < TOLERANCE;

    let horizontal_touch = touch(a.right, b.left) || touch(a.left, b.right);
    let vertical_overlap = a.top.min(b.top) - a.bottom.max(b.bottom);
    if horizontal_touch && mode.accepts(vertical_overlap) {
        return true;
    }

    let vertical_touch = touch(a.top, b.bottom) || touch(a.bottom, b.top);
    let horizontal_overlap = a.right.min(b.right) - a.left.max(b.left);
    vertical_touch && mode.accepts(horizontal_overlap)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square_face(x0: f64, y0: f64, x1: f64, y1: f64) -> Face {
        Face::new(vec![
            Point::new(x0, y1),
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    #[test]
    fn side_by_side_cells_link_once() {
        let cells = cells_from_faces(&[
            square_face(0.0, 0.0, 100.0, 100.0),
            square_face(100.0, 0.0, 200.0, 100.0),
        ]);
        let graph = build_adjacency(&cells, AdjacencyMode::Touching);

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        let link = graph.edges[0];
        assert_eq!((link.source, link.target), (0, 1));
        assert!((link.weight - 100.0).abs() < TOLERANCE);
    }

    #[test]
    fn corner_contact_depends_on_mode() {
        // The pair touches on both axes at a single corner.
        let cells = cells_from_faces(&[
            square_face(0.0, 0.0, 100.0, 100.0),
            square_face(100.0, 100.0, 200.0, 200.0),
        ]);

        let touching = build_adjacency(&cells, AdjacencyMode::Touching);
        assert_eq!(touching.edges.len(), 1);

        let strict = build_adjacency(&cells, AdjacencyMode::PositiveOverlap);
        assert!(strict.edges.is_empty());
    }

    #[test]
    fn separated_cells_do_not_link() {
        let cells = cells_from_faces(&[
            square_face(0.0, 0.0, 100.0, 100.0),
            square_face(150.0, 0.0, 250.0, 100.0),
        ]);
        let graph = build_adjacency(&cells, AdjacencyMode::Touching);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn weight_is_centroid_distance() {
        let cells = cells_from_faces(&[
            square_face(0.0, 0.0, 100.0, 200.0),
            square_face(100.0, 0.0, 300.0, 200.0),
        ]);
        let graph = build_adjacency(&cells, AdjacencyMode::Touching);

        assert_eq!(graph.edges.len(), 1);
        let expected = Point::new(50.0, 100.0).distance(Point::new(200.0, 100.0));
        assert!((graph.edges[0].weight - expected).abs() < TOLERANCE);
    }

    #[test]
    fn overlapping_interiors_do_not_count_as_touching() {
        // Overlapping boxes have no touching sides.
        let cells = cells_from_faces(&[
            square_face(0.0, 0.0, 120.0, 100.0),
            square_face(80.0, 0.0, 200.0, 100.0),
        ]);
        let graph = build_adjacency(&cells, AdjacencyMode::Touching);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn adjacency_graph_round_trips_through_json() {
        let cells = cells_from_faces(&[
            square_face(0.0, 0.0, 100.0, 100.0),
            square_face(100.0, 0.0, 200.0, 100.0),
        ]);
        let graph = build_adjacency(&cells, AdjacencyMode::Touching);

        let json = serde_json::to_string(&graph).unwrap();
        let back: AdjacencyGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }
}
