//! Planar free-space graph: workspace boundary, obstacle rings, and
//! vertical visibility segments merged into one embedded graph.
//!
//! Nodes live in an index-based table (`petgraph` node indices) with a
//! tolerance-quantized coordinate intern map on top, so edge splitting
//! never depends on hashing raw floats. Edges carry their geometric
//! length, a [`EdgeKind`] tag, and the owning obstacle id where
//! applicable.
//!
//! Build order matters for determinism and planarity: boundary first,
//! then obstacle rings, then vertical segments in ascending-x order
//! with each segment's points resolved top to bottom. A point landing
//! on the interior of an existing edge splits that edge in place; the
//! two halves inherit the original's kind and obstacle id with freshly
//! computed lengths.

use std::collections::HashMap;

use geo::line_measures::Distance;
use geo::{Coord, Euclidean, Line};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::types::{Boundary, Obstacle, Point, PointKey, TOLERANCE};
use crate::vertical::VerticalSegment;

/// What a planar-graph edge is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// One of the four workspace walls (possibly split).
    Boundary,
    /// Part of an obstacle ring.
    Obstacle,
    /// A vertical visibility segment (possibly split).
    Vertical,
}

/// Payload carried by every planar-graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Geometric length of the edge.
    pub weight: f64,
    /// What the edge is part of.
    pub kind: EdgeKind,
    /// 1-based obstacle id for `kind == Obstacle` edges.
    pub obstacle_id: Option<usize>,
}

/// The embedded free-space graph.
///
/// Invariants once built: no self-loops, no duplicate edges between a
/// node pair, edges cross only at shared endpoints, and the graph is
/// connected (obstacles lie inside the boundary, and every vertical
/// segment ends on an obstacle or a wall).
#[derive(Debug, Clone, Default)]
pub struct PlanarGraph {
    graph: UnGraph<Point, EdgeData>,
    interned: HashMap<PointKey, NodeIndex>,
}

impl PlanarGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Coordinates of a node.
    #[must_use]
    pub fn point(&self, node: NodeIndex) -> Point {
        self.graph[node]
    }

    /// Iterate all nodes with their coordinates.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, Point)> + '_ {
        self.graph.node_indices().map(|n| (n, self.graph[n]))
    }

    /// Iterate all edges as `(endpoint, endpoint, data)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &EdgeData)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    /// Iterate the neighbors of a node.
    pub fn neighbors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(node)
    }

    /// The edge data between two nodes, if they are connected.
    #[must_use]
    pub fn edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<&EdgeData> {
        self.graph.find_edge(a, b).and_then(|e| self.graph.edge_weight(e))
    }

    /// Whether every node is reachable from every other.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.graph.node_count() == 0
            || petgraph::algo::connected_components(&self.graph) == 1
    }

    /// Access the underlying `petgraph` structure (for path search).
    #[must_use]
    pub(crate) const fn inner(&self) -> &UnGraph<Point, EdgeData> {
        &self.graph
    }

    /// Get or insert the node for `p`, deduplicating by quantized key.
    pub(crate) fn intern(&mut self, p: Point) -> NodeIndex {
        match self.interned.entry(p.key()) {
            std::collections::hash_map::Entry::Occupied(entry) => *entry.get(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                *entry.insert(self.graph.add_node(p))
            }
        }
    }

    /// The existing node matching `p` within tolerance, if any.
    #[must_use]
    pub(crate) fn lookup(&self, p: Point) -> Option<NodeIndex> {
        self.interned.get(&p.key()).copied()
    }

    /// Add an edge unless it would be a self-loop or a duplicate.
    pub(crate) fn add_edge_dedup(&mut self, a: NodeIndex, b: NodeIndex, data: EdgeData) {
        if a == b || self.graph.find_edge(a, b).is_some() {
            return;
        }
        self.graph.add_edge(a, b, data);
    }

    /// First edge whose geometric segment passes within tolerance of
    /// `p`, excluding self-loops.
    fn find_split_target(&self, p: Point) -> Option<EdgeIndex> {
        let query = geo::Point::new(p.x, p.y);
        self.graph.edge_references().find_map(|e| {
            if e.source() == e.target() {
                return None;
            }
            let line = Line::new(
                Coord::from(self.graph[e.source()]),
                Coord::from(self.graph[e.target()]),
            );
            (Euclidean.distance(&line, &query) < TOLERANCE).then_some(e.id())
        })
    }

    /// Replace `edge` by two edges meeting at `p`, reusing its kind and
    /// obstacle id with recomputed lengths. Returns the node for `p`.
    fn split_edge(&mut self, edge: EdgeIndex, p: Point) -> NodeIndex {
        let Some((a, b)) = self.graph.edge_endpoints(edge) else {
            return self.intern(p);
        };
        let Some(data) = self.graph.remove_edge(edge) else {
            return self.intern(p);
        };

        let mid = self.intern(p);
        for end in [a, b] {
            let length = self.graph[mid].distance(self.graph[end]);
            self.add_edge_dedup(
                mid,
                end,
                EdgeData {
                    weight: length,
                    kind: data.kind,
                    obstacle_id: data.obstacle_id,
                },
            );
        }
        mid
    }

    /// Resolve a segment point to a node: reuse a coincident node,
    /// split an edge the point lands on, or insert it standalone.
    pub(crate) fn resolve_point(&mut self, p: Point) -> NodeIndex {
        if let Some(existing) = self.lookup(p) {
            return existing;
        }
        if let Some(edge) = self.find_split_target(p) {
            return self.split_edge(edge, p);
        }
        self.intern(p)
    }

    /// Remove any self-loop edges.
    pub(crate) fn strip_self_loops(&mut self) {
        while let Some(edge) = self
            .graph
            .edge_references()
            .find(|e| e.source() == e.target())
            .map(|e| e.id())
        {
            self.graph.remove_edge(edge);
        }
    }

    /// Snapshot as plain index-based lists for serialization.
    #[must_use]
    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.graph.node_indices().map(|n| self.graph[n]).collect(),
            edges: self
                .graph
                .edge_references()
                .map(|e| ExportedEdge {
                    source: e.source().index(),
                    target: e.target().index(),
                    weight: e.weight().weight,
                    kind: e.weight().kind,
                    obstacle_id: e.weight().obstacle_id,
                })
                .collect(),
        }
    }
}

/// Serializable snapshot of a [`PlanarGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    /// Node coordinates; positions index into `edges`.
    pub nodes: Vec<Point>,
    /// Edges referencing node positions.
    pub edges: Vec<ExportedEdge>,
}

/// One edge of a [`GraphExport`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportedEdge {
    /// Index of one endpoint in the node list.
    pub source: usize,
    /// Index of the other endpoint.
    pub target: usize,
    /// Geometric length.
    pub weight: f64,
    /// What the edge is part of.
    pub kind: EdgeKind,
    /// 1-based obstacle id for obstacle edges.
    pub obstacle_id: Option<usize>,
}

/// Build the planar free-space graph.
///
/// Segments are processed in ascending-x order (ties broken by
/// descending `y_top`, then descending `y_bottom`) and each segment's
/// candidate points top to bottom; this keeps edge splitting local and
/// the construction deterministic.
#[must_use]
pub fn build_planar_graph(
    boundary: Boundary,
    obstacles: &[Obstacle],
    segments: &[VerticalSegment],
) -> PlanarGraph {
    let mut graph = PlanarGraph::new();

    // 1. Workspace frame.
    let corners = boundary.corners().map(|c| graph.intern(c));
    for i in 0..4 {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        let length = graph.point(a).distance(graph.point(b));
        graph.add_edge_dedup(
            a,
            b,
            EdgeData {
                weight: length,
                kind: EdgeKind::Boundary,
                obstacle_id: None,
            },
        );
    }

    // 2. Obstacle rings, with 1-based ids. Vertices resolve through the
    // splitter so a vertex resting on a wall (or on another ring's
    // edge) joins that edge instead of floating on top of it; a ring
    // edge that coincides with a wall piece after splitting is
    // deduplicated rather than doubled.
    for (id, obstacle) in obstacles.iter().enumerate() {
        for (u, v) in obstacle.edges() {
            if u.close_to(v) {
                continue;
            }
            let a = graph.resolve_point(u);
            let b = graph.resolve_point(v);
            graph.add_edge_dedup(
                a,
                b,
                EdgeData {
                    weight: u.distance(v),
                    kind: EdgeKind::Obstacle,
                    obstacle_id: Some(id + 1),
                },
            );
        }
    }

    // 3. Vertical segments, left to right.
    let mut ordered: Vec<VerticalSegment> = segments.to_vec();
    ordered.sort_by(|a, b| {
        a.x.total_cmp(&b.x)
            .then(b.y_top.total_cmp(&a.y_top))
            .then(b.y_bottom.total_cmp(&a.y_bottom))
    });

    for segment in &ordered {
        let mut candidates = vec![
            Point::new(segment.x, segment.y_top),
            segment.source,
            Point::new(segment.x, segment.y_bottom),
        ];
        // Deduplicate by identity key, then order top to bottom.
        let mut seen = Vec::with_capacity(3);
        candidates.retain(|p| {
            let key = p.key();
            let fresh = !seen.contains(&key);
            if fresh {
                seen.push(key);
            }
            fresh
        });
        candidates.sort_by(|a, b| b.y.total_cmp(&a.y));

        let mut resolved: Vec<NodeIndex> =
            candidates.into_iter().map(|p| graph.resolve_point(p)).collect();
        resolved.dedup();

        // Connect consecutive pairs; a degenerate (single-point)
        // segment adds no edge.
        for pair in resolved.windows(2) {
            let length = (graph.point(pair[0]).y - graph.point(pair[1]).y).abs();
            graph.add_edge_dedup(
                pair[0],
                pair[1],
                EdgeData {
                    weight: length,
                    kind: EdgeKind::Vertical,
                    obstacle_id: None,
                },
            );
        }
    }

    // 4. Final cleanup.
    graph.strip_self_loops();

    graph
}
