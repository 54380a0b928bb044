//! Path queries: snap free points to the decomposition and search the
//! resulting graphs.
//!
//! Snapping uses an R-tree over centroids (or graph nodes); search is
//! A* with a straight-line heuristic, admissible for both weight
//! models since every edge weight is a Euclidean distance. An
//! unreachable goal is an ordinary empty result.

use std::collections::HashMap;

use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::adjacency::AdjacencyGraph;
use crate::graph::PlanarGraph;
use crate::types::Point;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Id of the cell whose centroid lies closest to `p`.
#[must_use]
pub fn nearest_cell(adjacency: &AdjacencyGraph, p: Point) -> Option<usize> {
    let tree = RTree::bulk_load(
        adjacency
            .nodes
            .iter()
            .map(|n| IndexedPoint::new([n.centroid.x, n.centroid.y], n.id))
            .collect(),
    );
    tree.nearest_neighbor(&[p.x, p.y]).map(|hit| hit.data)
}

/// The planar-graph node closest to `p`.
#[must_use]
pub fn nearest_node(graph: &PlanarGraph, p: Point) -> Option<NodeIndex> {
    let tree = RTree::bulk_load(
        graph
            .nodes()
            .map(|(n, point)| IndexedPoint::new([point.x, point.y], n.index()))
            .collect(),
    );
    tree.nearest_neighbor(&[p.x, p.y])
        .map(|hit| NodeIndex::new(hit.data))
}

/// Cell-to-cell route from the cell nearest `start` to the cell
/// nearest `goal`, as cell ids.
///
/// Start and goal snapping to the same cell yields that single id; an
/// unreachable goal (or an empty decomposition) yields an empty route.
#[must_use]
pub fn cell_route(adjacency: &AdjacencyGraph, start: Point, goal: Point) -> Vec<usize> {
    let (Some(from), Some(to)) = (
        nearest_cell(adjacency, start),
        nearest_cell(adjacency, goal),
    ) else {
        return Vec::new();
    };
    if from == to {
        return vec![from];
    }

    // Cell ids are opaque here: a deserialized adjacency graph need
    // not number them densely, so map ids to node indices explicitly.
    let mut graph: UnGraph<Point, f64> = UnGraph::default();
    let mut indices = HashMap::with_capacity(adjacency.nodes.len());
    let mut ids = Vec::with_capacity(adjacency.nodes.len());
    for node in &adjacency.nodes {
        indices.insert(node.id, graph.add_node(node.centroid));
        ids.push(node.id);
    }
    for link in &adjacency.edges {
        let (Some(&a), Some(&b)) = (indices.get(&link.source), indices.get(&link.target))
        else {
            continue;
        };
        graph.add_edge(a, b, link.weight);
    }

    let (Some(&source), Some(&target)) = (indices.get(&from), indices.get(&to)) else {
        return Vec::new();
    };
    let goal_centroid = graph[target];
    astar(
        &graph,
        source,
        |n| n == target,
        |e| *e.weight(),
        |n| graph[n].distance(goal_centroid),
    )
    .map_or_else(Vec::new, |(_, path)| {
        path.into_iter().map(|n| ids[n.index()]).collect()
    })
}

/// Node-to-node route on the planar graph, from the node nearest
/// `start` to the node nearest `goal`, as node coordinates.
#[must_use]
pub fn node_route(graph: &PlanarGraph, start: Point, goal: Point) -> Vec<Point> {
    let (Some(from), Some(to)) = (nearest_node(graph, start), nearest_node(graph, goal))
    else {
        return Vec::new();
    };
    if from == to {
        return vec![graph.point(from)];
    }

    let goal_point = graph.point(to);
    astar(
        graph.inner(),
        from,
        |n| n == to,
        |e| e.weight().weight,
        |n| graph.point(n).distance(goal_point),
    )
    .map_or_else(Vec::new, |(_, path)| {
        path.into_iter().map(|n| graph.point(n)).collect()
    })
}
