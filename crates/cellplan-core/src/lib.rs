//! cellplan-core: vertical cell decomposition for 2D path planning
//! (sans-IO).
//!
//! Turns a rectangular workspace with polygonal obstacles into routable
//! structure: vertical sweep -> planar graph -> face extraction ->
//! cell adjacency -> optional start/goal route.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! requests and returns structured data. Everything is deterministic:
//! the same request always produces the same faces, the same adjacency
//! graph, and the same route.

pub mod adjacency;
pub mod diagnostics;
pub mod faces;
pub mod graph;
pub mod query;
pub mod types;
pub mod vertical;

use std::time::Instant;

pub use adjacency::{AdjacencyGraph, AdjacencyMode, Cell, CellLink, CellNode};
pub use diagnostics::{PlanDiagnostics, PlanSummary, StageDiagnostics, StageMetrics};
pub use faces::{Face, extract_faces};
pub use graph::{
    EdgeData, EdgeKind, ExportedEdge, GraphExport, PlanarGraph, build_planar_graph,
};
pub use query::{cell_route, nearest_cell, nearest_node, node_route};
pub use types::{
    Boundary, Obstacle, ObstacleFault, PlanError, PlanRequest, PlanResult, Point,
    TOLERANCE,
};
pub use vertical::{VerticalSegment, compute_vertical_segments};

use diagnostics::spread_stats;

/// Run the full decomposition pipeline.
///
/// # Pipeline steps
///
/// 1. Validate obstacle rings
/// 2. Vertical visibility sweep
/// 3. Planar graph construction (with edge splitting)
/// 4. Face extraction
/// 5. Cell adjacency
/// 6. Optional start/goal route
///
/// An unreachable goal or an absent start/goal pair yields an empty
/// `path`, not an error.
///
/// # Errors
///
/// Returns [`PlanError::InvalidObstacle`] when an obstacle ring is
/// degenerate, self-intersecting, or outside the workspace.
/// Returns [`PlanError::NonPlanar`] when graph construction produces
/// crossing edges, which indicates a builder defect.
pub fn plan(request: &PlanRequest) -> Result<PlanResult, PlanError> {
    let boundary = request.boundary();

    // 1. Validate obstacle rings.
    for (index, obstacle) in request.obstacles.iter().enumerate() {
        obstacle.validate(index, boundary)?;
    }

    // 2. Vertical visibility sweep.
    let segments = compute_vertical_segments(boundary, &request.obstacles);

    // 3. Planar graph.
    let graph = build_planar_graph(boundary, &request.obstacles, &segments);

    // 4. Faces.
    let faces = extract_faces(&graph)?;

    // 5. Cells and adjacency.
    let cells = adjacency::cells_from_faces(&faces);
    let adjacency_graph = adjacency::build_adjacency(&cells, request.adjacency);

    // 6. Optional route.
    let path = match (request.start, request.goal) {
        (Some(start), Some(goal)) => cell_route(&adjacency_graph, start, goal),
        _ => Vec::new(),
    };

    Ok(PlanResult {
        obstacles: request.obstacles.clone(),
        graph: graph.export(),
        faces,
        adjacency: adjacency_graph,
        path,
    })
}

/// Everything [`plan_staged`] produces: each intermediate plus
/// diagnostics, for visualization and tuning.
#[derive(Debug, Clone)]
pub struct StagedPlan {
    /// The vertical visibility segments.
    pub segments: Vec<VerticalSegment>,
    /// The planar free-space graph.
    pub graph: PlanarGraph,
    /// The extracted faces, in extraction order.
    pub faces: Vec<Face>,
    /// Bounding-box summaries of the faces.
    pub cells: Vec<Cell>,
    /// The weighted cell-adjacency graph.
    pub adjacency: AdjacencyGraph,
    /// The cell route; `None` when the request carried no start/goal.
    pub route: Option<Vec<usize>>,
    /// Per-stage timings and counts.
    pub diagnostics: PlanDiagnostics,
}

/// Run the full pipeline, keeping every intermediate result and
/// collecting per-stage diagnostics.
///
/// # Errors
///
/// Same failure modes as [`plan`].
pub fn plan_staged(request: &PlanRequest) -> Result<StagedPlan, PlanError> {
    let boundary = request.boundary();
    let total_start = Instant::now();

    for (index, obstacle) in request.obstacles.iter().enumerate() {
        obstacle.validate(index, boundary)?;
    }

    let stage_start = Instant::now();
    let segments = compute_vertical_segments(boundary, &request.obstacles);
    let segment_stats = spread_stats(segments.iter().map(VerticalSegment::length));
    let vertical_sweep = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::VerticalSweep {
            obstacle_count: request.obstacles.len(),
            segment_count: segments.len(),
            min_segment_length: segment_stats.min,
            max_segment_length: segment_stats.max,
            mean_segment_length: segment_stats.mean,
        },
    };

    let stage_start = Instant::now();
    let graph = build_planar_graph(boundary, &request.obstacles, &segments);
    let kind_count = |kind: EdgeKind| graph.edges().filter(|(_, _, d)| d.kind == kind).count();
    let graph_build = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::GraphBuild {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            boundary_edges: kind_count(EdgeKind::Boundary),
            obstacle_edges: kind_count(EdgeKind::Obstacle),
            vertical_edges: kind_count(EdgeKind::Vertical),
        },
    };

    let stage_start = Instant::now();
    let faces = extract_faces(&graph)?;
    let ring_lengths: Vec<usize> = faces.iter().map(|f| f.ring().len()).collect();
    let total_ring_points: usize = ring_lengths.iter().sum();
    #[allow(clippy::cast_precision_loss)]
    let mean_ring_points = if ring_lengths.is_empty() {
        0.0
    } else {
        total_ring_points as f64 / ring_lengths.len() as f64
    };
    let face_extraction = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::FaceExtraction {
            face_count: faces.len(),
            total_ring_points,
            min_ring_points: ring_lengths.iter().copied().min().unwrap_or(0),
            max_ring_points: ring_lengths.iter().copied().max().unwrap_or(0),
            mean_ring_points,
        },
    };

    let stage_start = Instant::now();
    let cells = adjacency::cells_from_faces(&faces);
    let adjacency_graph = adjacency::build_adjacency(&cells, request.adjacency);
    let adjacency_stage = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Adjacency {
            mode: format!("{:?}", request.adjacency),
            cell_count: cells.len(),
            link_count: adjacency_graph.edges.len(),
        },
    };

    let (route, route_stage) = match (request.start, request.goal) {
        (Some(start), Some(goal)) => {
            let stage_start = Instant::now();
            let route = cell_route(&adjacency_graph, start, goal);
            let stage = StageDiagnostics {
                duration: stage_start.elapsed(),
                metrics: StageMetrics::Route {
                    route_cells: route.len(),
                },
            };
            (Some(route), Some(stage))
        }
        _ => (None, None),
    };

    let diagnostics = PlanDiagnostics {
        vertical_sweep,
        graph_build,
        face_extraction,
        adjacency: adjacency_stage,
        route: route_stage,
        total_duration: total_start.elapsed(),
        summary: PlanSummary {
            width: request.width,
            height: request.height,
            obstacle_count: request.obstacles.len(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            face_count: faces.len(),
            route_cells: route.as_ref().map_or(0, Vec::len),
        },
    };

    Ok(StagedPlan {
        segments,
        graph,
        faces,
        cells,
        adjacency: adjacency_graph,
        route,
        diagnostics,
    })
}
