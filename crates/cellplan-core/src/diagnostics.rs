//! Pipeline diagnostics: timing and counts for each decomposition
//! stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! tolerance tuning and workload sizing. Every call to
//! [`plan_staged`](crate::plan_staged) collects diagnostics alongside
//! the pipeline results; timestamps come from [`std::time::Instant`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Each field captures metrics for one logical stage. The route stage
/// is `None` when the request carried no start/goal pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDiagnostics {
    /// Stage 1: vertical visibility sweep.
    pub vertical_sweep: StageDiagnostics,
    /// Stage 2: planar graph construction.
    pub graph_build: StageDiagnostics,
    /// Stage 3: face extraction.
    pub face_extraction: StageDiagnostics,
    /// Stage 4: cell adjacency.
    pub adjacency: StageDiagnostics,
    /// Stage 5: route query (only when start and goal are set).
    pub route: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PlanSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Vertical sweep metrics.
    VerticalSweep {
        /// Number of input obstacles.
        obstacle_count: usize,
        /// Number of emitted segments.
        segment_count: usize,
        /// Shortest emitted segment.
        min_segment_length: f64,
        /// Longest emitted segment.
        max_segment_length: f64,
        /// Mean segment length.
        mean_segment_length: f64,
    },
    /// Planar graph construction metrics.
    GraphBuild {
        /// Node count after interning and splitting.
        node_count: usize,
        /// Edge count after splitting and self-loop removal.
        edge_count: usize,
        /// Edges tagged as boundary pieces.
        boundary_edges: usize,
        /// Edges tagged as obstacle ring pieces.
        obstacle_edges: usize,
        /// Edges tagged as vertical segment pieces.
        vertical_edges: usize,
    },
    /// Face extraction metrics.
    FaceExtraction {
        /// Number of accepted faces.
        face_count: usize,
        /// Total ring points across all faces (closing points included).
        total_ring_points: usize,
        /// Minimum ring points in any single face.
        min_ring_points: usize,
        /// Maximum ring points in any single face.
        max_ring_points: usize,
        /// Mean ring points per face.
        mean_ring_points: f64,
    },
    /// Cell adjacency metrics.
    Adjacency {
        /// Which strictness mode was used.
        mode: String,
        /// Number of cells.
        cell_count: usize,
        /// Number of links.
        link_count: usize,
    },
    /// Route query metrics.
    Route {
        /// Cells in the returned route (0 means unreachable).
        route_cells: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Workspace width.
    pub width: f64,
    /// Workspace height.
    pub height: f64,
    /// Number of input obstacles.
    pub obstacle_count: usize,
    /// Planar graph node count.
    pub node_count: usize,
    /// Planar graph edge count.
    pub edge_count: usize,
    /// Number of extracted faces.
    pub face_count: usize,
    /// Cells in the returned route.
    pub route_cells: usize,
}

impl PlanDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Plan Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Workspace: {:.0}x{:.0}, {} obstacles",
            self.summary.width, self.summary.height, self.summary.obstacle_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        // Per-stage breakdown.
        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let stages: Vec<(&str, &StageDiagnostics)> = {
            let mut s = vec![
                ("Vertical Sweep", &self.vertical_sweep),
                ("Graph Build", &self.graph_build),
                ("Face Extraction", &self.face_extraction),
                ("Adjacency", &self.adjacency),
            ];
            if let Some(ref route) = self.route {
                s.push(("Route", route));
            }
            s
        };

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Graph: {} nodes, {} edges  |  Faces: {}  |  Route cells: {}",
            self.summary.node_count,
            self.summary.edge_count,
            self.summary.face_count,
            self.summary.route_cells,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::VerticalSweep {
            obstacle_count,
            segment_count,
            min_segment_length,
            max_segment_length,
            mean_segment_length,
        } => {
            format!(
                "{obstacle_count} obstacles -> {segment_count} segments (min={min_segment_length:.1} max={max_segment_length:.1} mean={mean_segment_length:.1})",
            )
        }
        StageMetrics::GraphBuild {
            node_count,
            edge_count,
            boundary_edges,
            obstacle_edges,
            vertical_edges,
        } => {
            format!(
                "{node_count} nodes, {edge_count} edges (boundary={boundary_edges} obstacle={obstacle_edges} vertical={vertical_edges})",
            )
        }
        StageMetrics::FaceExtraction {
            face_count,
            total_ring_points,
            min_ring_points,
            max_ring_points,
            mean_ring_points,
        } => {
            format!(
                "{face_count} faces, {total_ring_points} ring pts (min={min_ring_points} max={max_ring_points} mean={mean_ring_points:.1})",
            )
        }
        StageMetrics::Adjacency {
            mode,
            cell_count,
            link_count,
        } => {
            format!("{mode} {cell_count} cells, {link_count} links")
        }
        StageMetrics::Route { route_cells } => format!("{route_cells} cells"),
    }
}

/// Statistics over a set of lengths or counts.
pub(crate) struct SpreadStats {
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Mean value.
    pub mean: f64,
}

/// Min/max/mean of an iterator of values; all zero when empty.
pub(crate) fn spread_stats(values: impl Iterator<Item = f64>) -> SpreadStats {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        count += 1;
    }
    if count == 0 {
        return SpreadStats {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        };
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / count as f64;
    SpreadStats { min, max, mean }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn spread_stats_empty() {
        let stats = spread_stats(std::iter::empty());
        assert!((stats.min - 0.0).abs() < f64::EPSILON);
        assert!((stats.max - 0.0).abs() < f64::EPSILON);
        assert!((stats.mean - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spread_stats_computes() {
        let stats = spread_stats([2.0, 4.0, 6.0].into_iter());
        assert!((stats.min - 2.0).abs() < f64::EPSILON);
        assert!((stats.max - 6.0).abs() < f64::EPSILON);
        assert!((stats.mean - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_produces_nonempty_string() {
        let diag = PlanDiagnostics {
            vertical_sweep: StageDiagnostics {
                duration: Duration::from_millis(2),
                metrics: StageMetrics::VerticalSweep {
                    obstacle_count: 1,
                    segment_count: 4,
                    min_segment_length: 200.0,
                    max_segment_length: 200.0,
                    mean_segment_length: 200.0,
                },
            },
            graph_build: StageDiagnostics {
                duration: Duration::from_millis(3),
                metrics: StageMetrics::GraphBuild {
                    node_count: 12,
                    edge_count: 16,
                    boundary_edges: 8,
                    obstacle_edges: 4,
                    vertical_edges: 4,
                },
            },
            face_extraction: StageDiagnostics {
                duration: Duration::from_millis(4),
                metrics: StageMetrics::FaceExtraction {
                    face_count: 5,
                    total_ring_points: 28,
                    min_ring_points: 5,
                    max_ring_points: 7,
                    mean_ring_points: 5.6,
                },
            },
            adjacency: StageDiagnostics {
                duration: Duration::from_millis(1),
                metrics: StageMetrics::Adjacency {
                    mode: "Touching".to_string(),
                    cell_count: 5,
                    link_count: 8,
                },
            },
            route: Some(StageDiagnostics {
                duration: Duration::from_millis(1),
                metrics: StageMetrics::Route { route_cells: 3 },
            }),
            total_duration: Duration::from_millis(11),
            summary: PlanSummary {
                width: 600.0,
                height: 600.0,
                obstacle_count: 1,
                node_count: 12,
                edge_count: 16,
                face_count: 5,
                route_cells: 3,
            },
        };

        let report = diag.report();
        assert!(!report.is_empty());
        assert!(report.contains("Plan Diagnostics Report"));
        assert!(report.contains("Face Extraction"));
        assert!(report.contains("Touching"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let stage = StageDiagnostics {
            duration: Duration::from_millis(250),
            metrics: StageMetrics::Route { route_cells: 1 },
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 0.25).abs() < 1e-12);
    }
}
