use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{
    haversine_m, lerp, point_in_polygon, point_segment_distance, project_onto_segment, BBox, Coord,
};
use super::graph::Graph;
use crate::common::{DomainError, DomainResult};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapError {
    #[error("query point lies inside an obstacle")]
    PointInObstacle,

    #[error("graph has no edge to snap onto")]
    NoNearbyEdge,
}

impl SnapError {
    pub fn code(&self) -> &'static str {
        match self {
            SnapError::PointInObstacle => "point_in_obstacle",
            SnapError::NoNearbyEdge => "no_nearby_edge",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Projection parameters within this distance of 0 or 1 reuse the edge endpoint. Default: 1e-6
    pub epsilon: f64,
    /// Key precision for inserted nodes, matching the graph's. Default: 6
    pub precision: u32,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self { epsilon: 1e-6, precision: 6 }
    }
}

impl SnapConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if !(self.epsilon.is_finite() && (0.0..0.5).contains(&self.epsilon)) {
            return Err(DomainError::InvalidCommand {
                reason: format!("snap epsilon must lie in [0, 0.5), got {}", self.epsilon),
            });
        }
        Ok(())
    }
}

/// Where a query point was attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapPoint {
    /// Node created for the query coordinate itself.
    pub node: usize,
    /// Existing endpoint or inserted split node the query node hangs off.
    pub anchor: usize,
    pub projected: Coord,
}

/// Private copy of the base graph with one snapped query point.
#[derive(Debug, Clone)]
pub struct SnappedGraph {
    pub graph: Graph,
    pub snap: SnapPoint,
}

/// Private copy of the base graph with both route endpoints snapped.
#[derive(Debug, Clone)]
pub struct SnappedPair {
    pub graph: Graph,
    pub start: SnapPoint,
    pub end: SnapPoint,
}

pub fn point_in_any_obstacle(graph: &Graph, c: &Coord) -> bool {
    graph
        .obstacles
        .iter()
        .any(|poly| BBox::of_rings(poly).contains(c) && point_in_polygon(c, poly))
}

/// Snap `coord` onto a copy of `base`; `base` itself is never touched.
pub fn snap_point(base: &Graph, coord: Coord, config: &SnapConfig) -> Result<SnappedGraph, SnapError> {
    let mut graph = base.clone();
    let snap = snap_into(&mut graph, coord, config, &[])?;
    Ok(SnappedGraph { graph, snap })
}

/// Snap both ends onto one shared copy. The end never attaches to the start's connector.
pub fn snap_pair(base: &Graph, start: Coord, end: Coord, config: &SnapConfig) -> Result<SnappedPair, SnapError> {
    if point_in_any_obstacle(base, &start) || point_in_any_obstacle(base, &end) {
        return Err(SnapError::PointInObstacle);
    }
    let mut graph = base.clone();
    let start_snap = snap_into(&mut graph, start, config, &[])?;
    let end_snap = snap_into(&mut graph, end, config, &[start_snap.node])?;
    Ok(SnappedPair { graph, start: start_snap, end: end_snap })
}

fn nearest_edge(graph: &Graph, c: &Coord, excluded: &[usize]) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for (u, v, _) in graph.edges() {
        if excluded.contains(&u) || excluded.contains(&v) {
            continue;
        }
        let d = point_segment_distance(c, &graph.coord(u), &graph.coord(v));
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((u, v, d));
        }
    }
    best
}

fn snap_into(graph: &mut Graph, coord: Coord, config: &SnapConfig, excluded: &[usize]) -> Result<SnapPoint, SnapError> {
    if point_in_any_obstacle(graph, &coord) {
        return Err(SnapError::PointInObstacle);
    }
    let (u, v, _) = nearest_edge(graph, &coord, excluded).ok_or(SnapError::NoNearbyEdge)?;
    let (cu, cv) = (graph.coord(u), graph.coord(v));
    let t = project_onto_segment(&coord, &cu, &cv);
    let projected = lerp(&cu, &cv, t);

    let anchor = if t <= config.epsilon {
        u
    } else if t >= 1.0 - config.epsilon {
        v
    } else {
        let split = graph.push_node(projected, config.precision);
        graph.unlink(u, v);
        graph.link(u, split, haversine_m(&cu, &projected));
        graph.link(split, v, haversine_m(&projected, &cv));
        split
    };
    let anchor_coord = graph.coord(anchor);

    let node = graph.push_node(coord, config.precision);
    graph.link(node, anchor, haversine_m(&coord, &anchor_coord));
    tracing::debug!(node, anchor, t, "snapped query point onto edge {}-{}", u, v);
    Ok(SnapPoint { node, anchor, projected: anchor_coord })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::path_planning::graph::GraphBuilder;

    fn square() -> Vec<Vec<Coord>> {
        vec![vec![
            Coord::new(0.0, 0.0),
            Coord::new(0.0, 2.0),
            Coord::new(2.0, 2.0),
            Coord::new(2.0, 0.0),
            Coord::new(0.0, 0.0),
        ]]
    }

    fn line_graph() -> Graph {
        let mut b = GraphBuilder::new(6);
        b.add_line(&[Coord::new(-1.0, 3.0), Coord::new(3.0, 3.0), Coord::new(3.0, -1.0)]);
        b.build(vec![square()], Vec::new())
    }

    #[test]
    fn test_point_in_obstacle_rejected() {
        let g = line_graph();
        let err = snap_point(&g, Coord::new(1.0, 1.0), &SnapConfig::default()).unwrap_err();
        assert_eq!(err, SnapError::PointInObstacle);
        assert_eq!(err.code(), "point_in_obstacle");
    }

    #[test]
    fn test_empty_graph_has_no_edge() {
        let err = snap_point(&Graph::default(), Coord::new(5.0, 5.0), &SnapConfig::default()).unwrap_err();
        assert_eq!(err, SnapError::NoNearbyEdge);
    }

    #[test]
    fn test_mid_edge_snap_splits_on_copy_only() {
        let g = line_graph();
        let snapped = snap_point(&g, Coord::new(1.0, 3.5), &SnapConfig::default()).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);

        let sg = &snapped.graph;
        assert_eq!(sg.node_count(), 5);
        assert_eq!(sg.edge_count(), 4);
        assert_eq!(snapped.snap.projected, Coord::new(1.0, 3.0));
        assert_eq!(sg.adjacency[snapped.snap.node].len(), 1);
        assert_eq!(sg.edge_weight(0, 1), None);
        let split = snapped.snap.anchor;
        let total = sg.edge_weight(0, split).unwrap() + sg.edge_weight(split, 1).unwrap();
        assert!((total - g.edge_weight(0, 1).unwrap()).abs() < 5.0);
    }

    #[test]
    fn test_endpoint_snap_reuses_node() {
        let g = line_graph();
        let snapped = snap_point(&g, Coord::new(3.5, 3.5), &SnapConfig::default()).unwrap();
        assert_eq!(snapped.snap.anchor, 1);
        assert_eq!(snapped.graph.node_count(), 4);
    }

    #[test]
    fn test_pair_snaps_onto_shared_copy() {
        let g = line_graph();
        let pair = snap_pair(&g, Coord::new(0.0, 3.2), Coord::new(3.2, 0.0), &SnapConfig::default()).unwrap();
        assert_ne!(pair.start.node, pair.end.node);
        assert_eq!(pair.graph.node_count(), 7);
    }
}
