use geojson::{FeatureCollection, Value};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::geometry::{
    haversine_m, point_in_polygon, segment_intersects_polygon, BBox, Coord, ObstaclePolygon,
    WallSegment,
};
use super::obstacles::{extract_obstacles, extract_walls, is_wall_feature, to_coords, ObstacleClassifier};
use crate::common::{DomainError, DomainResult};

/// Coordinate rounded to the builder's precision and scaled to integers.
pub type DedupKey = (i64, i64);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Decimal places used to merge coincident nodes. Default: 6
    pub precision: u32,
    /// Drop nodes inside and edges across obstacles. Default: true
    pub filter_obstacles: bool,
    /// Spatial index bucket size in degrees. Default: 0.01
    pub index_cell_deg: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            precision: 6,
            filter_obstacles: true,
            index_cell_deg: 0.01,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.precision > 12 {
            return Err(DomainError::InvalidCommand {
                reason: format!("graph precision {} exceeds 12 decimals", self.precision),
            });
        }
        if !(self.index_cell_deg.is_finite() && self.index_cell_deg > 0.0) {
            return Err(DomainError::InvalidCommand {
                reason: format!("index cell size must be positive, got {}", self.index_cell_deg),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    pub lon: f64,
    pub lat: f64,
    pub key: DedupKey,
}

impl GraphNode {
    pub fn coord(&self) -> Coord {
        Coord::new(self.lon, self.lat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub to: usize,
    /// Great-circle length in meters.
    pub weight: f64,
}

/// Undirected topology graph. Every edge is stored once per endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub adjacency: Vec<Vec<GraphEdge>>,
    pub obstacles: Vec<ObstaclePolygon>,
    pub walls: Vec<WallSegment>,
}

/// Owns the dedup map while line features are being turned into nodes and edges.
#[derive(Debug)]
pub struct GraphBuilder {
    scale: f64,
    key_to_id: HashMap<DedupKey, usize>,
    nodes: Vec<GraphNode>,
    adjacency: Vec<Vec<GraphEdge>>,
}

impl GraphBuilder {
    pub fn new(precision: u32) -> Self {
        Self {
            scale: 10f64.powi(precision as i32),
            key_to_id: HashMap::new(),
            nodes: Vec::new(),
            adjacency: Vec::new(),
        }
    }

    pub fn dedup_key(&self, c: &Coord) -> DedupKey {
        ((c.lon * self.scale).round() as i64, (c.lat * self.scale).round() as i64)
    }

    /// Returns the id of the node at `c`, creating it unless a node with the same key exists.
    pub fn add_node(&mut self, c: Coord) -> usize {
        let key = self.dedup_key(&c);
        if let Some(&id) = self.key_to_id.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(GraphNode { id, lon: c.lon, lat: c.lat, key });
        self.adjacency.push(Vec::new());
        self.key_to_id.insert(key, id);
        id
    }

    /// Adds `a`-`b` in both directions with its haversine length.
    /// Self-loops, duplicates and non-finite weights are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize) -> bool {
        if a == b || a >= self.nodes.len() || b >= self.nodes.len() {
            return false;
        }
        let weight = haversine_m(&self.nodes[a].coord(), &self.nodes[b].coord());
        self.insert_edge(a, b, weight)
    }

    fn insert_edge(&mut self, a: usize, b: usize, weight: f64) -> bool {
        if !weight.is_finite() || self.adjacency[a].iter().any(|e| e.to == b) {
            return false;
        }
        self.adjacency[a].push(GraphEdge { to: b, weight });
        self.adjacency[b].push(GraphEdge { to: a, weight });
        true
    }

    pub fn add_line(&mut self, line: &[Coord]) {
        for pair in line.windows(2) {
            let a = self.add_node(pair[0]);
            let b = self.add_node(pair[1]);
            self.add_edge(a, b);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Unlinks every node inside an obstacle and every edge touching or crossing one.
    /// Node ids are kept so the array stays dense.
    pub fn filter_obstacles(&mut self, obstacles: &[ObstaclePolygon]) {
        let boxes: Vec<BBox> = obstacles.iter().map(|o| BBox::of_rings(o)).collect();
        let blocked: Vec<bool> = self
            .nodes
            .iter()
            .map(|n| {
                let c = n.coord();
                obstacles
                    .iter()
                    .zip(&boxes)
                    .any(|(poly, bbox)| bbox.contains(&c) && point_in_polygon(&c, poly))
            })
            .collect();

        let nodes = &self.nodes;
        let edge_blocked = |u: usize, v: usize| {
            let (a, b) = if u < v { (u, v) } else { (v, u) };
            if blocked[a] || blocked[b] {
                return true;
            }
            let (ca, cb) = (nodes[a].coord(), nodes[b].coord());
            obstacles
                .iter()
                .zip(&boxes)
                .any(|(poly, bbox)| segment_intersects_polygon(&ca, &cb, poly, bbox))
        };

        let mut removed = 0usize;
        for (u, edges) in self.adjacency.iter_mut().enumerate() {
            let before = edges.len();
            edges.retain(|e| !edge_blocked(u, e.to));
            removed += before - edges.len();
        }
        tracing::debug!(
            blocked_nodes = blocked.iter().filter(|b| **b).count(),
            removed_edges = removed / 2,
            "applied obstacle filter"
        );
    }

    pub fn build(self, obstacles: Vec<ObstaclePolygon>, walls: Vec<WallSegment>) -> Graph {
        Graph {
            nodes: self.nodes,
            adjacency: self.adjacency,
            obstacles,
            walls,
        }
    }
}

/// Build the obstacle-filtered base graph from a feature collection.
///
/// Line features become the walkable network, except lines marked as walls and
/// features the classifier flags as obstacles.
pub fn build_topology_graph(
    collection: &FeatureCollection,
    classifier: &ObstacleClassifier,
    config: &GraphConfig,
) -> DomainResult<Graph> {
    config.validate()?;
    let obstacles = extract_obstacles(collection, classifier);
    let walls = extract_walls(collection);

    let mut builder = GraphBuilder::new(config.precision);
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else { continue };
        if is_wall_feature(feature) {
            continue;
        }
        if let Some(props) = &feature.properties {
            if classifier.is_obstacle(props) {
                continue;
            }
        }
        match &geometry.value {
            Value::LineString(line) => builder.add_line(&to_coords(line)),
            Value::MultiLineString(lines) => {
                for line in lines {
                    builder.add_line(&to_coords(line));
                }
            }
            _ => {}
        }
    }

    if config.filter_obstacles && !obstacles.is_empty() {
        builder.filter_obstacles(&obstacles);
    }
    let graph = builder.build(obstacles, walls);
    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        obstacles = graph.obstacles.len(),
        "built topology graph"
    );
    Ok(graph)
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn coord(&self, id: usize) -> Coord {
        self.nodes[id].coord()
    }

    /// Each undirected edge once, as `(u, v, weight)` with `u < v`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(u, edges)| {
            edges
                .iter()
                .filter(move |e| u < e.to)
                .map(move |e| (u, e.to, e.weight))
        })
    }

    pub fn total_weight(&self) -> f64 {
        self.edges().map(|(_, _, w)| w).sum()
    }

    pub fn edge_weight(&self, u: usize, v: usize) -> Option<f64> {
        self.adjacency.get(u)?.iter().find(|e| e.to == v).map(|e| e.weight)
    }

    pub fn node_bbox(&self) -> BBox {
        let mut bbox = BBox::empty();
        for node in &self.nodes {
            bbox.extend(&node.coord());
        }
        bbox
    }

    /// Query-scoped mutation; only ever called on a private copy.
    pub(crate) fn push_node(&mut self, c: Coord, precision: u32) -> usize {
        let scale = 10f64.powi(precision as i32);
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            id,
            lon: c.lon,
            lat: c.lat,
            key: ((c.lon * scale).round() as i64, (c.lat * scale).round() as i64),
        });
        self.adjacency.push(Vec::new());
        id
    }

    pub(crate) fn link(&mut self, a: usize, b: usize, weight: f64) {
        if a == b || !weight.is_finite() {
            return;
        }
        self.adjacency[a].push(GraphEdge { to: b, weight });
        self.adjacency[b].push(GraphEdge { to: a, weight });
    }

    pub(crate) fn unlink(&mut self, a: usize, b: usize) {
        self.adjacency[a].retain(|e| e.to != b);
        self.adjacency[b].retain(|e| e.to != a);
    }

    /// Rendering/UI view of the graph.
    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self
                .nodes
                .iter()
                .map(|n| ExportNode { id: n.id, lon: n.lon, lat: n.lat })
                .collect(),
            adjacency: self
                .adjacency
                .iter()
                .map(|edges| edges.iter().map(|e| ExportEdge { to: e.to, w: e.weight }).collect())
                .collect(),
            obstacles: self
                .obstacles
                .iter()
                .map(|poly| {
                    poly.iter()
                        .map(|ring| ring.iter().map(|c| [c.lon, c.lat]).collect())
                        .collect()
                })
                .collect(),
        }
    }

    pub fn to_petgraph(&self) -> UnGraph<Coord, f64> {
        let mut pg = UnGraph::with_capacity(self.node_count(), self.edge_count());
        for node in &self.nodes {
            pg.add_node(node.coord());
        }
        for (u, v, w) in self.edges() {
            pg.add_edge(NodeIndex::new(u), NodeIndex::new(v), w);
        }
        pg
    }

    /// Rebuild from a stored petgraph, keeping node order and stored weights.
    pub fn from_petgraph(
        pg: &UnGraph<Coord, f64>,
        precision: u32,
        obstacles: Vec<ObstaclePolygon>,
        walls: Vec<WallSegment>,
    ) -> Self {
        let mut builder = GraphBuilder::new(precision);
        let mut ids = Vec::with_capacity(pg.node_count());
        for idx in pg.node_indices() {
            ids.push(builder.add_node(pg[idx]));
        }
        for edge in pg.raw_edges() {
            let (a, b) = (ids[edge.source().index()], ids[edge.target().index()]);
            if a != b {
                builder.insert_edge(a, b, edge.weight);
            }
        }
        builder.build(obstacles, walls)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: usize,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEdge {
    pub to: usize,
    pub w: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub adjacency: Vec<Vec<ExportEdge>>,
    pub obstacles: Vec<Vec<Vec<[f64; 2]>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::path_planning::geometry::segments_intersect;
    use crate::domains::path_planning::obstacles::parse_feature_collection;

    const CROSSING: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        { "type": "Feature", "properties": {"type": "obstacle"},
          "geometry": { "type": "Polygon", "coordinates": [[[0,0],[0,2],[2,2],[2,0],[0,0]]] } },
        { "type": "Feature", "properties": {},
          "geometry": { "type": "LineString", "coordinates": [[-1,1],[3,1]] } },
        { "type": "Feature", "properties": {},
          "geometry": { "type": "LineString", "coordinates": [[-1,3],[3,3],[3,1]] } }
      ]
    }"#;

    fn build(text: &str, filter: bool) -> Graph {
        let fc = parse_feature_collection(text).unwrap();
        let config = GraphConfig { filter_obstacles: filter, ..GraphConfig::default() };
        build_topology_graph(&fc, &ObstacleClassifier::default(), &config).unwrap()
    }

    fn assert_symmetric(graph: &Graph) {
        for (a, edges) in graph.adjacency.iter().enumerate() {
            for e in edges {
                assert!(
                    graph.adjacency[e.to].iter().any(|back| back.to == a && back.weight == e.weight),
                    "edge {} -> {} has no mirror",
                    a,
                    e.to
                );
            }
        }
    }

    #[test]
    fn test_builder_dedups_and_ignores_self_loops() {
        let mut b = GraphBuilder::new(6);
        let a = b.add_node(Coord::new(1.0, 1.0));
        let again = b.add_node(Coord::new(1.000_000_1, 1.0));
        assert_eq!(a, again);
        let c = b.add_node(Coord::new(1.0, 2.0));
        assert!(!b.add_edge(a, a));
        assert!(b.add_edge(a, c));
        assert!(!b.add_edge(c, a));
        let g = b.build(Vec::new(), Vec::new());
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_filter_removes_crossing_edges() {
        let graph = build(CROSSING, true);
        let square = &graph.obstacles[0];
        for (u, v, _) in graph.edges() {
            let (a, b) = (graph.coord(u), graph.coord(v));
            let crosses = square
                .iter()
                .any(|ring| ring.windows(2).any(|e| segments_intersect(&a, &b, &e[0], &e[1])));
            assert!(!crosses, "edge {}-{} crosses the obstacle", u, v);
        }
        // the detour around the top survives
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_adjacency_symmetric_before_and_after_filter() {
        assert_symmetric(&build(CROSSING, false));
        assert_symmetric(&build(CROSSING, true));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let g1 = build(CROSSING, true);
        let g2 = build(CROSSING, true);
        assert_eq!(g1.node_count(), g2.node_count());
        assert_eq!(g1.total_weight(), g2.total_weight());
    }

    #[test]
    fn test_export_shape() {
        let graph = build(CROSSING, true);
        let export = graph.export();
        assert_eq!(export.nodes.len(), graph.node_count());
        assert_eq!(export.adjacency.len(), graph.node_count());
        let json = serde_json::to_value(&export).unwrap();
        assert!(json["adjacency"][0].is_array());
        assert_eq!(json["obstacles"][0][0][0], serde_json::json!([0.0, 0.0]));
    }

    #[test]
    fn test_petgraph_round_trip() {
        let graph = build(CROSSING, true);
        let back = Graph::from_petgraph(&graph.to_petgraph(), 6, graph.obstacles.clone(), Vec::new());
        assert_eq!(back.node_count(), graph.node_count());
        assert_eq!(back.edge_count(), graph.edge_count());
        assert!((back.total_weight() - graph.total_weight()).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_precision_rejected() {
        let config = GraphConfig { precision: 20, ..GraphConfig::default() };
        assert!(config.validate().is_err());
    }
}
