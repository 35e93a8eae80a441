use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::geometry::{Coord, ObstaclePolygon, WallSegment};
use crate::domains::path_planning::graph::Graph;
use crate::domains::path_planning::ports::{GraphStore, PathPlanningDataSource};

/// Magic prefix of stored graph files.
pub const GRAPH_MAGIC: &[u8; 4] = b"PGPH";
pub const GRAPH_FORMAT_VERSION: u8 = 1;

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "PATH_PLANNING_DATA_DIR";

#[derive(Debug, Serialize, Deserialize)]
struct GraphFileHeader {
    format: String,
    version: u8,
    nodes: usize,
    edges: usize,
}

#[derive(Serialize, Deserialize)]
struct StoredGraph {
    graph: UnGraph<Coord, f64>,
    precision: u32,
    obstacles: Vec<ObstaclePolygon>,
    walls: Vec<WallSegment>,
}

fn infra<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> DomainError + '_ {
    move |e| DomainError::InfrastructureError(format!("{}: {}", context, e))
}

/// Serialize a graph as magic + version + JSON header + bincode payload.
pub fn encode_graph(graph: &Graph, precision: u32) -> DomainResult<Vec<u8>> {
    let stored = StoredGraph {
        graph: graph.to_petgraph(),
        precision,
        obstacles: graph.obstacles.clone(),
        walls: graph.walls.clone(),
    };
    let header = serde_json::to_vec(&GraphFileHeader {
        format: "petgraph-bincode".to_string(),
        version: GRAPH_FORMAT_VERSION,
        nodes: graph.node_count(),
        edges: graph.edge_count(),
    })?;
    let payload = bincode::serialize(&stored).map_err(infra("bincode encode"))?;

    let mut bytes = Vec::with_capacity(9 + header.len() + payload.len());
    bytes.extend_from_slice(GRAPH_MAGIC);
    bytes.push(GRAPH_FORMAT_VERSION);
    bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_graph(bytes: &[u8]) -> DomainResult<Graph> {
    if bytes.len() < 9 || &bytes[..4] != GRAPH_MAGIC {
        return Err(DomainError::InfrastructureError("not a graph file (bad magic)".to_string()));
    }
    let version = bytes[4];
    if version != GRAPH_FORMAT_VERSION {
        return Err(DomainError::InfrastructureError(format!("unsupported graph file version {}", version)));
    }
    let header_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
    let payload_start = 9 + header_len;
    if bytes.len() < payload_start {
        return Err(DomainError::InfrastructureError("truncated graph header".to_string()));
    }
    let header: GraphFileHeader = serde_json::from_slice(&bytes[9..payload_start])?;
    let stored: StoredGraph = bincode::deserialize(&bytes[payload_start..]).map_err(infra("bincode decode"))?;

    let graph = Graph::from_petgraph(&stored.graph, stored.precision, stored.obstacles, stored.walls);
    if graph.node_count() != header.nodes || graph.edge_count() != header.edges {
        return Err(DomainError::InfrastructureError(format!(
            "graph payload has {}/{} nodes/edges, header says {}/{}",
            graph.node_count(),
            graph.edge_count(),
            header.nodes,
            header.edges
        )));
    }
    Ok(graph)
}

/// Map data under `<base>/geojson` and stored graphs under `<base>/graphs`.
pub struct FilesystemDataSource {
    base: PathBuf,
}

impl FilesystemDataSource {
    /// Precedence: explicit base -> PATH_PLANNING_DATA_DIR -> ./resources/path_planning
    /// -> /usr/share/gryphon-routing/path_planning
    pub fn new(base: Option<PathBuf>) -> Self {
        let base = base.unwrap_or_else(|| {
            if let Ok(v) = env::var(DATA_DIR_ENV) {
                PathBuf::from(v)
            } else {
                let cwd_default = Path::new("resources/path_planning");
                if cwd_default.exists() {
                    cwd_default.to_path_buf()
                } else {
                    PathBuf::from("/usr/share/gryphon-routing/path_planning")
                }
            }
        });
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn graph_path(&self, name: &str) -> PathBuf {
        self.base.join("graphs").join(name)
    }

    pub fn save_graph(&self, name: &str, graph: &Graph, precision: u32) -> DomainResult<()> {
        let bytes = encode_graph(graph, precision)?;
        self.save_graph_bytes(name, &bytes)
    }

    pub fn load_graph(&self, name: &str) -> DomainResult<Graph> {
        decode_graph(&GraphStore::load_graph_bytes(self, name)?)
    }
}

impl PathPlanningDataSource for FilesystemDataSource {
    fn load_geojson(&self, name: &str) -> DomainResult<String> {
        let p = self.base.join("geojson").join(name);
        fs::read_to_string(&p).map_err(infra(&format!("read {}", p.display())))
    }

    fn load_graph_bytes(&self, name: &str) -> DomainResult<Vec<u8>> {
        let p = self.graph_path(name);
        fs::read(&p).map_err(infra(&format!("read {}", p.display())))
    }
}

impl GraphStore for FilesystemDataSource {
    fn save_graph_bytes(&self, name: &str, bytes: &[u8]) -> DomainResult<()> {
        let p = self.graph_path(name);
        if let Some(dir) = p.parent() {
            fs::create_dir_all(dir).map_err(infra("create graphs dir"))?;
        }
        fs::write(&p, bytes).map_err(infra(&format!("write {}", p.display())))
    }

    fn load_graph_bytes(&self, name: &str) -> DomainResult<Vec<u8>> {
        PathPlanningDataSource::load_graph_bytes(self, name)
    }

    fn delete_graph(&self, name: &str) -> DomainResult<()> {
        let p = self.graph_path(name);
        fs::remove_file(&p).map_err(infra(&format!("delete {}", p.display())))
    }
}
