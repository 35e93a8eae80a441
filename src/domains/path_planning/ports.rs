use crate::common::DomainResult;

/// Port trait the path_planning domain depends on for loading map data.
/// Implementations (adapters) provide filesystem or network-backed sources.
pub trait PathPlanningDataSource: Send + Sync {
    fn load_geojson(&self, name: &str) -> DomainResult<String>;
    fn load_graph_bytes(&self, name: &str) -> DomainResult<Vec<u8>>;
}

/// Port for persisting built topology graphs so a map need not be rebuilt on every start.
pub trait GraphStore: Send + Sync {
    fn save_graph_bytes(&self, name: &str, bytes: &[u8]) -> DomainResult<()>;
    fn load_graph_bytes(&self, name: &str) -> DomainResult<Vec<u8>>;
    fn delete_graph(&self, name: &str) -> DomainResult<()>;
}
