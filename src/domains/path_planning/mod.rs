pub mod events;
pub mod geometry;
pub mod graph;
pub mod grid_planner;
pub mod obstacles;
pub mod pathfinder;
pub mod ports;
pub mod priority_queue;
pub mod snapping;
pub mod spatial_index;

pub use events::*;
pub use geometry::{BBox, Coord, ObstaclePolygon, Ring, WallSegment};
pub use graph::{build_topology_graph, Graph, GraphBuilder, GraphConfig, GraphExport};
pub use grid_planner::{
    GridPathPlanner, GridPlan, GridPlanError, GridPlanRequest, GridPlannerConfig, OccupancyGrid,
    PlanProgress, PlanStatus,
};
pub use obstacles::{extract_obstacles, extract_walls, parse_feature_collection, ObstacleClassifier};
pub use pathfinder::{astar, count_turns, dijkstra, CostStrategy, PathResult, PathfinderConfig, RouteStrategy};
pub use ports::*;
pub use priority_queue::IndexedPriorityQueue;
pub use snapping::{snap_pair, snap_point, SnapConfig, SnapError, SnappedGraph, SnappedPair};
pub use spatial_index::SpatialIndex;
