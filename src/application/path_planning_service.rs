// Path Planning Service - graph routing with grid fallback
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::common::{DomainError, DomainResult};
use crate::config::Config;
use crate::domains::path_planning::geometry::haversine_m;
use crate::domains::path_planning::{
    astar, build_topology_graph, count_turns, parse_feature_collection, snap_pair, Coord,
    Graph, GraphExport, GridPathPlanner, GridPlanRequest, ObstacleClassifier, PlanStatus,
    RouteStrategy, SnapError, SpatialIndex,
};
use crate::domains::DynLogger;

/// Ring radius passed to the spatial index for nearest-node queries.
const NEAREST_EXPAND: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Graph,
    Grid,
    /// Grid plan cut short by the iteration budget; the route ends before the goal.
    GridPartial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<Coord>,
    pub length_m: f64,
    pub turns: usize,
    pub source: RouteSource,
}

pub struct PathPlanningService {
    graph: Arc<Graph>,
    index: SpatialIndex,
    config: Config,
    planner: GridPathPlanner,
    logger: DynLogger,
}

impl PathPlanningService {
    pub fn new(graph: Graph, config: Config, logger: DynLogger) -> DomainResult<Self> {
        config.validate()?;
        let index = SpatialIndex::build(&graph, config.graph.index_cell_deg);
        let planner = GridPathPlanner::new(config.grid.clone())?;
        logger.info(&format!(
            "Route service ready: {} nodes, {} edges, {} obstacles, {} walls",
            graph.node_count(),
            graph.edge_count(),
            graph.obstacles.len(),
            graph.walls.len()
        ));
        Ok(Self { graph: Arc::new(graph), index, config, planner, logger })
    }

    /// Build the topology graph from GeoJSON text with the default obstacle classifier.
    pub fn from_geojson(text: &str, config: Config, logger: DynLogger) -> DomainResult<Self> {
        let collection = parse_feature_collection(text)?;
        let graph = build_topology_graph(&collection, &ObstacleClassifier::default(), &config.graph)?;
        Self::new(graph, config, logger)
    }

    pub fn graph(&self) -> Arc<Graph> {
        Arc::clone(&self.graph)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn nearest_node(&self, at: Coord) -> Option<usize> {
        self.index.nearest(at.lon, at.lat, NEAREST_EXPAND)
    }

    pub fn export(&self) -> GraphExport {
        self.graph.export()
    }

    /// Route over the topology graph, falling back to the grid planner when the
    /// endpoints cannot be snapped or the graph has no connecting path.
    /// An endpoint inside an obstacle fails immediately.
    pub fn route(&self, start: Coord, end: Coord, strategy: RouteStrategy) -> DomainResult<Route> {
        if !start.is_finite() || !end.is_finite() {
            return Err(DomainError::InvalidCommand {
                reason: "route endpoints must be finite".to_string(),
            });
        }
        let min_turn = self.config.pathfinder.min_turn_angle_deg.to_radians();

        match snap_pair(&self.graph, start, end, &self.config.snap) {
            Ok(snapped) => {
                let cost = self.config.pathfinder.cost_strategy(strategy);
                let result = astar(&snapped.graph, snapped.start.node, snapped.end.node, cost);
                if result.is_found() {
                    self.logger.info(&format!(
                        "Graph route: {} nodes, {:.1} m ({:?})",
                        result.path.len(),
                        result.length,
                        strategy
                    ));
                    return Ok(Route {
                        turns: count_turns(&result.coords, min_turn),
                        path: result.coords,
                        length_m: result.length,
                        source: RouteSource::Graph,
                    });
                }
                self.logger.warn("No graph path between snapped endpoints; trying grid planner");
            }
            Err(SnapError::PointInObstacle) => {
                self.logger.warn(&format!("Route rejected: endpoint inside obstacle ({:?} -> {:?})", start, end));
                return Err(SnapError::PointInObstacle.into());
            }
            Err(e) => {
                self.logger.warn(&format!("Snap failed ({}); trying grid planner", e.code()));
            }
        }

        let request = GridPlanRequest {
            start,
            end,
            obstacles: self.graph.obstacles.clone(),
            walls: self.graph.walls.clone(),
            bbox_nodes: (self.graph.node_count() > 0).then(|| self.graph.node_bbox()),
        };
        let plan = self.planner.plan(&request)?;
        let source = match plan.status {
            PlanStatus::Complete => RouteSource::Grid,
            PlanStatus::Partial => RouteSource::GridPartial,
        };
        let length_m = plan.path.windows(2).map(|w| haversine_m(&w[0], &w[1])).sum();
        self.logger.info(&format!(
            "Grid route: {} points on {}x{} grid{}",
            plan.path.len(),
            plan.cols,
            plan.rows,
            if plan.coarsened { " (coarsened)" } else { "" }
        ));
        Ok(Route {
            turns: count_turns(&plan.path, min_turn),
            path: plan.path,
            length_m,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::init_noop_logger;

    const GRID_MAP: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[0.0,0.0],[0.001,0.0],[0.002,0.0]]}},
        {"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[0.001,0.0],[0.001,0.001]]}},
        {"type":"Feature","properties":{"obstacle":true},"geometry":{"type":"Polygon","coordinates":[[[0.0015,0.0005],[0.0015,0.0009],[0.0019,0.0009],[0.0019,0.0005],[0.0015,0.0005]]]}}
    ]}"#;

    fn service() -> PathPlanningService {
        PathPlanningService::from_geojson(GRID_MAP, Config::default(), init_noop_logger()).unwrap()
    }

    #[test]
    fn test_route_over_graph() {
        let svc = service();
        let route = svc
            .route(Coord::new(0.0, 0.0), Coord::new(0.001, 0.001), RouteStrategy::Shortest)
            .unwrap();
        assert_eq!(route.source, RouteSource::Graph);
        assert_eq!(route.path.first(), Some(&Coord::new(0.0, 0.0)));
        assert_eq!(route.path.last(), Some(&Coord::new(0.001, 0.001)));
        assert!(route.length_m > 200.0 && route.length_m < 250.0);
    }

    #[test]
    fn test_route_rejects_point_in_obstacle() {
        let err = service()
            .route(Coord::new(0.0, 0.0), Coord::new(0.0017, 0.0007), RouteStrategy::Shortest)
            .unwrap_err();
        assert_eq!(err.route_code(), Some("point_in_obstacle"));
    }

    #[test]
    fn test_empty_graph_falls_back_to_grid() {
        let svc = PathPlanningService::new(Graph::default(), Config::default(), init_noop_logger()).unwrap();
        let route = svc
            .route(Coord::new(0.0, 0.0), Coord::new(0.001, 0.001), RouteStrategy::Shortest)
            .unwrap();
        assert_eq!(route.source, RouteSource::Grid);
        assert_eq!(route.path.last(), Some(&Coord::new(0.001, 0.001)));
    }

    #[test]
    fn test_nearest_node() {
        let svc = service();
        let id = svc.nearest_node(Coord::new(0.00101, 0.00099)).unwrap();
        assert_eq!(svc.graph().coord(id), Coord::new(0.001, 0.001));
    }
}
