use gryphon_routing::domains::path_planning::geometry::{point_in_polygon, segment_intersects_polygon, BBox};
use gryphon_routing::domains::path_planning::{
    astar, build_topology_graph, dijkstra, parse_feature_collection, snap_pair, Coord, CostStrategy, Graph,
    GraphBuilder, GraphConfig, GridPathPlanner, GridPlanRequest, ObstacleClassifier, ObstaclePolygon,
    PlanStatus, SnapConfig, SnapError, SpatialIndex,
};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> ObstaclePolygon {
    vec![vec![
        Coord::new(min_lon, min_lat),
        Coord::new(min_lon, max_lat),
        Coord::new(max_lon, max_lat),
        Coord::new(max_lon, min_lat),
        Coord::new(min_lon, min_lat),
    ]]
}

fn random_graph(seed: u64, nodes: usize, edges: usize) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = GraphBuilder::new(6);
    let ids: Vec<usize> = (0..nodes)
        .map(|_| builder.add_node(Coord::new(rng.gen_range(0.0..0.01), rng.gen_range(0.0..0.01))))
        .collect();
    for _ in 0..edges {
        let a = ids[rng.gen_range(0..ids.len())];
        let b = ids[rng.gen_range(0..ids.len())];
        builder.add_edge(a, b);
    }
    builder.build(Vec::new(), Vec::new())
}

/// 5x5 lattice of streets with 0.001° spacing.
fn street_grid_geojson(with_block: bool) -> String {
    let mut features = Vec::new();
    for v in ["0.0", "0.001", "0.002", "0.003", "0.004"] {
        features.push(format!(
            r#"{{"type":"Feature","properties":{{}},"geometry":{{"type":"LineString","coordinates":[[{v},0.0],[{v},0.001],[{v},0.002],[{v},0.003],[{v},0.004]]}}}}"#
        ));
        features.push(format!(
            r#"{{"type":"Feature","properties":{{}},"geometry":{{"type":"LineString","coordinates":[[0.0,{v}],[0.001,{v}],[0.002,{v}],[0.003,{v}],[0.004,{v}]]}}}}"#
        ));
    }
    if with_block {
        features.push(
            r#"{"type":"Feature","properties":{"type":"obstacle"},"geometry":{"type":"Polygon","coordinates":[[[0.0015,0.0015],[0.0015,0.0025],[0.0025,0.0025],[0.0025,0.0015],[0.0015,0.0015]]]}}"#
                .to_string(),
        );
    }
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

fn street_grid(with_block: bool) -> Graph {
    let fc = parse_feature_collection(&street_grid_geojson(with_block)).unwrap();
    build_topology_graph(&fc, &ObstacleClassifier::default(), &GraphConfig::default()).unwrap()
}

#[test]
fn test_square_obstacle_point_in_polygon() {
    let sq = rect(0.0, 0.0, 1.0, 1.0);
    assert!(point_in_polygon(&Coord::new(0.5, 0.5), &sq));
    assert!(!point_in_polygon(&Coord::new(1.5, 0.5), &sq));
    assert!(!point_in_polygon(&Coord::new(-0.1, 0.9), &sq));
}

#[test]
fn test_no_edge_crosses_an_obstacle_after_filtering() {
    let graph = street_grid(true);
    assert_eq!(graph.obstacles.len(), 1);
    let poly = &graph.obstacles[0];
    let bbox = BBox::of_rings(poly);

    // the center node (0.002, 0.002) is inside the block and loses all its edges
    let center = (0..graph.node_count())
        .find(|&id| graph.coord(id) == Coord::new(0.002, 0.002))
        .unwrap();
    assert!(graph.adjacency[center].is_empty());

    for (u, v, _) in graph.edges() {
        assert!(
            !segment_intersects_polygon(&graph.coord(u), &graph.coord(v), poly, &bbox),
            "edge {}-{} crosses the obstacle",
            u,
            v
        );
    }
    assert!(graph.edge_count() < street_grid(false).edge_count());
}

#[test]
fn test_adjacency_is_symmetric() {
    for seed in 0..5 {
        let graph = random_graph(seed, 30, 60);
        for (u, edges) in graph.adjacency.iter().enumerate() {
            for e in edges {
                let back = graph.adjacency[e.to].iter().find(|r| r.to == u).unwrap();
                assert_eq!(back.weight, e.weight);
            }
        }
    }
}

#[test]
fn test_astar_agrees_with_dijkstra_on_random_graphs() {
    for seed in 0..20 {
        let graph = random_graph(seed, 40, 80);
        let pg = graph.to_petgraph();
        let mut rng = StdRng::seed_from_u64(1000 + seed);
        for _ in 0..10 {
            let s = rng.gen_range(0..graph.node_count());
            let g = rng.gen_range(0..graph.node_count());
            let a = astar(&graph, s, g, CostStrategy::Shortest);
            let d = dijkstra(&graph, s, g);
            assert_eq!(a.is_found(), d.is_found(), "seed {} {}->{}", seed, s, g);

            let reference = petgraph::algo::dijkstra(&pg, NodeIndex::new(s), Some(NodeIndex::new(g)), |e| *e.weight());
            match reference.get(&NodeIndex::new(g)) {
                Some(expected) => {
                    assert!((a.length - expected).abs() < 1e-6, "seed {}: {} vs {}", seed, a.length, expected);
                    assert!((d.length - expected).abs() < 1e-6);
                }
                None => assert!(!a.is_found()),
            }
        }
    }
}

#[test]
fn test_topology_build_is_idempotent() {
    let a = street_grid(true).export();
    let b = street_grid(true).export();
    assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
}

#[test]
fn test_snap_rejects_point_inside_obstacle() {
    let graph = street_grid(true);
    let err = snap_pair(&graph, Coord::new(0.0, 0.0), Coord::new(0.002, 0.0021), &SnapConfig::default()).unwrap_err();
    assert_eq!(err, SnapError::PointInObstacle);
}

#[test]
fn test_snapped_route_goes_around_block() {
    let graph = street_grid(true);
    let start = Coord::new(0.0005, 0.002);
    let end = Coord::new(0.0035, 0.002);
    let pair = snap_pair(&graph, start, end, &SnapConfig::default()).unwrap();
    let route = astar(&pair.graph, pair.start.node, pair.end.node, CostStrategy::Shortest);
    assert!(route.is_found());
    assert_eq!(route.coords.first(), Some(&start));
    assert_eq!(route.coords.last(), Some(&end));
    for c in &route.coords {
        assert!(!point_in_polygon(c, &graph.obstacles[0]));
    }
    // the base graph is untouched by snapping
    assert_eq!(graph.node_count(), street_grid(true).node_count());
}

#[test]
fn test_spatial_index_finds_nearest_street_corner() {
    let graph = street_grid(false);
    let index = SpatialIndex::build(&graph, 0.0005);
    let id = index.nearest(0.00305, 0.00098, 5).unwrap();
    assert_eq!(graph.coord(id), Coord::new(0.003, 0.001));
}

#[test]
fn test_grid_planner_is_deterministic() {
    let obstacle = rect(0.0015, 0.0019, 0.0025, 0.0021);
    let req = GridPlanRequest {
        start: Coord::new(0.0, 0.002),
        end: Coord::new(0.004, 0.002),
        obstacles: vec![obstacle.clone()],
        walls: Vec::new(),
        bbox_nodes: None,
    };
    let planner = GridPathPlanner::default();
    let first = planner.plan(&req).unwrap();
    let second = planner.plan(&req).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.status, PlanStatus::Complete);
    for p in &first.path {
        assert!(!point_in_polygon(p, &obstacle));
    }
}
