use gryphon_routing::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use std::error::Error;
use std::path::PathBuf;

use gryphon_routing::adapters::outbound::{init_logger, FilesystemDataSource};
use gryphon_routing::application::PathPlanningService;
use gryphon_routing::domains::path_planning::{Coord, PathPlanningDataSource, RouteStrategy};

fn parse_coord(arg: Option<String>) -> Option<Coord> {
    let arg = arg?;
    let (lon, lat) = arg.split_once(',')?;
    Some(Coord::new(lon.trim().parse().ok()?, lat.trim().parse().ok()?))
}

/// Usage: gryphon-routing [config.toml] [start_lon,start_lat end_lon,end_lat] [shortest|fewest_turns]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting gryphon-routing");

    let mut args = std::env::args().skip(1).peekable();
    let config_path = match args.peek() {
        Some(a) if a.ends_with(".toml") => args.next().map(PathBuf::from),
        _ => None,
    };
    let config = Config::load(config_path.as_deref())?;
    info!(
        precision = config.graph.precision,
        map = %config.data.map,
        "Configuration loaded"
    );

    let logger = init_logger(config.logging.file.as_deref(), &config.logging.level, "routing");
    let data = FilesystemDataSource::new(config.data.dir.clone());

    let service = match &config.data.graph {
        Some(name) => match data.load_graph(name) {
            Ok(graph) => PathPlanningService::new(graph, config.clone(), logger.clone())?,
            Err(e) => {
                warn!("Failed to load stored graph {}: {}; rebuilding from {}", name, e, config.data.map);
                let text = data.load_geojson(&config.data.map)?;
                let service = PathPlanningService::from_geojson(&text, config.clone(), logger.clone())?;
                data.save_graph(name, &service.graph(), config.graph.precision)?;
                service
            }
        },
        None => {
            let text = data.load_geojson(&config.data.map)?;
            PathPlanningService::from_geojson(&text, config.clone(), logger.clone())?
        }
    };

    let graph = service.graph();
    let bbox = graph.node_bbox();
    let (start, end) = match (parse_coord(args.next()), parse_coord(args.next())) {
        (Some(s), Some(e)) => (s, e),
        _ if bbox.is_valid() => (
            Coord::new(bbox.min_lon, bbox.min_lat),
            Coord::new(bbox.max_lon, bbox.max_lat),
        ),
        _ => return Err("no route endpoints given and the graph is empty".into()),
    };
    let strategy = match args.next().as_deref() {
        Some("fewest_turns") => RouteStrategy::FewestTurns,
        _ => RouteStrategy::Shortest,
    };

    match service.route(start, end, strategy) {
        Ok(route) => println!("{}", serde_json::to_string_pretty(&route)?),
        Err(e) => {
            let code = e.route_code().unwrap_or("internal");
            println!("{}", serde_json::json!({ "ok": false, "error": code, "message": e.to_string() }));
        }
    }

    info!("gryphon-routing finished");
    Ok(())
}
