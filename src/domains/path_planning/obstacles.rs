use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use super::geometry::{Coord, ObstaclePolygon, Ring, WallSegment};
use crate::common::{DomainError, DomainResult};

type Predicate = dyn Fn(&JsonObject) -> bool + Send + Sync;

/// Decides from a feature's properties whether its polygon blocks movement.
#[derive(Clone)]
pub struct ObstacleClassifier {
    predicate: Arc<Predicate>,
}

impl ObstacleClassifier {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&JsonObject) -> bool + Send + Sync + 'static,
    {
        Self { predicate: Arc::new(predicate) }
    }

    pub fn is_obstacle(&self, properties: &JsonObject) -> bool {
        (self.predicate)(properties)
    }

    fn matches(&self, feature: &Feature) -> bool {
        match &feature.properties {
            Some(props) => self.is_obstacle(props),
            None => self.is_obstacle(&JsonObject::new()),
        }
    }
}

impl Default for ObstacleClassifier {
    /// `walkable: false`, `blocked: true`, `obstacle: true` or `type: "obstacle"` (any case).
    fn default() -> Self {
        Self::new(|props| {
            props.get("walkable") == Some(&JsonValue::Bool(false))
                || props.get("blocked") == Some(&JsonValue::Bool(true))
                || props.get("obstacle") == Some(&JsonValue::Bool(true))
                || type_is(props, "obstacle")
        })
    }
}

impl fmt::Debug for ObstacleClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObstacleClassifier(..)")
    }
}

fn type_is(props: &JsonObject, expected: &str) -> bool {
    props
        .get("type")
        .and_then(JsonValue::as_str)
        .map(|t| t.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Line features flagged `wall: true` or `type: "wall"` are walls, not walkable network.
pub fn is_wall_feature(feature: &Feature) -> bool {
    feature
        .properties
        .as_ref()
        .map(|props| props.get("wall") == Some(&JsonValue::Bool(true)) || type_is(props, "wall"))
        .unwrap_or(false)
}

/// Parse GeoJSON text into a feature collection; a bare feature or geometry is wrapped.
pub fn parse_feature_collection(text: &str) -> DomainResult<FeatureCollection> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| DomainError::Geojson(e.to_string()))?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => return Ok(fc),
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };
    Ok(FeatureCollection { bbox: None, features, foreign_members: None })
}

pub(crate) fn to_coords(positions: &[Vec<f64>]) -> Vec<Coord> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Coord::new(p[0], p[1]))
        .collect()
}

/// Close the ring if open. Rings under three points are rejected.
fn normalize_ring(positions: &[Vec<f64>]) -> Option<Ring> {
    let mut ring = to_coords(positions);
    if ring.len() < 3 {
        return None;
    }
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    Some(ring)
}

fn polygon_rings(rings: &[Vec<Vec<f64>>]) -> ObstaclePolygon {
    rings.iter().filter_map(|r| normalize_ring(r)).collect()
}

/// Collect every polygon the classifier flags, in source order.
pub fn extract_obstacles(collection: &FeatureCollection, classifier: &ObstacleClassifier) -> Vec<ObstaclePolygon> {
    let mut obstacles = Vec::new();
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else { continue };
        if !classifier.matches(feature) {
            continue;
        }
        match &geometry.value {
            Value::Polygon(rings) => obstacles.push(polygon_rings(rings)),
            Value::MultiPolygon(polygons) => {
                obstacles.extend(polygons.iter().map(|rings| polygon_rings(rings)));
            }
            _ => {}
        }
    }
    obstacles.retain(|poly| !poly.is_empty());
    tracing::debug!(count = obstacles.len(), "extracted obstacle polygons");
    obstacles
}

/// Every consecutive coordinate pair of a wall line becomes one segment.
pub fn extract_walls(collection: &FeatureCollection) -> Vec<WallSegment> {
    let mut walls = Vec::new();
    for feature in collection.features.iter().filter(|f| is_wall_feature(f)) {
        let Some(geometry) = &feature.geometry else { continue };
        let lines: Vec<Vec<Coord>> = match &geometry.value {
            Value::LineString(line) => vec![to_coords(line)],
            Value::MultiLineString(lines) => lines.iter().map(|l| to_coords(l)).collect(),
            _ => continue,
        };
        for line in lines {
            walls.extend(line.windows(2).map(|w| [w[0], w[1]]));
        }
    }
    walls
}
