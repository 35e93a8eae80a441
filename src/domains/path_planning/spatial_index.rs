use std::collections::HashMap;

use super::geometry::Coord;
use super::graph::Graph;

/// Minimum number of cell rings searched before the linear fallback.
pub const MIN_RING_RADIUS: usize = 30;

/// Grid-bucketed nearest-node lookup over a graph's nodes.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
    coords: Vec<Coord>,
}

impl SpatialIndex {
    pub fn build(graph: &Graph, cell_size: f64) -> Self {
        let mut index = Self {
            cell_size,
            buckets: HashMap::new(),
            coords: graph.nodes.iter().map(|n| n.coord()).collect(),
        };
        for (id, c) in index.coords.iter().enumerate() {
            let cell = index.cell_of(c.lon, c.lat);
            index.buckets.entry(cell).or_default().push(id);
        }
        tracing::debug!(nodes = index.coords.len(), buckets = index.buckets.len(), "built spatial index");
        index
    }

    fn cell_of(&self, lon: f64, lat: f64) -> (i64, i64) {
        ((lon / self.cell_size).floor() as i64, (lat / self.cell_size).floor() as i64)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Closest node in the first non-empty ring of cells around `(lon, lat)`.
    ///
    /// Searches ring radii `0..=max(expand_max, 30)` and falls back to a full scan.
    /// `None` only when the index holds no nodes.
    pub fn nearest(&self, lon: f64, lat: f64, expand_max: usize) -> Option<usize> {
        if self.coords.is_empty() {
            return None;
        }
        let query = Coord::new(lon, lat);
        let (cx, cy) = self.cell_of(lon, lat);
        let max_radius = expand_max.max(MIN_RING_RADIUS) as i64;

        for r in 0..=max_radius {
            let mut candidates = Vec::new();
            for dx in -r..=r {
                for dy in -r..=r {
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    if let Some(ids) = self.buckets.get(&(cx + dx, cy + dy)) {
                        candidates.extend_from_slice(ids);
                    }
                }
            }
            if !candidates.is_empty() {
                return self.closest_of(&query, candidates.into_iter());
            }
        }

        self.closest_of(&query, 0..self.coords.len())
    }

    fn closest_of(&self, query: &Coord, ids: impl Iterator<Item = usize>) -> Option<usize> {
        let mut best: Option<(f64, usize)> = None;
        for id in ids {
            let d = query.planar_distance(&self.coords[id]);
            let better = match best {
                None => true,
                Some((bd, bid)) => d < bd || (d == bd && id < bid),
            };
            if better {
                best = Some((d, id));
            }
        }
        best.map(|(_, id)| id)
    }
}
