use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::geometry::{haversine_m, Coord};
use super::graph::Graph;
use super::priority_queue::IndexedPriorityQueue;
use crate::common::{DomainError, DomainResult};

/// Placeholder predecessor for search states that carry no heading.
const NO_PREV: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    Shortest,
    FewestTurns,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostStrategy {
    /// Edge cost is the edge weight.
    Shortest,
    /// Edge weight plus `turn_penalty × angle` (radians) for turns sharper than `min_turn_angle`.
    FewestTurns { turn_penalty: f64, min_turn_angle: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Meters of extra cost per radian of turning. Default: 50.0
    pub turn_penalty: f64,
    /// Turns below this angle are free. Default: 15.0
    pub min_turn_angle_deg: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            turn_penalty: 50.0,
            min_turn_angle_deg: 15.0,
        }
    }
}

impl PathfinderConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if !(self.turn_penalty.is_finite() && self.turn_penalty >= 0.0) {
            return Err(DomainError::InvalidCommand {
                reason: format!("turn penalty must be non-negative, got {}", self.turn_penalty),
            });
        }
        if !(0.0..=180.0).contains(&self.min_turn_angle_deg) {
            return Err(DomainError::InvalidCommand {
                reason: format!("min turn angle must lie in [0, 180], got {}", self.min_turn_angle_deg),
            });
        }
        Ok(())
    }

    pub fn cost_strategy(&self, strategy: RouteStrategy) -> CostStrategy {
        match strategy {
            RouteStrategy::Shortest => CostStrategy::Shortest,
            RouteStrategy::FewestTurns => CostStrategy::FewestTurns {
                turn_penalty: self.turn_penalty,
                min_turn_angle: self.min_turn_angle_deg.to_radians(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<usize>,
    pub coords: Vec<Coord>,
    /// Sum of edge weights in meters; infinite when no route exists.
    pub length: f64,
}

impl PathResult {
    pub fn none() -> Self {
        Self {
            path: Vec::new(),
            coords: Vec::new(),
            length: f64::INFINITY,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.path.is_empty() && self.length.is_finite()
    }

    fn from_nodes(graph: &Graph, path: Vec<usize>) -> Self {
        let length = path
            .windows(2)
            .map(|w| graph.edge_weight(w[0], w[1]).unwrap_or(f64::INFINITY))
            .sum();
        let coords = path.iter().map(|&id| graph.coord(id)).collect();
        Self { path, coords, length }
    }
}

/// Heading change in radians at `b` for the polyline `a → b → c`.
pub fn turn_angle(a: &Coord, b: &Coord, c: &Coord) -> f64 {
    let (x1, y1) = (b.lon - a.lon, b.lat - a.lat);
    let (x2, y2) = (c.lon - b.lon, c.lat - b.lat);
    let norm = x1.hypot(y1) * x2.hypot(y2);
    if norm == 0.0 {
        return 0.0;
    }
    ((x1 * x2 + y1 * y2) / norm).clamp(-1.0, 1.0).acos()
}

/// Number of interior vertices turning by more than `min_angle` radians.
pub fn count_turns(coords: &[Coord], min_angle: f64) -> usize {
    coords
        .windows(3)
        .filter(|w| turn_angle(&w[0], &w[1], &w[2]) > min_angle)
        .count()
}

fn valid_endpoints(graph: &Graph, start: usize, goal: usize) -> bool {
    start < graph.node_count() && goal < graph.node_count()
}

/// A* with the great-circle distance as heuristic.
///
/// Under [`CostStrategy::FewestTurns`] the search state is the pair
/// `(node, predecessor)` so the turn cost of the next edge is known.
pub fn astar(graph: &Graph, start: usize, goal: usize, strategy: CostStrategy) -> PathResult {
    if !valid_endpoints(graph, start, goal) {
        return PathResult::none();
    }
    if start == goal {
        return PathResult::from_nodes(graph, vec![start]);
    }

    let turn_aware = matches!(strategy, CostStrategy::FewestTurns { .. });
    let goal_coord = graph.coord(goal);
    let h = |id: usize| haversine_m(&graph.coord(id), &goal_coord);

    let start_state = (start, NO_PREV);
    let mut open = IndexedPriorityQueue::new();
    let mut g_score: HashMap<(usize, usize), f64> = HashMap::new();
    let mut came_from: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    let mut closed: HashSet<(usize, usize)> = HashSet::new();

    g_score.insert(start_state, 0.0);
    open.push_or_decrease(start_state, h(start));

    while let Some((state, _)) = open.pop() {
        let (current, prev) = state;
        if current == goal {
            let mut path = vec![current];
            let mut cursor = state;
            while let Some(&parent) = came_from.get(&cursor) {
                path.push(parent.0);
                cursor = parent;
            }
            path.reverse();
            return PathResult::from_nodes(graph, path);
        }
        if !closed.insert(state) {
            continue;
        }
        let g_current = g_score[&state];

        for edge in &graph.adjacency[current] {
            let mut cost = edge.weight;
            if let CostStrategy::FewestTurns { turn_penalty, min_turn_angle } = strategy {
                if prev != NO_PREV {
                    let angle = turn_angle(&graph.coord(prev), &graph.coord(current), &graph.coord(edge.to));
                    if angle > min_turn_angle {
                        cost += turn_penalty * angle;
                    }
                }
            }
            let next = (edge.to, if turn_aware { current } else { NO_PREV });
            if closed.contains(&next) {
                continue;
            }
            let tentative = g_current + cost;
            if tentative < *g_score.get(&next).unwrap_or(&f64::INFINITY) {
                g_score.insert(next, tentative);
                came_from.insert(next, state);
                open.push_or_decrease(next, tentative + h(edge.to));
            }
        }
    }

    PathResult::none()
}

/// Uniform-cost search over edge weights; the reference answer for [`astar`].
pub fn dijkstra(graph: &Graph, start: usize, goal: usize) -> PathResult {
    if !valid_endpoints(graph, start, goal) {
        return PathResult::none();
    }
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut open = IndexedPriorityQueue::with_capacity(n);

    dist[start] = 0.0;
    open.push_or_decrease(start, 0.0);

    while let Some((u, d)) = open.pop() {
        if u == goal {
            break;
        }
        for edge in &graph.adjacency[u] {
            let nd = d + edge.weight;
            if nd < dist[edge.to] {
                dist[edge.to] = nd;
                prev[edge.to] = Some(u);
                open.push_or_decrease(edge.to, nd);
            }
        }
    }

    if !dist[goal].is_finite() {
        return PathResult::none();
    }
    let mut path = vec![goal];
    let mut cursor = goal;
    while let Some(p) = prev[cursor] {
        path.push(p);
        cursor = p;
    }
    path.reverse();
    PathResult::from_nodes(graph, path)
}
