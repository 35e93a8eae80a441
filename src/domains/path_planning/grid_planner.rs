//! Occupancy-grid fallback planner.
//!
//! Each query lays a fresh lattice over the padded span of its endpoints,
//! blocks cells covered by obstacles or hugging walls, links free cells to
//! their 8 neighbours when the straight hop is clear, and runs a bounded A*.
//! A failed first attempt is retried once on a wider, coarser grid.
//!
//! A* that runs out of iterations returns the explored cell closest to the goal
//! as a [`PlanStatus::Partial`] plan. Callers must check the status: a partial
//! path ends short of the goal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{
    bbox_intersects, point_in_polygon, point_segment_distance, segment_intersects_polygon,
    segments_intersect, BBox, Coord, ObstaclePolygon, WallSegment,
};
use super::pathfinder::turn_angle;
use super::priority_queue::IndexedPriorityQueue;
use crate::common::{DomainError, DomainResult};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GridPlanError {
    #[error("start or end coordinate is not finite")]
    InvalidCoordinates,

    #[error("start and end are both unset (0, 0)")]
    ZeroCoordinates,

    #[error("no free grid cell near start or end")]
    NearbyGridFail,

    #[error("no path between start and end")]
    NoPath,
}

impl GridPlanError {
    pub fn code(&self) -> &'static str {
        match self {
            GridPlanError::InvalidCoordinates => "invalid-coordinates",
            GridPlanError::ZeroCoordinates => "zero-coordinates",
            GridPlanError::NearbyGridFail => "nearby-grid-fail",
            GridPlanError::NoPath => "no-path",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Complete,
    /// Iteration budget ran out; the path stops at the closest explored cell.
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanProgress {
    /// The first grid failed and a coarser one is being built.
    ExtendingComputation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridPlannerConfig {
    /// Padding added on each side, as a fraction of the endpoint span. Default: 0.3
    pub padding_ratio: f64,
    /// Smallest span (degrees) used for sizing, so coincident endpoints still get a grid. Default: 0.0005
    pub min_span_deg: f64,
    /// Target cell size along the diagonal, in degrees. Default: 0.00005
    pub base_cell_deg: f64,
    pub min_cols: usize,
    pub max_cols: usize,
    pub min_rows: usize,
    pub max_rows: usize,
    /// Cells closer than this × the smaller cell side to a wall are blocked. Default: 0.3
    pub wall_clearance_factor: f64,
    /// Iteration budget as a multiple of the cell count. Default: 2.0
    pub max_iterations_factor: f64,
    /// Interior points with |cos(turn)| at or above this are pruned. Default: 0.995
    pub collinear_cos: f64,
    /// Padding multiplier for the retry grid. Default: 1.5
    pub retry_padding_factor: f64,
    /// Cell size multiplier for the retry grid. Default: 2.0
    pub retry_cell_factor: f64,
    /// Search iterations between yield checkpoints. Default: 1000
    pub yield_every: usize,
}

impl Default for GridPlannerConfig {
    fn default() -> Self {
        Self {
            padding_ratio: 0.3,
            min_span_deg: 0.0005,
            base_cell_deg: 0.00005,
            min_cols: 40,
            max_cols: 200,
            min_rows: 30,
            max_rows: 200,
            wall_clearance_factor: 0.3,
            max_iterations_factor: 2.0,
            collinear_cos: 0.995,
            retry_padding_factor: 1.5,
            retry_cell_factor: 2.0,
            yield_every: 1000,
        }
    }
}

impl GridPlannerConfig {
    pub fn validate(&self) -> DomainResult<()> {
        let invalid = |reason: String| Err(DomainError::InvalidCommand { reason });
        if self.min_cols == 0 || self.min_cols > self.max_cols {
            return invalid(format!("column range {}..{} is empty", self.min_cols, self.max_cols));
        }
        if self.min_rows == 0 || self.min_rows > self.max_rows {
            return invalid(format!("row range {}..{} is empty", self.min_rows, self.max_rows));
        }
        for (name, value) in [
            ("padding_ratio", self.padding_ratio),
            ("min_span_deg", self.min_span_deg),
            ("base_cell_deg", self.base_cell_deg),
            ("max_iterations_factor", self.max_iterations_factor),
            ("retry_padding_factor", self.retry_padding_factor),
            ("retry_cell_factor", self.retry_cell_factor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }
        if !(0.0..=1.0).contains(&self.collinear_cos) {
            return invalid(format!("collinear_cos must lie in [0, 1], got {}", self.collinear_cos));
        }
        if self.yield_every == 0 {
            return invalid("yield_every must be at least 1".to_string());
        }
        Ok(())
    }
}

/// One grid planning query.
///
/// A start and end of exactly `(0, 0)` both together mean "unset" and are rejected;
/// a single endpoint at `(0, 0)` is planned normally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPlanRequest {
    pub start: Coord,
    pub end: Coord,
    pub obstacles: Vec<ObstaclePolygon>,
    pub walls: Vec<WallSegment>,
    /// Extent of the surrounding network; used for bounds when an endpoint is not finite.
    pub bbox_nodes: Option<BBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    pub path: Vec<Coord>,
    pub status: PlanStatus,
    /// The plan came from the retry grid.
    pub coarsened: bool,
    pub cols: usize,
    pub rows: usize,
    pub iterations: usize,
}

/// Query-scoped lattice of cell centers.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    pub bbox: BBox,
    pub cols: usize,
    pub rows: usize,
    pub cell_w: f64,
    pub cell_h: f64,
    pub blocked: Vec<bool>,
    pub adjacency: Vec<Vec<(usize, f64)>>,
}

/// Prepared obstacle with its bounding box for cheap rejection.
struct BoxedObstacle<'a> {
    rings: &'a ObstaclePolygon,
    bbox: BBox,
}

/// Neighbour offsets whose mirror images complete the 8-neighbourhood.
const FORWARD_NEIGHBOURS: [(i64, i64); 4] = [(1, 0), (-1, 1), (0, 1), (1, 1)];

impl OccupancyGrid {
    pub fn build(bbox: BBox, cols: usize, rows: usize, obstacles: &[ObstaclePolygon], walls: &[WallSegment], wall_clearance_factor: f64) -> Self {
        let cell_w = bbox.width() / cols as f64;
        let cell_h = bbox.height() / rows as f64;
        let mut grid = Self {
            bbox,
            cols,
            rows,
            cell_w,
            cell_h,
            blocked: vec![false; cols * rows],
            adjacency: vec![Vec::new(); cols * rows],
        };

        let obstacles: Vec<BoxedObstacle> = obstacles
            .iter()
            .map(|rings| BoxedObstacle { rings, bbox: BBox::of_rings(rings) })
            .filter(|o| bbox_intersects(&o.bbox, &bbox))
            .collect();
        let clearance = wall_clearance_factor * cell_w.min(cell_h);
        let walls: Vec<(&WallSegment, BBox)> = walls
            .iter()
            .map(|w| {
                let mut b = BBox::of_segment(&w[0], &w[1]);
                b.min_lon -= clearance;
                b.min_lat -= clearance;
                b.max_lon += clearance;
                b.max_lat += clearance;
                (w, b)
            })
            .filter(|(_, b)| bbox_intersects(b, &bbox))
            .collect();

        for idx in 0..grid.node_count() {
            let c = grid.cell_center(idx);
            let in_obstacle = obstacles
                .iter()
                .any(|o| o.bbox.contains(&c) && point_in_polygon(&c, o.rings));
            let near_wall = walls
                .iter()
                .any(|(w, b)| b.contains(&c) && point_segment_distance(&c, &w[0], &w[1]) < clearance);
            grid.blocked[idx] = in_obstacle || near_wall;
        }

        for row in 0..rows {
            for col in 0..cols {
                let a = grid.index(col, row);
                if grid.blocked[a] {
                    continue;
                }
                for (dc, dr) in FORWARD_NEIGHBOURS {
                    let (nc, nr) = (col as i64 + dc, row as i64 + dr);
                    if nc < 0 || nr < 0 || nc >= cols as i64 || nr >= rows as i64 {
                        continue;
                    }
                    let b = grid.index(nc as usize, nr as usize);
                    if grid.blocked[b] {
                        continue;
                    }
                    let (ca, cb) = (grid.cell_center(a), grid.cell_center(b));
                    let seg_box = BBox::of_segment(&ca, &cb);
                    let hits_obstacle = obstacles
                        .iter()
                        .any(|o| segment_intersects_polygon(&ca, &cb, o.rings, &o.bbox));
                    let hits_wall = walls.iter().any(|(w, wb)| {
                        bbox_intersects(&seg_box, wb) && segments_intersect(&ca, &cb, &w[0], &w[1])
                    });
                    if hits_obstacle || hits_wall {
                        continue;
                    }
                    let weight = ca.planar_distance(&cb);
                    grid.adjacency[a].push((b, weight));
                    grid.adjacency[b].push((a, weight));
                }
            }
        }
        grid
    }

    pub fn node_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    pub fn cell_center(&self, idx: usize) -> Coord {
        let (col, row) = (idx % self.cols, idx / self.cols);
        Coord::new(
            self.bbox.min_lon + (col as f64 + 0.5) * self.cell_w,
            self.bbox.min_lat + (row as f64 + 0.5) * self.cell_h,
        )
    }

    /// Cell containing `c`, clamped onto the grid.
    pub fn cell_of(&self, c: &Coord) -> (usize, usize) {
        let col = ((c.lon - self.bbox.min_lon) / self.cell_w).floor();
        let row = ((c.lat - self.bbox.min_lat) / self.cell_h).floor();
        (
            col.clamp(0.0, (self.cols - 1) as f64) as usize,
            row.clamp(0.0, (self.rows - 1) as f64) as usize,
        )
    }

    /// A free cell with no neighbours cannot start or end a search.
    fn is_connected(&self, idx: usize) -> bool {
        !self.blocked[idx] && !self.adjacency[idx].is_empty()
    }

    fn closest_connected<I: Iterator<Item = usize>>(&self, c: &Coord, cells: I) -> Option<usize> {
        let mut best: Option<(f64, usize)> = None;
        for idx in cells.filter(|&i| self.is_connected(i)) {
            let d = c.planar_distance(&self.cell_center(idx));
            if best.map_or(true, |(bd, _)| d < bd) {
                best = Some((d, idx));
            }
        }
        best.map(|(_, idx)| idx)
    }

    /// Closest connected cell to `c`: a small window around its cell first, then the whole grid.
    pub fn nearest_free_grid_index(&self, c: &Coord) -> Option<usize> {
        let (col, row) = self.cell_of(c);
        let radius = 5.min(((self.node_count() as f64).sqrt() / 2.0) as usize);
        let (c0, c1) = (col.saturating_sub(radius), (col + radius).min(self.cols - 1));
        let (r0, r1) = (row.saturating_sub(radius), (row + radius).min(self.rows - 1));
        let window = (r0..=r1).flat_map(|r| (c0..=c1).map(move |cc| r * self.cols + cc));
        self.closest_connected(c, window)
            .or_else(|| self.closest_connected(c, 0..self.node_count()))
    }

    /// Any cell that has at least one neighbour, scanning in index order.
    pub fn find_any_valid_node(&self) -> Option<usize> {
        (0..self.node_count()).find(|&i| !self.adjacency[i].is_empty())
    }

    /// Nearest connected cell, otherwise any connected cell.
    fn locate(&self, c: &Coord) -> Option<usize> {
        self.nearest_free_grid_index(c).or_else(|| self.find_any_valid_node())
    }
}

struct SearchOutcome {
    cells: Vec<usize>,
    status: PlanStatus,
    iterations: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GridPathPlanner {
    config: GridPlannerConfig,
}

impl GridPathPlanner {
    pub fn new(config: GridPlannerConfig) -> DomainResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GridPlannerConfig {
        &self.config
    }

    pub fn plan(&self, request: &GridPlanRequest) -> Result<GridPlan, GridPlanError> {
        self.plan_with_progress(request, &mut |_| {})
    }

    /// Plan, reporting [`PlanProgress`] before a retry grid is built.
    pub fn plan_with_progress(
        &self,
        request: &GridPlanRequest,
        on_progress: &mut dyn FnMut(PlanProgress),
    ) -> Result<GridPlan, GridPlanError> {
        let (start, end) = (request.start, request.end);
        if !start.is_finite() || !end.is_finite() {
            return Err(GridPlanError::InvalidCoordinates);
        }
        if start == Coord::new(0.0, 0.0) && end == Coord::new(0.0, 0.0) {
            return Err(GridPlanError::ZeroCoordinates);
        }

        let first = self.attempt(request, self.config.padding_ratio, self.config.base_cell_deg, false);
        match first {
            Ok(Some(plan)) => return Ok(plan),
            Ok(None) => tracing::info!("grid search found no path, retrying on a coarser grid"),
            Err(e) => tracing::info!(error = e.code(), "grid endpoints not located, retrying on a coarser grid"),
        }

        on_progress(PlanProgress::ExtendingComputation);
        let padding = self.config.padding_ratio * self.config.retry_padding_factor;
        let cell = self.config.base_cell_deg * self.config.retry_cell_factor;
        match self.attempt(request, padding, cell, true)? {
            Some(plan) => Ok(plan),
            None => {
                tracing::warn!(?start, ?end, "grid planner exhausted both grids");
                Err(GridPlanError::NoPath)
            }
        }
    }

    fn bounds(&self, request: &GridPlanRequest, padding: f64) -> Option<BBox> {
        let (s, e) = (request.start, request.end);
        if !s.is_finite() || !e.is_finite() {
            return request.bbox_nodes.filter(BBox::is_valid);
        }
        let w = (s.lon - e.lon).abs().max(self.config.min_span_deg);
        let h = (s.lat - e.lat).abs().max(self.config.min_span_deg);
        let (cx, cy) = ((s.lon + e.lon) / 2.0, (s.lat + e.lat) / 2.0);
        let (half_w, half_h) = (w / 2.0 + w * padding, h / 2.0 + h * padding);
        Some(BBox {
            min_lon: cx - half_w,
            min_lat: cy - half_h,
            max_lon: cx + half_w,
            max_lat: cy + half_h,
        })
    }

    fn dimensions(&self, bbox: &BBox, cell_deg: f64) -> (usize, usize) {
        let (w, h) = (bbox.width(), bbox.height());
        let cols = ((w.hypot(h) / cell_deg).round() as usize).clamp(self.config.min_cols, self.config.max_cols);
        let rows = ((cols as f64 * h / w).round() as usize).clamp(self.config.min_rows, self.config.max_rows);
        (cols, rows)
    }

    fn attempt(
        &self,
        request: &GridPlanRequest,
        padding: f64,
        cell_deg: f64,
        coarsened: bool,
    ) -> Result<Option<GridPlan>, GridPlanError> {
        let bbox = self.bounds(request, padding).ok_or(GridPlanError::InvalidCoordinates)?;
        let (cols, rows) = self.dimensions(&bbox, cell_deg);
        let grid = OccupancyGrid::build(bbox, cols, rows, &request.obstacles, &request.walls, self.config.wall_clearance_factor);
        tracing::debug!(
            cols,
            rows,
            blocked = grid.blocked.iter().filter(|b| **b).count(),
            coarsened,
            "built occupancy grid"
        );

        let start = grid.locate(&request.start).ok_or(GridPlanError::NearbyGridFail)?;
        let goal = grid.locate(&request.end).ok_or(GridPlanError::NearbyGridFail)?;

        let Some(outcome) = self.search(&grid, start, goal) else {
            return Ok(None);
        };
        let mut path: Vec<Coord> = outcome.cells.iter().map(|&i| grid.cell_center(i)).collect();
        path = prune_collinear(&path, self.config.collinear_cos);
        pin_endpoints(&mut path, request.start, request.end, outcome.status);

        tracing::debug!(points = path.len(), iterations = outcome.iterations, status = ?outcome.status, "grid plan ready");
        Ok(Some(GridPlan {
            path,
            status: outcome.status,
            coarsened,
            cols,
            rows,
            iterations: outcome.iterations,
        }))
    }

    /// Bounded A* with a squared-distance heuristic.
    fn search(&self, grid: &OccupancyGrid, start: usize, goal: usize) -> Option<SearchOutcome> {
        let n = grid.node_count();
        let max_iterations = ((n as f64) * self.config.max_iterations_factor).ceil() as usize;
        let goal_center = grid.cell_center(goal);
        let h = |idx: usize| {
            let c = grid.cell_center(idx);
            let (dx, dy) = (c.lon - goal_center.lon, c.lat - goal_center.lat);
            dx * dx + dy * dy
        };

        let mut g = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open = IndexedPriorityQueue::new();
        g[start] = 0.0;
        open.push_or_decrease(start, h(start));

        let mut best = (h(start), start);
        let mut iterations = 0usize;

        while let Some((current, _)) = open.pop() {
            if current == goal {
                return Some(SearchOutcome {
                    cells: walk_back(&prev, goal),
                    status: PlanStatus::Complete,
                    iterations,
                });
            }
            iterations += 1;
            if iterations % self.config.yield_every == 0 {
                // checkpoint only; the search never suspends here
                tracing::debug!(iterations, open = open.len(), "grid search checkpoint");
            }
            if iterations > max_iterations {
                if best.1 == start {
                    return None;
                }
                tracing::warn!(iterations, "grid search hit its iteration cap; returning a partial path");
                return Some(SearchOutcome {
                    cells: walk_back(&prev, best.1),
                    status: PlanStatus::Partial,
                    iterations,
                });
            }
            closed[current] = true;
            let hc = h(current);
            if hc < best.0 {
                best = (hc, current);
            }

            for &(next, w) in &grid.adjacency[current] {
                if closed[next] {
                    continue;
                }
                let tentative = g[current] + w;
                if tentative < g[next] {
                    g[next] = tentative;
                    prev[next] = Some(current);
                    open.push_or_decrease(next, tentative + h(next));
                }
            }
        }
        None
    }
}

fn walk_back(prev: &[Option<usize>], to: usize) -> Vec<usize> {
    let mut cells = vec![to];
    let mut cursor = to;
    while let Some(p) = prev[cursor] {
        cells.push(p);
        cursor = p;
    }
    cells.reverse();
    cells
}

/// Keep an interior point only where the path actually bends.
pub fn prune_collinear(path: &[Coord], collinear_cos: f64) -> Vec<Coord> {
    if path.len() < 3 {
        return path.to_vec();
    }
    let mut out = Vec::with_capacity(path.len());
    out.push(path[0]);
    for w in path.windows(3) {
        if turn_angle(&w[0], &w[1], &w[2]).cos().abs() < collinear_cos {
            out.push(w[1]);
        }
    }
    out.push(path[path.len() - 1]);
    out
}

/// Replace the snapped cell centers at the ends with the exact query points.
/// A partial path keeps its last cell, since it never reached `end`.
fn pin_endpoints(path: &mut Vec<Coord>, start: Coord, end: Coord, status: PlanStatus) {
    if path.len() == 1 {
        path.push(path[0]);
    }
    if let Some(first) = path.first_mut() {
        *first = start;
    }
    if status == PlanStatus::Complete {
        if let Some(last) = path.last_mut() {
            *last = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> ObstaclePolygon {
        vec![vec![
            Coord::new(min_lon, min_lat),
            Coord::new(min_lon, max_lat),
            Coord::new(max_lon, max_lat),
            Coord::new(max_lon, min_lat),
            Coord::new(min_lon, min_lat),
        ]]
    }

    fn request(obstacles: Vec<ObstaclePolygon>, walls: Vec<WallSegment>) -> GridPlanRequest {
        GridPlanRequest {
            start: Coord::new(13.400, 52.500),
            end: Coord::new(13.404, 52.500),
            obstacles,
            walls,
            bbox_nodes: None,
        }
    }

    #[test]
    fn test_routes_around_block() {
        let obstacle = rect(13.4015, 52.4998, 13.4025, 52.5002);
        let planner = GridPathPlanner::default();
        let plan = planner.plan(&request(vec![obstacle.clone()], Vec::new())).unwrap();

        assert_eq!(plan.status, PlanStatus::Complete);
        assert!(!plan.coarsened);
        assert_eq!(plan.path.first(), Some(&Coord::new(13.400, 52.500)));
        assert_eq!(plan.path.last(), Some(&Coord::new(13.404, 52.500)));
        for p in &plan.path {
            assert!(!point_in_polygon(p, &obstacle), "{:?} lies in the obstacle", p);
        }
    }

    #[test]
    fn test_identical_inputs_identical_paths() {
        let planner = GridPathPlanner::default();
        let req = request(vec![rect(13.4015, 52.4998, 13.4025, 52.5002)], Vec::new());
        let a = planner.plan(&req).unwrap();
        let b = planner.plan(&req).unwrap();
        assert_eq!(serde_json::to_vec(&a.path).unwrap(), serde_json::to_vec(&b.path).unwrap());
    }

    #[test]
    fn test_open_ground_prunes_to_straight_line() {
        let plan = GridPathPlanner::default().plan(&request(Vec::new(), Vec::new())).unwrap();
        assert_eq!(plan.path.len(), 2);
    }

    #[test]
    fn test_sentinel_and_non_finite_rejected() {
        let planner = GridPathPlanner::default();
        let mut req = request(Vec::new(), Vec::new());
        req.start = Coord::new(0.0, 0.0);
        req.end = Coord::new(0.0, 0.0);
        assert_eq!(planner.plan(&req).unwrap_err(), GridPlanError::ZeroCoordinates);

        req.end = Coord::new(f64::NAN, 1.0);
        assert_eq!(planner.plan(&req).unwrap_err().code(), "invalid-coordinates");
    }

    #[test]
    fn test_full_wall_means_no_path_after_retry() {
        let wall = [Coord::new(13.402, 50.0), Coord::new(13.402, 55.0)];
        let mut events = Vec::new();
        let err = GridPathPlanner::default()
            .plan_with_progress(&request(Vec::new(), vec![wall]), &mut |p| events.push(p))
            .unwrap_err();
        assert_eq!(err, GridPlanError::NoPath);
        assert_eq!(events, vec![PlanProgress::ExtendingComputation]);
    }

    #[test]
    fn test_everything_blocked_is_nearby_grid_fail() {
        let everything = rect(13.0, 52.0, 14.0, 53.0);
        let err = GridPathPlanner::default().plan(&request(vec![everything], Vec::new())).unwrap_err();
        assert_eq!(err, GridPlanError::NearbyGridFail);
    }

    #[test]
    fn test_iteration_cap_yields_partial_path() {
        let config = GridPlannerConfig { max_iterations_factor: 0.01, ..GridPlannerConfig::default() };
        let planner = GridPathPlanner::new(config).unwrap();
        let req = request(Vec::new(), Vec::new());
        let plan = planner.plan(&req).unwrap();
        assert_eq!(plan.status, PlanStatus::Partial);
        assert_eq!(plan.path[0], req.start);
        assert_ne!(plan.path.last(), Some(&req.end));
    }

    #[test]
    fn test_wall_blocks_adjacent_cells() {
        let bbox = BBox { min_lon: 0.0, min_lat: 0.0, max_lon: 1.0, max_lat: 1.0 };
        let wall = [Coord::new(0.5, 0.0), Coord::new(0.5, 1.0)];
        let grid = OccupancyGrid::build(bbox, 10, 10, &[], &[wall], 0.3);
        // centers sit 0.05 from the wall; clearance is 0.03
        assert!(grid.blocked.iter().all(|b| !b));
        let left = grid.index(4, 5);
        let right = grid.index(5, 5);
        assert!(grid.adjacency[left].iter().all(|(to, _)| *to != right));
    }

    #[test]
    fn test_horizontal_query_height_uses_span_floor() {
        let planner = GridPathPlanner::default();
        let bbox = planner.bounds(&request(Vec::new(), Vec::new()), 0.3).unwrap();
        // 0.0005 floor padded by 0.3 on each side
        assert!((bbox.height() - 0.0008).abs() < 1e-12);
        assert!((bbox.width() - 0.004 * 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_cell_within_wall_clearance_is_blocked() {
        let bbox = BBox { min_lon: 0.0, min_lat: 0.0, max_lon: 1.0, max_lat: 1.0 };
        let wall = [Coord::new(0.47, 0.0), Coord::new(0.47, 1.0)];
        let grid = OccupancyGrid::build(bbox, 10, 10, &[], &[wall], 0.3);
        // clearance is 0.03; (4,5) sits 0.02 from the wall
        assert!(grid.blocked[grid.index(4, 5)]);
        assert!(!grid.blocked[grid.index(3, 5)]);
        assert!(!grid.blocked[grid.index(5, 5)]);
    }

    fn unit_grid(size: usize, extent: f64, obstacles: &[ObstaclePolygon], walls: &[WallSegment]) -> OccupancyGrid {
        let bbox = BBox { min_lon: 0.0, min_lat: 0.0, max_lon: extent, max_lat: extent };
        OccupancyGrid::build(bbox, size, size, obstacles, walls, 0.3)
    }

    #[test]
    fn test_locate_prefers_window_cell() {
        let grid = unit_grid(10, 1.0, &[], &[]);
        assert_eq!(grid.locate(&Coord::new(0.33, 0.47)), Some(grid.index(3, 4)));
    }

    #[test]
    fn test_locate_scans_whole_grid_when_window_is_blocked() {
        // 20x20 cells of 0.1; the 6x6 window around (0,0) is covered
        let grid = unit_grid(20, 2.0, &[rect(-0.1, -0.1, 0.6, 0.6)], &[]);
        assert!(grid.blocked[grid.index(5, 5)]);
        assert_eq!(grid.locate(&Coord::new(0.05, 0.05)), Some(grid.index(6, 0)));
    }

    #[test]
    fn test_locate_skips_isolated_free_cell() {
        let boxed = |a: (f64, f64), b: (f64, f64)| [Coord::new(a.0, a.1), Coord::new(b.0, b.1)];
        let walls = vec![
            boxed((0.21, 0.315), (0.29, 0.315)),
            boxed((0.29, 0.315), (0.29, 0.385)),
            boxed((0.29, 0.385), (0.21, 0.385)),
            boxed((0.21, 0.385), (0.21, 0.315)),
        ];
        let grid = unit_grid(10, 1.0, &[rect(0.2, 0.2, 0.3, 0.3)], &walls);
        let pocket = grid.index(2, 3);
        assert!(grid.blocked[grid.index(2, 2)]);
        assert!(!grid.blocked[pocket]);
        assert!(grid.adjacency[pocket].is_empty());

        // the pocket is closest, but the start goes to the nearest connected neighbour
        let start = grid.locate(&Coord::new(0.25, 0.29));
        assert_eq!(start, Some(grid.index(1, 2)));
        assert_ne!(start, grid.find_any_valid_node());
    }

    #[test]
    fn test_locate_fails_when_no_cell_is_connected() {
        let mut walls = Vec::new();
        for i in 1..10 {
            let v = i as f64 / 10.0;
            walls.push([Coord::new(v, 0.0), Coord::new(v, 1.0)]);
            walls.push([Coord::new(0.0, v), Coord::new(1.0, v)]);
        }
        let grid = unit_grid(10, 1.0, &[], &walls);
        assert!(grid.blocked.iter().all(|b| !b));
        assert_eq!(grid.find_any_valid_node(), None);
        assert_eq!(grid.locate(&Coord::new(0.5, 0.5)), None);
    }

    #[test]
    fn test_any_valid_node_scans_in_index_order() {
        let grid = unit_grid(10, 1.0, &[rect(-0.1, -0.1, 0.3, 1.1)], &[]);
        assert_eq!(grid.find_any_valid_node(), Some(grid.index(3, 0)));
    }

    #[test]
    fn test_prune_keeps_corners() {
        let path = vec![
            Coord::new(0.0, 0.0),
            Coord::new(1.0, 0.0),
            Coord::new(2.0, 0.0),
            Coord::new(2.0, 1.0),
        ];
        let pruned = prune_collinear(&path, 0.995);
        assert_eq!(pruned, vec![Coord::new(0.0, 0.0), Coord::new(2.0, 0.0), Coord::new(2.0, 1.0)]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GridPlannerConfig { min_cols: 300, ..GridPlannerConfig::default() };
        assert!(GridPathPlanner::new(config).is_err());
    }
}
