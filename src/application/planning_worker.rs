use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::task_channel::{spawn_task_channel, ProgressSink, TaskChannel};
use crate::domains::path_planning::{
    BBox, Coord, GridPathPlanner, GridPlanError, GridPlanRequest, PathPlanningEvent, PlanProgress,
    PlanStatus,
};
use crate::domains::DynLogger;

/// Requests queued ahead of the blocking pool before `submit` waits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Grid planning request as it arrives over the task boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub start_lon: f64,
    pub start_lat: f64,
    pub end_lon: f64,
    pub end_lat: f64,
    /// Polygons as rings of `[lon, lat]`.
    #[serde(default)]
    pub obstacles: Vec<Vec<Vec<[f64; 2]>>>,
    #[serde(default)]
    pub walls: Vec<[[f64; 2]; 2]>,
    #[serde(default)]
    pub bbox_nodes: Option<BBox>,
}

impl PlanRequest {
    pub fn new(start: Coord, end: Coord) -> Self {
        Self {
            start_lon: start.lon,
            start_lat: start.lat,
            end_lon: end.lon,
            end_lat: end.lat,
            obstacles: Vec::new(),
            walls: Vec::new(),
            bbox_nodes: None,
        }
    }

    pub fn to_grid_request(&self) -> GridPlanRequest {
        let pt = |p: &[f64; 2]| Coord::new(p[0], p[1]);
        GridPlanRequest {
            start: Coord::new(self.start_lon, self.start_lat),
            end: Coord::new(self.end_lon, self.end_lat),
            obstacles: self
                .obstacles
                .iter()
                .map(|poly| poly.iter().map(|ring| ring.iter().map(pt).collect()).collect())
                .collect(),
            walls: self.walls.iter().map(|[a, b]| [pt(a), pt(b)]).collect(),
            bbox_nodes: self.bbox_nodes,
        }
    }
}

/// `{ok: true, path, partial}` or `{ok: false, error: "<code>"}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PlanResponseWire", try_from = "PlanResponseWire")]
pub enum PlanResponse {
    Ok { path: Vec<Coord>, partial: bool },
    Err { error: GridPlanError },
}

impl PlanResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, PlanResponse::Ok { .. })
    }
}

#[derive(Serialize, Deserialize)]
struct PlanResponseWire {
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<Vec<Coord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<GridPlanError>,
}

impl From<PlanResponse> for PlanResponseWire {
    fn from(resp: PlanResponse) -> Self {
        match resp {
            PlanResponse::Ok { path, partial } => Self { ok: true, path: Some(path), partial: Some(partial), error: None },
            PlanResponse::Err { error } => Self { ok: false, path: None, partial: None, error: Some(error) },
        }
    }
}

impl TryFrom<PlanResponseWire> for PlanResponse {
    type Error = String;

    fn try_from(wire: PlanResponseWire) -> Result<Self, Self::Error> {
        match (wire.ok, wire.path, wire.error) {
            (true, Some(path), _) => Ok(PlanResponse::Ok { path, partial: wire.partial.unwrap_or(false) }),
            (false, _, Some(error)) => Ok(PlanResponse::Err { error }),
            (true, None, _) => Err("ok response without a path".to_string()),
            (false, _, None) => Err("error response without an error code".to_string()),
        }
    }
}

pub type PlanningChannel = TaskChannel<PlanRequest, PlanResponse, PlanProgress>;

/// Runs grid planning requests off the async runtime.
pub struct PlanningWorker {
    planner: GridPathPlanner,
    logger: DynLogger,
    events: Option<mpsc::Sender<PathPlanningEvent>>,
}

impl PlanningWorker {
    /// Start the worker and return its channel. `events`, when given, receives the
    /// lifecycle of every request; events are dropped if that receiver lags.
    pub fn spawn(
        planner: GridPathPlanner,
        logger: DynLogger,
        events: Option<mpsc::Sender<PathPlanningEvent>>,
    ) -> PlanningChannel {
        let worker = Arc::new(Self { planner, logger, events });
        spawn_task_channel(DEFAULT_QUEUE_CAPACITY, move |id, request, progress| {
            worker.handle(id, request, progress)
        })
    }

    fn publish(&self, event: PathPlanningEvent) {
        if let Some(events) = &self.events {
            let _ = events.try_send(event);
        }
    }

    fn handle(&self, id: Uuid, request: PlanRequest, progress: &ProgressSink<PlanProgress>) -> PlanResponse {
        let request_id = id.to_string();
        let grid_request = request.to_grid_request();
        self.publish(PathPlanningEvent::RouteRequested {
            request_id: request_id.clone(),
            start: grid_request.start,
            end: grid_request.end,
            timestamp: Utc::now(),
        });

        let mut on_progress = |p: PlanProgress| {
            if p == PlanProgress::ExtendingComputation {
                self.logger.info(&format!("Request {}: first grid failed, retrying coarser", request_id));
                self.publish(PathPlanningEvent::ComputationExtended {
                    request_id: request_id.clone(),
                    timestamp: Utc::now(),
                });
            }
            progress.emit(p);
        };

        match self.planner.plan_with_progress(&grid_request, &mut on_progress) {
            Ok(plan) => {
                let partial = plan.status == PlanStatus::Partial;
                if partial {
                    self.logger.warn(&format!(
                        "Request {}: iteration budget exhausted, returning partial path of {} points",
                        request_id,
                        plan.path.len()
                    ));
                } else {
                    self.logger.info(&format!(
                        "Request {}: planned {} points on {}x{} grid",
                        request_id,
                        plan.path.len(),
                        plan.cols,
                        plan.rows
                    ));
                }
                self.publish(PathPlanningEvent::RouteCompleted {
                    request_id,
                    waypoints: plan.path.len(),
                    partial,
                    timestamp: Utc::now(),
                });
                PlanResponse::Ok { path: plan.path, partial }
            }
            Err(error) => {
                self.logger.warn(&format!("Request {} failed: {}", request_id, error.code()));
                self.publish(PathPlanningEvent::RouteFailed {
                    request_id,
                    reason: error.code().to_string(),
                    timestamp: Utc::now(),
                });
                PlanResponse::Err { error }
            }
        }
    }
}
