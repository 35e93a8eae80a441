use crate::common::DomainEvent;
use crate::domains::path_planning::geometry::Coord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one planning request on the task channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PathPlanningEvent {
    RouteRequested {
        request_id: String,
        start: Coord,
        end: Coord,
        timestamp: DateTime<Utc>,
    },
    ComputationExtended {
        request_id: String,
        timestamp: DateTime<Utc>,
    },
    RouteCompleted {
        request_id: String,
        waypoints: usize,
        partial: bool,
        timestamp: DateTime<Utc>,
    },
    RouteFailed {
        request_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent for PathPlanningEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PathPlanningEvent::RouteRequested { .. } => "RouteRequested",
            PathPlanningEvent::ComputationExtended { .. } => "ComputationExtended",
            PathPlanningEvent::RouteCompleted { .. } => "RouteCompleted",
            PathPlanningEvent::RouteFailed { .. } => "RouteFailed",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            PathPlanningEvent::RouteRequested { request_id, .. } => request_id,
            PathPlanningEvent::ComputationExtended { request_id, .. } => request_id,
            PathPlanningEvent::RouteCompleted { request_id, .. } => request_id,
            PathPlanningEvent::RouteFailed { request_id, .. } => request_id,
        }
    }

    fn event_version(&self) -> u64 { 1 }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PathPlanningEvent::RouteRequested { timestamp, .. } => *timestamp,
            PathPlanningEvent::ComputationExtended { timestamp, .. } => *timestamp,
            PathPlanningEvent::RouteCompleted { timestamp, .. } => *timestamp,
            PathPlanningEvent::RouteFailed { timestamp, .. } => *timestamp,
        }
    }
}
