use thiserror::Error;

use crate::domains::path_planning::grid_planner::GridPlanError;
use crate::domains::path_planning::snapping::SnapError;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),

    #[error("GeoJSON error: {0}")]
    Geojson(String),

    #[error("Snap failed: {0}")]
    Snap(#[from] SnapError),

    #[error("Grid planning failed: {0}")]
    Grid(#[from] GridPlanError),

    #[error("Request {id} timed out")]
    Timeout { id: String },
}

impl DomainError {
    /// Stable machine-readable code for routing failures; `None` for infrastructure errors.
    pub fn route_code(&self) -> Option<&'static str> {
        match self {
            DomainError::Snap(e) => Some(e.code()),
            DomainError::Grid(e) => Some(e.code()),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Task channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
