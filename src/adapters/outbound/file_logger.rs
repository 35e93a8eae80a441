use crate::domains::logger::{DomainLogger, FileLogger};
use std::sync::Arc;

/// Install `fast_log` at `path` and return a logger tagged with `component`.
/// With `console` unset nothing is written to stdout.
pub fn init_file_logger(path: &str, level: &str, component: &str, console: bool) -> Result<Arc<dyn DomainLogger>, String> {
    FileLogger::init(path, level, console).map_err(|e| format!("Failed to initialize fast_log at {}: {}", path, e))?;
    Ok(Arc::new(FileLogger::new(component)))
}
