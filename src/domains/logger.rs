use chrono::Utc;
use log::{error as log_error, info as log_info, warn as log_warn};
use std::str::FromStr;
use std::sync::Arc;

/// Domain-level logging port.
/// Kept small and infallible so planners and services never fail on logging.
pub trait DomainLogger: Send + Sync + 'static {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

pub type DynLogger = Arc<dyn DomainLogger>;

/// File adapter backed by `fast_log`.
pub struct FileLogger {
    component: String,
}

impl FileLogger {
    /// Install the global `fast_log` logger writing to `path`, mirrored to stdout when `console` is set.
    /// `level` is a `log` level name such as "info" or "debug"; unknown names fall back to info.
    pub fn init(path: &str, level: &str, console: bool) -> Result<(), Box<dyn std::error::Error>> {
        let level = log::LevelFilter::from_str(level).unwrap_or(log::LevelFilter::Info);
        let mut config = fast_log::config::Config::new().file(path).level(level);
        if console {
            config = config.console();
        }
        fast_log::init(config)?;
        Ok(())
    }

    pub fn new(component: &str) -> Self {
        Self { component: component.to_string() }
    }
}

impl DomainLogger for FileLogger {
    fn info(&self, msg: &str) {
        log_info!("{} [{}] {}", Utc::now().to_rfc3339(), self.component, msg);
    }

    fn warn(&self, msg: &str) {
        log_warn!("{} [{}] {}", Utc::now().to_rfc3339(), self.component, msg);
    }

    fn error(&self, msg: &str) {
        log_error!("{} [{}] {}", Utc::now().to_rfc3339(), self.component, msg);
    }
}
