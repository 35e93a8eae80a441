use crate::domains::logger::DomainLogger;
use std::sync::Arc;

/// Fans every record out to all attached loggers in order.
pub struct MultiLogger {
    sinks: Vec<Arc<dyn DomainLogger>>,
}

impl MultiLogger {
    pub fn new(sinks: Vec<Arc<dyn DomainLogger>>) -> Self {
        Self { sinks }
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.sinks.iter().for_each(|s| s.error(msg));
    }
}

/// File logger when `file` is set and can be opened, otherwise console only.
/// `fast_log` already mirrors to the console, so the two are never combined.
pub fn init_logger(file: Option<&str>, level: &str, component: &str) -> Arc<dyn DomainLogger> {
    let console = crate::adapters::outbound::init_console_logger(component);
    let Some(path) = file else { return console };
    match crate::adapters::outbound::init_file_logger(path, level, component, true) {
        Ok(file_logger) => file_logger,
        Err(e) => {
            console.warn(&format!("{}; logging to console only", e));
            console
        }
    }
}
