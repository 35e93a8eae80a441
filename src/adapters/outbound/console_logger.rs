use crate::domains::logger::DomainLogger;
use std::sync::Arc;

/// Writes info to stdout (or stderr) and warnings/errors to stderr, prefixed with the component.
struct ConsoleLogger {
    component: String,
    info_to_stderr: bool,
}

impl DomainLogger for ConsoleLogger {
    fn info(&self, msg: &str) {
        if self.info_to_stderr {
            eprintln!("[{}] {}", self.component, msg);
        } else {
            println!("[{}] {}", self.component, msg);
        }
    }
    fn warn(&self, msg: &str) { eprintln!("[{}] WARN: {}", self.component, msg); }
    fn error(&self, msg: &str) { eprintln!("[{}] ERROR: {}", self.component, msg); }
}

/// Console-backed DomainLogger, also the fallback when no log file can be opened.
pub fn init_console_logger(component: &str) -> Arc<dyn DomainLogger> {
    Arc::new(ConsoleLogger { component: component.to_string(), info_to_stderr: false })
}

/// Console logger that keeps stdout free, for processes speaking a protocol on it.
pub fn init_stderr_logger(component: &str) -> Arc<dyn DomainLogger> {
    Arc::new(ConsoleLogger { component: component.to_string(), info_to_stderr: true })
}
