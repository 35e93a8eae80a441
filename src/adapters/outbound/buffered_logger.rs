use crate::domains::logger::DomainLogger;
use std::sync::Arc;
use tokio::sync::mpsc;

enum Level {
    Info,
    Warn,
    Error,
}

struct LogMessage {
    level: Level,
    msg: String,
}

struct BufferedLogger {
    sender: mpsc::Sender<LogMessage>,
}

impl BufferedLogger {
    fn enqueue(&self, level: Level, msg: &str) {
        // never block a planner on logging; drop when the buffer is full
        let _ = self.sender.try_send(LogMessage { level, msg: msg.to_string() });
    }
}

impl DomainLogger for BufferedLogger {
    fn info(&self, msg: &str) { self.enqueue(Level::Info, msg); }
    fn warn(&self, msg: &str) { self.enqueue(Level::Warn, msg); }
    fn error(&self, msg: &str) { self.enqueue(Level::Error, msg); }
}

/// Non-blocking logger for code running on blocking planner threads.
/// A background task drains up to `capacity` queued records into `sink`.
/// Must be called from within a tokio runtime.
pub fn init_buffered_logger(sink: Arc<dyn DomainLogger>, capacity: usize) -> Arc<dyn DomainLogger> {
    let (tx, mut rx) = mpsc::channel::<LogMessage>(capacity.max(1));

    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            match record.level {
                Level::Info => sink.info(&record.msg),
                Level::Warn => sink.warn(&record.msg),
                Level::Error => sink.error(&record.msg),
            }
        }
    });

    Arc::new(BufferedLogger { sender: tx })
}
