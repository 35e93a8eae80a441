use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::common::{ApplicationError, ApplicationResult, DomainError};

/// Per-request progress buffer. Progress beyond this is dropped, never awaited.
pub const PROGRESS_CAPACITY: usize = 16;

/// Handler-side end of a request's progress stream.
pub struct ProgressSink<P> {
    sender: mpsc::Sender<P>,
}

impl<P> ProgressSink<P> {
    /// Non-blocking; dropped if the caller stopped listening or the buffer is full.
    pub fn emit(&self, progress: P) {
        let _ = self.sender.try_send(progress);
    }
}

/// Caller-side end of one submitted request.
pub struct TaskHandle<Resp, P> {
    pub id: Uuid,
    pub progress: mpsc::Receiver<P>,
    pub response: oneshot::Receiver<Resp>,
}

impl<Resp, P> TaskHandle<Resp, P> {
    /// Forward progress to `on_progress` as it arrives and return the response.
    /// Every progress item sent before the response is delivered first.
    pub async fn finish_with<F>(mut self, mut on_progress: F) -> ApplicationResult<Resp>
    where
        F: FnMut(P),
    {
        let id = self.id;
        loop {
            tokio::select! {
                biased;
                Some(p) = self.progress.recv() => on_progress(p),
                resp = &mut self.response => {
                    while let Ok(p) = self.progress.try_recv() {
                        on_progress(p);
                    }
                    return resp.map_err(|_| {
                        ApplicationError::Channel(format!("task {} dropped its response", id))
                    });
                }
            }
        }
    }
}

struct Job<Req, Resp, P> {
    id: Uuid,
    request: Req,
    progress: ProgressSink<P>,
    respond: oneshot::Sender<Resp>,
}

/// Async request/response boundary in front of a blocking handler.
pub struct TaskChannel<Req, Resp, P> {
    sender: mpsc::Sender<Job<Req, Resp, P>>,
}

impl<Req, Resp, P> Clone for TaskChannel<Req, Resp, P> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<Req, Resp, P> TaskChannel<Req, Resp, P>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    P: Send + 'static,
{
    pub async fn submit(&self, request: Req) -> ApplicationResult<TaskHandle<Resp, P>> {
        let id = Uuid::new_v4();
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CAPACITY);
        let (respond, response) = oneshot::channel();
        let job = Job {
            id,
            request,
            progress: ProgressSink { sender: progress_tx },
            respond,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| ApplicationError::Channel("task channel is closed".to_string()))?;
        Ok(TaskHandle { id, progress: progress_rx, response })
    }

    /// Submit and wait, ignoring progress. On timeout the computation keeps running
    /// and its late response is dropped.
    pub async fn call(&self, request: Req, timeout: Option<Duration>) -> ApplicationResult<Resp> {
        let handle = self.submit(request).await?;
        let id = handle.id;
        let response = handle.response;
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, response)
                .await
                .map_err(|_| DomainError::Timeout { id: id.to_string() })?,
            None => response.await,
        };
        received.map_err(|_| ApplicationError::Channel(format!("task {} dropped its response", id)))
    }
}

/// Start a dispatcher that runs `handler` on the blocking pool, one invocation per request.
/// Must be called from within a tokio runtime.
pub fn spawn_task_channel<Req, Resp, P, F>(capacity: usize, handler: F) -> TaskChannel<Req, Resp, P>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    P: Send + 'static,
    F: Fn(Uuid, Req, &ProgressSink<P>) -> Resp + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let (sender, mut jobs) = mpsc::channel::<Job<Req, Resp, P>>(capacity.max(1));

    tokio::spawn(async move {
        while let Some(job) = jobs.recv().await {
            let handler = Arc::clone(&handler);
            tokio::task::spawn_blocking(move || {
                let response = handler(job.id, job.request, &job.progress);
                let _ = job.respond.send(response);
            });
        }
        tracing::debug!("task channel closed");
    });

    TaskChannel { sender }
}
