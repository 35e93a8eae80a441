use crate::communication::{OutboundMessage, WorkerCommunication};
use gryphon_routing::application::{PlanningChannel, PlanningWorker};
use gryphon_routing::common::{EventEnvelope, EventMetadata};
use gryphon_routing::domains::path_planning::{GridPathPlanner, PathPlanningEvent};
use gryphon_routing::domains::DynLogger;
use gryphon_routing::Config;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Source recorded on every event envelope this process writes.
const EVENT_SOURCE: &str = "pathplan_worker";

pub struct GridPlanWorker {
    pub worker_id: String,
    channel: PlanningChannel,
    logger: DynLogger,
}

impl GridPlanWorker {
    pub fn new(config: &Config, logger: DynLogger) -> Result<Self, Box<dyn std::error::Error>> {
        let planner = GridPathPlanner::new(config.grid.clone())?;
        let (events_tx, events_rx) = mpsc::channel(256);
        let channel = PlanningWorker::spawn(planner, logger.clone(), Some(events_tx));
        tokio::spawn(log_events(events_rx, logger.clone()));

        Ok(Self {
            worker_id: format!("grid-worker-{}", Uuid::new_v4()),
            channel,
            logger,
        })
    }

    /// Serve requests from stdin until it closes, then wait for in-flight plans.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logger.info(&format!("Worker {} reading requests from stdin", self.worker_id));
        let (mut comm, writer) = WorkerCommunication::new();
        let mut in_flight = JoinSet::new();

        while let Some(message) = comm.next_request().await? {
            let id = message.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            reap_finished(&mut in_flight, &self.logger);

            let handle = self.channel.submit(message.request).await?;
            let out = comm.sender();
            let logger = self.logger.clone();

            in_flight.spawn(async move {
                let progress_out = out.clone();
                let progress_id = id.clone();
                let result = handle
                    .finish_with(|progress| {
                        let _ = progress_out.try_send(OutboundMessage::Progress {
                            id: progress_id.clone(),
                            progress,
                        });
                    })
                    .await;
                match result {
                    Ok(response) => {
                        let _ = out.send(OutboundMessage::Response { id, response }).await;
                    }
                    Err(e) => logger.error(&format!("Request {} lost: {}", id, e)),
                }
            });
        }

        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                self.logger.error(&format!("Request task failed: {}", e));
            }
        }
        drop(comm);
        let _ = writer.await;
        self.logger.info(&format!("Worker {} finished: stdin closed", self.worker_id));
        Ok(())
    }
}

/// Drop finished request tasks without waiting; returns how many were reaped.
fn reap_finished(in_flight: &mut JoinSet<()>, logger: &DynLogger) -> usize {
    let mut reaped = 0;
    while let Some(done) = in_flight.try_join_next() {
        if let Err(e) = done {
            logger.error(&format!("Request task failed: {}", e));
        }
        reaped += 1;
    }
    reaped
}

async fn log_events(mut events: mpsc::Receiver<PathPlanningEvent>, logger: DynLogger) {
    while let Some(event) = events.recv().await {
        match EventEnvelope::new(&event, "PathPlan", EventMetadata::from_source(EVENT_SOURCE)) {
            Ok(envelope) => match serde_json::to_string(&envelope) {
                Ok(json) => logger.info(&json),
                Err(e) => logger.warn(&format!("Failed to encode event envelope: {}", e)),
            },
            Err(e) => logger.warn(&format!("Failed to wrap {:?}: {}", event, e)),
        }
    }
}

pub async fn run_worker(config: Config, logger: DynLogger) -> Result<(), Box<dyn std::error::Error>> {
    let worker = GridPlanWorker::new(&config, logger)?;
    worker.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gryphon_routing::adapters::outbound::init_noop_logger;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_reap_keeps_only_running_tasks() {
        let logger = init_noop_logger();
        let mut in_flight = JoinSet::new();
        let (release, wait) = oneshot::channel::<()>();
        in_flight.spawn(async move {
            let _ = wait.await;
        });
        for _ in 0..3 {
            in_flight.spawn(async {});
        }

        let mut reaped = 0;
        while in_flight.len() > 1 {
            reaped += reap_finished(&mut in_flight, &logger);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reaped, 3);
        assert_eq!(in_flight.len(), 1);

        release.send(()).unwrap();
        assert!(in_flight.join_next().await.unwrap().is_ok());
        assert_eq!(reap_finished(&mut in_flight, &logger), 0);
    }
}
