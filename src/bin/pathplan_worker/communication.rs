use gryphon_routing::application::{PlanRequest, PlanResponse};
use gryphon_routing::domains::path_planning::PlanProgress;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

/// One request line on stdin. `id` is echoed back; a fresh one is assigned when absent.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub request: PlanRequest,
}

/// One line on stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Progress { id: String, progress: PlanProgress },
    Response { id: String, response: PlanResponse },
    /// The input line could not be parsed as a request.
    Rejected { line: usize, reason: String },
}

pub struct WorkerCommunication {
    lines: Lines<BufReader<Stdin>>,
    line_no: usize,
    outbound: mpsc::Sender<OutboundMessage>,
}

impl WorkerCommunication {
    /// Reader over stdin plus a single writer task owning stdout.
    pub fn new() -> (Self, tokio::task::JoinHandle<()>) {
        let (outbound, mut rx) = mpsc::channel::<OutboundMessage>(256);
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(message) = rx.recv().await {
                let mut line = match serde_json::to_string(&message) {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode outbound message");
                        continue;
                    }
                };
                line.push('\n');
                if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                    tracing::warn!("stdout closed; dropping remaining output");
                    break;
                }
            }
        });
        let comm = Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            line_no: 0,
            outbound,
        };
        (comm, writer)
    }

    pub fn sender(&self) -> mpsc::Sender<OutboundMessage> {
        self.outbound.clone()
    }

    /// Next parsed request; malformed lines are answered with `Rejected` and skipped.
    /// `None` at end of input.
    pub async fn next_request(&mut self) -> std::io::Result<Option<InboundMessage>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InboundMessage>(&line) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    let _ = self
                        .outbound
                        .send(OutboundMessage::Rejected { line: self.line_no, reason: e.to_string() })
                        .await;
                }
            }
        }
        Ok(None)
    }
}
