// ============================================================================
// Request Transport
// ============================================================================
//
// Delivery of server requests. Each document gets one FIFO queue drained by
// one worker task, so at most one request per document is in flight and
// answers come back in issuance order. Different documents proceed
// independently.
//
// ============================================================================

pub mod http;

pub use http::HttpTransport;

use crate::config::CommandConfig;
use crate::core::{CommandError, Result};
use crate::request::{RequestCommand, reconcile};
use crate::wire::ServerRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

/// One request as it travels to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_id: Uuid,
    /// Document the request belongs to; requests of one document are ordered.
    pub document: String,
    pub issued_at: DateTime<Utc>,
    pub request: ServerRequest,
}

impl RequestEnvelope {
    pub fn new(document: impl Into<String>, request: ServerRequest) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            document: document.into(),
            issued_at: Utc::now(),
            request,
        }
    }
}

#[async_trait]
pub trait RequestTransport: Send + Sync {
    /// Delivers one request and returns the authority's result.
    async fn send(&self, envelope: RequestEnvelope) -> Result<JsonValue>;
}

/// Receiver of the authority's answer to one queued request.
pub type PendingReply = oneshot::Receiver<Result<JsonValue>>;

struct Job {
    envelope: RequestEnvelope,
    reply: oneshot::Sender<Result<JsonValue>>,
}

pub struct RequestDispatcher {
    transport: Arc<dyn RequestTransport>,
    queues: Mutex<HashMap<String, mpsc::Sender<Job>>>,
    queue_capacity: usize,
    request_timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn RequestTransport>, config: &CommandConfig) -> Self {
        Self {
            transport,
            queues: Mutex::new(HashMap::new()),
            queue_capacity: config.queue_capacity.max(1),
            request_timeout: config.request_timeout,
        }
    }

    /// Queues a request behind earlier requests of the same document.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn enqueue(&self, document: &str, request: ServerRequest) -> Result<PendingReply> {
        let sender = self.queue_for(document)?;
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            envelope: RequestEnvelope::new(document, request),
            reply,
        };
        sender
            .send(job)
            .await
            .map_err(|_| CommandError::Transport(format!("queue for '{}' is closed", document)))?;
        Ok(receiver)
    }

    pub async fn dispatch(&self, document: &str, request: ServerRequest) -> Result<JsonValue> {
        let pending = self.enqueue(document, request).await?;
        pending
            .await
            .map_err(|_| CommandError::Transport(format!("worker for '{}' stopped", document)))?
    }

    /// Queues all requests in order, then waits for every answer.
    pub async fn dispatch_all(
        &self,
        document: &str,
        requests: Vec<ServerRequest>,
    ) -> Result<Vec<Result<JsonValue>>> {
        let mut pending = Vec::with_capacity(requests.len());
        for request in requests {
            pending.push(self.enqueue(document, request).await?);
        }
        let replies = futures::future::join_all(pending).await;
        Ok(replies
            .into_iter()
            .map(|reply| {
                reply.unwrap_or_else(|_| {
                    Err(CommandError::Transport(format!("worker for '{}' stopped", document)))
                })
            })
            .collect())
    }

    /// Sends the execute request of a locally executed command and merges
    /// the answer. Transport failures go to `handle_error`.
    pub async fn execute_and_reconcile(
        &self,
        document: &str,
        command: &mut dyn RequestCommand,
    ) -> Result<bool> {
        let request = command.get_execute_request()?;
        let outcome = self.dispatch(document, request).await;
        reconcile(command, outcome)
    }

    /// Sends the redo request of a locally redone command.
    pub async fn redo_remote(&self, document: &str, command: &mut dyn RequestCommand) -> Result<bool> {
        let request = command.get_redo_request()?;
        match self.dispatch(document, request).await {
            Ok(_) => Ok(true),
            Err(err) => {
                command.handle_error(&err);
                Ok(false)
            }
        }
    }

    /// Sends the undo request of a locally undone command. Returns `false`
    /// without sending anything while the command is not reconciled yet.
    pub async fn undo_remote(&self, document: &str, command: &mut dyn RequestCommand) -> Result<bool> {
        let Some(request) = command.get_undo_request()? else {
            event!(
                Level::DEBUG,
                command = %command.kind(),
                document = document,
                "no undo request before the server answered"
            );
            return Ok(false);
        };
        match self.dispatch(document, request).await {
            Ok(_) => Ok(true),
            Err(err) => {
                command.handle_error(&err);
                Ok(false)
            }
        }
    }

    pub fn documents(&self) -> Result<Vec<String>> {
        let queues = self.queues.lock()?;
        let mut documents: Vec<String> = queues.keys().cloned().collect();
        documents.sort();
        Ok(documents)
    }

    /// Drops the queue of `document`. Requests already queued are still
    /// delivered, then its worker exits. A later request starts a new queue.
    pub fn close(&self, document: &str) -> Result<bool> {
        let closed = self.queues.lock()?.remove(document).is_some();
        if closed {
            event!(Level::DEBUG, document = document, "request queue closed");
        }
        Ok(closed)
    }

    fn queue_for(&self, document: &str) -> Result<mpsc::Sender<Job>> {
        let mut queues = self.queues.lock()?;
        if let Some(sender) = queues.get(document).filter(|s| !s.is_closed()) {
            return Ok(sender.clone());
        }
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        spawn_worker(
            document.to_string(),
            self.transport.clone(),
            self.request_timeout,
            receiver,
        );
        queues.insert(document.to_string(), sender.clone());
        Ok(sender)
    }
}

fn spawn_worker(
    document: String,
    transport: Arc<dyn RequestTransport>,
    request_timeout: Duration,
    mut receiver: mpsc::Receiver<Job>,
) {
    event!(Level::DEBUG, document = %document, "starting request worker");
    tokio::spawn(async move {
        while let Some(Job { envelope, reply }) = receiver.recv().await {
            let span = info_span!(
                "transport.request",
                document = %document,
                request_id = %envelope.request_id,
                name = %envelope.request.name
            );
            let outcome = async {
                match timeout(request_timeout, transport.send(envelope)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CommandError::Transport(format!(
                        "request timed out after {}ms",
                        request_timeout.as_millis()
                    ))),
                }
            }
            .instrument(span)
            .await;

            if let Err(err) = &outcome {
                event!(Level::WARN, document = %document, error = %err, "server request failed");
            }
            // the issuer may have stopped waiting
            let _ = reply.send(outcome);
        }
        event!(Level::DEBUG, document = %document, "request worker stopped");
    });
}
