//! History worker: runs store and query calls off the dispatcher task.
//!
//! The dispatcher only enqueues jobs. One worker drains the queue in order,
//! so a message stored before a query from the same client is visible to
//! that query. Answers go back to the dispatcher as events, which places
//! them in the asking session's output in command order.

use tokio::sync::{broadcast, mpsc};

use skychat_core::command::HistoryQuery;
use skychat_core::wire::NO_MESSAGES;
use skychat_core::{Message, NewMessage, Reply, SessionId};
use skychat_services::{run_query, HistoryError, SharedHistory};

use crate::dispatch::DispatchEvent;

#[derive(Debug)]
pub enum HistoryJob {
    Store(NewMessage),
    Query {
        session: SessionId,
        name: String,
        query: HistoryQuery,
    },
}

/// Dispatcher-side handle. `None` when history is disabled.
#[derive(Debug, Clone)]
pub struct HistoryHandle {
    jobs: Option<mpsc::UnboundedSender<HistoryJob>>,
}

impl HistoryHandle {
    pub fn new(jobs: mpsc::UnboundedSender<HistoryJob>) -> Self {
        Self { jobs: Some(jobs) }
    }

    pub fn disabled() -> Self {
        Self { jobs: None }
    }

    /// Fire-and-forget persistence of a delivered message.
    pub fn store(&self, message: NewMessage) {
        let Some(jobs) = &self.jobs else { return };
        if jobs.send(HistoryJob::Store(message)).is_err() {
            tracing::warn!("history worker gone, message not stored");
        }
    }

    /// Queue a query on behalf of `session`. Returns false when history
    /// is disabled or the worker has stopped, in which case no answer will
    /// ever arrive.
    pub fn query(&self, session: SessionId, name: String, query: HistoryQuery) -> bool {
        let Some(jobs) = &self.jobs else { return false };
        let queued = jobs
            .send(HistoryJob::Query {
                session,
                name,
                query,
            })
            .is_ok();
        if !queued {
            tracing::warn!(%session, "history worker gone, query dropped");
        }
        queued
    }
}

pub struct HistoryWorker {
    store: SharedHistory,
    jobs: mpsc::UnboundedReceiver<HistoryJob>,
    events: mpsc::UnboundedSender<DispatchEvent>,
    shutdown: broadcast::Receiver<()>,
}

impl HistoryWorker {
    pub fn new(
        store: SharedHistory,
        jobs: mpsc::UnboundedReceiver<HistoryJob>,
        events: mpsc::UnboundedSender<DispatchEvent>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            store,
            jobs,
            events,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("history worker shutting down");
                    return;
                }

                job = self.jobs.recv() => {
                    match job {
                        Some(job) => self.handle(job).await,
                        None => {
                            tracing::info!("history queue closed, worker exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, job: HistoryJob) {
        let store = self.store.clone();
        match job {
            HistoryJob::Store(message) => {
                let from = message.from.clone();
                match tokio::task::spawn_blocking(move || store.store(message)).await {
                    Ok(Ok(id)) => tracing::trace!(id, %from, "message stored"),
                    Ok(Err(e)) => tracing::warn!(error = %e, %from, "failed to store message"),
                    Err(e) => tracing::warn!(error = %e, "history store task failed"),
                }
            }
            HistoryJob::Query {
                session,
                name,
                query,
            } => {
                let result =
                    tokio::task::spawn_blocking(move || run_query(store.as_ref(), &name, &query))
                        .await;
                let reply = match result {
                    Ok(result) => render(result),
                    Err(e) => {
                        tracing::warn!(error = %e, "history query task failed");
                        Reply::error("history lookup failed")
                    }
                };
                if self
                    .events
                    .send(DispatchEvent::HistoryReply { session, reply })
                    .is_err()
                {
                    tracing::debug!(%session, "dispatcher gone, history answer dropped");
                }
            }
        }
    }
}

fn render(result: Result<Vec<Message>, HistoryError>) -> Reply {
    match result {
        Ok(messages) if messages.is_empty() => Reply::info(NO_MESSAGES),
        Ok(messages) => Reply::info(
            messages
                .iter()
                .map(Message::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "history query failed");
            Reply::error("history lookup failed")
        }
    }
}
