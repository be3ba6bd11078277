//! Deferred capture.
//!
//! Jobs go through a bounded queue drained by a single worker. Delivery is
//! at-most-once: a full queue drops the job, a failed insert is logged at
//! debug and forgotten. Nothing is retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::{
    exchange::{CaptureOverrides, RequestSnapshot, ResponseSnapshot},
    logbook::LogbookService,
};

#[derive(Debug)]
pub struct CaptureJob {
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
    pub elapsed_ms: f64,
    pub overrides: CaptureOverrides,
}

#[derive(Debug, Clone)]
pub struct CaptureDispatcher {
    queue_name: Arc<str>,
    sender: mpsc::Sender<CaptureJob>,
}

impl CaptureDispatcher {
    /// Starts the worker. It exits once every dispatcher clone is dropped
    /// and the queue is drained.
    pub fn spawn(
        logbook: Arc<LogbookService>,
        queue_name: &str,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<CaptureJob>(capacity.max(1));
        let queue_name: Arc<str> = Arc::from(queue_name);
        let worker_queue = queue_name.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if let Err(err) = logbook
                    .capture(&job.request, &job.response, job.elapsed_ms, job.overrides)
                    .await
                {
                    tracing::debug!(
                        error = %err,
                        queue = %worker_queue,
                        method = %job.request.method,
                        path = %job.request.path,
                        "Deferred capture dropped"
                    );
                }
            }
        });

        (Self { queue_name, sender }, handle)
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Never waits. Returns false when the job was dropped.
    pub fn dispatch(&self, job: CaptureJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::debug!(
                    queue = %self.queue_name,
                    path = %job.request.path,
                    "Capture queue full, dropping job"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(queue = %self.queue_name, "Capture queue closed");
                false
            }
        }
    }
}
