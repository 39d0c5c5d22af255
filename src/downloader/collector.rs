use super::JobOutcome;
use crate::report::{OperationResult, Status};
use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The single consumer of a [`WorkerPool`](super::WorkerPool)'s result
/// stream.  The collected results are owned by the collector task and handed
/// back in order of arrival once the stream closes.
#[derive(Debug)]
pub(super) struct ResultCollector {
    handle: JoinHandle<Vec<OperationResult>>,
}

impl ResultCollector {
    pub(super) fn spawn(mut receiver: mpsc::Receiver<JobOutcome>) -> ResultCollector {
        let handle = tokio::spawn(async move {
            let mut results = Vec::new();
            while let Some(outcome) = receiver.recv().await {
                log_outcome(&outcome);
                results.push(outcome.result);
            }
            results
        });
        ResultCollector { handle }
    }

    /// Wait for the result stream to close and return the collected results
    pub(super) async fn finish(self) -> anyhow::Result<Vec<OperationResult>> {
        self.handle.await.context("result collector task failed")
    }
}

fn log_outcome(outcome: &JobOutcome) {
    let JobOutcome { job, result } = outcome;
    match result.status {
        Status::Success => tracing::info!(
            status = %result.status,
            source = job.object.name(),
            dest = %result.file_name,
            bytes = result.file_size,
            "Downloaded report"
        ),
        Status::AlreadyExists => tracing::info!(
            status = %result.status,
            source = job.object.name(),
            dest = %result.file_name,
            "Report already downloaded; skipped"
        ),
        Status::Failed => tracing::warn!(
            status = %result.status,
            object = %job.object,
            error = result.error.as_deref().unwrap_or_default(),
            "Failed to download report"
        ),
    }
}
