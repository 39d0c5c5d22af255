use super::{DownloadJob, Downloader, JobOutcome};
use crate::s3::ReportStore;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A fixed set of worker tasks pulling [`DownloadJob`]s from a bounded queue
/// and sending a [`JobOutcome`] for each one down a bounded result channel.
///
/// Both channels have a capacity of twice the number of workers, so
/// [`WorkerPool::submit()`] waits whenever the workers fall behind.
#[derive(Debug)]
pub(super) struct WorkerPool {
    /// The sending half of the job queue.  Dropping it closes the queue.
    job_sender: async_channel::Sender<DownloadJob>,

    /// Handles for the worker tasks
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` worker tasks that process jobs with `downloader`.
    /// Returns the pool along with the receiving end of the result channel,
    /// which closes once every worker has exited.
    pub(super) fn start<S: ReportStore>(
        downloader: Arc<Downloader<S>>,
        workers: NonZeroUsize,
    ) -> (WorkerPool, mpsc::Receiver<JobOutcome>) {
        let capacity = workers.get() * 2;
        let (job_sender, job_receiver) = async_channel::bounded(capacity);
        let (result_sender, result_receiver) = mpsc::channel(capacity);
        let handles = (1..=workers.get())
            .map(|worker| {
                let this = downloader.clone();
                let jobs = job_receiver.clone();
                let results = result_sender.clone();
                tokio::spawn(async move {
                    while let Ok(job) = jobs.recv().await {
                        let outcome = this.process(job).await;
                        if results.send(outcome).await.is_err() {
                            // The collector has gone away; there is no one
                            // left to report to.
                            tracing::error!(worker, "Result channel closed unexpectedly; worker exiting");
                            return;
                        }
                    }
                    tracing::trace!(worker, "Job queue drained; worker exiting");
                })
            })
            .collect();
        (
            WorkerPool {
                job_sender,
                handles,
            },
            result_receiver,
        )
    }

    /// Add a job to the queue, waiting if the queue is full
    pub(super) async fn submit(&self, job: DownloadJob) -> Result<(), PoolClosedError> {
        self.job_sender
            .send(job)
            .await
            .map_err(|e| PoolClosedError(e.into_inner()))
    }

    /// Close the job queue and wait for every worker to finish the jobs
    /// remaining in it and exit
    pub(super) async fn wait_for_completion(self) {
        let WorkerPool {
            job_sender,
            handles,
        } = self;
        drop(job_sender);
        for h in handles {
            if let Err(e) = h.await {
                tracing::error!(error = %e, "Download worker task failed");
            }
        }
    }
}

/// Error returned when submitting a job after every worker has exited
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("no download workers are running to accept job for {}", .0.object)]
pub(super) struct PoolClosedError(DownloadJob);
