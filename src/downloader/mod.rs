mod collector;
mod pool;
use self::collector::*;
use self::pool::*;
use crate::consts::{MAX_WORKERS, TEMP_PREFIX};
use crate::report::{OperationResult, Status};
use crate::s3::{size_or_zero, ObjectLocation, ReportStore};
use crate::timestamps::LogicalDate;
use anyhow::Context;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Error message recorded for jobs that were interrupted or never started
/// because the run was cancelled
static CANCELLED_MESSAGE: &str = "download cancelled";

/// Clamp a requested worker count to between 1 and [`MAX_WORKERS`]
pub(crate) fn clamp_workers(requested: i64) -> NonZeroUsize {
    let workers = usize::try_from(requested).unwrap_or(0);
    if workers > MAX_WORKERS {
        tracing::warn!(requested, "Limiting workers to {MAX_WORKERS}");
    }
    NonZeroUsize::new(workers.min(MAX_WORKERS)).unwrap_or(NonZeroUsize::MIN)
}

/// Returns the name of the local file for an object: the object's base name
/// prefixed with `YYYYMMDD_` if the object name encodes a date, or with
/// `unknown_date_` if it doesn't
pub(crate) fn local_filename(object: &ObjectLocation) -> (String, Option<LogicalDate>) {
    match LogicalDate::from_object_name(object.key()) {
        Ok(date) => (format!("{}_{}", date.compact(), object.name()), Some(date)),
        Err(e) => {
            tracing::debug!(error = %e, "Could not determine report date; using unknown_date_ prefix");
            (format!("unknown_date_{}", object.name()), None)
        }
    }
}

/// A request to download a single object
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct DownloadJob {
    pub(crate) object: ObjectLocation,
}

impl From<ObjectLocation> for DownloadJob {
    fn from(object: ObjectLocation) -> DownloadJob {
        DownloadJob { object }
    }
}

/// A finished job paired with its result
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct JobOutcome {
    pub(crate) job: DownloadJob,
    pub(crate) result: OperationResult,
}

/// What happened when a job tried to fetch its object
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Fetched {
    /// A file was already present at the target path
    AlreadyExists,

    /// The object was written to the target path
    Downloaded { bytes: u64 },
}

/// Object responsible for downloading report objects into a local folder
/// using a fixed number of concurrent workers
#[derive(Debug)]
pub(crate) struct Downloader<S> {
    /// The client for interacting with Object Storage
    store: Arc<S>,

    /// The folder in which to save downloaded reports
    outdir: PathBuf,

    /// The number of concurrent workers
    workers: NonZeroUsize,

    /// A [`CancellationToken`] for aborting the run
    token: CancellationToken,
}

impl<S: ReportStore> Downloader<S> {
    pub(crate) fn new(
        store: Arc<S>,
        outdir: PathBuf,
        workers: NonZeroUsize,
        token: CancellationToken,
    ) -> Arc<Downloader<S>> {
        Arc::new(Downloader {
            store,
            outdir,
            workers,
            token,
        })
    }

    /// Download every object in `objects` and return one result per object,
    /// in order of completion
    pub(crate) async fn run(
        self: &Arc<Self>,
        objects: Vec<ObjectLocation>,
    ) -> anyhow::Result<Vec<OperationResult>> {
        tracing::info!(
            workers = self.workers.get(),
            files = objects.len(),
            "Starting download workers"
        );
        let start = std::time::Instant::now();
        let (pool, results) = WorkerPool::start(self.clone(), self.workers);
        let collector = ResultCollector::spawn(results);
        for object in objects {
            pool.submit(DownloadJob::from(object)).await?;
        }
        pool.wait_for_completion().await;
        let results = collector.finish().await?;
        tracing::info!(elapsed = ?start.elapsed(), "Download completed");
        Ok(results)
    }

    /// Carry out a single job.  Every failure is recorded in the returned
    /// outcome rather than being propagated.
    #[tracing::instrument(skip_all, fields(object = %job.object))]
    pub(crate) async fn process(&self, job: DownloadJob) -> JobOutcome {
        let last_attempt = OffsetDateTime::now_utc();
        let file_size = self
            .token
            .run_until_cancelled(size_or_zero(&*self.store, &job.object))
            .await
            .unwrap_or(0);
        let (file_name, report_date) = local_filename(&job.object);
        let path = self.outdir.join(&file_name);
        let mut result = OperationResult {
            file_name,
            file_size,
            report_date,
            status: Status::Failed,
            downloaded: false,
            error: None,
            last_attempt,
        };
        let fetched = if self.token.is_cancelled() {
            None
        } else {
            self.token
                .run_until_cancelled(self.fetch(&job.object, &path))
                .await
        };
        match fetched {
            Some(Ok(Fetched::AlreadyExists)) => {
                tracing::debug!(path = %path.display(), "File already exists; skipping");
                result.status = Status::AlreadyExists;
            }
            Some(Ok(Fetched::Downloaded { bytes })) => {
                result.file_size = bytes;
                result.status = Status::Success;
                result.downloaded = true;
            }
            Some(Err(e)) => {
                result.error = Some(format!("{e:#}"));
            }
            None => {
                tracing::debug!("Download cancelled");
                result.error = Some(CANCELLED_MESSAGE.to_owned());
            }
        }
        JobOutcome { job, result }
    }

    /// Download `object` to `path` unless something already exists there.
    ///
    /// The content is streamed into a temporary file in the download folder
    /// which is then moved to `path` without overwriting.  On failure, the
    /// temporary file is removed and nothing is created at `path`.
    async fn fetch(&self, object: &ObjectLocation, path: &Path) -> anyhow::Result<Fetched> {
        match fs_err::tokio::symlink_metadata(path).await {
            Ok(_) => return Ok(Fetched::AlreadyExists),
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => return Err(anyhow::Error::from(e).context("failed to check for existing file")),
        }
        let mut body = self.store.get_object(object).await?;
        tracing::trace!("Opening temporary output file");
        let outfile = tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}download."))
            .tempfile_in(&self.outdir)
            .with_context(|| format!("failed to create temporary output file for {object}"))?;
        let fd = outfile
            .as_file()
            .try_clone()
            .with_context(|| format!("failed to open temporary output file for {object}"))?;
        let mut writer = tokio::fs::File::from_std(fd);
        let bytes = tokio::io::copy(&mut body, &mut writer)
            .await
            .with_context(|| format!("failed to download {object}"))?;
        writer
            .flush()
            .await
            .with_context(|| format!("failed to write {object} to disk"))?;
        drop(writer);
        tracing::trace!(dest = %path.display(), "Moving temporary output file to destination");
        match outfile.persist_noclobber(path) {
            Ok(_) => Ok(Fetched::Downloaded { bytes }),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "File appeared during download; discarding downloaded copy");
                Ok(Fetched::AlreadyExists)
            }
            Err(e) => Err(anyhow::Error::from(e.error)
                .context(format!("failed to move downloaded file to {}", path.display()))),
        }
    }
}
