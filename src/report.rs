use crate::consts::TEMP_PREFIX;
use crate::s3::{size_or_zero, ObjectLocation, ReportStore};
use crate::timestamps::LogicalDate;
use anyhow::Context;
use futures_util::{stream, StreamExt};
use serde::{Serialize, Serializer};
use std::cmp::Reverse;
use std::num::NonZeroUsize;
use std::path::Path;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

static OPERATION_REPORT_HEADER: [&str; 7] = [
    "file_name",
    "file_size",
    "report_date",
    "status",
    "downloaded",
    "error",
    "last_attempt",
];

static SUMMARY_REPORT_HEADER: [&str; 5] = [
    "bucket_name",
    "object_name",
    "size_bytes",
    "report_date",
    "tenancy_ocid",
];

/// Value recorded in place of a report date when an object's name does not
/// encode one
static UNKNOWN_DATE: &str = "unknown";

/// The outcome of a single download attempt
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, strum::Display)]
pub(crate) enum Status {
    Success,
    Failed,
    #[serde(rename = "Already exists")]
    #[strum(serialize = "Already exists")]
    AlreadyExists,
}

/// Audit record for one download job; one row of the operation report
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct OperationResult {
    /// The date-prefixed name of the local file
    pub(crate) file_name: String,

    /// Size of the object in bytes.  For successful downloads, this is the
    /// number of bytes actually written.
    pub(crate) file_size: u64,

    #[serde(serialize_with = "serialize_report_date")]
    pub(crate) report_date: Option<LogicalDate>,

    pub(crate) status: Status,

    /// Whether the object was downloaded during this run
    pub(crate) downloaded: bool,

    pub(crate) error: Option<String>,

    /// When the job was started
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) last_attempt: OffsetDateTime,
}

fn serialize_report_date<S: Serializer>(
    date: &Option<LogicalDate>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match date {
        Some(d) => d.serialize(serializer),
        None => serializer.serialize_str(UNKNOWN_DATE),
    }
}

/// Counts of download outcomes by status
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Tally {
    pub(crate) succeeded: usize,
    pub(crate) already_existed: usize,
    pub(crate) failed: usize,
}

impl Tally {
    pub(crate) fn new(results: &[OperationResult]) -> Tally {
        let mut tally = Tally::default();
        for r in results {
            match r.status {
                Status::Success => tally.succeeded += 1,
                Status::AlreadyExists => tally.already_existed += 1,
                Status::Failed => tally.failed += 1,
            }
        }
        tally
    }
}

/// One row of the summary of all listed reports
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct SummaryRow {
    pub(crate) bucket_name: String,

    /// The final component of the object name
    pub(crate) object_name: String,

    pub(crate) size_bytes: u64,
    pub(crate) report_date: LogicalDate,
    pub(crate) tenancy_ocid: String,
}

/// Build the summary rows for `objects`, resolving each object's size with up
/// to `concurrency` metadata requests at once.  Objects without a report date
/// are left out.  The rows are sorted by report date, newest first.
///
/// Once `token` is cancelled, outstanding metadata requests are abandoned and
/// the affected rows record a size of 0.
pub(crate) async fn build_summary<S: ReportStore>(
    store: &S,
    objects: &[ObjectLocation],
    tenancy: &str,
    concurrency: NonZeroUsize,
    token: &CancellationToken,
) -> Vec<SummaryRow> {
    let dated = objects.iter().filter_map(|obj| {
        match LogicalDate::from_object_name(obj.key()) {
            Ok(date) => Some((obj, date)),
            Err(e) => {
                tracing::debug!(error = %e, "Leaving undated object out of summary");
                None
            }
        }
    });
    let mut rows = stream::iter(dated)
        .map(move |(obj, date)| async move {
            SummaryRow {
                bucket_name: obj.bucket().to_owned(),
                object_name: obj.name().to_owned(),
                size_bytes: token
                    .run_until_cancelled(size_or_zero(store, obj))
                    .await
                    .unwrap_or(0),
                report_date: date,
                tenancy_ocid: tenancy.to_owned(),
            }
        })
        .buffered(concurrency.get())
        .collect::<Vec<_>>()
        .await;
    rows.sort_by_key(|r| Reverse(r.report_date));
    rows
}

/// Write the download operation report to `path`
pub(crate) fn write_operation_report(
    path: &Path,
    results: &[OperationResult],
) -> anyhow::Result<()> {
    write_csv(path, &OPERATION_REPORT_HEADER, results)
}

/// Write the report summary to `path`
pub(crate) fn write_summary_report(path: &Path, rows: &[SummaryRow]) -> anyhow::Result<()> {
    write_csv(path, &SUMMARY_REPORT_HEADER, rows)
}

/// Write a header line and then `rows` as CSV to a temporary file beside
/// `path`, then move the file into place
fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let fp = tempfile::Builder::new()
        .prefix(&format!("{TEMP_PREFIX}report."))
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file for {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(fp.as_file());
    writer
        .write_record(header)
        .with_context(|| format!("failed to write CSV header to {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write CSV row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush CSV data to {}", path.display()))?;
    drop(writer);
    fp.persist(path).with_context(|| {
        format!(
            "failed to persist temporary report file to {}",
            path.display()
        )
    })?;
    Ok(())
}
