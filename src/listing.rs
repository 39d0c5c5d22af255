use crate::consts::REPORT_MARKER;
use crate::s3::{ListObjectsError, ObjectLocation, ReportStore};
use crate::timestamps::{LogicalDate, Lookback};
use time::OffsetDateTime;

/// List the report objects in `namespace`/`bucket` whose names contain
/// [`REPORT_MARKER`] and whose dates fall within `lookback` of `now`.
///
/// Objects whose names do not encode a date are skipped with a warning.  An
/// error from any listing request aborts the whole listing.
pub(crate) async fn list_reports<S: ReportStore>(
    store: &S,
    namespace: &str,
    bucket: &str,
    lookback: Lookback,
    now: OffsetDateTime,
) -> Result<Vec<ObjectLocation>, ListObjectsError> {
    tracing::debug!(
        namespace,
        bucket,
        days = lookback.days(),
        cutoff = ?lookback.cutoff(now),
        "Listing report objects"
    );
    let mut reports = Vec::new();
    let mut start = None;
    let mut pages = 0usize;
    loop {
        let page = store.list_objects(namespace, bucket, start.take()).await?;
        pages += 1;
        tracing::trace!(page = pages, names = page.names.len(), "Received listing page");
        for name in page.names {
            if !name.contains(REPORT_MARKER) {
                continue;
            }
            match LogicalDate::from_object_name(&name) {
                Ok(date) if lookback.includes(date, now) => {
                    reports.push(ObjectLocation::new(
                        namespace.to_owned(),
                        bucket.to_owned(),
                        name,
                    ));
                }
                Ok(date) => {
                    tracing::trace!(object = %name, %date, "Report is older than lookback window; skipping");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping object with invalid date format");
                }
            }
        }
        match page.next_start {
            Some(token) if !token.is_empty() => start = Some(token),
            _ => break,
        }
    }
    tracing::debug!(pages, reports = reports.len(), "Finished listing report objects");
    Ok(reports)
}
