/// Substring that identifies an object as a FOCUS report
pub(crate) static REPORT_MARKER: &str = "FOCUS";

/// The Object Storage namespace in which OCI publishes cost reports
pub(crate) static DEFAULT_NAMESPACE: &str = "bling";

/// Path of the summary of all listed reports
pub(crate) static SUMMARY_FILENAME: &str = "oci_focus_reports.csv";

/// Prefix for temporary files created in the download folder and next to the
/// CSV reports
pub(crate) static TEMP_PREFIX: &str = ".focusdl.";

/// Upper bound on the number of concurrent download workers
pub(crate) const MAX_WORKERS: usize = 16;
