mod config;
mod consts;
mod downloader;
mod listing;
mod report;
mod s3;
mod timestamps;
mod util;
use crate::config::{default_config_path, OciProfile, DEFAULT_PROFILE};
use crate::consts::{DEFAULT_NAMESPACE, SUMMARY_FILENAME};
use crate::downloader::{clamp_workers, Downloader};
use crate::listing::list_reports;
use crate::report::{build_summary, write_operation_report, write_summary_report, Tally};
use crate::s3::{compat_endpoint, S3Client};
use crate::timestamps::Lookback;
use crate::util::log_process_info;
use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::io::{stderr, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt::time::OffsetTime, prelude::*};

/// List, download, and summarize OCI FOCUS cost reports
///
/// The FOCUS reports that OCI publishes for a tenancy over the last few days
/// are listed and, if `--download` is given, saved locally under names
/// prefixed with their report dates.  A summary of the listed reports is
/// always written to `oci_focus_reports.csv` in the current directory.
#[derive(Clone, Debug, Parser)]
#[command(version)]
struct Arguments {
    /// Only consider reports dated within the given number of days before now
    #[arg(long, default_value_t = 7, value_name = "N")]
    days: u32,

    /// Download the listed reports into the given directory, which is
    /// created if it does not exist.
    ///
    /// If this is omitted or empty, reports are listed and summarized but not
    /// downloaded.
    #[arg(long, value_name = "DIR")]
    download: Option<OsString>,

    /// Use the given Amazon S3 Compatibility API endpoint instead of the one
    /// derived from the namespace & region
    #[arg(long, env = "OCI_S3_ENDPOINT", value_name = "URL")]
    endpoint: Option<String>,

    /// Set logging level
    #[arg(
        short,
        long,
        default_value = "INFO",
        value_name = "ERROR|WARN|INFO|DEBUG|TRACE"
    )]
    log_level: Level,

    /// The Object Storage namespace in which the reports are stored
    #[arg(long, default_value = DEFAULT_NAMESPACE, value_name = "NAMESPACE")]
    namespace: String,

    /// Read the tenancy & region from the given OCI CLI configuration file.
    /// Defaults to `~/.oci/config`.
    #[arg(long, env = "OCI_CONFIG_FILE", value_name = "PATH")]
    oci_config: Option<PathBuf>,

    /// The profile in the OCI CLI configuration file to use
    #[arg(long, env = "OCI_CLI_PROFILE", default_value = DEFAULT_PROFILE, value_name = "NAME")]
    profile: String,

    /// The OCI region in which the reports are stored.  Defaults to the
    /// region set in the OCI CLI configuration.
    #[arg(long, env = "OCI_REGION", value_name = "REGION")]
    region: Option<String>,

    /// Write the download operation report to the given file
    #[arg(long, default_value = "download_report.csv", value_name = "FILE")]
    report: PathBuf,

    /// The OCID of the tenancy whose reports to fetch, which is also the
    /// name of the bucket holding them.  Defaults to the tenancy set in the
    /// OCI CLI configuration.
    #[arg(long, env = "OCI_TENANCY", value_name = "OCID")]
    tenancy: Option<String>,

    /// Set the number of concurrent download workers.  Values outside the
    /// range 1 to 16 are clamped to it.
    #[arg(long, default_value_t = 4, allow_negative_numbers = true, value_name = "N")]
    workers: i64,
}

impl Arguments {
    fn download_dir(&self) -> Option<PathBuf> {
        self.download
            .as_ref()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }

    /// Determine the tenancy OCID & region, reading whichever of them was not
    /// given on the command line from the OCI CLI configuration
    fn account(&self) -> anyhow::Result<(String, String)> {
        if let (Some(tenancy), Some(region)) = (&self.tenancy, &self.region) {
            return Ok((tenancy.clone(), region.clone()));
        }
        let path = match &self.oci_config {
            Some(p) => p.clone(),
            None => default_config_path().context(
                "cannot locate OCI config file as $HOME is not set; pass --oci-config, or pass both --tenancy and --region",
            )?,
        };
        let profile = OciProfile::load(&path, &self.profile)?;
        let Some(tenancy) = self.tenancy.clone().or(profile.tenancy) else {
            anyhow::bail!(
                "no tenancy given on the command line or in profile {:?} of {}",
                self.profile,
                path.display()
            );
        };
        let Some(region) = self.region.clone().or(profile.region) else {
            anyhow::bail!(
                "no region given on the command line or in profile {:?} of {}",
                self.profile,
                path.display()
            );
        };
        Ok((tenancy, region))
    }
}

// See
// <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/time/struct.OffsetTime.html#method.local_rfc_3339>
// for an explanation of the main + #[tokio::main]run thing
fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    let timer =
        OffsetTime::local_rfc_3339().context("failed to determine local timezone offset")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(stderr().is_terminal())
                .with_writer(stderr),
        )
        .with(
            Targets::new()
                .with_target(env!("CARGO_CRATE_NAME"), args.log_level)
                .with_target("aws_config", Level::DEBUG.min(args.log_level))
                .with_default(Level::INFO.min(args.log_level)),
        )
        .init();
    run(args)
}

#[tokio::main]
async fn run(args: Arguments) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received; shutting down momentarily ...");
                token.cancel();
            }
        }
    });

    let r = process_reports(args, token).await;
    log_process_info(start_time);
    r
}

/// List the reports, download them if requested, and write the CSV reports.
/// Network calls stop early once `token` is cancelled.
async fn process_reports(args: Arguments, token: CancellationToken) -> anyhow::Result<()> {
    let (tenancy, region) = args.account()?;
    let workers = clamp_workers(args.workers);
    let outdir = args.download_dir();
    if let Some(dir) = &outdir {
        tracing::trace!(path = %dir.display(), "Creating download directory");
        fs_err::create_dir_all(dir)?;
    }
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| compat_endpoint(&args.namespace, &region));
    let store = Arc::new(S3Client::new(region, endpoint).await);
    tracing::info!(%tenancy, endpoint = store.endpoint(), "Connected to Object Storage");

    tracing::info!(days = args.days, "Listing FOCUS reports ...");
    let Some(listing) = token
        .run_until_cancelled(list_reports(
            &*store,
            &args.namespace,
            &tenancy,
            Lookback::new(args.days),
            OffsetDateTime::now_utc(),
        ))
        .await
    else {
        anyhow::bail!("cancelled while listing FOCUS reports");
    };
    let reports = listing.context("failed to list FOCUS reports")?;
    tracing::info!(reports = reports.len(), "Found FOCUS reports");

    if let Some(dir) = outdir {
        let downloader = Downloader::new(store.clone(), dir, workers, token.clone());
        let results = downloader.run(reports.clone()).await?;
        let tally = Tally::new(&results);
        tracing::info!(
            succeeded = tally.succeeded,
            already_existed = tally.already_existed,
            failed = tally.failed,
            "Finished downloading reports"
        );
        write_operation_report(&args.report, &results)?;
        tracing::info!(path = %args.report.display(), "Wrote download report");
    }

    tracing::info!("Building report summary ...");
    let rows = build_summary(&*store, &reports, &tenancy, workers, &token).await;
    let summary_path = Path::new(SUMMARY_FILENAME);
    write_summary_report(summary_path, &rows)?;
    tracing::info!(path = %summary_path.display(), rows = rows.len(), "Wrote report summary");
    Ok(())
}
