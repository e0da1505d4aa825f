use crate::worker;
use chrono::{DateTime, Utc};
use clap::{Args, Parser};
use care_sync::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "care-sync-worker",
    about = "Close stale home-care interventions and open follow-up tasks, one citizen per queue item",
    version
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Clear pending items and enqueue every eligible citizen instead of processing
    #[arg(long = "queue")]
    pub(crate) populate: bool,
    /// Case-management snapshot to read citizens, pathways and calendars from
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
    /// Work-queue file to claim items from
    #[arg(long = "queue-file")]
    pub(crate) queue_file: Option<PathBuf>,
    /// Directory holding reference-data CSV overlays
    #[arg(long = "reference-data")]
    pub(crate) reference_data: Option<PathBuf>,
    /// Evaluate as of this RFC 3339 timestamp instead of the current time
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    worker::run(cli.run).await
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_to_processing_mode() {
        let cli = Cli::try_parse_from(["care-sync-worker"]).expect("parses");
        assert!(!cli.run.populate);
        assert!(cli.run.now.is_none());
    }

    #[test]
    fn accepts_overrides() {
        let cli = Cli::try_parse_from([
            "care-sync-worker",
            "--queue",
            "--snapshot",
            "fixtures/snapshot.json",
            "--queue-file",
            "/tmp/queue.json",
            "--now",
            "2025-10-01T10:00:00+02:00",
        ])
        .expect("parses");

        assert!(cli.run.populate);
        assert_eq!(cli.run.snapshot, Some(PathBuf::from("fixtures/snapshot.json")));
        assert_eq!(cli.run.queue_file, Some(PathBuf::from("/tmp/queue.json")));
        assert_eq!(
            cli.run.now,
            Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).single()
        );
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(Cli::try_parse_from(["care-sync-worker", "--now", "yesterday"]).is_err());
    }
}
