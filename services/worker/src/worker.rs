use crate::cli::RunArgs;
use crate::infra::{CsvBillingLedger, JsonFileWorkQueue, SnapshotCaseClient};
use care_sync::config::AppConfig;
use care_sync::error::AppError;
use care_sync::reference_data::ReferenceData;
use care_sync::telemetry;
use care_sync::workflows::assignments::AssignmentSyncService;
use care_sync::workflows::queue::{populate_queue, Clock, QueueDriver};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: RunArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(snapshot) = args.snapshot.take() {
        config.paths.snapshot = snapshot;
    }
    if let Some(queue) = args.queue_file.take() {
        config.paths.queue = queue;
    }
    if let Some(dir) = args.reference_data.take() {
        config.paths.reference_data = Some(dir);
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let reference_data = match &config.paths.reference_data {
        Some(dir) => ReferenceData::load(dir)?,
        None => ReferenceData::standard(),
    };
    let client = Arc::new(SnapshotCaseClient::open(&config.paths.snapshot)?);
    let queue = Arc::new(JsonFileWorkQueue::open(&config.paths.queue)?);

    info!(
        environment = ?config.environment,
        snapshot = %config.paths.snapshot.display(),
        queue = %config.paths.queue.display(),
        populate = args.populate,
        "care sync worker starting"
    );

    if args.populate {
        let summary = tokio::task::spawn_blocking(move || {
            populate_queue(client.as_ref(), queue.as_ref(), &reference_data)
        })
        .await
        .map_err(|err| AppError::Worker(err.to_string()))??;

        info!(
            cleared = summary.cleared,
            enqueued = summary.enqueued,
            excluded = summary.excluded,
            duplicates = summary.duplicates,
            errors = summary.errors,
            "population finished"
        );
        return Ok(());
    }

    let billing = Arc::new(CsvBillingLedger::new(&config.paths.billing_ledger));
    let service = Arc::new(AssignmentSyncService::new(
        client.clone(),
        billing,
        &config.sync,
        reference_data,
    ));

    let mut driver = QueueDriver::new(queue, service);
    if let Some(now) = args.now {
        driver = driver.with_clock(Clock::Fixed(now));
    }

    let stop = driver.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current item");
            stop.store(true, Ordering::Release);
        }
    });

    let summary = tokio::task::spawn_blocking(move || driver.run())
        .await
        .map_err(|err| AppError::Worker(err.to_string()))??;

    info!(
        processed = summary.processed(),
        mutations = client.mutations().len(),
        stopped_early = summary.stopped_early,
        "worker finished"
    );
    Ok(())
}
