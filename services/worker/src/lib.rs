mod cli;
mod infra;
mod worker;

use care_sync::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
