//! Weekly sweep that schedules lotteries for events whose registration end
//! has come within the task horizon.

use aws_lambda_events::event::cloudwatch_events::CloudWatchEvent;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info};
use lottery_service::LotteryScheduler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Lottery Refresh Lambda");

    let scheduler = LotteryScheduler::from_env().await?;

    lambda_runtime::run(service_fn(|event| handler(event, &scheduler))).await?;
    Ok(())
}

async fn handler(_event: LambdaEvent<CloudWatchEvent>, scheduler: &LotteryScheduler) -> Result<(), Error> {
    info!("Lottery refresh triggered");

    let summary = match scheduler.refresh_lotteries().await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Failed to list events awaiting a lottery: {}", e);
            return Err(Error::from(format!("Failed to list events: {}", e)));
        }
    };

    if !summary.failed.is_empty() {
        return Err(Error::from(format!(
            "Scheduling failed for {} events: {}",
            summary.failed.len(),
            summary.failed.join(", ")
        )));
    }

    Ok(())
}
