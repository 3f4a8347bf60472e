//! DynamoDB stream handler for the `events` table.

use aws_lambda_events::event::dynamodb::Event as DynamoDbEvent;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info, warn};
use lottery_service::LotteryScheduler;
use syzygy_shared::models::Event;
use syzygy_shared::streams::document_change;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Lottery Trigger Lambda");

    let scheduler = LotteryScheduler::from_env().await?;

    lambda_runtime::run(service_fn(|event| handler(event, &scheduler))).await?;
    Ok(())
}

async fn handler(
    event: LambdaEvent<DynamoDbEvent>,
    scheduler: &LotteryScheduler,
) -> Result<(), Error> {
    let records = event.payload.records;
    info!("Processing {} event stream records", records.len());

    let mut failures = 0;

    for record in &records {
        let change = match document_change::<Event>(record) {
            Ok(change) => change,
            Err(e) => {
                warn!("Skipping unreadable event record {}: {}", record.event_id, e);
                continue;
            }
        };

        match scheduler.handle_event_change(&change).await {
            Ok(Some(outcome)) => info!(
                "Event record {} ({:?}): {:?}",
                record.event_id,
                change.kind(),
                outcome
            ),
            Ok(None) => {}
            Err(e) if e.is_data_integrity() => {
                warn!("Skipping event record {}: {}", record.event_id, e);
            }
            Err(e) => {
                error!("Failed to handle event record {}: {}", record.event_id, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(Error::from(format!(
            "{} of {} event records failed",
            failures,
            records.len()
        )));
    }

    Ok(())
}
