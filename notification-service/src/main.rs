use aws_lambda_events::event::dynamodb::Event as DynamoDbEvent;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use log::{error, info, warn};
use notification_service::{NotificationDispatcher, WriteOutcome};
use syzygy_shared::models::Notification;
use syzygy_shared::streams::document_change;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Notification Service Lambda");

    let dispatcher = NotificationDispatcher::from_env().await;

    lambda_runtime::run(service_fn(|event| handler(event, &dispatcher))).await?;
    Ok(())
}

/// Handles a batch of `notifications` stream records. Malformed records are
/// skipped; delivery failures fail the batch so the stream retries it.
async fn handler(
    event: LambdaEvent<DynamoDbEvent>,
    dispatcher: &NotificationDispatcher,
) -> Result<(), Error> {
    let records = event.payload.records;
    info!("Processing {} notification stream records", records.len());

    let mut failures = 0;

    for record in &records {
        let change = match document_change::<Notification>(record) {
            Ok(change) => change,
            Err(e) => {
                warn!(
                    "Skipping unreadable notification record {}: {}",
                    record.event_id, e
                );
                continue;
            }
        };

        match dispatcher.handle_notification_write(&change).await {
            Ok(WriteOutcome::Ignored) => {}
            Ok(outcome) => info!("Notification record {} handled: {:?}", record.event_id, outcome),
            Err(e) => {
                error!(
                    "Failed to handle notification record {}: {}",
                    record.event_id, e
                );
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(Error::from(format!(
            "{} of {} notification records failed",
            failures,
            records.len()
        )));
    }

    Ok(())
}
