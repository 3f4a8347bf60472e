//! Conversion of DynamoDB stream records into [`DocumentChange`]s.
//!
//! Tables are expected to stream `NEW_AND_OLD_IMAGES`.

use aws_lambda_events::event::dynamodb::EventRecord;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::models::DocumentChange;

fn image<T: DeserializeOwned>(item: &serde_dynamo::Item) -> Result<T, StoreError> {
    Ok(serde_dynamo::from_item(item.clone())?)
}

pub fn document_change<T: DeserializeOwned>(
    record: &EventRecord,
) -> Result<DocumentChange<T>, StoreError> {
    match record.event_name.as_str() {
        "INSERT" => Ok(DocumentChange::created(image(&record.change.new_image)?)),
        "MODIFY" => Ok(DocumentChange::updated(
            image(&record.change.old_image)?,
            image(&record.change.new_image)?,
        )),
        "REMOVE" => Ok(DocumentChange::deleted(image(&record.change.old_image)?)),
        other => Err(StoreError::Serialization(format!(
            "Unknown stream event name: {}",
            other
        ))),
    }
}
