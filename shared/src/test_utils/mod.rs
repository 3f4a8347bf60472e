//! In-memory implementations of the store, push and task contracts, with the
//! same conditional-write semantics as the DynamoDB implementations.

pub mod mock_event_store;
pub mod mock_invitation_store;
pub mod mock_notification_store;
pub mod mock_push_gateway;
pub mod mock_task_scheduler;
pub mod mock_user_store;
pub mod test_logging;
