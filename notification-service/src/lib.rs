//! Notification creation, fan-out, delivery and revocation.

pub mod dispatcher;
pub mod errors;
pub mod routes;

pub use dispatcher::{NewNotification, NotificationDispatcher, WriteOutcome};
pub use errors::NotificationError;

#[cfg(test)]
mod tests;
