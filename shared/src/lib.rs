//! Shared building blocks for the Syzygy event services.
//!
//! Holds the document models, the store contracts and their DynamoDB
//! implementations, the push gateway, the deferred task scheduler client and
//! runtime configuration. In-memory implementations of every contract live in
//! [`test_utils`] behind the `test_utils` feature.

pub mod config;
pub mod error;
pub mod models;
pub mod push;
pub mod store;
pub mod streams;
pub mod tasks;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
