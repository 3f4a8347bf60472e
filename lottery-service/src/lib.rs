//! Event lottery scheduling and drawing.
//!
//! The [`LotteryScheduler`] owns the per-event lifecycle: it schedules a
//! deferred draw when registration closes within the task horizon, draws
//! immediately once the deadline has passed, and cancels or reschedules when
//! the event changes. The HTTP routes expose the task callback and the
//! organizer's early draw.

pub mod draw;
pub mod errors;
pub mod routes;
pub mod scheduler;

pub use errors::{AppError, LotteryError};
pub use scheduler::{DrawOutcome, DrawTrigger, LotteryScheduler, RefreshSummary, ScheduleOutcome};

#[cfg(test)]
mod tests;
