use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use log::{debug, error, info, warn};
use notification_service::NotificationDispatcher;
use serde_json::json;
use syzygy_shared::config::{CloudTasksConfig, LotteryConfig, TableNames};
use syzygy_shared::error::TaskError;
use syzygy_shared::models::{DocumentChange, Event, Invitation, LotteryResult};
use syzygy_shared::store::dynamo::{create_dynamo_client, DynamoEventStore, DynamoInvitationStore};
use syzygy_shared::store::{EventStore, InvitationStore};
use syzygy_shared::tasks::{CloudTasksScheduler, TaskRequest, TaskScheduler};

use crate::draw::{invite_count, select_winners};
use crate::errors::LotteryError;

/// Which branch a scheduling attempt took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { handle: String },
    DrawnImmediately,
    /// Registration closes beyond the task horizon; the refresh sweep picks
    /// the event up later.
    BeyondHorizon,
    AlreadyScheduled,
    AlreadyComplete,
}

/// Why a draw is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTrigger {
    /// The deferred task fired.
    Scheduled,
    /// Registration had already closed when scheduling was attempted.
    Immediate,
    /// The organizer asked for the draw before registration closed.
    Early,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutcome {
    Drawn {
        winners: Vec<String>,
        waiting_list: Vec<String>,
        invitation_ids: Vec<String>,
    },
    AlreadyComplete,
}

/// Result of one refresh sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshSummary {
    pub examined: usize,
    pub scheduled: usize,
    pub drawn: usize,
    pub beyond_horizon: usize,
    pub skipped: usize,
    /// Ids of events whose scheduling failed and will be retried next sweep.
    pub failed: Vec<String>,
}

impl RefreshSummary {
    fn record(&mut self, outcome: &ScheduleOutcome) {
        match outcome {
            ScheduleOutcome::Scheduled { .. } => self.scheduled += 1,
            ScheduleOutcome::DrawnImmediately => self.drawn += 1,
            ScheduleOutcome::BeyondHorizon => self.beyond_horizon += 1,
            ScheduleOutcome::AlreadyScheduled | ScheduleOutcome::AlreadyComplete => {
                self.skipped += 1
            }
        }
    }
}

#[derive(Clone)]
pub struct LotteryScheduler {
    events: Arc<dyn EventStore>,
    invitations: Arc<dyn InvitationStore>,
    tasks: Arc<dyn TaskScheduler>,
    notifier: NotificationDispatcher,
    config: LotteryConfig,
}

impl LotteryScheduler {
    pub fn new(
        events: Arc<dyn EventStore>,
        invitations: Arc<dyn InvitationStore>,
        tasks: Arc<dyn TaskScheduler>,
        notifier: NotificationDispatcher,
        config: LotteryConfig,
    ) -> Self {
        Self {
            events,
            invitations,
            tasks,
            notifier,
            config,
        }
    }

    /// Production wiring: DynamoDB stores, Cloud Tasks and the Expo gateway.
    /// Fails if the callback or queue settings are missing.
    pub async fn from_env() -> Result<Self, LotteryError> {
        let config = LotteryConfig::from_env()?;
        let tasks = CloudTasksScheduler::new(CloudTasksConfig::from_env()?).await?;

        let client = create_dynamo_client().await;
        let tables = TableNames::from_env();

        info!("Lottery callbacks will target {}", config.callback_url);

        Ok(Self::new(
            Arc::new(DynamoEventStore::with_client_and_table(
                client.clone(),
                tables.events,
            )),
            Arc::new(DynamoInvitationStore::with_client_and_table(
                client,
                tables.invitations,
            )),
            Arc::new(tasks),
            NotificationDispatcher::from_env().await,
            config,
        ))
    }

    /// Reacts to a write on the events collection. Returns the scheduling
    /// outcome when one was attempted.
    pub async fn handle_event_change(
        &self,
        change: &DocumentChange<Event>,
    ) -> Result<Option<ScheduleOutcome>, LotteryError> {
        match (&change.before, &change.after) {
            (Some(before), None) => {
                debug!("Event {} deleted", before.id);
                // The document is gone, so only the task needs cleaning up.
                if let Some(handle) = &before.lottery_task_name {
                    self.cancel_task(handle).await?;
                }
                Ok(None)
            }
            (None, Some(after)) => {
                debug!("Event {} created", after.id);
                self.schedule_lottery(after).await.map(Some)
            }
            (Some(before), Some(after)) => {
                let (time_before, time_after) =
                    match (before.registration_end, after.registration_end) {
                        (Some(b), Some(a)) => (b, a),
                        _ => {
                            warn!("Ignoring {} since registrationEnd is missing", after.id);
                            return Ok(None);
                        }
                    };

                if time_before == time_after {
                    return Ok(None);
                }

                info!(
                    "Event {} registration end moved from {} to {}",
                    after.id, time_before, time_after
                );

                let mut event = after.clone();
                if let Some(handle) = event.lottery_task_name.take() {
                    self.cancel_task(&handle).await?;
                    self.events.set_lottery_task(&event.id, None).await?;
                }
                self.schedule_lottery(&event).await.map(Some)
            }
            (None, None) => Ok(None),
        }
    }

    /// Moves an event from `NoTask` towards a draw: schedules a deferred
    /// task, draws now if registration has closed, or leaves it for the
    /// refresh sweep when the deadline is beyond the horizon.
    pub async fn schedule_lottery(&self, event: &Event) -> Result<ScheduleOutcome, LotteryError> {
        self.schedule_lottery_at(event, Utc::now()).await
    }

    pub(crate) async fn schedule_lottery_at(
        &self,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, LotteryError> {
        if event.lottery_complete {
            return Ok(ScheduleOutcome::AlreadyComplete);
        }
        if event.lottery_task_name.is_some() {
            return Ok(ScheduleOutcome::AlreadyScheduled);
        }

        let registration_end = event
            .registration_end
            .ok_or_else(|| LotteryError::missing_field(&event.id, "registrationEnd"))?;
        let delay = registration_end - now;

        if delay >= self.config.horizon {
            debug!(
                "Event {} closes in {} days, beyond the task horizon",
                event.id,
                delay.num_days()
            );
            return Ok(ScheduleOutcome::BeyondHorizon);
        }

        if delay <= chrono::Duration::zero() {
            info!("Registration for event {} already closed, drawing now", event.id);
            return match self.draw_lottery(&event.id, DrawTrigger::Immediate).await? {
                DrawOutcome::Drawn { .. } => Ok(ScheduleOutcome::DrawnImmediately),
                DrawOutcome::AlreadyComplete => Ok(ScheduleOutcome::AlreadyComplete),
            };
        }

        let handle = self
            .tasks
            .create_task(TaskRequest {
                target_url: self.config.callback_url.clone(),
                payload: json!({ "eventId": event.id }),
                schedule_time: registration_end,
            })
            .await?;

        if let Err(e) = self.events.set_lottery_task(&event.id, Some(&handle)).await {
            error!(
                "Failed to record task {} on event {}: {}",
                handle, event.id, e
            );
            // An unrecorded task would be duplicated by the next sweep.
            if let Err(cancel_err) = self.cancel_task(&handle).await {
                warn!("Failed to cancel unrecorded task {}: {}", handle, cancel_err);
            }
            return Err(e.into());
        }

        info!(
            "Scheduled lottery for event {} at {} as {}",
            event.id, registration_end, handle
        );
        Ok(ScheduleOutcome::Scheduled { handle })
    }

    /// Deletes a deferred task. A task that no longer exists counts as
    /// cancelled.
    async fn cancel_task(&self, handle: &str) -> Result<(), LotteryError> {
        match self.tasks.delete_task(handle).await {
            Ok(()) => {
                info!("Cancelled lottery task {}", handle);
                Ok(())
            }
            Err(TaskError::NotFound(_)) => {
                debug!("Lottery task {} already gone", handle);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Runs the draw for an event exactly once. Later calls observe
    /// [`DrawOutcome::AlreadyComplete`].
    pub async fn draw_lottery(
        &self,
        event_id: &str,
        trigger: DrawTrigger,
    ) -> Result<DrawOutcome, LotteryError> {
        let event = self
            .events
            .get_event(event_id)
            .await?
            .ok_or_else(|| LotteryError::EventNotFound(event_id.to_string()))?;

        if event.lottery_complete {
            info!("Lottery for event {} already drawn", event_id);
            return Ok(DrawOutcome::AlreadyComplete);
        }

        let waiting_list = event
            .waiting_list
            .as_ref()
            .ok_or_else(|| LotteryError::missing_field(event_id, "waitingList"))?;
        let organizer_id = event
            .organizer_id
            .as_deref()
            .ok_or_else(|| LotteryError::missing_field(event_id, "organizerId"))?;

        let count = invite_count(event.max_attendees, event.invites.len(), waiting_list.len());
        let selection = {
            let mut rng = rand::thread_rng();
            select_winners(waiting_list, count, &mut rng)
        };

        let invitations: Vec<Invitation> = selection
            .winners
            .iter()
            .map(|winner| Invitation::new(event_id, organizer_id, winner))
            .collect();
        let invitation_ids: Vec<String> = invitations.iter().map(|i| i.id.clone()).collect();

        let mut invites = event.invites.clone();
        invites.extend(invitation_ids.iter().cloned());
        let result = LotteryResult {
            invites,
            waiting_list: selection.remaining.clone(),
        };

        // The conditional merge is the draw's commit point.
        match self.events.complete_lottery(event_id, &result).await {
            Ok(()) => {}
            Err(e) if e.is_condition_failed() => {
                info!("Lottery for event {} was drawn concurrently", event_id);
                return Ok(DrawOutcome::AlreadyComplete);
            }
            Err(e) => return Err(e.into()),
        }

        // Past the commit a retry sees `AlreadyComplete`, so failures from
        // here on name the winners left without invitations or notifications.
        if let Err(e) = try_join_all(
            invitations
                .iter()
                .map(|invitation| self.invitations.create_invitation(invitation)),
        )
        .await
        {
            warn!(
                "Lottery for event {} committed but invitations failed for winners {:?}: {}",
                event_id, selection.winners, e
            );
            return Err(e.into());
        }

        info!(
            "Drew lottery for event {} ({:?}): {} winners, {} remain waiting",
            event_id,
            trigger,
            selection.winners.len(),
            selection.remaining.len()
        );

        if trigger == DrawTrigger::Early {
            if let Some(handle) = &event.lottery_task_name {
                self.cancel_task(handle).await?;
            }
        }

        if let Err(e) = self
            .notifier
            .notify_of_lottery(&event, &selection.winners, &selection.remaining)
            .await
        {
            warn!(
                "Lottery for event {} committed but notifications failed for winners {:?} and waiting list {:?}: {}",
                event_id, selection.winners, selection.remaining, e
            );
            return Err(e.into());
        }

        Ok(DrawOutcome::Drawn {
            winners: selection.winners,
            waiting_list: selection.remaining,
            invitation_ids,
        })
    }

    /// Re-runs scheduling for every event that is neither complete nor
    /// scheduled. Failures are recorded and the sweep continues.
    pub async fn refresh_lotteries(&self) -> Result<RefreshSummary, LotteryError> {
        let events = self.events.events_awaiting_lottery().await?;
        let mut summary = RefreshSummary {
            examined: events.len(),
            ..Default::default()
        };

        for event in &events {
            match self.schedule_lottery(event).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) if e.is_data_integrity() => {
                    warn!("Skipping event {}: {}", event.id, e);
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!("Failed to schedule lottery for event {}: {}", event.id, e);
                    summary.failed.push(event.id.clone());
                }
            }
        }

        info!(
            "Lottery refresh: {} examined, {} scheduled, {} drawn, {} beyond horizon, {} skipped, {} failed",
            summary.examined,
            summary.scheduled,
            summary.drawn,
            summary.beyond_horizon,
            summary.skipped,
            summary.failed.len()
        );

        Ok(summary)
    }
}
