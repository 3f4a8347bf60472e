use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{collections, Invitation};
use crate::store::InvitationStore;

#[derive(Default)]
pub struct MockInvitationStore {
    invitations: Mutex<Vec<Invitation>>,
    fail_writes: AtomicBool,
}

impl MockInvitationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn invitations(&self) -> Vec<Invitation> {
        self.invitations.lock().unwrap().clone()
    }

    pub fn invitations_for_event(&self, event_id: &str) -> Vec<Invitation> {
        self.invitations()
            .into_iter()
            .filter(|i| i.event_id == event_id)
            .collect()
    }
}

#[async_trait]
impl InvitationStore for MockInvitationStore {
    async fn create_invitation(&self, invitation: &Invitation) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("invitation writes disabled".into()));
        }

        let mut invitations = self.invitations.lock().unwrap();
        if invitations.iter().any(|i| i.id == invitation.id) {
            return Err(StoreError::ConditionFailed {
                collection: collections::INVITATIONS,
                id: invitation.id.clone(),
            });
        }
        invitations.push(invitation.clone());
        Ok(())
    }
}
