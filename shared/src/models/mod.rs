mod changes;
mod event;
mod invitation;
mod notification;
mod user;

pub use changes::{ChangeKind, DocumentChange};
pub use event::{Event, LotteryResult, LotteryState};
pub use invitation::Invitation;
pub use notification::{DeliveryRecord, Notification, NotificationCategory};
pub use user::{NotificationPreference, UserProfile};

/// Collection names as they appear in the document database contract.
pub mod collections {
    pub const EVENTS: &str = "events";
    pub const INVITATIONS: &str = "invitations";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const USER_NOTIFICATIONS: &str = "userNotifications";
    pub const USERS: &str = "users";
}

/// Generates a new random document id.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
