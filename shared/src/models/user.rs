use serde::{Deserialize, Serialize};

use super::NotificationCategory;

/// The slice of a `users` document needed for push delivery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default, rename = "fcmToken")]
    pub push_token: Option<String>,
    #[serde(default)]
    pub organizer_notifications: Option<bool>,
    #[serde(default)]
    pub system_notifications: Option<bool>,
}

/// A user's opt-out setting for one notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPreference {
    Enabled,
    Disabled,
    /// The user never set the flag. Delivery is allowed.
    Unset,
}

impl NotificationPreference {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => NotificationPreference::Enabled,
            Some(false) => NotificationPreference::Disabled,
            None => NotificationPreference::Unset,
        }
    }

    pub fn allows_delivery(self) -> bool {
        match self {
            NotificationPreference::Enabled | NotificationPreference::Unset => true,
            NotificationPreference::Disabled => false,
        }
    }
}

impl UserProfile {
    pub fn preference(&self, category: NotificationCategory) -> NotificationPreference {
        match category {
            NotificationCategory::Organizer => {
                NotificationPreference::from_flag(self.organizer_notifications)
            }
            NotificationCategory::System => {
                NotificationPreference::from_flag(self.system_notifications)
            }
        }
    }

    /// The push token to use for `category`, or `None` when the user has no
    /// token or opted out.
    pub fn deliverable_token(&self, category: NotificationCategory) -> Option<&str> {
        if !self.preference(category).allows_delivery() {
            return None;
        }
        self.push_token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(token: Option<&str>, organizer: Option<bool>, system: Option<bool>) -> UserProfile {
        UserProfile {
            id: "u1".into(),
            push_token: token.map(String::from),
            organizer_notifications: organizer,
            system_notifications: system,
        }
    }

    #[test]
    fn test_preference_from_flag() {
        assert_eq!(NotificationPreference::from_flag(Some(true)), NotificationPreference::Enabled);
        assert_eq!(NotificationPreference::from_flag(Some(false)), NotificationPreference::Disabled);
        assert_eq!(NotificationPreference::from_flag(None), NotificationPreference::Unset);
        assert!(NotificationPreference::Unset.allows_delivery());
        assert!(!NotificationPreference::Disabled.allows_delivery());
    }

    #[test]
    fn test_deliverable_token() {
        let unset = profile(Some("tok"), None, None);
        assert_eq!(unset.deliverable_token(NotificationCategory::System), Some("tok"));
        assert_eq!(unset.deliverable_token(NotificationCategory::Organizer), Some("tok"));

        let opted_out = profile(Some("tok"), Some(false), Some(true));
        assert_eq!(opted_out.deliverable_token(NotificationCategory::Organizer), None);
        assert_eq!(opted_out.deliverable_token(NotificationCategory::System), Some("tok"));

        let no_token = profile(None, Some(true), Some(true));
        assert_eq!(no_token.deliverable_token(NotificationCategory::System), None);
    }
}
