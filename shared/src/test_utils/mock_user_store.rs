use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::UserProfile;
use crate::store::UserStore;

#[derive(Default)]
pub struct MockUserStore {
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl MockUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    /// Adds a user with a push token derived from the id and no preference
    /// flags set.
    pub fn insert_with_token(&self, id: &str) {
        self.insert(UserProfile {
            id: id.to_string(),
            push_token: Some(token_for(id)),
            ..Default::default()
        });
    }
}

/// The token [`MockUserStore::insert_with_token`] assigns to `user_id`.
pub fn token_for(user_id: &str) -> String {
    format!("ExponentPushToken[{}]", user_id)
}

#[async_trait]
impl UserStore for MockUserStore {
    async fn get_profiles(&self, ids: &[String]) -> Result<Vec<UserProfile>, StoreError> {
        let profiles = self.profiles.lock().unwrap();
        let mut found: Vec<UserProfile> = Vec::new();
        for id in ids {
            if found.iter().any(|p| &p.id == id) {
                continue;
            }
            if let Some(profile) = profiles.get(id) {
                found.push(profile.clone());
            }
        }
        Ok(found)
    }
}
