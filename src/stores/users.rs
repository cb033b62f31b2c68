use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::models::{User, UserId};
use crate::persistence::Snapshots;

/// Registered buyers keyed by chat id. Registration is an idempotent
/// overwrite; there is no deletion.
pub struct UserRegistry {
    users: DashMap<UserId, User>,
    snapshots: Arc<Snapshots>,
}

impl UserRegistry {
    pub fn load(snapshots: Arc<Snapshots>) -> Self {
        let users = DashMap::new();
        for (user_id, user) in snapshots.load_users() {
            users.insert(user_id, user);
        }
        Self { users, snapshots }
    }

    pub fn register(&self, user_id: UserId, name: &str, phone: &str) -> User {
        let user = User::new(user_id, name, phone);
        self.users.insert(user_id, user.clone());
        self.flush();
        user
    }

    pub fn get(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|user| user.clone())
    }

    fn flush(&self) {
        let snapshot: HashMap<UserId, User> = self
            .users
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        if let Err(e) = self.snapshots.save_users(&snapshot) {
            warn!(error = %e, "user flush failed, keeping in-memory state");
        }
    }
}
