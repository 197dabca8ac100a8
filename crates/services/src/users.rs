use std::sync::Arc;

use chrono::Utc;
use domains::{AppError, ContentStore, Result, User};

/// Guest-user bookkeeping.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn ContentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn register_guest(&self, user_agent: Option<&str>) -> Result<User> {
        let guest = User::guest(user_agent, Utc::now());
        self.store.insert_user(guest.clone()).await?;
        tracing::info!(id = %guest.id, "guest user registered");
        Ok(guest)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete_user(id).await? {
            return Err(AppError::not_found("User", id));
        }
        tracing::info!(id, "user deleted");
        Ok(())
    }
}
