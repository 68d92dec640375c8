use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::models::collections;
use crate::store::{with_timeout, DocumentStore, Filter, StoreError, LOOKUP_TIMEOUT};

/// Persists the latest issued token pair per user identity.
///
/// Every login supersedes the previous pair; concurrent logins by the
/// same user race harmlessly to last-write-wins.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn DocumentStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Overwrite the stored pair for the identity, stamping an update
    /// timestamp. Creates the record if absent.
    pub async fn save_token_pair(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), StoreError> {
        let filter = Filter::new().eq("user_id", user_id);
        let patch = json!({
            "token": access_token,
            "refresh_token": refresh_token,
            "updated_at": Utc::now(),
        });

        with_timeout(
            LOOKUP_TIMEOUT,
            self.store.update_one(collections::USERS, &filter, patch, true),
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn creates_record_when_absent() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(store.clone());

        sessions
            .save_token_pair("u1", "access-1", "refresh-1")
            .await
            .expect("save");

        let doc = store
            .find_one(collections::USERS, &Filter::new().eq("user_id", "u1"))
            .await
            .unwrap()
            .expect("record created");
        assert_eq!(doc["token"], "access-1");
        assert_eq!(doc["refresh_token"], "refresh-1");
        assert!(doc["updated_at"].is_string());
    }

    #[tokio::test]
    async fn later_login_supersedes_pair() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(store.clone());

        sessions
            .save_token_pair("u1", "access-1", "refresh-1")
            .await
            .expect("first save");
        sessions
            .save_token_pair("u1", "access-2", "refresh-2")
            .await
            .expect("second save");

        let docs = store
            .find_many(collections::USERS, &Filter::new().eq("user_id", "u1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["token"], "access-2");
        assert_eq!(docs[0]["refresh_token"], "refresh-2");
    }
}
