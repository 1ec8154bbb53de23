//! In-process session store for tests and throwaway deployments

use async_trait::async_trait;
use dashmap::DashMap;

use super::{SessionStore, StoreError};
use crate::session::SessionRecord;

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn write(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        self.sessions.insert(user_id.to_string(), record.clone());
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_write_overwrites_and_lists_sorted() {
        let store = MemorySessionStore::new();
        assert!(store.is_empty());

        store.write("b", &SessionRecord::default()).await.unwrap();
        let record = SessionRecord {
            cookies: "c".to_string(),
            ..Default::default()
        };
        store.write("a", &SessionRecord::default()).await.unwrap();
        store.write("a", &record).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.read("a").await.unwrap(), Some(record));
        assert_eq!(store.list_user_ids().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.read("c").await.unwrap().is_none());
    }
}
