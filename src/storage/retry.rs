//! Retry adapter for transient store failures

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};

use super::{SessionStore, StoreError};
use crate::core::config::store::{max_delay, min_delay};
use crate::session::SessionRecord;

/// Wraps a [`SessionStore`] and retries failures that [`StoreError::is_retryable`]
/// accepts, with jittered exponential backoff.
pub struct RetryingStore<S> {
    inner: S,
    backoff: ExponentialBuilder,
}

impl<S: SessionStore> RetryingStore<S> {
    /// `max_retries` counts attempts after the first one; 0 disables retrying.
    pub fn new(inner: S, max_retries: usize) -> Self {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(min_delay())
            .with_max_delay(max_delay())
            .with_max_times(max_retries)
            .with_jitter();
        Self { inner, backoff }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn log_retry(op: &'static str) -> impl FnMut(&StoreError, std::time::Duration) {
    move |err, delay| {
        tracing::warn!(op, error = %err, delay_ms = delay.as_millis() as u64, "Session store failed, retrying");
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for RetryingStore<S> {
    async fn read(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        (|| self.inner.read(user_id))
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(StoreError::is_retryable)
            .notify(log_retry("read"))
            .await
    }

    async fn write(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        (|| self.inner.write(user_id, record))
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(StoreError::is_retryable)
            .notify(log_retry("write"))
            .await
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        (|| self.inner.list_user_ids())
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(StoreError::is_retryable)
            .notify(log_retry("list"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls with the error produced by `make_err`.
    struct FlakyStore {
        inner: MemorySessionStore,
        failures: usize,
        calls: AtomicUsize,
        make_err: fn() -> StoreError,
    }

    impl FlakyStore {
        fn new(failures: usize, make_err: fn() -> StoreError) -> Self {
            Self {
                inner: MemorySessionStore::new(),
                failures,
                calls: AtomicUsize::new(0),
                make_err,
            }
        }

        fn trip(&self) -> Result<(), StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err((self.make_err)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn read(&self, user_id: &str) -> Result<Option<SessionRecord>, StoreError> {
            self.trip()?;
            self.inner.read(user_id).await
        }

        async fn write(&self, user_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
            self.trip()?;
            self.inner.write(user_id, record).await
        }

        async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
            self.trip()?;
            self.inner.list_user_ids().await
        }
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable("locked".to_string())
    }

    fn migration() -> StoreError {
        StoreError::Migration("broken".to_string())
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let store = RetryingStore::new(FlakyStore::new(2, unavailable), 3);
        store.write("1", &SessionRecord::default()).await.unwrap();
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let store = RetryingStore::new(FlakyStore::new(10, unavailable), 2);
        let err = store.read("1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let store = RetryingStore::new(FlakyStore::new(10, migration), 3);
        assert!(store.list_user_ids().await.is_err());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
    }
}
