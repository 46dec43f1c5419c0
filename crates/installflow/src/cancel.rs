//! Cooperative cancellation of running jobs.
//!
//! A request-serving process sets a keyed flag; the worker running the job
//! reads it between steps. The flag lives in a [`CancellationStore`] injected
//! at construction, never in process-global state.

use async_trait::async_trait;
use installflow_core::{CancellationStore, FlowError, RunId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::FlowConfig;

/// Cancellation flags for runs, keyed by `<prefix><run id>`.
#[derive(Clone)]
pub struct CancellationSignal {
    store: Arc<dyn CancellationStore>,
    prefix: String,
    ttl: Option<Duration>,
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CancellationSignal {
    /// Creates a signal over `store` using the key prefix and TTL from `config`.
    pub fn new(store: Arc<dyn CancellationStore>, config: &FlowConfig) -> Self {
        Self {
            store,
            prefix: config.cancel_key_prefix.clone(),
            ttl: config.cancel_ttl,
        }
    }

    /// The key a run's flag is stored under.
    ///
    /// ```
    /// use installflow::{CancellationSignal, FlowConfig, MemoryCancellationStore};
    /// use installflow::RunId;
    /// use std::sync::Arc;
    ///
    /// let signal = CancellationSignal::new(
    ///     Arc::new(MemoryCancellationStore::new()),
    ///     &FlowConfig::default(),
    /// );
    /// assert_eq!(signal.key(RunId::new(42)), "cancel-job-42");
    /// ```
    pub fn key(&self, run: RunId) -> String {
        format!("{}{}", self.prefix, run)
    }

    /// Asks the worker running `run` to stop before its next step.
    pub async fn request(&self, run: RunId) -> Result<(), FlowError> {
        let key = self.key(run);
        self.store.set_flag(&key, self.ttl).await?;
        info!(run = %run, key = %key, "Cancellation requested");
        Ok(())
    }

    pub async fn is_requested(&self, run: RunId) -> Result<bool, FlowError> {
        self.store.get_flag(&self.key(run)).await
    }

    /// Removes the flag once the cancellation has been observed.
    pub async fn clear(&self, run: RunId) -> Result<(), FlowError> {
        let key = self.key(run);
        self.store.delete_flag(&key).await?;
        debug!(run = %run, key = %key, "Cancellation cleared");
        Ok(())
    }
}

struct Flag {
    expires_at: Option<Instant>,
}

impl Flag {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process [`CancellationStore`] for single-node deployments and tests.
///
/// Expired flags read as unset and are dropped on the next write.
#[derive(Default)]
pub struct MemoryCancellationStore {
    flags: RwLock<HashMap<String, Flag>>,
}

impl MemoryCancellationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CancellationStore for MemoryCancellationStore {
    async fn get_flag(&self, key: &str) -> Result<bool, FlowError> {
        let flags = self.flags.read().await;
        Ok(flags
            .get(key)
            .is_some_and(|flag| flag.is_live(Instant::now())))
    }

    async fn set_flag(&self, key: &str, ttl: Option<Duration>) -> Result<(), FlowError> {
        let now = Instant::now();
        let mut flags = self.flags.write().await;
        flags.retain(|_, flag| flag.is_live(now));
        flags.insert(
            key.to_string(),
            Flag {
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    async fn delete_flag(&self, key: &str) -> Result<(), FlowError> {
        self.flags.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn signal(ttl: Option<Duration>) -> CancellationSignal {
        let config = FlowConfig::default().with_cancel_ttl(ttl);
        CancellationSignal::new(Arc::new(MemoryCancellationStore::new()), &config)
    }

    #[tokio::test]
    async fn test_absent_key_is_not_cancelled() {
        let signal = signal(None);
        assert!(!signal.is_requested(RunId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_request_and_clear() {
        let signal = signal(None);
        let run = RunId::new(7);

        assert_ok!(signal.request(run).await);
        assert!(signal.is_requested(run).await.unwrap());
        assert!(!signal.is_requested(RunId::new(8)).await.unwrap());

        assert_ok!(signal.clear(run).await);
        assert!(!signal.is_requested(run).await.unwrap());
        // clearing twice is harmless
        assert_ok!(signal.clear(run).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_flag_reads_unset() {
        let signal = signal(Some(Duration::from_secs(3600)));
        let run = RunId::new(3);

        signal.request(run).await.unwrap();
        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(signal.is_requested(run).await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!signal.is_requested(run).await.unwrap());
    }

    #[test]
    fn test_custom_prefix() {
        let config = FlowConfig::default().with_cancel_key_prefix("stop:");
        let signal = CancellationSignal::new(Arc::new(MemoryCancellationStore::new()), &config);
        assert_eq!(signal.key(RunId::new(5)), "stop:5");
    }
}
