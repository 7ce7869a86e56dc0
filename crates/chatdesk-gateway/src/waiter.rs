use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::select_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::dispatcher::{Dispatcher, Subscription};

/// Grace period before the first check; updates rarely arrive faster.
pub const INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_CHECKS: u32 = 30;
pub const MAX_WAITERS: usize = 1024;

/// Read access to a conversation's `last_edit`.
#[async_trait]
pub trait EditReader: Send + Sync + 'static {
    /// `None` when the conversation does not exist.
    async fn last_edit(&self, conversation_id: &str) -> anyhow::Result<Option<DateTime<Utc>>>;
}

#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Re-checks after the first one before giving up.
    pub max_checks: u32,
    /// Long-polls allowed in flight at once.
    pub max_waiters: usize,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
            poll_interval: POLL_INTERVAL,
            max_checks: MAX_CHECKS,
            max_waiters: MAX_WAITERS,
        }
    }
}

impl WaitConfig {
    /// Upper bound on how long a single wait can block.
    pub fn max_wait(&self) -> Duration {
        self.initial_delay + self.poll_interval * self.max_checks
    }
}

/// A conversation and the `last_edit` the client already has.
#[derive(Debug, Clone)]
pub struct Watch {
    pub conversation_id: String,
    pub last_known_edit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub conversation_id: String,
    pub last_edit: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Updated,
    /// The check bound ran out. Not an error: the snapshots are current.
    TimedOut,
}

#[derive(Debug)]
pub struct WaitResult {
    pub outcome: WaitOutcome,
    /// One per watch, same order.
    pub snapshots: Vec<Snapshot>,
    pub checks: u32,
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("too many update requests in flight")]
    Busy,
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Blocks update requests until a watched conversation changes or the
/// check bound is exhausted.
///
/// Checks happen once after `initial_delay`, then every `poll_interval`,
/// at most `max_checks` more times. A publish on the [`Dispatcher`] for a
/// watched conversation triggers an extra check right away. Dropping the
/// future cancels the wait and frees its slot.
pub struct Waiter<R> {
    reader: Arc<R>,
    dispatcher: Dispatcher,
    config: WaitConfig,
    permits: Arc<Semaphore>,
}

impl<R> Clone for Waiter<R> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config,
            permits: self.permits.clone(),
        }
    }
}

impl<R: EditReader> Waiter<R> {
    pub fn new(reader: Arc<R>, dispatcher: Dispatcher, config: WaitConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_waiters));
        Self {
            reader,
            dispatcher,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn wait_for_update(
        &self,
        conversation_id: &str,
        last_known_edit: Option<DateTime<Utc>>,
    ) -> Result<WaitResult, WaitError> {
        self.wait_for_any(&[Watch {
            conversation_id: conversation_id.to_string(),
            last_known_edit,
        }])
        .await
    }

    /// Wait until any watched conversation's `last_edit` differs from what
    /// the client knows. A watch with no known edit returns immediately.
    pub async fn wait_for_any(&self, watches: &[Watch]) -> Result<WaitResult, WaitError> {
        if watches.is_empty() {
            return Ok(WaitResult {
                outcome: WaitOutcome::TimedOut,
                snapshots: Vec::new(),
                checks: 0,
            });
        }

        let _permit = self.permits.clone().try_acquire_owned().map_err(|_| {
            warn!("Long-poll rejected: {} waiters already in flight", self.config.max_waiters);
            WaitError::Busy
        })?;

        // Subscribe before the first read so an append that commits between
        // a read and the next sleep still wakes us.
        let mut subscriptions: Vec<Subscription> = watches
            .iter()
            .map(|w| self.dispatcher.subscribe(&w.conversation_id))
            .collect();

        if watches.iter().any(|w| w.last_known_edit.is_none()) {
            let snapshots = self.read(watches).await?;
            return Ok(WaitResult {
                outcome: WaitOutcome::Updated,
                snapshots,
                checks: 1,
            });
        }

        let started = Instant::now();
        let mut next_tick = started + self.config.initial_delay;
        let mut ticks = 0u32;
        let mut checks = 0u32;

        loop {
            let woken = tokio::select! {
                _ = sleep_until(next_tick) => false,
                _ = any_changed(&mut subscriptions) => true,
            };

            let snapshots = self.read(watches).await?;
            checks += 1;

            if is_updated(watches, &snapshots) {
                debug!("Long-poll saw an update after {:?} ({} checks)", started.elapsed(), checks);
                return Ok(WaitResult {
                    outcome: WaitOutcome::Updated,
                    snapshots,
                    checks,
                });
            }

            if !woken {
                if ticks >= self.config.max_checks {
                    debug!("Long-poll timed out after {} checks", checks);
                    return Ok(WaitResult {
                        outcome: WaitOutcome::TimedOut,
                        snapshots,
                        checks,
                    });
                }
                ticks += 1;
                next_tick += self.config.poll_interval;
            }
        }
    }

    async fn read(&self, watches: &[Watch]) -> Result<Vec<Snapshot>, WaitError> {
        let mut snapshots = Vec::with_capacity(watches.len());
        for watch in watches {
            let last_edit = self
                .reader
                .last_edit(&watch.conversation_id)
                .await?
                .ok_or_else(|| WaitError::NotFound(watch.conversation_id.clone()))?;
            snapshots.push(Snapshot {
                conversation_id: watch.conversation_id.clone(),
                last_edit,
            });
        }
        Ok(snapshots)
    }
}

fn is_updated(watches: &[Watch], snapshots: &[Snapshot]) -> bool {
    watches
        .iter()
        .zip(snapshots)
        .any(|(w, s)| w.last_known_edit != Some(s.last_edit))
}

/// Resolves when any subscription sees a change. `subscriptions` must be non-empty.
async fn any_changed(subscriptions: &mut [Subscription]) {
    select_all(subscriptions.iter_mut().map(|s| Box::pin(s.changed()))).await;
}
