use std::collections::HashMap;
use std::future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

/// Wakes long-poll waiters when a conversation changes.
///
/// Each watched conversation owns a `watch` channel carrying a version
/// counter. Appending a message bumps the counter; waiters subscribed to
/// that conversation re-check storage immediately instead of waiting for
/// their next poll tick. Entries exist only while someone is subscribed.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// conversation_id -> version sender
    conversations: Mutex<HashMap<String, watch::Sender<u64>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn conversations(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<u64>>> {
        // The map holds no invariant a panicking holder could break.
        self.inner
            .conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start watching a conversation. Only changes published after this
    /// call wake the returned subscription.
    pub fn subscribe(&self, conversation_id: &str) -> Subscription {
        let mut conversations = self.conversations();
        let rx = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe();

        Subscription {
            conversation_id: conversation_id.to_string(),
            rx: Some(rx),
            dispatcher: self.clone(),
        }
    }

    /// Signal that a conversation changed. Returns whether anyone was watching.
    pub fn publish(&self, conversation_id: &str) -> bool {
        match self.conversations().get(conversation_id) {
            Some(tx) => {
                tx.send_modify(|version| *version = version.wrapping_add(1));
                true
            }
            None => false,
        }
    }

    /// Number of conversations with at least one live subscription.
    pub fn watched_conversations(&self) -> usize {
        self.conversations().len()
    }

    fn release(&self, conversation_id: &str, rx: watch::Receiver<u64>) {
        let mut conversations = self.conversations();
        drop(rx);
        if conversations
            .get(conversation_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            conversations.remove(conversation_id);
        }
    }
}

/// A waiter's interest in one conversation. Dropping it unsubscribes.
pub struct Subscription {
    conversation_id: String,
    rx: Option<watch::Receiver<u64>>,
    dispatcher: Dispatcher,
}

impl Subscription {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Resolves on the next published change. Never resolves if the
    /// channel is gone, so callers fall back to their poll timer.
    pub async fn changed(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.changed().await.is_ok() {
                return;
            }
        }
        future::pending::<()>().await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(rx) = self.rx.take() {
            self.dispatcher.release(&self.conversation_id, rx);
        }
    }
}
