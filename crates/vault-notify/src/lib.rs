#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vault-notify** – Maintains the set of active streaming subscribers and
//! fans out best-effort, coalescing wake signals to them on mutation.
//!
//! Grounded on `toka-bus-core`'s pub/sub shape, reworked per the vault
//! design notes: a `dashmap`-sharded `{username -> {handle -> wake}}` map
//! (so `publish` costs O(#subscribers for that user), not O(#total
//! subscribers) the way a single broadcast channel would), and a
//! capacity-1 wake channel instead of a ring buffer, so a slow subscriber
//! observes "you may be stale" rather than a backlog of stale deltas.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Capacity of each subscriber's wake channel. One pending wake is all a
/// subscriber ever needs to know "go re-read your inventory" — additional
/// publishes before it drains are coalesced into that one wake.
const WAKE_CHANNEL_CAPACITY: usize = 1;

/// Opaque identity of one live subscription.
pub type SubscriptionHandle = Uuid;

/// The receiving half of a subscription's wake channel.
pub type WakeReceiver = mpsc::Receiver<()>;

/// Registry of live streaming subscribers, keyed by owning username.
///
/// Every subscription's wake channel and registry entry is released on
/// every exit path by calling [`Registry::unsubscribe`] — callers are
/// expected to do this in a `finally`-style guard (e.g. inside the
/// subscription loop's `Drop` path) so a panicking handler never leaks a
/// slot.
#[derive(Default)]
pub struct Registry {
    by_user: DashMap<String, DashMap<SubscriptionHandle, mpsc::Sender<()>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscription for `username`, returning its handle and
    /// the receiving half of its wake channel.
    pub fn subscribe(&self, username: &str) -> (SubscriptionHandle, WakeReceiver) {
        let (tx, rx) = mpsc::channel(WAKE_CHANNEL_CAPACITY);
        let handle = Uuid::new_v4();

        self.by_user
            .entry(username.to_owned())
            .or_default()
            .insert(handle, tx);

        tracing::trace!(username, %handle, "subscribed");
        (handle, rx)
    }

    /// Remove a subscription. Safe to call more than once for the same
    /// handle, or for a handle that was never registered.
    pub fn unsubscribe(&self, username: &str, handle: SubscriptionHandle) {
        if let Some(subs) = self.by_user.get(username) {
            subs.remove(&handle);
        }
        // Drop the now-possibly-empty per-user shard so a long-gone user
        // doesn't leave an empty map sitting in the registry forever.
        self.by_user.remove_if(username, |_, subs| subs.is_empty());
        tracing::trace!(username, %handle, "unsubscribed");
    }

    /// Wake every live subscriber of `username`. Never blocks, never fails:
    /// a full wake channel means that subscriber already has a pending
    /// wake and this publish is coalesced into it; a closed channel means
    /// the subscriber is already tearing down and the publish is dropped.
    ///
    /// This never touches any other user's subscriptions — mutations by
    /// `u1` cannot cause a subscriber of `u2` to be woken.
    pub fn publish(&self, username: &str) {
        let Some(subs) = self.by_user.get(username) else { return };
        for entry in subs.iter() {
            let _ = entry.value().try_send(());
        }
    }

    /// Number of live subscriptions across all users (for tests/metrics).
    pub fn subscriber_count(&self) -> usize {
        self.by_user.iter().map(|s| s.len()).sum()
    }

    /// Number of live subscriptions for a single user (for tests/metrics).
    pub fn subscriber_count_for(&self, username: &str) -> usize {
        self.by_user.get(username).map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_wakes_only_subscribers_of_that_user() {
        let registry = Registry::new();
        let (alice_handle, mut alice_rx) = registry.subscribe("alice");
        let (_bob_handle, mut bob_rx) = registry.subscribe("bob");

        registry.publish("alice");

        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_err());

        registry.unsubscribe("alice", alice_handle);
    }

    #[tokio::test]
    async fn concurrent_publishes_before_drain_are_coalesced() {
        let registry = Registry::new();
        let (_handle, mut rx) = registry.subscribe("alice");

        registry.publish("alice");
        registry.publish("alice");
        registry.publish("alice");

        // Exactly one pending wake, no matter how many publishes landed
        // before the subscriber drained it.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_removes_entry_and_is_idempotent() {
        let registry = Registry::new();
        let (handle, _rx) = registry.subscribe("alice");
        assert_eq!(registry.subscriber_count_for("alice"), 1);

        registry.unsubscribe("alice", handle);
        assert_eq!(registry.subscriber_count_for("alice"), 0);

        // Calling unsubscribe again (e.g. from both a cancel path and a
        // send-failure path) must not panic.
        registry.unsubscribe("alice", handle);
    }

    #[tokio::test]
    async fn publish_for_unknown_user_is_a_harmless_no_op() {
        let registry = Registry::new();
        registry.publish("nobody-subscribed");
    }

    #[tokio::test]
    async fn multiple_subscribers_for_same_user_all_wake() {
        let registry = Registry::new();
        let (_h1, mut rx1) = registry.subscribe("alice");
        let (_h2, mut rx2) = registry.subscribe("alice");

        registry.publish("alice");

        tokio::time::timeout(Duration::from_millis(100), rx1.recv())
            .await
            .expect("rx1 should have received a wake")
            .expect("channel should still be open");
        tokio::time::timeout(Duration::from_millis(100), rx2.recv())
            .await
            .expect("rx2 should have received a wake")
            .expect("channel should still be open");
    }
}
