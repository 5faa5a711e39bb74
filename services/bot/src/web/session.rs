//! services/bot/src/web/session.rs
//!
//! Short-lived per-user conversation state: the intent waiting for a
//! Confirm/Cancel press. Entries expire after a fixed TTL.

use dashmap::DashMap;
use lifeline_core::domain::{Intent, UserId};
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// How often the background sweeper drops expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// An intent parsed from free text, waiting for the user's confirmation.
#[derive(Debug, Clone)]
pub struct PendingIntent {
    /// Ties the confirmation buttons to this exact intent.
    pub token: Uuid,
    pub intent: Intent,
    pub expires_at: Instant,
}

pub struct SessionStore {
    pending: DashMap<UserId, PendingIntent>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    /// Stores `intent` for `user`, replacing anything pending, and returns its token.
    pub fn create(&self, user: UserId, intent: Intent) -> Uuid {
        let token = Uuid::new_v4();
        self.pending.insert(
            user,
            PendingIntent {
                token,
                intent,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Extends the expiry of a live entry. Returns `false` when nothing is pending.
    pub fn refresh(&self, user: UserId) -> bool {
        let now = Instant::now();
        match self.pending.get_mut(&user) {
            Some(mut entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                true
            }
            _ => false,
        }
    }

    /// Removes and returns the pending intent when `token` matches and it has not expired.
    /// A stale token leaves a newer pending intent untouched.
    pub fn take(&self, user: UserId, token: Uuid) -> Option<Intent> {
        let now = Instant::now();
        self.pending
            .remove_if(&user, |_, p| p.token == token)
            .and_then(|(_, p)| (p.expires_at > now).then_some(p.intent))
    }

    /// Drops the user's pending intent. Returns whether there was one.
    pub fn clear(&self, user: UserId) -> bool {
        self.pending.remove(&user).is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|_, p| p.expires_at > now);
        before.saturating_sub(self.pending.len())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sweeps expired entries every [`SWEEP_INTERVAL`] until `cancel` fires.
    pub async fn run_sweeper(&self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.evict_expired();
                    if evicted > 0 {
                        debug!(evicted, "Expired pending intents removed");
                    }
                }
            }
        }
    }
}
