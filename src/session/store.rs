// Session store
// Concurrent map of hashed session keys to per-record mutexes, with TTL and
// capacity cleanup that is safe to run alongside live traffic.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use super::clock::{Clock, MonotonicClock};
use super::record::{SessionRecord, SessionSummary, Turn};
use crate::errors::SessionError;

/// Times a writer re-resolves a record that was evicted under it
const MAX_RESOLVE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is dropped
    pub ttl_hours: u64,
    /// Soft upper bound on live sessions
    pub max_sessions: usize,
    /// Turns retained per session
    pub max_turns: usize,
    /// Background cleanup period
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            max_sessions: 10_000,
            max_turns: 100,
            cleanup_interval_secs: 300,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours as i64)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// A resolved session: its hashed key and shared record
#[derive(Clone)]
pub struct SessionHandle {
    key: String,
    record: Arc<Mutex<SessionRecord>>,
}

impl SessionHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, SessionRecord>, SessionError> {
        self.record
            .lock()
            .map_err(|_| SessionError::Poisoned(self.key.clone()))
    }
}

pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<SessionRecord>>>,
    salt: String,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            salt: Uuid::new_v4().to_string(),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Salted hash of a caller-supplied identifier. Raw identifiers are never
    /// stored or logged.
    pub fn key_for(&self, session_id: &str) -> String {
        self.salted_hash("session", session_id)
    }

    /// Salted hash of a message, the only trace of its text that is kept
    pub fn hash_message(&self, text: &str) -> String {
        self.salted_hash("message", text)
    }

    fn salted_hash(&self, domain: &str, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(b":");
        hasher.update(domain.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get or create a session
    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let key = self.key_for(session_id);

        if let Some(record) = self.sessions.get(&key) {
            return SessionHandle {
                key,
                record: Arc::clone(record.value()),
            };
        }

        // Make room before inserting so the map stays near its bound
        if self.sessions.len() >= self.config.max_sessions {
            self.evict_over_capacity(self.config.max_sessions.saturating_sub(1));
        }

        let now = self.clock.now();
        let max_turns = self.config.max_turns;
        let record = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::info!(session = %short(&key), "Created new session");
                Arc::new(Mutex::new(SessionRecord::new(key.clone(), now, max_turns)))
            })
            .value()
            .clone();

        SessionHandle { key, record }
    }

    /// Run `f` on the live record for `session_id` while holding its lock.
    ///
    /// The lock is held for the whole call, so every read-assess-append
    /// sequence for one session is linearized. If cleanup evicted the record
    /// between lookup and lock, a fresh record is resolved instead.
    pub fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionRecord, DateTime<Utc>) -> T,
    ) -> Result<T, SessionError> {
        for attempt in 0..MAX_RESOLVE_ATTEMPTS {
            let handle = self.get_or_create(session_id);
            let mut record = handle.lock()?;

            if record.is_retired() {
                tracing::debug!(
                    session = %short(handle.key()),
                    attempt,
                    "Session retired during lookup, re-resolving"
                );
                continue;
            }

            let now = self.clock.now();
            return Ok(f(&mut *record, now));
        }

        Err(SessionError::Evicted(short(&self.key_for(session_id)).to_string()))
    }

    /// Append a turn to a session, creating it if needed
    pub fn append_turn(&self, session_id: &str, turn: Turn) -> Result<(), SessionError> {
        self.with_session(session_id, |record, now| record.append_turn(turn, now))
    }

    /// Read a session without creating or touching it.
    ///
    /// A record poisoned by an earlier panic is still readable here; its
    /// history is needed to fail safe.
    pub fn peek<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&SessionRecord) -> T,
    ) -> Result<T, SessionError> {
        let key = self.key_for(session_id);
        let record = self
            .sessions
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::UnknownSession(short(&key).to_string()))?;

        let guard = record.lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&*guard))
    }

    /// Clear the poison left on a record by a writer that panicked while
    /// holding its lock, so later turns are scored again. Returns whether the
    /// record was poisoned.
    pub fn recover(&self, session_id: &str) -> bool {
        let key = self.key_for(session_id);
        let Some(record) = self.sessions.get(&key).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };
        if !record.is_poisoned() {
            return false;
        }

        record.clear_poison();
        tracing::warn!(session = %short(&key), "Recovered session poisoned by a panicked writer");
        true
    }

    pub fn snapshot(&self, session_id: &str) -> Result<SessionSummary, SessionError> {
        self.peek(session_id, |record| record.summary())
    }

    /// Delete a session
    pub fn remove(&self, session_id: &str) -> bool {
        let key = self.key_for(session_id);
        match self.sessions.remove(&key) {
            Some((_, record)) => {
                record.lock().unwrap_or_else(|e| e.into_inner()).retire();
                tracing::info!(session = %short(&key), "Removed session");
                true
            }
            None => false,
        }
    }

    /// Get active session count
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop idle and over-capacity sessions, returning how many were removed.
    ///
    /// Records locked by an in-flight turn are skipped. A record is only
    /// removed if, under its own lock, it is still expired and was not touched
    /// after the sweep started.
    pub fn cleanup(&self) -> usize {
        let sweep_started = self.clock.now();
        let ttl = self.config.ttl();

        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                try_lock(entry.value())
                    .map_or(false, |record| record.is_expired(sweep_started, ttl))
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            let evicted = self.sessions.remove_if(&key, |_, record| {
                try_lock(record).map_or(false, |mut record| {
                    let still_idle = record.last_active_at() <= sweep_started
                        && record.is_expired(sweep_started, ttl);
                    if still_idle {
                        record.retire();
                    }
                    still_idle
                })
            });
            if evicted.is_some() {
                removed += 1;
                tracing::debug!(session = %short(&key), "Removed expired session");
            }
        }

        removed += self.evict_over_capacity(self.config.max_sessions);

        if removed > 0 {
            tracing::info!(
                removed,
                active = self.sessions.len(),
                "Cleaned up sessions"
            );
        }
        removed
    }

    /// Evict least recently active sessions until at most `limit` remain.
    /// Locked records are never chosen, so the bound is soft under load.
    fn evict_over_capacity(&self, limit: usize) -> usize {
        if self.sessions.len() <= limit {
            return 0;
        }

        let mut candidates: Vec<(DateTime<Utc>, String)> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                let last_active = try_lock(entry.value())?.last_active_at();
                Some((last_active, entry.key().clone()))
            })
            .collect();
        candidates.sort();

        let mut removed = 0;
        for (_, key) in candidates {
            if self.sessions.len() <= limit {
                break;
            }
            let evicted = self.sessions.remove_if(&key, |_, record| {
                try_lock(record).map_or(false, |mut record| {
                    record.retire();
                    true
                })
            });
            if evicted.is_some() {
                removed += 1;
                tracing::debug!(session = %short(&key), "Evicted session over capacity");
            }
        }
        removed
    }

    /// Start background cleanup task
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.cleanup();
            }
        })
    }
}

/// Lock a record without waiting. Poisoned records are still inspected so
/// cleanup can reclaim them.
fn try_lock(record: &Mutex<SessionRecord>) -> Option<MutexGuard<'_, SessionRecord>> {
    match record.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Key prefix used in logs and errors
fn short(key: &str) -> &str {
    &key[..key.len().min(12)]
}
