//! Session registry: which participants are connected to which stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::outbox::{outbox, Inbox, Outbox, OverflowPolicy, PushOutcome};
use super::{ParticipantId, SessionKey};
use crate::error::CollabError;
use crate::Result;

/// Default number of snapshots buffered per participant.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Relay behaviour shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Also deliver a snapshot back to the participant that sent it.
    pub echo_to_sender: bool,
    /// Maximum queued snapshots per participant.
    pub queue_capacity: usize,
    /// What happens when a participant's queue is full.
    pub overflow_policy: OverflowPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            echo_to_sender: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

/// A participant's membership in one session.
///
/// Cheap to clone; the registry, not the handle, owns the connection state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantHandle {
    id: ParticipantId,
    key: SessionKey,
}

impl ParticipantHandle {
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

/// Live participants of one session key.
#[derive(Debug)]
struct Session {
    participants: Mutex<HashMap<ParticipantId, Outbox>>,
    created_at: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            participants: Mutex::new(HashMap::new()),
            created_at: Instant::now(),
        }
    }
}

/// Summary of one live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub key: SessionKey,
    pub participants: usize,
    pub age_seconds: f64,
}

/// Relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub connects: u64,
    pub disconnects: u64,
    /// Snapshots handed to a recipient's queue.
    pub deliveries: u64,
    /// Queued snapshots evicted by newer ones.
    pub dropped: u64,
    /// Participants closed because their queue overflowed.
    pub overflow_disconnects: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    connects: AtomicU64,
    disconnects: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
    overflow_disconnects: AtomicU64,
}

/// Thread-safe registry of collaborative sessions.
///
/// Lock order is registry map, then a session's participant table. Joins
/// and leaves take the map's write lock so that creating a session on first
/// connect and discarding it on last disconnect are atomic. Sends only take
/// the read lock long enough to find the session, then fan out under that
/// session's own lock, which keeps each sender's snapshots in issue order.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, Arc<Session>>>,
    config: ChannelConfig,
    stats: AtomicStats,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            stats: AtomicStats::default(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Register a new participant under `key`, creating the session if absent.
    ///
    /// Returns the handle used for [`send`](Self::send) and
    /// [`disconnect`](Self::disconnect), and the inbox the connection drains.
    pub fn connect(&self, key: SessionKey) -> Result<(ParticipantHandle, Inbox)> {
        let id = ParticipantId::new();
        let (tx, rx) = outbox(self.config.queue_capacity);

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| CollabError::LockPoisoned)?;
        let session = sessions.entry(key.clone()).or_insert_with(|| {
            info!(session = %key, "session created");
            Arc::new(Session::new())
        });
        let count = {
            let mut participants = session
                .participants
                .lock()
                .map_err(|_| CollabError::LockPoisoned)?;
            participants.insert(id, tx);
            participants.len()
        };
        drop(sessions);

        self.stats.connects.fetch_add(1, Ordering::Relaxed);
        info!(session = %key, participant = %id, participants = count, "participant joined");

        Ok((ParticipantHandle { id, key }, rx))
    }

    /// Relay `content` to the other participants of the handle's session.
    ///
    /// Returns how many queues accepted the snapshot. With `echo_to_sender`
    /// enabled the sender's own queue counts too.
    pub fn send(&self, handle: &ParticipantHandle, content: &str) -> Result<usize> {
        self.send_with(handle, content, |_| {})
    }

    /// Like [`send`](Self::send), but runs `commit` first under the session's
    /// lock.
    ///
    /// Commits and fan-outs of one session happen in the same order, so
    /// whatever `commit` records always matches the last snapshot every
    /// participant received. `commit` must not call back into the registry.
    pub fn send_with<F>(&self, handle: &ParticipantHandle, content: &str, commit: F) -> Result<usize>
    where
        F: FnOnce(&str),
    {
        let session = {
            let sessions = self
                .sessions
                .read()
                .map_err(|_| CollabError::LockPoisoned)?;
            sessions.get(&handle.key).cloned()
        };
        let session =
            session.ok_or_else(|| CollabError::ParticipantNotConnected(handle.id.to_string()))?;

        let content: Arc<str> = Arc::from(content);
        let policy = self.config.overflow_policy;
        let mut delivered = 0;
        let mut overflowed = Vec::new();
        {
            let mut participants = session
                .participants
                .lock()
                .map_err(|_| CollabError::LockPoisoned)?;
            if !participants.contains_key(&handle.id) {
                return Err(CollabError::ParticipantNotConnected(handle.id.to_string()));
            }
            commit(&content);

            for (id, outbox) in participants.iter() {
                if *id == handle.id && !self.config.echo_to_sender {
                    continue;
                }
                match outbox.push(Arc::clone(&content), policy) {
                    PushOutcome::Queued => delivered += 1,
                    PushOutcome::DroppedOldest => {
                        delivered += 1;
                        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        debug!(session = %handle.key, participant = %id, "dropped stale snapshot");
                    }
                    PushOutcome::Overflow => {
                        outbox.close();
                        overflowed.push(*id);
                    }
                    PushOutcome::Closed => {}
                }
            }

            for id in &overflowed {
                participants.remove(id);
            }
        }

        self.stats
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        debug!(
            session = %handle.key,
            participant = %handle.id,
            bytes = content.len(),
            delivered,
            "snapshot relayed"
        );

        if !overflowed.is_empty() {
            for id in &overflowed {
                warn!(session = %handle.key, participant = %id, "queue overflow, participant disconnected");
            }
            self.stats
                .overflow_disconnects
                .fetch_add(overflowed.len() as u64, Ordering::Relaxed);
            self.stats
                .disconnects
                .fetch_add(overflowed.len() as u64, Ordering::Relaxed);
            self.discard_if_empty(&handle.key, &session)?;
        }

        Ok(delivered)
    }

    /// Remove a participant, discarding its session once empty.
    ///
    /// Idempotent: returns `false` when the handle was already gone.
    pub fn disconnect(&self, handle: &ParticipantHandle) -> Result<bool> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| CollabError::LockPoisoned)?;
        let Some(session) = sessions.get(&handle.key) else {
            return Ok(false);
        };

        let (removed, remaining) = {
            let mut participants = session
                .participants
                .lock()
                .map_err(|_| CollabError::LockPoisoned)?;
            let removed = participants.remove(&handle.id);
            if let Some(outbox) = &removed {
                outbox.close();
            }
            (removed.is_some(), participants.len())
        };

        if remaining == 0 {
            sessions.remove(&handle.key);
            info!(session = %handle.key, "session closed");
        }
        drop(sessions);

        if removed {
            self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
            info!(session = %handle.key, participant = %handle.id, participants = remaining, "participant left");
        }
        Ok(removed)
    }

    fn discard_if_empty(&self, key: &SessionKey, session: &Arc<Session>) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| CollabError::LockPoisoned)?;
        let empty = match sessions.get(key) {
            Some(current) if Arc::ptr_eq(current, session) => current
                .participants
                .lock()
                .map(|p| p.is_empty())
                .map_err(|_| CollabError::LockPoisoned)?,
            _ => false,
        };
        if empty {
            sessions.remove(key);
            info!(session = %key, "session closed");
        }
        Ok(())
    }

    /// Whether a session exists for `key`.
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions
            .read()
            .map(|s| s.contains_key(key))
            .unwrap_or(false)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Number of participants connected under `key`.
    pub fn participant_count(&self, key: &SessionKey) -> usize {
        let session = match self.sessions.read() {
            Ok(sessions) => sessions.get(key).cloned(),
            Err(_) => None,
        };
        session
            .and_then(|s| s.participants.lock().map(|p| p.len()).ok())
            .unwrap_or(0)
    }

    /// List live session keys.
    pub fn keys(&self) -> Result<Vec<SessionKey>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| CollabError::LockPoisoned)?;
        Ok(sessions.keys().cloned().collect())
    }

    /// Summaries of every live session, sorted by key.
    pub fn summaries(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| CollabError::LockPoisoned)?;
        let mut out = Vec::with_capacity(sessions.len());
        for (key, session) in sessions.iter() {
            let participants = session
                .participants
                .lock()
                .map_err(|_| CollabError::LockPoisoned)?
                .len();
            out.push(SessionSummary {
                key: key.clone(),
                participants,
                age_seconds: session.created_at.elapsed().as_secs_f64(),
            });
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    /// Snapshot of the relay counters.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            connects: self.stats.connects.load(Ordering::Relaxed),
            disconnects: self.stats.disconnects.load(Ordering::Relaxed),
            deliveries: self.stats.deliveries.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            overflow_disconnects: self.stats.overflow_disconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}
