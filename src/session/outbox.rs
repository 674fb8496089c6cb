//! Bounded per-participant outbound queue.
//!
//! Every participant owns one queue. The registry pushes snapshots into it
//! without waiting; the connection's writer task drains it through the
//! paired [`Inbox`]. Because each snapshot replaces the previous one, a full
//! queue either drops its oldest entry or reports overflow so the registry
//! can disconnect the slow participant.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// What to do when a participant's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest queued snapshot to make room.
    #[default]
    DropOldest,
    /// Refuse the snapshot and disconnect the participant.
    Disconnect,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "disconnect" => Ok(OverflowPolicy::Disconnect),
            other => Err(format!("unknown overflow policy '{}'", other)),
        }
    }
}

/// Result of pushing one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest snapshot.
    DroppedOldest,
    /// Queue full under [`OverflowPolicy::Disconnect`]; nothing was queued.
    Overflow,
    /// Queue already closed; nothing was queued.
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<Arc<str>>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

/// Sending half, held by the session registry.
#[derive(Debug, Clone)]
pub struct Outbox {
    shared: Arc<Shared>,
}

/// Receiving half, held by the participant's writer task.
#[derive(Debug)]
pub struct Inbox {
    shared: Arc<Shared>,
}

/// Create a queue holding at most `capacity` snapshots (minimum 1).
pub fn outbox(capacity: usize) -> (Outbox, Inbox) {
    let shared = Arc::new(Shared {
        state: Mutex::new(QueueState::default()),
        notify: Notify::new(),
        capacity: capacity.max(1),
    });
    (
        Outbox {
            shared: Arc::clone(&shared),
        },
        Inbox { shared },
    )
}

impl Outbox {
    /// Queue a snapshot without blocking.
    pub fn push(&self, content: Arc<str>, policy: OverflowPolicy) -> PushOutcome {
        let outcome = {
            let mut state = match self.shared.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.queue.len() >= self.shared.capacity {
                match policy {
                    OverflowPolicy::DropOldest => {
                        state.queue.pop_front();
                        state.queue.push_back(content);
                        PushOutcome::DroppedOldest
                    }
                    OverflowPolicy::Disconnect => return PushOutcome::Overflow,
                }
            } else {
                state.queue.push_back(content);
                PushOutcome::Queued
            }
        };
        self.shared.notify.notify_one();
        outcome
    }

    /// Close the queue and discard anything still pending.
    ///
    /// After this returns the paired inbox yields `None`.
    pub fn close(&self) {
        {
            let mut state = match self.shared.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.closed = true;
            state.queue.clear();
        }
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .state
            .lock()
            .map(|s| s.closed)
            .unwrap_or(true)
    }

    /// Number of snapshots waiting to be written.
    pub fn len(&self) -> usize {
        self.shared.state.lock().map(|s| s.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inbox {
    /// Wait for the next snapshot. Returns `None` once the queue is closed.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            if let Some(next) = self.try_recv() {
                return next;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Non-blocking receive.
    ///
    /// `Some(Some(_))` is a snapshot, `Some(None)` means closed and `None`
    /// means nothing is queued yet.
    pub fn try_recv(&mut self) -> Option<Option<Arc<str>>> {
        let mut state = match self.shared.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.closed {
            return Some(None);
        }
        state.queue.pop_front().map(Some)
    }
}
