//! Participant identifier type.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for participant ID generation.
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one participant channel.
///
/// IDs come from an atomic counter and are unique within a single process
/// lifetime. A reconnecting client always gets a fresh ID. Displayed as
/// `part-XXXXXXXX` (hexadecimal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Create a new unique participant ID.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a ParticipantId from a raw u64 value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part-{:08x}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = crate::error::CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("part-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(ParticipantId)
            .ok_or_else(|| crate::error::CollabError::ParticipantNotConnected(s.into()))
    }
}
