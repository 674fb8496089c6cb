//! Collaborative session channel.
//!
//! One session exists per [`SessionKey`] while at least one participant is
//! connected. Participants send whole-document snapshots; the registry hands
//! each snapshot to every other participant's bounded queue. There is no
//! merge: receivers apply the latest snapshot they see.

mod id;
mod key;
mod outbox;
mod registry;

pub use id::ParticipantId;
pub use key::{KeyMode, SessionKey, DEFAULT_FILE};
pub use outbox::{outbox, Inbox, Outbox, OverflowPolicy, PushOutcome};
pub use registry::{
    ChannelConfig, ParticipantHandle, RegistryStats, SessionRegistry, SessionSummary,
    DEFAULT_QUEUE_CAPACITY,
};
