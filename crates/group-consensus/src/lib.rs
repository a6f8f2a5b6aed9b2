pub mod bus;
pub mod clock;
pub mod engine;
pub mod error;
pub mod message_id;
pub mod model;
pub mod quorum;
pub mod sync_strategy;

pub use bus::{Bus, BusError, Envelope};
pub use clock::VectorClock;
pub use engine::{GroupEngine, SyncRequest, SyncResponse};
pub use error::GroupError;
pub use message_id::compute_message_id;
pub use model::{Group, GroupMember, GroupMessage, GroupSettings, MessageStatus, Role, Vote};
pub use sync_strategy::{SmartSyncStrategy, SyncConfig, SyncError, SyncFuture, SyncStrategy};
