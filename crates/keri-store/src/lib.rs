//! KERI event storage: SAID computation, KEL/TEL event types, ACDC
//! containers, key-state snapshots, and the `EventStore` that admits and
//! indexes them.

pub mod acdc;
pub mod error;
pub mod kel;
pub mod key_state;
pub mod said;
pub mod store;
pub mod tel;

pub use acdc::Acdc;
pub use error::StoreError;
pub use kel::{KelEvent, KelEventKind};
pub use key_state::KeyStateRecord;
pub use said::{compute_said, digest_bytes, verify_said, SaidField};
pub use store::EventStore;
pub use tel::{TelEvent, TelEventKind};
