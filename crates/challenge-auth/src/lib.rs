pub mod authenticator;
pub mod canonical;
pub mod error;
pub mod model;

pub use authenticator::ChallengeAuthenticator;
pub use error::ChallengeError;
pub use model::{ChallengePayload, ChallengeRecord, IndexedSignature};
