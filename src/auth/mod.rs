//! OAuth2 device authorization grant: initiation, polling, state and revocation.

pub mod backend;
pub mod device_code;
pub mod error;
pub mod providers;
pub mod revoker;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod token;

pub use backend::{AuthBackend, TokenTypeHint};
pub use device_code::{DeviceAuthorization, DeviceFlow, FlowState, TokenPoll};
pub use error::AuthError;
pub use revoker::{CredentialRevoker, RevocationResult};
pub use scheduler::{PollHandle, PollPolicy, PollScheduler};
pub use service::{DeviceFlowService, FlowHandle};
pub use store::{FlowStateStore, FlowView};
pub use token::Credential;
