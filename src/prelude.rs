//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthBackend, AuthError, Credential, DeviceFlow, DeviceFlowService, FlowHandle, FlowState,
    FlowStateStore, FlowView, RevocationResult, TokenPoll,
};
pub use crate::config::DeviceGrantConfig;
pub use crate::error::{DeviceGrantError, Result};
