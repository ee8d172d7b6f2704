//! Authorization-server backends.

pub mod keycloak;

pub use keycloak::{AuthEndpoints, KeycloakBackend};
