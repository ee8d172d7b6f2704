use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials issued once a device flow is approved.
///
/// Held in memory by the flow store only; never written to disk.
///
/// # Example
/// ```no_run
/// use device_grant::auth::Credential;
/// use chrono::Utc;
///
/// let credential = Credential {
///     access_token: "access".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     id_token: None,
///     expires_at: None,
///     issued_at: Utc::now(),
///     scopes: Some(vec!["openid".to_string()]),
/// };
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
    pub scopes: Option<Vec<String>>,
}

impl Credential {
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"..")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| ".."))
            .field("id_token", &self.id_token.as_ref().map(|_| ".."))
            .field("expires_at", &self.expires_at)
            .field("issued_at", &self.issued_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}
