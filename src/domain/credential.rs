//! Short-lived AWX bearer credential.

use std::fmt;

/// A personal access token minted for a single orchestration attempt.
///
/// Deliberately not `Clone`: revocation takes the credential by value, so a
/// token can only be revoked once and cannot be reused afterwards.
pub struct DownstreamCredential {
    id: u64,
    token: String,
}

impl DownstreamCredential {
    pub fn new(id: u64, token: impl Into<String>) -> Self {
        Self {
            id,
            token: token.into(),
        }
    }

    /// AWX token id, used for the revoke call
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bearer value for the Authorization header
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for DownstreamCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownstreamCredential")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .finish()
    }
}
