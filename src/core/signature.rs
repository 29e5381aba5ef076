//! Workspace signature verification.
//!
//! A signature is the lowercase hex HMAC-SHA256 of the workspace id keyed
//! with the shared secret. Operators obtain it from `/private/hmac` (or
//! `arts sign`) and configure it as the run task's signing value; Terraform
//! Cloud then presents it in the `X-TFC-Task-Signature` header.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::errors::AuthenticationError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the presented signature
pub const SIGNATURE_HEADER: &str = "x-tfc-task-signature";

/// Hex length of a SHA-256 MAC
const SIGNATURE_HEX_LEN: usize = 64;

/// Signs and verifies workspace ids with a shared secret
#[derive(Clone)]
pub struct SignatureVerifier {
    keyed: HmacSha256,
}

impl SignatureVerifier {
    pub fn new(secret: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Hex-encoded signature for a workspace id
    pub fn sign(&self, workspace_id: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(workspace_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a presented signature against the workspace id.
    ///
    /// The comparison is byte-for-byte on the lowercase hex form: anything
    /// that is not exactly 64 lowercase hex digits is rejected up front, and
    /// the digest itself is compared in constant time.
    pub fn verify(&self, workspace_id: &str, presented: Option<&str>) -> bool {
        let Some(presented) = presented else {
            return false;
        };

        if presented.len() != SIGNATURE_HEX_LEN
            || !presented
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return false;
        }

        let Ok(provided) = hex::decode(presented) else {
            return false;
        };

        let mut mac = self.keyed.clone();
        mac.update(workspace_id.as_bytes());
        mac.verify_slice(&provided).is_ok()
    }

    /// Same as [`verify`](Self::verify) but explains the rejection
    pub fn authenticate(
        &self,
        workspace_id: &str,
        presented: Option<&str>,
    ) -> Result<(), AuthenticationError> {
        if presented.is_none() {
            return Err(AuthenticationError::MissingSignature);
        }

        if self.verify(workspace_id, presented) {
            Ok(())
        } else {
            Err(AuthenticationError::SignatureMismatch {
                workspace_id: workspace_id.to_string(),
            })
        }
    }
}
