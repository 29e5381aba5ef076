//! Core orchestration logic.
//!
//! This module contains:
//! - Signature: workspace HMAC signing and verification
//! - Delivery: task result reporting and the callback retry policy
//! - Orchestrator: the acknowledge-then-act attempt lifecycle
//! - Errors: the pipeline's error taxonomy

pub mod delivery;
pub mod errors;
pub mod orchestrator;
pub mod signature;

// Re-export commonly used types
pub use delivery::{DeliveryPolicy, ResultReporter, RetryPolicy};
pub use errors::{AuthenticationError, CredentialError, DispatchError, ReportDeliveryError};
pub use orchestrator::Orchestrator;
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};
