//! arts - Terraform Cloud run task bridge for Ansible AWX
//!
//! Receives run task events from Terraform Cloud, acknowledges them right
//! away, then launches an AWX job template, launches a workflow job template,
//! or creates an inventory, and reports the outcome to the task's callback
//! URL.
//!
//! # Architecture
//!
//! Every invocation is one short-lived attempt:
//! - The workspace signature is verified before anything else
//! - A 200 is returned as soon as the signature checks out
//! - A per-attempt AWX token is minted, used once, and always revoked
//! - Exactly one terminal status is sent back to Terraform Cloud
//!
//! Nothing is persisted between invocations.
//!
//! # Modules
//!
//! - `adapters`: External system integrations (AWX, Terraform Cloud callback)
//! - `core`: Orchestration logic (Signature, Delivery, Orchestrator)
//! - `domain`: Data structures (TaskInvocation, Action, Attempt, TaskStatusReport)
//! - `server`: HTTP routes
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve the run task endpoints
//! ARTS_ANSIBLE_HOST=https://awx.example.com ARTS_ANSIBLE_USER=svc \
//!   ARTS_ANSIBLE_PASSWORD=... ARTS_HMAC_KEY=... arts serve
//!
//! # Signature to configure on the run task for a workspace
//! arts sign --workspace-id ws-abc123
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, SignatureVerifier};
pub use domain::{Action, ActionResult, Attempt, Stage, TaskInvocation, TaskStatus, TaskStatusReport};
pub use server::{AppState, BridgeApi};
