//! Domain types for the run task bridge.

pub mod action;
pub mod attempt;
pub mod credential;
pub mod invocation;
pub mod report;

pub use action::{is_valid_template_id, Action, ActionResult, LaunchOverrides};
pub use attempt::{Attempt, Stage, StageRecord, TransitionError};
pub use credential::DownstreamCredential;
pub use invocation::{TaskInvocation, TEST_TOKEN};
pub use report::{TaskStatus, TaskStatusReport};
