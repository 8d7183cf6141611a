//! Pipeline entry points for grade checks.
//!
//! - `compute_changes`: Classify new and changed grades between two snapshots
//! - `RunCoordinator`: Check every configured user once

pub mod diff;
pub mod run;

pub use diff::compute_changes;
pub use run::{RunCoordinator, RunReport, Stage, UserOutcome, UserStatus};
