//! Release of assembled images
//!
//! Either publishes every image under every tag or builds every image
//! locally, concurrently, collecting one outcome per task.

pub mod executor;
pub mod report;
pub mod tags;

pub use executor::{
    plan_tasks, Destination, ReleaseExecutor, ReleaseMode, ReleaseReport, ReleaseTask, RunOptions,
    TaskOutcome,
};
pub use report::{ReleaseLog, REPORT_FILE};
pub use tags::TagSet;

/// Tag every release carries
pub const LATEST: &str = "latest";
