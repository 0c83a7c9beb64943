//! Terminal output for drydock commands
//!
//! Uses `cliclack` for prompts and step logging, `indicatif` for the stage
//! bar, and falls back to plain prefixed lines in CI or when output is
//! piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use drydock::ui::{self, StageProgress, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "drydock run");
//!
//! let progress = StageProgress::new(&ctx, "run");
//! let outcome = pipeline.with_observer(progress.observer()).run().await;
//! progress.finish();
//!
//! ui::outro_success(&ctx, "Released 8 image(s)");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_error, outro_success, outro_warn, remark, section,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{StageProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, DrydockTheme};
