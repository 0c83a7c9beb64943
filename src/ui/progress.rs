//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::pipeline::{PipelineState, StateObserver};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Pipeline stage bar.
///
/// Advances once per non-terminal state after `Init`. Shows an indicatif
/// bar in interactive mode and one line per stage otherwise.
#[derive(Clone)]
pub struct StageProgress {
    bar: Option<ProgressBar>,
}

impl StageProgress {
    pub fn new(ctx: &UiContext, label: &str, stages: u64) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new(stages);
            if let Ok(template) = ProgressStyle::default_bar().template(
                "  {spinner:.blue} {prefix}  {bar:20.blue/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}",
            ) {
                bar.set_style(
                    template
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self { bar }
    }

    /// Record a state transition
    pub fn on_state(&self, state: PipelineState) {
        if state == PipelineState::Init || state.is_terminal() {
            return;
        }
        match &self.bar {
            Some(bar) => {
                bar.inc(1);
                bar.set_message(state.to_string());
            }
            None => println!("  {} {}", style("==>").blue(), state),
        }
    }

    /// Observer for `Pipeline::with_observer`
    pub fn observer(&self) -> StateObserver {
        let progress = self.clone();
        Arc::new(move |state| progress.on_state(state))
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
