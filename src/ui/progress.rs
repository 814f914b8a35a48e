use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Start a stderr spinner showing `message`. Finish it with
/// `finish_and_clear` once the work is done.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    progress.set_style(style);
    progress.set_message(message.into());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
