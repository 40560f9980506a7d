//! Spinner shown while the stack is provisioning.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "  {spinner:.cyan} {msg} {elapsed:.dim}";

/// Steady-ticking spinner labelled `msg`.
#[must_use]
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    // Provisioning waits are long; a slow tick is enough.
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
