//! Stylesheet for terminal output, built on owo-colors.

use owo_colors::Style;

/// Colors used by the renderers and the progress reporter.
///
/// The default value is unstyled; [`Styles::colorize`] turns colors on.
#[derive(Default, Clone)]
pub struct Styles {
    /// `✓` next to a node that succeeded
    pub success: Style,
    /// `!` next to a node that failed or was skipped
    pub warning: Style,
    /// Node kinds and export names
    pub dim: Style,
    /// Section titles such as `Plan:` and `Outputs:`
    pub header: Style,
    /// Arrow before an in-progress step
    pub step: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.dim = Style::new().dimmed();
        self.header = Style::new().bold().cyan();
        self.step = Style::new().cyan();
    }
}
