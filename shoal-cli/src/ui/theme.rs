//! UI Theme Module - consistent text styling for line-oriented output
//!
//! Every styled string in the CLI goes through [`Theme`], so colour can be
//! switched off in one place (redirected output, `NO_COLOR`, tests).

use std::io::IsTerminal;

use crossterm::style::{StyledContent, Stylize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    color: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self::detect()
    }
}

impl Theme {
    /// Colour only when stdout is a terminal and `NO_COLOR` is unset
    pub fn detect() -> Self {
        if std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn colored() -> Self {
        Self { color: true }
    }

    fn paint<'a>(
        &self,
        text: &'a str,
        style: impl FnOnce(StyledContent<&'a str>) -> StyledContent<&'a str>,
    ) -> String {
        if self.color {
            style(text.stylize()).to_string()
        } else {
            text.to_string()
        }
    }

    // ========== StyleKit Helper Functions ==========

    /// Header of the error summary
    pub fn error_header(&self, text: &str) -> String {
        self.paint(text, |s| s.red().bold())
    }

    /// Service name inside the error summary
    pub fn error_service(&self, text: &str) -> String {
        self.paint(text, |s| s.red().bold())
    }

    /// Error message inside the error summary
    pub fn error_message(&self, text: &str) -> String {
        self.paint(text, |s| s.on_red())
    }

    /// Final line of a widget whose service failed
    pub fn failure(&self, text: &str) -> String {
        self.paint(text, |s| s.red())
    }

    /// Service label in the status report
    pub fn service_label(&self, text: &str, running: bool) -> String {
        if running {
            self.paint(text, |s| s.green().bold())
        } else {
            self.paint(text, |s| s.red().bold())
        }
    }

    pub fn emphasis(&self, text: &str) -> String {
        self.paint(text, |s| s.bold())
    }

    pub fn warning(&self, text: &str) -> String {
        self.paint(text, |s| s.yellow())
    }
}
