use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use super::geometry::{Budget, CrosstermGeometry, TerminalGeometry};
use crate::ui::Theme;

/// How progress lines reach the output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Redraw each widget in place using cursor movement. Needs a terminal.
    Live,
    /// Append a new line per update. For pipes, files and CI logs.
    Plain,
}

impl RenderMode {
    pub fn detect() -> Self {
        if io::stdout().is_terminal() {
            Self::Live
        } else {
            Self::Plain
        }
    }
}

/// Output sink shared by the progress board, the error summary and the status report.
pub struct Console<W> {
    out: W,
    geometry: Arc<dyn TerminalGeometry>,
    theme: Theme,
    mode: RenderMode,
}

impl Console<io::Stdout> {
    pub fn stdout(theme: Theme, mode: RenderMode) -> Self {
        Self::new(io::stdout(), Arc::new(CrosstermGeometry), theme, mode)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, geometry: Arc<dyn TerminalGeometry>, theme: Theme, mode: RenderMode) -> Self {
        Self {
            out,
            geometry,
            theme,
            mode,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn width(&self, budget: Budget) -> usize {
        self.geometry.width(budget)
    }

    /// Terminal height, when stdout is a terminal
    pub fn rows(&self) -> Option<u16> {
        self.geometry.rows()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Write for Console<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
