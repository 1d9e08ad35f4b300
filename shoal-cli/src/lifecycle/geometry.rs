//! Character budgets derived from the terminal width.

use std::io::{self, IsTerminal};

/// Width used when the terminal size cannot be determined
pub const FALLBACK_WIDTH: usize = 45;

/// Which kind of text a budget is for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Budget {
    /// In-progress text to the right of a progress bar (40% of the columns)
    Right,
    /// Failure messages (70% of the columns)
    Error,
}

impl Budget {
    fn fraction(self) -> f64 {
        match self {
            Self::Right => 0.4,
            Self::Error => 0.7,
        }
    }
}

/// Source of the current display width.
///
/// Queried on every use, so a terminal resized mid-operation is picked up on
/// the next redraw.
pub trait TerminalGeometry: Send + Sync {
    /// Current number of columns, or `None` without a controlling terminal
    fn columns(&self) -> Option<u16>;

    /// Current number of rows, if known
    fn rows(&self) -> Option<u16> {
        None
    }

    fn width(&self, budget: Budget) -> usize {
        match self.columns() {
            Some(cols) if cols > 0 => (f64::from(cols) * budget.fraction()).round() as usize,
            _ => FALLBACK_WIDTH,
        }
    }
}

/// Reads the size of the terminal stdout is attached to
#[derive(Clone, Copy, Debug, Default)]
pub struct CrosstermGeometry;

impl CrosstermGeometry {
    fn size(&self) -> Option<(u16, u16)> {
        stdout_size(io::stdout().is_terminal(), crossterm::terminal::size)
    }
}

impl TerminalGeometry for CrosstermGeometry {
    fn columns(&self) -> Option<u16> {
        self.size().map(|(cols, _rows)| cols)
    }

    fn rows(&self) -> Option<u16> {
        self.size().map(|(_cols, rows)| rows)
    }
}

/// `crossterm::terminal::size` falls back to `/dev/tty` and `tput`, so it
/// reports a size even when stdout is redirected. Only ask when it is not.
fn stdout_size(
    stdout_is_terminal: bool,
    query: impl FnOnce() -> io::Result<(u16, u16)>,
) -> Option<(u16, u16)> {
    if !stdout_is_terminal {
        return None;
    }
    query().ok()
}

/// A terminal of known width. `None` behaves like redirected output.
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub struct FixedGeometry(pub Option<u16>);

#[cfg(test)]
impl TerminalGeometry for FixedGeometry {
    fn columns(&self) -> Option<u16> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets_are_fractions_of_columns() {
        let geometry = FixedGeometry(Some(100));
        assert_eq!(geometry.width(Budget::Right), 40);
        assert_eq!(geometry.width(Budget::Error), 70);
    }

    #[test]
    fn test_budgets_round_to_nearest() {
        // 0.4 * 81 = 32.4, 0.7 * 81 = 56.7
        let geometry = FixedGeometry(Some(81));
        assert_eq!(geometry.width(Budget::Right), 32);
        assert_eq!(geometry.width(Budget::Error), 57);
    }

    #[test]
    fn test_redirected_stdout_ignores_controlling_terminal() {
        let size = stdout_size(false, || Ok((80, 24)));
        assert_eq!(size, None);

        let size = stdout_size(true, || Ok((80, 24)));
        assert_eq!(size, Some((80, 24)));

        let size = stdout_size(true, || Err(io::Error::other("no tty")));
        assert_eq!(size, None);
    }

    #[test]
    fn test_real_geometry_falls_back_when_stdout_is_not_a_terminal() {
        if io::stdout().is_terminal() {
            return;
        }
        assert_eq!(CrosstermGeometry.columns(), None);
        assert_eq!(CrosstermGeometry.width(Budget::Right), FALLBACK_WIDTH);
    }

    #[test]
    fn test_fallback_without_terminal() {
        let geometry = FixedGeometry(None);
        assert_eq!(geometry.width(Budget::Right), FALLBACK_WIDTH);
        assert_eq!(geometry.width(Budget::Error), FALLBACK_WIDTH);
    }
}
