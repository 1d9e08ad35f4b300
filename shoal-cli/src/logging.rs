//! Diagnostics go to stderr so they never interleave with the progress board.
//!
//! stderr is usually the same terminal, though, and a log line printed while
//! the board redraws in place would shift every row. [`hold`] parks log output
//! until the returned guard is dropped.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor `--verbose` says otherwise
const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "debug";

static GATE: Mutex<Gate> = Mutex::new(Gate::new());

/// Pick the log filter. `RUST_LOG` wins over `--verbose`.
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        })
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(GatedStderr::default)
        .with_target(false)
        .init();
}

/// Park log output until the guard is dropped. Holds nest.
pub fn hold() -> LogHold {
    gate().hold();
    LogHold { _private: () }
}

pub struct LogHold {
    _private: (),
}

impl Drop for LogHold {
    fn drop(&mut self) {
        let _ = gate().release(&mut io::stderr());
    }
}

/// stderr, unless a [`LogHold`] is alive
#[derive(Default)]
pub struct GatedStderr;

impl Write for GatedStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        gate().write(buf, &mut io::stderr())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

fn gate() -> MutexGuard<'static, Gate> {
    GATE.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Gate {
    holds: usize,
    pending: Vec<u8>,
}

impl Gate {
    const fn new() -> Self {
        Self {
            holds: 0,
            pending: Vec::new(),
        }
    }

    fn hold(&mut self) {
        self.holds += 1;
    }

    fn write(&mut self, buf: &[u8], out: &mut impl Write) -> io::Result<()> {
        if self.holds > 0 {
            self.pending.extend_from_slice(buf);
            Ok(())
        } else {
            out.write_all(buf)
        }
    }

    /// Drop one hold; the last one flushes everything parked so far
    fn release(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.holds = self.holds.saturating_sub(1);
        if self.holds == 0 && !self.pending.is_empty() {
            out.write_all(&std::mem::take(&mut self.pending))?;
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(filter(false).to_string(), "warn");
        assert_eq!(filter(true).to_string(), "debug");
    }

    #[test]
    fn test_open_gate_writes_through() {
        let mut gate = Gate::new();
        let mut out = Vec::new();
        gate.write(b"WARN interrupted\n", &mut out).unwrap();
        assert_eq!(out, b"WARN interrupted\n");
    }

    #[test]
    fn test_held_lines_come_out_after_release_in_order() {
        let mut gate = Gate::new();
        let mut out = Vec::new();

        gate.hold();
        gate.write(b"first\n", &mut out).unwrap();
        gate.write(b"second\n", &mut out).unwrap();
        assert!(out.is_empty());

        gate.release(&mut out).unwrap();
        assert_eq!(out, b"first\nsecond\n");

        gate.write(b"third\n", &mut out).unwrap();
        assert_eq!(out, b"first\nsecond\nthird\n");
    }

    #[test]
    fn test_nested_holds_release_on_last() {
        let mut gate = Gate::new();
        let mut out = Vec::new();

        gate.hold();
        gate.hold();
        gate.write(b"parked\n", &mut out).unwrap();
        gate.release(&mut out).unwrap();
        assert!(out.is_empty());
        gate.release(&mut out).unwrap();
        assert_eq!(out, b"parked\n");
    }
}
