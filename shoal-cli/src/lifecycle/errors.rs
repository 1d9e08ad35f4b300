use std::io::{self, Write};

use shoal_core::model::{LifecycleOp, ServiceName};

use crate::ui::Theme;

pub const TAB: &str = "    ";

/// A service that failed during an operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorRecord {
    pub service: ServiceName,
    pub message: String,
}

/// Failures collected over one operation, in arrival order. Append-only.
#[derive(Debug)]
pub struct ErrorLog {
    op: LifecycleOp,
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    pub fn new(op: LifecycleOp) -> Self {
        Self {
            op,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Print the summary block. Prints nothing when no service failed.
    pub fn render_summary(&self, out: &mut impl Write, theme: &Theme) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let header = format!(
            "There were errors while {} some of the services:",
            self.op.verb()
        );
        writeln!(out, "{}", theme.error_header(&header))?;
        for record in &self.records {
            writeln!(out, "{}{}", TAB, theme.error_service(&format!("{}:", record.service)))?;
            writeln!(out, "{}{}", TAB, theme.error_message(&record.message))?;
            writeln!(out)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(log: &ErrorLog) -> String {
        let mut out = Vec::new();
        log.render_summary(&mut out, &Theme::plain()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_empty_log_renders_nothing() {
        let log = ErrorLog::new(LifecycleOp::Start);
        assert!(log.is_empty());
        assert_eq!(render(&log), "");
    }

    #[test]
    fn test_summary_lists_records_in_arrival_order() {
        let mut log = ErrorLog::new(LifecycleOp::Stop);
        log.record(ErrorRecord {
            service: "db".into(),
            message: "connection refused".into(),
        });
        log.record(ErrorRecord {
            service: "api".into(),
            message: "exit code 137".into(),
        });

        assert_eq!(
            render(&log),
            "There were errors while stopping some of the services:\n\
             \x20   db:\n\
             \x20   connection refused\n\
             \n\
             \x20   api:\n\
             \x20   exit code 137\n\
             \n"
        );
    }
}
