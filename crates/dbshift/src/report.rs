//! Turning a run outcome into console output and an exit code.

use std::io::{self, Write};

use crate::engine::MigrationRecord;
use crate::error::ShiftError;
use crate::runner::RunResult;

/// Printed when a run applied nothing.
pub const NOTHING_TO_DO: &str = "No migrations to run";

/// Writes run outcomes to injected stdout/stderr sinks.
pub struct ResultReporter<O: Write, E: Write> {
    out: O,
    err: E,
}

impl ResultReporter<io::Stdout, io::Stderr> {
    /// Reporter on the process stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ResultReporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Print the outcome and return the process exit code.
    ///
    /// A run that only printed help or version text reports nothing.
    pub fn report(&mut self, result: &RunResult) -> u8 {
        let written = match result {
            Ok(None) => Ok(()),
            Ok(Some(records)) => self.print_records(records),
            Err(e) => {
                let _ = writeln!(self.err, "{}", e);
                return e.exit_code();
            }
        };
        match written {
            Ok(()) => 0,
            Err(e) => {
                let _ = writeln!(self.err, "Failed to write report: {}", e);
                ShiftError::from(e).exit_code()
            }
        }
    }

    fn print_records(&mut self, records: &[MigrationRecord]) -> io::Result<()> {
        if records.is_empty() {
            writeln!(self.out, "{}", NOTHING_TO_DO)?;
        }
        for record in records {
            match &record.name {
                Some(name) => writeln!(self.out, "{} {} {}", record.action, record.version, name)?,
                None => writeln!(self.out, "{} {}", record.action, record.version)?,
            }
        }
        self.out.flush()
    }

    /// Consume the reporter, returning its sinks.
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Action;

    fn report(result: &RunResult) -> (u8, String, String) {
        let mut reporter = ResultReporter::new(Vec::new(), Vec::new());
        let code = reporter.report(result);
        let (out, err) = reporter.into_inner();
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_records_in_application_order() {
        let records = vec![
            MigrationRecord::new(3, Action::Undo, Some("table-3".into())),
            MigrationRecord::new(2, Action::Undo, None),
        ];
        let (code, out, err) = report(&Ok(Some(records)));
        assert_eq!(code, 0);
        assert_eq!(out, "undo 3 table-3\nundo 2\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_empty_result() {
        let (code, out, _) = report(&Ok(Some(Vec::new())));
        assert_eq!(code, 0);
        assert_eq!(out.trim(), NOTHING_TO_DO);
    }

    #[test]
    fn test_help_result_prints_nothing() {
        let (code, out, err) = report(&Ok(None));
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn test_error_is_single_line_on_stderr() {
        let (code, out, err) = report(&Err(ShiftError::config_not_found("missing.json")));
        assert_ne!(code, 0);
        assert!(out.is_empty());
        assert_eq!(err, "Config file not found: missing.json\n");
    }
}
