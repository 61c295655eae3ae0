//! Test reporting
//!
//! The manager reports through the [`TestReporter`] trait so the output format stays separate from execution.
//! [`ConsoleReporter`] is the default, plain-text format.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use crate::compare::Verdict;
use crate::test_case::TestCase;

/// Totals for one session. `total == passed + failed` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration: Duration,
}

/// Largest exit status used for a failure count; 255 is reserved for fatal errors.
pub const MAX_FAILURE_EXIT_CODE: usize = 254;

impl Summary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Process exit status: 0 when nothing failed, otherwise the failed count (capped).
    pub fn exit_code(&self) -> i32 {
        self.failed.min(MAX_FAILURE_EXIT_CODE) as i32
    }
}

/// Receives progress from a test session.
pub trait TestReporter {
    /// A directory with an active configuration and at least one test is about to run.
    fn on_directory_start(&mut self, _dir: &Path) {}

    /// One test has a verdict.
    fn on_test_complete(&mut self, case: &TestCase, verdict: &Verdict);

    /// The walk is over.
    fn on_run_complete(&mut self, summary: &Summary);
}

/// Plain-text reporter writing to stdout (or any writer).
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    /// Suppress lines for passing tests.
    pub hide_passed: bool,
}

impl ConsoleReporter {
    pub fn new(hide_passed: bool) -> Self {
        Self::with_writer(io::stdout(), hide_passed)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(out: W, hide_passed: bool) -> Self {
        Self { out, hide_passed }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// Console output is best-effort; a closed stdout must not abort the run.
impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn on_directory_start(&mut self, dir: &Path) {
        let _ = writeln!(self.out, "{}", dir.display());
    }

    fn on_test_complete(&mut self, case: &TestCase, verdict: &Verdict) {
        match verdict {
            Verdict::Passed => {
                if !self.hide_passed {
                    let _ = writeln!(self.out, "Testing {}: PASSED", case.name());
                }
            }
            Verdict::Failed(failure) => {
                let _ = writeln!(self.out, "Testing {}: FAILED\n{}\n", case.name(), failure);
            }
        }
    }

    fn on_run_complete(&mut self, summary: &Summary) {
        let _ = writeln!(
            self.out,
            "\n\n-=====================================================================-"
        );
        let _ = writeln!(
            self.out,
            "Ran {} tests in {:.2}s.",
            summary.total,
            summary.duration.as_secs_f64()
        );
        let _ = writeln!(self.out, "Passed {} Failed {}.", summary.passed, summary.failed);
        let _ = self.out.flush();
    }
}
