//! Outcome evaluation
//!
//! Turns a finished [`TestCase`] into a [`Verdict`]:
//!
//! 1. an unsuccessful outcome fails the test, unless `ignore_exit_code` is set;
//! 2. `ignore` passes the test without looking at any output;
//! 3. otherwise the captured output and the answer file must be equal once all whitespace is removed.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::scratch::ScratchLease;
use crate::test_case::{Outcome, TestCase};

/// Remove every whitespace character, including whitespace between tokens.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whether `a` and `b` are equal ignoring all whitespace.
pub fn same_modulo_whitespace(a: &str, b: &str) -> bool {
    let a = a.chars().filter(|c| !c.is_whitespace());
    let b = b.chars().filter(|c| !c.is_whitespace());
    a.eq(b)
}

/// Why a test failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The process result was not success and exit codes were not ignored.
    ExitCode(Outcome),
    /// Output differed from the answer; both are kept verbatim.
    Mismatch { actual: String, expected: String },
    /// The answer file could not be read.
    UnreadableAnswer { path: PathBuf, error: String },
    /// The preset could not run the test (e.g. the produced executable would not start).
    Preset(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::ExitCode(outcome) => write!(f, "{outcome}"),
            Failure::Mismatch { actual, expected } => {
                write!(f, "got:\n{actual}\nexpected:\n{expected}")
            }
            Failure::UnreadableAnswer { path, error } => {
                write!(f, "cannot read answer '{}': {error}", path.display())
            }
            Failure::Preset(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(Failure),
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

/// Evaluate a finished test case against its answer.
///
/// Only a failure to read the scratch output is an error; it means the environment is broken.
pub fn evaluate(case: &TestCase, scratch: &ScratchLease<'_>) -> io::Result<Verdict> {
    if !case.ignore_exit_code && !case.outcome.is_success() {
        return Ok(Verdict::Failed(Failure::ExitCode(case.outcome)));
    }

    if case.ignore {
        return Ok(Verdict::Passed);
    }

    let actual = scratch.read_output()?;
    let expected = match fs::read(case.answer()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            return Ok(Verdict::Failed(Failure::UnreadableAnswer {
                path: case.answer().to_path_buf(),
                error: e.to_string(),
            }));
        }
    };

    if same_modulo_whitespace(&actual, &expected) {
        Ok(Verdict::Passed)
    } else {
        Ok(Verdict::Failed(Failure::Mismatch { actual, expected }))
    }
}
