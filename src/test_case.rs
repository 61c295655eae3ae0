//! Test case record
//!
//! A [`TestCase`] carries one test file's paths plus the outcome fields a preset fills in. Records are built fresh for
//! every (test file, run) pair and never reused.
//!
//! ## Outcome
//!
//! The process result is an explicit [`Outcome`] rather than a magic integer, so "nobody ran anything", "the program
//! exited with N" and "the build step failed" stay distinguishable. [`Outcome::exit_code`] still maps each state to an
//! integer for reporting, using reserved values outside the 0–255 range a real process can return.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::discovery;

/// Reported exit code of a test whose preset never recorded a result.
pub const NOT_RUN_EXIT_CODE: i32 = -1;

/// Reported exit code of a compile-and-run test whose compilation step failed.
pub const BUILD_FAILED_EXIT_CODE: i32 = -2;

/// Reported exit code of a process that was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -3;

/// Result of the process a preset ran for a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// No preset has recorded a result yet.
    #[default]
    NotRun,
    /// The process exited normally with this code.
    Exited(i32),
    /// The process was terminated without an exit code (e.g. by a signal).
    Signaled,
    /// The compile step of a compile-and-run preset failed; nothing was executed.
    /// `code` is the compiler's own exit code, if it had one.
    BuildFailed { code: Option<i32> },
}

impl Outcome {
    /// Build an outcome from a raw process exit code (`None` when killed by a signal).
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(code) => Outcome::Exited(code),
            None => Outcome::Signaled,
        }
    }

    /// Only a process that exited with 0 counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Exited(0))
    }

    /// Integer form of the outcome, for reports.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::NotRun => NOT_RUN_EXIT_CODE,
            Outcome::Exited(code) => *code,
            Outcome::Signaled => SIGNALED_EXIT_CODE,
            Outcome::BuildFailed { .. } => BUILD_FAILED_EXIT_CODE,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.exit_code();
        match self {
            Outcome::NotRun => write!(f, "exit code = {code} (never set)"),
            Outcome::Exited(_) => write!(f, "exit code = {code}"),
            Outcome::Signaled => write!(f, "exit code = {code} (terminated by signal)"),
            Outcome::BuildFailed { code: Some(compiler) } => {
                write!(f, "exit code = {code} (build failed, compiler exited with {compiler})")
            }
            Outcome::BuildFailed { code: None } => {
                write!(f, "exit code = {code} (build failed, compiler terminated by signal)")
            }
        }
    }
}

/// One test file's run: its paths and the outcome fields a preset fills in.
///
/// The paths are fixed at construction; presets only touch `outcome`, `ignore_exit_code` and `ignore`.
#[derive(Debug, Clone)]
pub struct TestCase {
    input: PathBuf,
    answer: PathBuf,
    output: PathBuf,
    output_dir: PathBuf,
    working_dir: PathBuf,
    /// What the preset observed.
    pub outcome: Outcome,
    /// A non-successful outcome does not fail the test.
    pub ignore_exit_code: bool,
    /// Skip the textual comparison; the test passes once the exit-code check does.
    pub ignore: bool,
}

impl TestCase {
    pub fn new(
        input: impl Into<PathBuf>,
        answer: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            answer: answer.into(),
            output: output.into(),
            output_dir: output_dir.into(),
            working_dir: working_dir.into(),
            outcome: Outcome::NotRun,
            ignore_exit_code: false,
            ignore: false,
        }
    }

    /// Resolve the expected-answer path for `input`.
    ///
    /// The trailing `test_ext` of the file name is swapped for `ans_ext`. When that file does not exist the input is
    /// its own answer, which covers golden-input tests and exit-code-only tests alike.
    pub fn answer_for(input: &Path, test_ext: &str, ans_ext: &str) -> PathBuf {
        let candidate = input
            .file_name()
            .and_then(|name| discovery::replace_suffix(name, test_ext, ans_ext))
            .map(|name| input.with_file_name(name));

        match candidate {
            Some(path) if path.is_file() => path,
            _ => input.to_path_buf(),
        }
    }

    /// Test source file.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Expected-answer file (possibly the input itself).
    pub fn answer(&self) -> &Path {
        &self.answer
    }

    /// Scratch file receiving the captured output.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Scratch directory for intermediate artifacts such as produced executables.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Test-tree directory the case came from.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// File name of the input, for display.
    pub fn name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }

    /// Whether no separate answer file exists for this case.
    pub fn answer_is_input(&self) -> bool {
        self.answer == self.input
    }
}
