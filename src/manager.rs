//! Test manager
//!
//! Walks a test tree depth-first and runs every directory that has an active configuration:
//!
//! ```text
//! for each directory under root (each visited once):
//!     load config            -> none / no `[run]` / invalid  => skip directory
//!     files_with_suffix      -> none                          => skip directory
//!     for each test file:
//!         resolve answer, build a fresh TestCase, run the preset, evaluate, count
//! ```
//!
//! Tests run strictly one after another; each holds the scratch lease for its whole lifetime. A failing test never
//! stops the walk. Only a broken environment (unusable scratch space, missing compiler) does.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use miette::Diagnostic;
use thiserror::Error;

use crate::compare::{self, Failure, Verdict};
use crate::config::{self, DirectoryConfig, LoadedConfig};
use crate::discovery;
use crate::presets::{PresetError, Toolchain};
use crate::report::{Summary, TestReporter};
use crate::scratch::ScratchSpace;
use crate::test_case::TestCase;

/// Errors that abort a whole session.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("test root '{}' is not a directory", path.display())]
    #[diagnostic(code(scctest::root))]
    RootNotDirectory { path: PathBuf },

    #[error("scratch file '{}' is unusable", path.display())]
    #[diagnostic(code(scctest::scratch), help("check that the scratch directory is writable"))]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Toolchain(#[from] PresetError),
}

/// What happened to one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    NoConfig,
    ConfigWithoutRun,
    InvalidConfig,
    NoMatchingFiles,
    Active { tests: usize },
}

#[derive(Debug, Default)]
struct Counters {
    total: usize,
    passed: usize,
    failed: usize,
}

/// Runs a test tree against one toolchain and scratch space.
pub struct TestManager<R: TestReporter> {
    toolchain: Toolchain,
    scratch: ScratchSpace,
    reporter: R,
    counters: Counters,
}

impl<R: TestReporter> TestManager<R> {
    pub fn new(toolchain: Toolchain, scratch: ScratchSpace, reporter: R) -> Self {
        Self {
            toolchain,
            scratch,
            reporter,
            counters: Counters::default(),
        }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Run every test under `root` and report the totals.
    #[tracing::instrument(skip_all, fields(root = %root.display()))]
    pub fn run(&mut self, root: &Path) -> Result<Summary, RunnerError> {
        if !root.is_dir() {
            return Err(RunnerError::RootNotDirectory {
                path: root.to_path_buf(),
            });
        }

        let start = Instant::now();
        self.counters = Counters::default();
        self.walk(root)?;

        let summary = Summary {
            total: self.counters.total,
            passed: self.counters.passed,
            failed: self.counters.failed,
            duration: start.elapsed(),
        };
        self.reporter.on_run_complete(&summary);
        Ok(summary)
    }

    fn walk(&mut self, dir: &Path) -> Result<(), RunnerError> {
        self.run_directory(dir)?;
        for sub in discovery::subdirectories(dir) {
            self.walk(&sub)?;
        }
        Ok(())
    }

    /// Run the tests of `dir` alone, without descending into subdirectories.
    pub fn run_directory(&mut self, dir: &Path) -> Result<DirectoryState, RunnerError> {
        let config = match config::load_directory_config(dir) {
            Ok(LoadedConfig::Active(config)) => config,
            Ok(LoadedConfig::Missing) => return Ok(DirectoryState::NoConfig),
            Ok(LoadedConfig::WithoutRun) => {
                tracing::debug!(dir = %dir.display(), "configuration has no [run] table");
                return Ok(DirectoryState::ConfigWithoutRun);
            }
            Err(e) => {
                let config_path = e.path().to_path_buf();
                tracing::warn!(
                    config = %config_path.display(),
                    "skipping directory: {:?}",
                    miette::Report::new(e)
                );
                return Ok(DirectoryState::InvalidConfig);
            }
        };

        let files = discovery::files_with_suffix(dir, &config.test_ext);
        if files.is_empty() {
            return Ok(DirectoryState::NoMatchingFiles);
        }

        self.reporter.on_directory_start(dir);
        for input in &files {
            self.run_test(&config, input)?;
        }
        Ok(DirectoryState::Active { tests: files.len() })
    }

    fn run_test(&mut self, config: &DirectoryConfig, input: &Path) -> Result<Verdict, RunnerError> {
        let answer = TestCase::answer_for(input, &config.test_ext, &config.ans_ext);
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let plan = config.plan_for(&file_name);

        let scratch_path = self.scratch.output().to_path_buf();
        let scratch_error = |source| RunnerError::Scratch {
            path: scratch_path.clone(),
            source,
        };

        let lease = self.scratch.lease().map_err(scratch_error)?;
        let mut case = TestCase::new(input, answer, lease.output(), lease.dir(), &config.dir);

        let verdict = match plan.execute(&self.toolchain, &mut case) {
            Ok(()) => compare::evaluate(&case, &lease).map_err(scratch_error)?,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => Verdict::Failed(Failure::Preset(e.to_string())),
        };
        drop(lease);

        self.record(&case, &verdict);
        Ok(verdict)
    }

    fn record(&mut self, case: &TestCase, verdict: &Verdict) {
        self.counters.total += 1;
        if verdict.is_passed() {
            self.counters.passed += 1;
        } else {
            self.counters.failed += 1;
            tracing::debug!(
                test = %case.name(),
                dir = %case.working_dir().display(),
                outcome = ?case.outcome,
                self_answer = case.answer_is_input(),
                "test failed"
            );
        }
        self.reporter.on_test_complete(case, verdict);
    }
}
