//! Shared helpers for scctest integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use scctest::presets::{CommandRunner, Invocation};
use scctest::{Summary, TestCase, TestReporter, Verdict};

/// Path handed to the toolchain as the compiler; never executed.
pub const FAKE_COMPILER: &str = "/fake/bin/scc";

/// Runner that answers every invocation through a closure and logs what it saw.
pub struct FnRunner<F> {
    handler: F,
    log: Rc<RefCell<Vec<String>>>,
}

impl<F> FnRunner<F>
where
    F: Fn(&Invocation<'_>) -> io::Result<Option<i32>>,
{
    pub fn new(handler: F) -> (Self, Rc<RefCell<Vec<String>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                handler,
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl<F> CommandRunner for FnRunner<F>
where
    F: Fn(&Invocation<'_>) -> io::Result<Option<i32>>,
{
    fn run(&self, invocation: &Invocation<'_>) -> io::Result<Option<i32>> {
        self.log.borrow_mut().push(invocation.to_string());
        (self.handler)(invocation)
    }
}

/// Whether the invocation targets the compiler rather than a produced executable.
pub fn is_compiler(invocation: &Invocation<'_>) -> bool {
    invocation.program == Path::new(FAKE_COMPILER)
}

/// Test input of a compiler invocation (first argument when no base args are set).
pub fn input_arg(invocation: &Invocation<'_>) -> PathBuf {
    PathBuf::from(&invocation.args[0])
}

/// The path following `-o` or `-log`.
pub fn output_arg(invocation: &Invocation<'_>) -> Option<PathBuf> {
    let pos = invocation.args.iter().position(|a| a == "-o" || a == "-log")?;
    invocation.args.get(pos + 1).map(PathBuf::from)
}

/// Create `files` (relative path, contents) under `root`, making parent directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

/// One reported test.
#[derive(Debug, Clone)]
pub struct Reported {
    pub name: String,
    pub exit_code: i32,
    pub verdict: Verdict,
}

/// Reporter that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub directories: Vec<PathBuf>,
    pub tests: Vec<Reported>,
    pub summary: Option<Summary>,
}

impl RecordingReporter {
    pub fn get(&self, name: &str) -> &Reported {
        self.tests
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("test {name} was not reported"))
    }
}

impl TestReporter for RecordingReporter {
    fn on_directory_start(&mut self, dir: &Path) {
        self.directories.push(dir.to_path_buf());
    }

    fn on_test_complete(&mut self, case: &TestCase, verdict: &Verdict) {
        self.tests.push(Reported {
            name: case.name(),
            exit_code: case.outcome.exit_code(),
            verdict: verdict.clone(),
        });
    }

    fn on_run_complete(&mut self, summary: &Summary) {
        self.summary = Some(*summary);
    }
}
