//! CLI module for scctest
//!
//! ```text
//! scctest [ROOT] [--hide-passed] [--compiler PATH] [--scratch-dir DIR] [-I DIR]...
//! ```
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros. [`execute`] returns `CliResult<ExitCode>` instead of
//! calling `process::exit`; only the top-level [`run`] handles errors and exits.
//!
//! Relative paths are resolved against the working directory. Without `--compiler` the binary is expected at
//! `<cwd>/../../bin/scc`, the layout of the compiler's own source tree.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use miette::Diagnostic;

use crate::manager::TestManager;
use crate::presets::{Toolchain, exec_name};
use crate::report::ConsoleReporter;
use crate::scratch::{DEFAULT_SCRATCH_DIR, ScratchSpace};
use crate::version::SCCTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// The environment is broken; distinct from any failed-test count.
    pub const FATAL: ExitCode = ExitCode(255);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Environment failure rendered as a diagnostic.
    pub fn fatal<E>(error: E) -> Self
    where
        E: Diagnostic + Send + Sync + 'static,
    {
        Self::new(format!("{:?}", miette::Report::new(error)), ExitCode::FATAL)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run the scc compiler test tree
#[derive(Parser, Debug)]
#[command(name = "scctest")]
#[command(version = SCCTEST_VERSION)]
#[command(about = "Run the scc compiler test tree", long_about = None)]
pub struct Cli {
    /// Root of the test tree (default: current directory)
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Hide passed tests
    #[arg(long)]
    pub hide_passed: bool,

    /// Compiler binary (default: ../../bin/scc)
    #[arg(long, value_name = "PATH")]
    pub compiler: Option<PathBuf>,

    /// Scratch directory for captured output and executables (default: ./__tmp__)
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Include directory passed to every compiler invocation
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,
}

/// Compiler location used when `--compiler` is not given.
pub fn default_compiler_path(cwd: &Path) -> PathBuf {
    cwd.join("..").join("..").join("bin").join(exec_name("scc"))
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the parsed command line and return the exit code.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let cwd = env::current_dir()
        .map_err(|e| CliError::new(format!("cannot determine working directory: {e}"), ExitCode::FATAL))?;

    let root = match cli.root {
        Some(root) => cwd.join(root),
        None => cwd.clone(),
    };
    let compiler = match cli.compiler {
        Some(path) => cwd.join(path),
        None => default_compiler_path(&cwd),
    };
    let scratch_dir = cwd.join(cli.scratch_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR)));

    let mut toolchain = Toolchain::new(compiler);
    for dir in &cli.include {
        toolchain = toolchain.with_include_dir(cwd.join(dir));
    }
    toolchain.verify().map_err(CliError::fatal)?;

    let scratch = ScratchSpace::create(&scratch_dir).map_err(|e| {
        CliError::new(
            format!("cannot create scratch space '{}': {e}", scratch_dir.display()),
            ExitCode::FATAL,
        )
    })?;

    tracing::debug!(
        root = %root.display(),
        compiler = %toolchain.compiler().display(),
        scratch = %scratch.dir().display(),
        "starting test session"
    );

    let mut manager = TestManager::new(toolchain, scratch, ConsoleReporter::new(cli.hide_passed));
    let summary = manager.run(&root).map_err(CliError::fatal)?;

    if summary.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode(summary.exit_code()))
    }
}

// ============================================================================
// Tests
// ============================================================================
