//! Preset library
//!
//! Each preset builds an `scc` command line from a [`TestCase`], runs it, and records the result on the case. The
//! command line is always
//!
//! ```text
//! <compiler> <base args...> <input> <mode flags...> <-o|-log> <output> <extra args...>
//! ```
//!
//! so the toolchain-wide baseline (include paths and the like) comes first and per-test flags come last, where they
//! can supplement or override it.
//!
//! ## Process boundary
//!
//! All subprocesses go through the [`CommandRunner`] trait. [`SystemRunner`] spawns real processes; tests plug in a
//! scripted runner instead.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::test_case::{Outcome, TestCase};

/// Named invocation strategies, as selected by a directory configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Dump the token stream.
    Lex,
    /// Dump lexer diagnostics; a non-zero exit is expected.
    LexErrors,
    /// Dump the syntax tree.
    Parse,
    /// Dump parser diagnostics; a non-zero exit is expected.
    ParseErrors,
    /// Emit the SSA intermediate form.
    Ssa,
    /// Build an executable and run it.
    CompileAndRun,
}

impl Preset {
    /// Name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Lex => "lex",
            Preset::LexErrors => "lex-errors",
            Preset::Parse => "parse",
            Preset::ParseErrors => "parse-errors",
            Preset::Ssa => "ssa",
            Preset::CompileAndRun => "compile-and-run",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a test compares captured output or only checks the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    CompareOutput,
    ExitCodeOnly,
}

/// Where a child's standard output goes.
#[derive(Debug, Clone, Copy)]
pub enum StdoutTarget<'a> {
    Inherit,
    Null,
    /// Truncate and write this file.
    File(&'a Path),
}

/// One process to run.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub program: &'a Path,
    pub args: Vec<OsString>,
    pub stdout: StdoutTarget<'a>,
}

impl fmt::Display for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        if let StdoutTarget::File(path) = self.stdout {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}

/// Runs a process to completion and reports its exit code (`None` if it had none).
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation<'_>) -> io::Result<Option<i32>>;
}

/// Spawns real processes, blocking until they exit. Standard error is inherited.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation<'_>) -> io::Result<Option<i32>> {
        let mut command = Command::new(invocation.program);
        command.args(&invocation.args);
        match invocation.stdout {
            StdoutTarget::Inherit => command.stdout(Stdio::inherit()),
            StdoutTarget::Null => command.stdout(Stdio::null()),
            StdoutTarget::File(path) => command.stdout(Stdio::from(fs::File::create(path)?)),
        };
        let status = command.status()?;
        Ok(status.code())
    }
}

/// Errors raised while running a preset.
#[derive(Debug, Error, Diagnostic)]
pub enum PresetError {
    /// The compiler could not be started at all. This aborts the whole run.
    #[error("cannot run compiler '{}'", path.display())]
    #[diagnostic(
        code(scctest::compiler),
        help("build the compiler first or point `--compiler` at it")
    )]
    Compiler {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A produced executable could not be started. Only the current test fails.
    #[error("cannot run produced executable '{}': {source}", path.display())]
    #[diagnostic(code(scctest::executable))]
    Executable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PresetError {
    /// Whether the error means the environment is broken rather than the test.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PresetError::Compiler { .. })
    }
}

/// Platform file name for an executable called `stem`.
pub fn exec_name(stem: &str) -> String {
    format!("{stem}{}", std::env::consts::EXE_SUFFIX)
}

/// The compiler plus everything needed to invoke it.
pub struct Toolchain {
    compiler: PathBuf,
    base_args: Vec<OsString>,
    runner: Box<dyn CommandRunner>,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("compiler", &self.compiler)
            .field("base_args", &self.base_args)
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    /// Toolchain for `compiler` that spawns real processes.
    pub fn new(compiler: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
            base_args: Vec::new(),
            runner: Box::new(SystemRunner),
        }
    }

    /// Replace the process runner.
    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Append flags passed to every compiler invocation, ahead of per-test flags.
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.base_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `-I <dir>` to the baseline flags.
    pub fn with_include_dir(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().as_os_str().to_owned();
        self.with_base_args([OsString::from("-I"), dir])
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    /// Check that the compiler binary exists before any test runs.
    pub fn verify(&self) -> Result<(), PresetError> {
        if self.compiler.is_file() {
            Ok(())
        } else {
            Err(PresetError::Compiler {
                path: self.compiler.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            })
        }
    }

    /// Run `preset` on `case`.
    ///
    /// In [`RunMode::ExitCodeOnly`] the case's `ignore` flag is set whatever the preset; compile-and-run additionally
    /// discards the executable's output.
    #[tracing::instrument(skip_all, fields(preset = %preset, test = %case.name()))]
    pub fn apply(
        &self,
        preset: Preset,
        case: &mut TestCase,
        mode: RunMode,
        extra: &[String],
    ) -> Result<(), PresetError> {
        match preset {
            Preset::Lex => self.lex(case, extra)?,
            Preset::LexErrors => self.lex_errors(case, extra)?,
            Preset::Parse => self.parse(case, extra)?,
            Preset::ParseErrors => self.parse_errors(case, extra)?,
            Preset::Ssa => self.ssa(case, extra)?,
            Preset::CompileAndRun => self.compile_and_run(case, mode, extra)?,
        }
        if mode == RunMode::ExitCodeOnly {
            case.ignore = true;
        }
        Ok(())
    }

    /// Dump tokens into the output file.
    pub fn lex(&self, case: &mut TestCase, extra: &[String]) -> Result<(), PresetError> {
        case.outcome = self.compile(case, &["-dump-tokens"], "-o", case.output(), extra)?;
        Ok(())
    }

    /// Dump lexer diagnostics into the output file; the compiler's non-zero exit is expected.
    pub fn lex_errors(&self, case: &mut TestCase, extra: &[String]) -> Result<(), PresetError> {
        case.outcome = self.compile(case, &["-dump-tokens"], "-log", case.output(), extra)?;
        case.ignore_exit_code = true;
        Ok(())
    }

    /// Dump the syntax tree into the output file.
    pub fn parse(&self, case: &mut TestCase, extra: &[String]) -> Result<(), PresetError> {
        case.outcome = self.compile(case, &["-fsyntax-only", "-dump-tree"], "-o", case.output(), extra)?;
        Ok(())
    }

    /// Dump parser diagnostics into the output file; the compiler's non-zero exit is expected.
    pub fn parse_errors(&self, case: &mut TestCase, extra: &[String]) -> Result<(), PresetError> {
        case.outcome = self.compile(case, &["-fsyntax-only", "-dump-tree"], "-log", case.output(), extra)?;
        case.ignore_exit_code = true;
        Ok(())
    }

    /// Emit SSA into the output file.
    pub fn ssa(&self, case: &mut TestCase, extra: &[String]) -> Result<(), PresetError> {
        case.outcome = self.compile(case, &["-S", "-emit-ssa"], "-o", case.output(), extra)?;
        Ok(())
    }

    /// Compile to an executable in the scratch directory and run it.
    ///
    /// The previous test's executable is removed first. A failed build records [`Outcome::BuildFailed`] and runs nothing. Otherwise the executable's exit code is
    /// recorded and its stdout goes to the output file, or nowhere in [`RunMode::ExitCodeOnly`].
    pub fn compile_and_run(&self, case: &mut TestCase, mode: RunMode, extra: &[String]) -> Result<(), PresetError> {
        let exe = case.output_dir().join(exec_name("out"));
        match fs::remove_file(&exe) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(PresetError::Executable { path: exe, source }),
        }

        let build = self.compile(case, &[], "-o", &exe, extra)?;
        if !build.is_success() {
            let code = match build {
                Outcome::Exited(code) => Some(code),
                _ => None,
            };
            tracing::debug!(?code, "build step failed");
            case.outcome = Outcome::BuildFailed { code };
            return Ok(());
        }

        let stdout = match mode {
            RunMode::CompareOutput => StdoutTarget::File(case.output()),
            RunMode::ExitCodeOnly => {
                case.ignore = true;
                StdoutTarget::Null
            }
        };
        let code = {
            let invocation = Invocation {
                program: &exe,
                args: Vec::new(),
                stdout,
            };
            tracing::debug!(command = %invocation, "running executable");
            self.runner.run(&invocation).map_err(|source| PresetError::Executable {
                path: exe.clone(),
                source,
            })?
        };
        case.outcome = Outcome::from_code(code);
        Ok(())
    }

    fn compile(
        &self,
        case: &TestCase,
        mode_flags: &[&str],
        output_flag: &str,
        output: &Path,
        extra: &[String],
    ) -> Result<Outcome, PresetError> {
        let mut args: Vec<OsString> = self.base_args.clone();
        args.push(case.input().as_os_str().to_owned());
        args.extend(mode_flags.iter().map(OsString::from));
        args.push(OsString::from(output_flag));
        args.push(output.as_os_str().to_owned());
        args.extend(extra.iter().map(|a| OsStr::new(a).to_owned()));

        let invocation = Invocation {
            program: &self.compiler,
            args,
            stdout: StdoutTarget::Inherit,
        };
        tracing::debug!(command = %invocation, "invoking compiler");

        let code = self.runner.run(&invocation).map_err(|source| PresetError::Compiler {
            path: self.compiler.clone(),
            source,
        })?;
        Ok(Outcome::from_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::test_case::BUILD_FAILED_EXIT_CODE;

    /// Records every invocation and answers with queued exit codes (0 once the queue is empty).
    #[derive(Clone, Default)]
    struct ScriptedRunner {
        calls: Rc<RefCell<Vec<(PathBuf, Vec<String>)>>>,
        codes: Rc<RefCell<VecDeque<io::Result<Option<i32>>>>>,
    }

    impl ScriptedRunner {
        fn answering(codes: Vec<io::Result<Option<i32>>>) -> Self {
            let runner = Self::default();
            runner.codes.borrow_mut().extend(codes);
            runner
        }

        fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation<'_>) -> io::Result<Option<i32>> {
            let args = invocation.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
            self.calls.borrow_mut().push((invocation.program.to_path_buf(), args));
            self.codes.borrow_mut().pop_front().unwrap_or(Ok(Some(0)))
        }
    }

    fn toolchain(runner: &ScriptedRunner) -> Toolchain {
        Toolchain::new("/bin/scc").with_runner(runner.clone())
    }

    fn case() -> TestCase {
        TestCase::new("/t/c.t", "/t/c.a", "/scratch/out.txt", "/scratch", "/t")
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preset_display_uses_config_name() {
        assert_eq!(Preset::CompileAndRun.to_string(), "compile-and-run");
        assert_eq!(Preset::LexErrors.to_string(), "lex-errors");
    }

    #[test]
    fn test_lex_command_line() {
        let runner = ScriptedRunner::default();
        let mut tc = case();
        toolchain(&runner).lex(&mut tc, &strings(&["-x64"])).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("/bin/scc"));
        assert_eq!(
            calls[0].1,
            strings(&["/t/c.t", "-dump-tokens", "-o", "/scratch/out.txt", "-x64"])
        );
        assert_eq!(tc.outcome, Outcome::Exited(0));
        assert!(!tc.ignore_exit_code);
    }

    #[test]
    fn test_error_presets_log_and_ignore_exit_code() {
        let runner = ScriptedRunner::answering(vec![Ok(Some(1)), Ok(Some(1))]);
        let tools = toolchain(&runner);

        let mut tc = case();
        tools.lex_errors(&mut tc, &[]).unwrap();
        assert_eq!(tc.outcome, Outcome::Exited(1));
        assert!(tc.ignore_exit_code);

        let mut tc = case();
        tools.parse_errors(&mut tc, &[]).unwrap();
        assert!(tc.ignore_exit_code);

        let calls = runner.calls();
        assert_eq!(calls[0].1, strings(&["/t/c.t", "-dump-tokens", "-log", "/scratch/out.txt"]));
        assert_eq!(
            calls[1].1,
            strings(&["/t/c.t", "-fsyntax-only", "-dump-tree", "-log", "/scratch/out.txt"])
        );
    }

    #[test]
    fn test_parse_and_ssa_command_lines() {
        let runner = ScriptedRunner::default();
        let tools = toolchain(&runner);
        tools.parse(&mut case(), &[]).unwrap();
        tools.ssa(&mut case(), &[]).unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls[0].1,
            strings(&["/t/c.t", "-fsyntax-only", "-dump-tree", "-o", "/scratch/out.txt"])
        );
        assert_eq!(calls[1].1, strings(&["/t/c.t", "-S", "-emit-ssa", "-o", "/scratch/out.txt"]));
    }

    #[test]
    fn test_base_args_precede_per_test_args() {
        let runner = ScriptedRunner::default();
        let tools = toolchain(&runner).with_include_dir("/support");
        tools.lex(&mut case(), &strings(&["-I", "/local"])).unwrap();

        assert_eq!(
            runner.calls()[0].1,
            strings(&[
                "-I",
                "/support",
                "/t/c.t",
                "-dump-tokens",
                "-o",
                "/scratch/out.txt",
                "-I",
                "/local"
            ])
        );
    }

    #[test]
    fn test_compile_and_run_build_failure_skips_execution() {
        let runner = ScriptedRunner::answering(vec![Ok(Some(2))]);
        let mut tc = case();
        toolchain(&runner)
            .compile_and_run(&mut tc, RunMode::CompareOutput, &[])
            .unwrap();

        assert_eq!(tc.outcome, Outcome::BuildFailed { code: Some(2) });
        assert_eq!(tc.outcome.exit_code(), BUILD_FAILED_EXIT_CODE);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_compile_and_run_records_program_exit_code() {
        let runner = ScriptedRunner::answering(vec![Ok(Some(0)), Ok(Some(42))]);
        let mut tc = case();
        toolchain(&runner)
            .compile_and_run(&mut tc, RunMode::CompareOutput, &[])
            .unwrap();

        let exe = PathBuf::from("/scratch").join(exec_name("out"));
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].1,
            vec!["/t/c.t".to_string(), "-o".to_string(), exe.to_string_lossy().into_owned()]
        );
        assert_eq!(calls[1].0, exe);
        assert!(calls[1].1.is_empty());
        assert_eq!(tc.outcome, Outcome::Exited(42));
        assert!(!tc.ignore);
    }

    #[test]
    fn test_compile_and_run_removes_stale_executable() {
        let scratch = tempfile::TempDir::new().unwrap();
        let exe = scratch.path().join(exec_name("out"));
        fs::write(&exe, "previous test's program").unwrap();

        let runner = ScriptedRunner::default();
        let mut tc = TestCase::new("/t/c.t", "/t/c.a", scratch.path().join("out.txt"), scratch.path(), "/t");
        toolchain(&runner)
            .compile_and_run(&mut tc, RunMode::CompareOutput, &[])
            .unwrap();

        assert!(!exe.exists());
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_compile_and_run_exit_code_only_sets_ignore() {
        let runner = ScriptedRunner::default();
        let mut tc = case();
        toolchain(&runner)
            .compile_and_run(&mut tc, RunMode::ExitCodeOnly, &[])
            .unwrap();

        assert_eq!(tc.outcome, Outcome::Exited(0));
        assert!(tc.ignore);
    }

    #[test]
    fn test_apply_exit_code_only_applies_to_any_preset() {
        let runner = ScriptedRunner::default();
        let mut tc = case();
        toolchain(&runner)
            .apply(Preset::Parse, &mut tc, RunMode::ExitCodeOnly, &[])
            .unwrap();
        assert!(tc.ignore);
    }

    #[test]
    fn test_compiler_launch_failure_is_fatal() {
        let runner = ScriptedRunner::answering(vec![Err(io::Error::new(io::ErrorKind::NotFound, "gone"))]);
        let err = toolchain(&runner).lex(&mut case(), &[]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_executable_launch_failure_is_not_fatal() {
        let runner = ScriptedRunner::answering(vec![
            Ok(Some(0)),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope")),
        ]);
        let err = toolchain(&runner)
            .compile_and_run(&mut case(), RunMode::CompareOutput, &[])
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_verify_missing_compiler() {
        let err = Toolchain::new("/definitely/not/here/scc").verify().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invocation_display() {
        let out = PathBuf::from("/scratch/out.txt");
        let inv = Invocation {
            program: Path::new("/bin/scc"),
            args: vec![OsString::from("a.t"), OsString::from("-dump-tokens")],
            stdout: StdoutTarget::File(&out),
        };
        assert_eq!(inv.to_string(), "/bin/scc a.t -dump-tokens > /scratch/out.txt");
    }
}
