//! Per-directory test configuration
//!
//! A test directory opts in by containing a [`CONFIG_FILE_NAME`] file. The file picks a preset (the directory's
//! `run` policy) and may override the test and answer suffixes:
//!
//! ```toml
//! test_ext = ".c"
//! ans_ext = ".out"
//!
//! [run]
//! preset = "compile-and-run"
//! args = ["-I", "{dir}/include"]
//! exit_code_only = false
//!
//! [files."crash.c"]
//! exit_code_only = true
//! ```
//!
//! Every directory is loaded on its own: nothing is cached and nothing is inherited from parent directories. The
//! only thing a configuration can reach is the preset registry.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::presets::{Preset, PresetError, RunMode, Toolchain};
use crate::test_case::TestCase;

/// File name looked up in every directory of the test tree.
pub const CONFIG_FILE_NAME: &str = "scctest.toml";

/// Suffix of test inputs unless overridden.
pub const DEFAULT_TEST_EXT: &str = ".t";

/// Suffix of expected-answer files unless overridden.
pub const DEFAULT_ANS_EXT: &str = ".a";

/// Placeholder in `args` replaced with the configuration's directory.
pub const DIR_PLACEHOLDER: &str = "{dir}";

/// Errors produced while loading a directory configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read '{}'", path.display())]
    #[diagnostic(code(scctest::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid test configuration '{}'", path.display())]
    #[diagnostic(
        code(scctest::config::parse),
        help(
            "a test directory needs a `[run]` table with `preset` set to one of: \
             lex, lex-errors, parse, parse-errors, ssa, compile-and-run"
        )
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("`{key}` in '{}' must not be empty", path.display())]
    #[diagnostic(code(scctest::config::empty_suffix))]
    EmptySuffix { path: PathBuf, key: &'static str },
}

impl ConfigError {
    /// Path of the offending configuration file.
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } | ConfigError::EmptySuffix { path, .. } => {
                path
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    test_ext: Option<String>,
    ans_ext: Option<String>,
    run: Option<RunSpec>,
    #[serde(default)]
    files: BTreeMap<String, FileOverride>,
}

/// The directory's `run` policy: a preset plus how to call it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    pub preset: Preset,
    /// Extra compiler flags for every test in the directory.
    #[serde(default)]
    pub args: Vec<String>,
    /// Only check exit codes; skip output comparison.
    #[serde(default)]
    pub exit_code_only: bool,
    /// Force the preset's `ignore_exit_code` choice.
    #[serde(default)]
    pub ignore_exit_code: Option<bool>,
}

/// Settings for a single test file, layered over the directory's [`RunSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOverride {
    /// Appended after the directory-wide args.
    #[serde(default)]
    pub args: Vec<String>,
    pub exit_code_only: Option<bool>,
    pub ignore_exit_code: Option<bool>,
}

/// An active directory configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub dir: PathBuf,
    pub test_ext: String,
    pub ans_ext: String,
    pub run: RunSpec,
    pub files: BTreeMap<String, FileOverride>,
}

/// Result of looking for a configuration in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedConfig {
    /// No configuration file.
    Missing,
    /// A configuration file without a `[run]` table.
    WithoutRun,
    Active(DirectoryConfig),
}

/// Load the configuration of `dir`, if it has one.
pub fn load_directory_config(dir: &Path) -> Result<LoadedConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok(LoadedConfig::Missing);
    }

    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    parse_config(dir, &path, &text)
}

/// Parse configuration `text` read from `path` inside `dir`.
pub fn parse_config(dir: &Path, path: &Path, text: &str) -> Result<LoadedConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(run) = raw.run else {
        return Ok(LoadedConfig::WithoutRun);
    };

    let test_ext = suffix(path, "test_ext", raw.test_ext, DEFAULT_TEST_EXT)?;
    let ans_ext = suffix(path, "ans_ext", raw.ans_ext, DEFAULT_ANS_EXT)?;

    Ok(LoadedConfig::Active(DirectoryConfig {
        dir: dir.to_path_buf(),
        test_ext,
        ans_ext,
        run,
        files: raw.files,
    }))
}

fn suffix(path: &Path, key: &'static str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    match value {
        Some(v) if v.is_empty() => Err(ConfigError::EmptySuffix {
            path: path.to_path_buf(),
            key,
        }),
        Some(v) => Ok(v),
        None => Ok(default.to_string()),
    }
}

/// Everything needed to run one test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    pub preset: Preset,
    pub args: Vec<String>,
    pub mode: RunMode,
    pub ignore_exit_code: Option<bool>,
}

impl TestPlan {
    /// Run the plan's preset on `case`, then apply the configured flag overrides.
    pub fn execute(&self, toolchain: &Toolchain, case: &mut TestCase) -> Result<(), PresetError> {
        toolchain.apply(self.preset, case, self.mode, &self.args)?;
        if let Some(ignore_exit_code) = self.ignore_exit_code {
            case.ignore_exit_code = ignore_exit_code;
        }
        Ok(())
    }
}

impl DirectoryConfig {
    /// Resolve the plan for the test file called `file_name`.
    pub fn plan_for(&self, file_name: &str) -> TestPlan {
        let file = self.files.get(file_name);
        let dir = self.dir.to_string_lossy();

        let args = self
            .run
            .args
            .iter()
            .chain(file.into_iter().flat_map(|f| f.args.iter()))
            .map(|arg| arg.replace(DIR_PLACEHOLDER, &dir))
            .collect();

        let exit_code_only = file
            .and_then(|f| f.exit_code_only)
            .unwrap_or(self.run.exit_code_only);

        TestPlan {
            preset: self.run.preset,
            args,
            mode: if exit_code_only {
                RunMode::ExitCodeOnly
            } else {
                RunMode::CompareOutput
            },
            ignore_exit_code: file.and_then(|f| f.ignore_exit_code).or(self.run.ignore_exit_code),
        }
    }
}
