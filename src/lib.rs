#![forbid(unsafe_code)]
//! scctest: directory-driven test runner for the `scc` compiler
//!
//! Walks a test tree, and for every directory carrying a `scctest.toml` runs the configured preset (tokenize, parse,
//! emit SSA, compile-and-run, ...) on each test file, then compares the captured output with the expected answer,
//! ignoring whitespace.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod compare;
pub mod config;
pub mod discovery;
pub mod manager;
pub mod presets;
pub mod report;
pub mod scratch;
pub mod test_case;
pub mod version;

pub use compare::{Failure, Verdict, same_modulo_whitespace, strip_whitespace};
pub use config::{CONFIG_FILE_NAME, DirectoryConfig, LoadedConfig, load_directory_config};
pub use manager::{DirectoryState, RunnerError, TestManager};
pub use presets::{CommandRunner, Preset, RunMode, Toolchain};
pub use report::{ConsoleReporter, Summary, TestReporter};
pub use scratch::ScratchSpace;
pub use test_case::{Outcome, TestCase};
