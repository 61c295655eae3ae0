//! Scratch space shared by every test in a session
//!
//! All tests write their captured output to the same file. A [`ScratchLease`] mutably borrows the [`ScratchSpace`],
//! so only one test can hold the write/read/clear cycle at a time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the captured-output file inside the scratch directory.
pub const OUTPUT_FILE_NAME: &str = "out.txt";

/// Default scratch directory name, created under the working directory.
pub const DEFAULT_SCRATCH_DIR: &str = "__tmp__";

#[derive(Debug)]
pub struct ScratchSpace {
    dir: PathBuf,
    output: PathBuf,
}

impl ScratchSpace {
    /// Create (or reuse) the scratch directory and an empty output file.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let output = dir.join(OUTPUT_FILE_NAME);
        fs::File::create(&output)?;
        Ok(Self { dir, output })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Clear the output file and hand it to one test.
    pub fn lease(&mut self) -> io::Result<ScratchLease<'_>> {
        fs::File::create(&self.output)?;
        Ok(ScratchLease { space: self })
    }
}

/// Exclusive use of the scratch space for the duration of one test.
#[derive(Debug)]
pub struct ScratchLease<'a> {
    space: &'a mut ScratchSpace,
}

impl ScratchLease<'_> {
    pub fn dir(&self) -> &Path {
        &self.space.dir
    }

    pub fn output(&self) -> &Path {
        &self.space.output
    }

    /// Whatever the test wrote to the output file. Invalid UTF-8 is replaced rather than rejected.
    pub fn read_output(&self) -> io::Result<String> {
        let bytes = fs::read(&self.space.output)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
