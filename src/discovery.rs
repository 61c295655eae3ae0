//! Test file discovery
//!
//! Plain directory listings: no recursion, no errors. The walk over the tree lives in the manager.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// Immediate-child files of `dir` whose name ends with `suffix`.
///
/// An unreadable directory or one without matches yields an empty list. Results are sorted so reports are stable.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = list_dir(dir)
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| path.file_name().is_some_and(|name| has_suffix(name, suffix)))
        .collect();

    files.sort();
    files
}

/// Immediate-child directories of `dir`, sorted. Symlinked directories are not followed.
pub fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = list_dir(dir)
        .into_iter()
        .filter(|path| fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir()))
        .collect();
    dirs.sort();
    dirs
}

/// Whether the raw file name ends with `suffix`. Names that are not valid UTF-8 still match.
pub fn has_suffix(name: &OsStr, suffix: &str) -> bool {
    name.as_encoded_bytes().ends_with(suffix.as_bytes())
}

/// `name` with its trailing `from` replaced by `to`, or `None` if it does not end with `from`.
pub fn replace_suffix(name: &OsStr, from: &str, to: &str) -> Option<OsString> {
    if !has_suffix(name, from) {
        return None;
    }
    let mut replaced = stem(name, from.len())?;
    replaced.push(to);
    Some(replaced)
}

#[cfg(unix)]
fn stem(name: &OsStr, suffix_len: usize) -> Option<OsString> {
    use std::os::unix::ffi::OsStrExt;

    let bytes = name.as_bytes();
    Some(OsStr::from_bytes(&bytes[..bytes.len() - suffix_len]).to_os_string())
}

#[cfg(not(unix))]
fn stem(name: &OsStr, suffix_len: usize) -> Option<OsString> {
    let name = name.to_str()?;
    name.get(..name.len() - suffix_len).map(OsString::from)
}

fn list_dir(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "cannot list directory");
            Vec::new()
        }
    }
}
