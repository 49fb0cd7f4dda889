//! Finding Graphviz programs on `PATH`.
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("{0} not in $PATH")]
    PrimaryMissing(String),
}

/// Suffixes tried, in order, when looking for `cmd`.
#[cfg(windows)]
const EXECUTABLE_SUFFIXES: &[&str] = &["", ".exe", ".bat", ".cmd"];
#[cfg(not(windows))]
const EXECUTABLE_SUFFIXES: &[&str] = &[""];

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn with_suffixes(base: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    EXECUTABLE_SUFFIXES.iter().map(move |suffix| {
        let mut name = OsString::from(base.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    })
}

/// Find `cmd` the way a shell would, searching `path` (a `PATH`-style list).
///
/// A `cmd` with a directory component is checked as-is instead of searched.
pub fn which(cmd: &str, path: Option<&OsStr>) -> Option<PathBuf> {
    let found = if Path::new(cmd).components().count() > 1 {
        with_suffixes(Path::new(cmd)).find(|p| is_executable(p))
    } else {
        path.into_iter()
            .flat_map(env::split_paths)
            .filter(|dir| !dir.as_os_str().is_empty())
            .flat_map(|dir| with_suffixes(&dir.join(cmd)).collect::<Vec<_>>())
            .find(|p| is_executable(p))
    };
    log::debug!("which {cmd} => {found:?}");
    found
}

/// [`which`], but only accept results that live next to `primary`.
///
/// Graphviz has numerous optional components. If e.g. `mingle` was disabled
/// in the build under test, a naive lookup may find the `mingle` from an older
/// system-wide installation, which then loads the new installation's shared
/// libraries and most likely crashes.
pub fn which_colocated(
    cmd: &str,
    primary: &str,
    path: Option<&OsStr>,
) -> Result<Option<PathBuf>, DiscoveryError> {
    let Some(found) = which(cmd, path) else {
        return Ok(None);
    };

    let primary_path =
        which(primary, path).ok_or_else(|| DiscoveryError::PrimaryMissing(primary.to_owned()))?;

    if found.parent() != primary_path.parent() {
        log::debug!(
            "discarding {} as it is not alongside {}",
            found.display(),
            primary_path.display()
        );
        return Ok(None);
    }
    Ok(Some(found))
}
