//! Build a translated `cl` invocation with CMake.
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;
use thiserror::Error;

use crate::process::{self, ProcessError};
use crate::translator::BuildDescription;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to set up CMake project: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Make CMake complain loudly about anything questionable.
const PARANOIA: &[&str] = &["--log-level=VERBOSE", "--warn-uninitialized", "-Werror-dev"];

/// Arguments for the CMake configure step. `project_platform` selects x86 vs
/// x64 through `-A`.
pub fn configure_args(
    source: &Path,
    build: &Path,
    project_platform: Option<&str>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(platform) = project_platform {
        args.extend(["-A".into(), platform.into()]);
    }
    args.extend(["-S".into(), source.into(), "-B".into(), build.into()]);
    args.extend(PARANOIA.iter().map(OsString::from));
    args
}

/// Configure, build and install `description`.
///
/// The project lives in a temporary directory that is removed however this
/// returns. The installed binary ends up at the description's destination.
pub fn build(
    description: &BuildDescription,
    project_platform: Option<&str>,
) -> Result<(), BuildError> {
    let tmp = tempfile::Builder::new().prefix("gvharness-cl-").tempdir()?;
    log::debug!("CMake project in {}", tmp.path().display());
    build_in(&tmp, description, project_platform)
}

fn build_in(
    tmp: &TempDir,
    description: &BuildDescription,
    project_platform: Option<&str>,
) -> Result<(), BuildError> {
    let source = tmp.path().join("src");
    fs::create_dir_all(&source)?;
    let build = tmp.path().join("build");
    fs::write(source.join("CMakeLists.txt"), description.to_string())?;

    let configure = configure_args(&source, &build, project_platform);
    process::run(Command::new("cmake").args(configure))?;
    process::run(Command::new("cmake").arg("--build").arg(&build).arg("--verbose"))?;
    process::run(
        Command::new("cmake")
            .arg("--build")
            .arg(&build)
            .args(["--target", "install", "--verbose"]),
    )?;
    Ok(())
}
