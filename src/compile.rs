//! Compiling and running C probe programs against the Graphviz libraries.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::config::HarnessConfig;
use crate::discovery::which;
use crate::platform::Platform;
use crate::process::{self, Captured, ProcessError};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("`dot` not found")]
    DotMissing,
}

/// A C program to compile.
#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    pub source: PathBuf,
    pub cflags: Vec<String>,
    /// Library names (`cgraph`) or paths to library files
    pub link: Vec<String>,
    /// Where to put the binary, a fresh temporary file if unset
    pub destination: Option<PathBuf>,
}

impl CompileRequest {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }
}

/// Warnings to enable in probe programs.
///
/// On MSVC, C4820 (struct padding) and C5045 (Spectre mitigation
/// opportunities) are disabled since they are noise in test code.
pub fn warning_flags(platform: Platform) -> &'static [&'static str] {
    if platform.is_msvc() {
        &["/Wall", "/wd4820", "/wd5045"]
    } else {
        &["-Wall", "-Wextra"]
    }
}

/// A library to link against, as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkTarget<'a> {
    /// An existing absolute path, used without any lookup
    File(&'a str),
    Name(&'a str),
}

impl<'a> LinkTarget<'a> {
    fn classify(link: &'a str) -> Self {
        let path = Path::new(link);
        if path.is_absolute() && path.exists() {
            LinkTarget::File(link)
        } else {
            LinkTarget::Name(link)
        }
    }
}

/// Compiler and linker flags for a set of link targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LinkFlags {
    cflags: Vec<String>,
    ldflags: Vec<String>,
}

/// Link flags spelled out directly, without pkg-config.
fn direct_link_flags(
    platform: Platform,
    static_build: bool,
    targets: &[LinkTarget<'_>],
) -> LinkFlags {
    let mut flags = LinkFlags::default();
    if platform.is_msvc() {
        if targets.is_empty() {
            return flags;
        }
        if !static_build {
            flags.cflags.push("-DGVDLL=1".to_owned());
        }
        flags.ldflags.push("-link".to_owned());
        flags.ldflags.extend(targets.iter().map(|target| match target {
            LinkTarget::File(file) => (*file).to_owned(),
            LinkTarget::Name(name) => format!("{name}.lib"),
        }));
    } else {
        flags.ldflags.extend(targets.iter().map(|target| match target {
            LinkTarget::File(file) => (*file).to_owned(),
            LinkTarget::Name(name) => format!("-l{name}"),
        }));
    }
    flags
}

/// Link flags through pkg-config, assuming it can find Graphviz' `.pc` files.
///
/// Names are looked up in batches. An absolute path flushes the pending batch
/// first to roughly keep the library order the caller asked for.
fn pkg_config_link_flags(
    pkgconf: &Path,
    targets: &[LinkTarget<'_>],
) -> Result<LinkFlags, ProcessError> {
    let mut flags = LinkFlags::default();
    let mut pending: Vec<String> = Vec::new();
    for target in targets {
        match target {
            LinkTarget::File(file) => {
                flush_pkg_config(pkgconf, &mut pending, &mut flags)?;
                flags.ldflags.push((*file).to_owned());
            }
            LinkTarget::Name(name) => pending.push(format!("lib{name}")),
        }
    }
    flush_pkg_config(pkgconf, &mut pending, &mut flags)?;
    Ok(flags)
}

fn flush_pkg_config(
    pkgconf: &Path,
    pending: &mut Vec<String>,
    flags: &mut LinkFlags,
) -> Result<(), ProcessError> {
    if pending.is_empty() {
        return Ok(());
    }
    for (query, out) in [("--cflags", &mut flags.cflags), ("--libs", &mut flags.ldflags)] {
        let found = process::run_text(
            Command::new(pkgconf).arg(query).arg("--").args(pending.iter()),
            None,
        )?;
        out.extend(found.split_whitespace().map(str::to_owned));
    }
    pending.clear();
    Ok(())
}

/// The full compiler command line.
///
/// MSVC goes through this harness' own `cl` wrapper; everything else uses
/// `config.cc` directly.
pub fn compiler_command(
    config: &HarnessConfig,
    source: &Path,
    destination: &Path,
    cflags: &[String],
    ldflags: &[String],
) -> Command {
    let mut command;
    if config.platform.is_msvc() {
        command = Command::new(&config.self_exe);
        command
            .args(["cl", "/std:c17"])
            .arg(source)
            .arg("-Fe:")
            .arg(destination)
            .args(["-nologo", config.runtime_flag()]);
    } else {
        command = Command::new(&config.cc);
        command.arg("-std=c17").arg(source).arg("-o").arg(destination);
    }
    command.args(cflags).args(ldflags);
    command
}

/// Compile a C program, returning the path of the binary.
///
/// If compilation fails, the destination is removed.
pub fn compile_c(
    config: &HarnessConfig,
    request: &CompileRequest,
) -> Result<PathBuf, CompileError> {
    let path = config.path.as_deref();

    let mut cflags: Vec<String> = warning_flags(config.platform)
        .iter()
        .map(|f| (*f).to_owned())
        .chain(config.cflags.iter().cloned())
        .chain(request.cflags.iter().cloned())
        .collect();
    let mut ldflags = config.ldflags.clone();

    // on macOS, ensure the compiled binary can find Graphviz libraries at runtime
    if config.platform.is_macos() {
        let dot = which("dot", path).ok_or(CompileError::DotMissing)?;
        let prefix = dot.parent().and_then(Path::parent).unwrap_or(Path::new("/"));
        ldflags.push(format!("-Wl,-rpath,{}", prefix.join("lib").display()));
    }

    let targets: Vec<LinkTarget<'_>> = request
        .link
        .iter()
        .map(|l| LinkTarget::classify(l))
        .collect();
    let pkgconf = which("pkg-config", path).or_else(|| which("pkgconf", path));
    let link = match pkgconf {
        Some(pkgconf) if !config.is_cmake() => pkg_config_link_flags(&pkgconf, &targets)?,
        _ => direct_link_flags(config.platform, config.is_static_build(), &targets),
    };
    cflags.extend(link.cflags);
    ldflags.extend(link.ldflags);

    let destination = match &request.destination {
        Some(destination) => destination.clone(),
        None => {
            let file = tempfile::Builder::new().suffix(".exe").tempfile()?;
            let (_, path) = file.keep().map_err(|e| e.error)?;
            path
        }
    };

    let mut command = compiler_command(config, &request.source, &destination, &cflags, &ldflags);
    if let Err(e) = process::run_raw(&mut command, None) {
        match fs::remove_file(&destination) {
            Err(remove) if remove.kind() != io::ErrorKind::NotFound => {
                log::warn!("could not remove {}: {remove}", destination.display());
            }
            _ => {}
        }
        return Err(e.into());
    }
    Ok(destination)
}

/// Compile and run a C program, returning its stdout and stderr.
pub fn run_c(
    config: &HarnessConfig,
    request: &CompileRequest,
    args: &[String],
    input: Option<&str>,
) -> Result<Captured, CompileError> {
    let tmp = tempfile::tempdir()?;
    let exe = tmp.path().join("a.exe");

    let request = CompileRequest {
        destination: Some(exe.clone()),
        ..request.clone()
    };
    compile_c(config, &request)?;

    let mut command = Command::new(&exe);
    command.args(args);
    Ok(process::run_captured(&mut command, input.map(str::as_bytes))?)
}
