//! Reverse `cl` command lines into equivalent `CMakeLists.txt` content.
//!
//! Configuring MSVC's `cl` to run standalone means dealing with fragile
//! PowerShell/Batch environments. Instead, compiler discovery is outsourced
//! to CMake: the `cl` options are translated into a CMake project which then
//! builds with whichever MSVC CMake finds. Only a subset of `cl` options is
//! recognized. Any C compiler that understands MSVC options works.
mod cmake;
mod option_kinds;

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use option_kinds::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("{option} option missing parameter")]
    MissingParameter { option: String },
    #[error("unrecognized cl option {0}")]
    UnrecognizedOption(String),
}

/// Something to link against, from the tokens following `/link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Library {
    /// `cgraph.lib`, found through the usual library search path as `cgraph`
    Named(String),
    /// Anything else, taken to be a file
    Path(PathBuf),
}

impl Library {
    fn from_token(token: &str, cwd: &Path) -> Self {
        match token.strip_suffix(".lib") {
            Some(name) if is_word(name) => Library::Named(name.to_owned()),
            _ => Library::Path(resolve(cwd, token)),
        }
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Everything collected from a `cl` command line.
///
/// All paths are absolute, so the rendered `CMakeLists.txt` (see the
/// `Display` impl) can be written to an arbitrary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescription {
    /// MSVC runtime library to link
    pub runtime_library: Option<RuntimeLibrary>,
    /// C sources to compile
    pub sources: Vec<PathBuf>,
    /// Binary output path
    pub destination: PathBuf,
    /// ISO C standard to use, C{standard}
    pub standard: Option<u32>,
    /// Macro definitions, `NAME` or `NAME=VALUE`
    pub definitions: Vec<String>,
    /// Extra compiler flags, passed through as-is
    pub compile_flags: Vec<String>,
    /// Directories to put in the include path
    pub include_dirs: Vec<PathBuf>,
    /// Libraries to link
    pub libraries: Vec<Library>,
}

impl BuildDescription {
    /// An empty description, producing `main` in `cwd`.
    pub fn new(cwd: &Path) -> Self {
        Self {
            runtime_library: None,
            sources: Vec::new(),
            destination: cwd.join("main"),
            standard: None,
            definitions: Vec::new(),
            compile_flags: Vec::new(),
            include_dirs: Vec::new(),
            libraries: Vec::new(),
        }
    }
}

/// Translate `cl` options into a build description.
///
/// `args[0]` is the program name (`"cl"`) and is ignored. Relative paths are
/// made absolute against `cwd`.
pub fn translate<S: AsRef<str>>(
    args: &[S],
    cwd: &Path,
) -> Result<BuildDescription, TranslateError> {
    let mut description = BuildDescription::new(cwd);
    let mut tokens = args.iter().map(AsRef::<str>::as_ref).skip(1);

    while let Some(token) = tokens.next() {
        let option = ClOption::classify(token);
        log::trace!("{token:?} => {option:?}");

        match option {
            ClOption::Define(definition) => {
                description.definitions.push(definition.to_owned());
            }
            ClOption::OutputFile => {
                let destination = parameter(&mut tokens, token)?;
                description.destination = absolute(cwd, destination);
            }
            ClOption::Include => {
                let dir = parameter(&mut tokens, token)?;
                description.include_dirs.push(resolve(cwd, dir));
            }
            ClOption::IncludeAttached(dir) => {
                description.include_dirs.push(resolve(cwd, dir));
            }
            ClOption::Link => {
                // swallow everything else as libraries to link
                description
                    .libraries
                    .extend(tokens.by_ref().map(|lib| Library::from_token(lib, cwd)));
                break;
            }
            // CMake sets this automatically
            ClOption::NoLogo => {}
            ClOption::Runtime(runtime) => description.runtime_library = Some(runtime),
            ClOption::Standard(standard) => description.standard = Some(standard),
            ClOption::Sanitize | ClOption::WarnAll | ClOption::WarningToggle => {
                // pass these through as-is
                description.compile_flags.push(token.to_owned());
            }
            ClOption::Source(source) => description.sources.push(absolute(cwd, source)),
            ClOption::Error => {
                return Err(TranslateError::UnrecognizedOption(token.to_owned()));
            }
        }
    }

    Ok(description)
}

/// The token following an option that takes a separate parameter.
fn parameter<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    option: &str,
) -> Result<&'a str, TranslateError> {
    tokens.next().ok_or_else(|| TranslateError::MissingParameter {
        option: option.to_owned(),
    })
}

/// `cwd`-relative absolute path, with `.` components dropped.
fn absolute(cwd: &Path, path: &str) -> PathBuf {
    cwd.join(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Like [`absolute`] but also folds `..` components. This is purely lexical;
/// symlinks are not followed.
fn resolve(cwd: &Path, path: &str) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            c => resolved.push(c),
        }
    }
    resolved
}
