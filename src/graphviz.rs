//! Running the Graphviz command line tools.
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::discovery::{which_colocated, DiscoveryError};
use crate::process::{self, ProcessError};

#[derive(Debug, Error)]
pub enum GraphvizError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("attempt to run {0} without it available")]
    Unavailable(&'static str),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Output formats `dot` writes as text rather than binary.
const TEXTUAL_FORMATS: &[&str] = &[
    "canon",
    "cmapx",
    "dot",
    "fig",
    "gv",
    "json",
    "pic",
    "svg",
    "svg_inline",
    "xdot",
    "xdot1.2",
    "xdot1.4",
];

pub fn is_textual_format(format: &str) -> bool {
    TEXTUAL_FORMATS.contains(&format)
}

/// What to lay out.
#[derive(Debug, Clone, Copy)]
pub enum DotInput<'a> {
    File(&'a Path),
    /// Graph source, fed to `dot` on stdin
    Source(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotOutput {
    Text(String),
    Binary(Vec<u8>),
}

impl DotOutput {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DotOutput::Text(text) => text.as_bytes(),
            DotOutput::Binary(bytes) => bytes,
        }
    }
}

/// Run `dot -T<format>` over the input.
///
/// The output is decoded as UTF-8 for textual formats, see
/// [`is_textual_format`].
pub fn dot(format: &str, input: DotInput<'_>) -> Result<DotOutput, ProcessError> {
    let mut command = Command::new("dot");
    command.arg(format!("-T{format}"));
    let source = match input {
        DotInput::File(file) => {
            command.arg(file);
            None
        }
        DotInput::Source(source) => Some(source),
    };

    if is_textual_format(format) {
        Ok(DotOutput::Text(process::run_text(&mut command, source)?))
    } else {
        let bytes = process::run_raw(&mut command, source.map(str::as_bytes))?;
        Ok(DotOutput::Binary(bytes))
    }
}

/// Run a GVPR program on empty input.
///
/// The `gvpr` used must be the one installed alongside `dot`.
pub fn gvpr(program: &Path, path: Option<&OsStr>) -> Result<String, GraphvizError> {
    let gvpr = which_colocated("gvpr", "dot", path)?.ok_or(GraphvizError::Unavailable("GVPR"))?;
    let output = process::run_text(Command::new(gvpr).arg("-f").arg(program), None)?;
    Ok(output)
}
