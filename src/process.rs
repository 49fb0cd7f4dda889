//! Running external commands.
//!
//! Every command is echoed to stderr before it runs so a failing step can be
//! reproduced by hand. When a command fails, whatever output was captured from
//! it is replayed before the error is returned, so the real diagnostic is
//! never swallowed.
use std::ffi::OsStr;
use std::io::{self, Write};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed to write input to {program}: {source}")]
    Input { program: String, source: io::Error },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("{program} produced output that is not UTF-8")]
    Decode { program: String },
}

/// Output of a command whose stdout and stderr were both captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

/// Quote a single argument for a POSIX shell.
fn quote(arg: &OsStr) -> String {
    let arg = arg.to_string_lossy();
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c);
    if !arg.is_empty() && arg.chars().all(is_safe) {
        arg.into_owned()
    } else {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    }
}

/// The command line as it could be pasted into a shell.
pub fn display_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

fn echo(command: &Command) {
    eprintln!("+ {}", display_command(command));
}

fn spawn_error(command: &Command) -> impl FnOnce(io::Error) -> ProcessError + '_ {
    move |source| ProcessError::Spawn {
        program: program_name(command),
        source,
    }
}

/// Run a command with inherited stdio, failing on a non-zero exit.
pub fn run(command: &mut Command) -> Result<(), ProcessError> {
    echo(command);
    let status = command.status().map_err(spawn_error(command))?;
    check(command, status)
}

fn check(command: &Command, status: ExitStatus) -> Result<(), ProcessError> {
    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::Failed {
            program: program_name(command),
            status,
        })
    }
}

/// Run with stdout and stderr piped, writing `input` to stdin.
///
/// Without input stdin is closed rather than inherited, so a command that
/// unexpectedly reads it sees end of file instead of hanging.
fn capture(
    command: &mut Command,
    input: Option<&[u8]>,
    capture_stderr: bool,
) -> Result<Output, ProcessError> {
    echo(command);
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(if capture_stderr {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

    let mut child = command.spawn().map_err(spawn_error(command))?;

    // feed stdin from another thread so a chatty child cannot fill its
    // stdout pipe while we are blocked writing
    let writer = match (input, child.stdin.take()) {
        (Some(input), Some(mut stdin)) => {
            let input = input.to_vec();
            Some(thread::spawn(move || stdin.write_all(&input)))
        }
        _ => None,
    };

    let output = child.wait_with_output().map_err(spawn_error(command))?;
    if let Some(writer) = writer {
        match writer.join() {
            Ok(written) => check_input(command, written)?,
            Err(_) => log::warn!("stdin writer for {} panicked", program_name(command)),
        }
    }
    Ok(output)
}

fn check_input(command: &Command, written: io::Result<()>) -> Result<(), ProcessError> {
    match written {
        // a child that exits without reading all of its input is fine
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        result => result.map_err(|source| ProcessError::Input {
            program: program_name(command),
            source,
        }),
    }
}

/// Run a command, returning its stdout.
///
/// If it fails, its stdout is passed through to ours before the error is
/// returned.
pub fn run_raw(command: &mut Command, input: Option<&[u8]>) -> Result<Vec<u8>, ProcessError> {
    let output = capture(command, input, false)?;
    if !output.status.success() {
        let _ = io::stdout().write_all(&output.stdout);
    }
    check(command, output.status)?;
    Ok(output.stdout)
}

/// [`run_raw`] for commands that take and return text.
pub fn run_text(command: &mut Command, input: Option<&str>) -> Result<String, ProcessError> {
    let stdout = run_raw(command, input.map(str::as_bytes))?;
    String::from_utf8(stdout).map_err(|_| ProcessError::Decode {
        program: program_name(command),
    })
}

/// Run a command capturing both output streams.
///
/// Output is decoded lossily since probe programs may print arbitrary bytes.
/// On failure both streams are replayed to ours.
pub fn run_captured(command: &mut Command, input: Option<&[u8]>) -> Result<Captured, ProcessError> {
    let output = capture(command, input, true)?;
    let captured = Captured {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !output.status.success() {
        print!("{}", captured.stdout);
        eprint!("{}", captured.stderr);
    }
    check(command, output.status)?;
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quotes_only_when_needed() {
        let mut command = Command::new("dot");
        command.args(["-Tsvg", "a graph.gv", "it's", ""]);
        assert_eq!(
            r#"dot -Tsvg 'a graph.gv' 'it'"'"'s' ''"#,
            display_command(&command)
        );
    }

    #[test]
    fn plain_arguments_are_unquoted() {
        let mut command = Command::new("/usr/bin/cmake");
        command.args(["--build", "/tmp/build", "--target", "install"]);
        assert_eq!(
            "/usr/bin/cmake --build /tmp/build --target install",
            display_command(&command)
        );
    }

    #[test]
    fn missing_program() {
        let err = run(&mut Command::new("gvharness-no-such-program")).unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn unread_input_is_fine() {
        let command = Command::new("true");
        let broken = io::Error::from(io::ErrorKind::BrokenPipe);
        assert!(check_input(&command, Err(broken)).is_ok());
    }

    #[test]
    fn input_errors_name_the_write() {
        let command = Command::new("dot");
        let err = check_input(&command, Err(io::Error::other("disk on fire"))).unwrap_err();
        assert!(matches!(err, ProcessError::Input { .. }));
        assert_eq!("failed to write input to dot: disk on fire", err.to_string());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout() {
        let stdout = run_text(&mut Command::new("cat"), Some("digraph { a -> b }")).unwrap();
        assert_eq!("digraph { a -> b }", stdout);
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2"]);
        assert_eq!(
            Captured {
                stdout: "out\n".into(),
                stderr: "err\n".into(),
            },
            run_captured(&mut command, None).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn failure_is_an_error() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo oops; exit 3"]);
        let err = run_raw(&mut command, None).unwrap_err();
        assert!(matches!(err, ProcessError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn invalid_utf8_is_reported() {
        let mut command = Command::new("printf");
        command.arg(r"\377");
        let err = run_text(&mut command, None).unwrap_err();
        assert!(matches!(err, ProcessError::Decode { .. }));
    }
}
