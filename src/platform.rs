//! Questions about the machine the harness runs on.
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use regex::bytes::Regex as BytesRegex;
use regex::Regex;

use crate::discovery::which;
use crate::process::{self, ProcessError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    /// Windows with a GNU toolchain rather than MSVC
    pub mingw: bool,
}

impl Platform {
    pub fn host() -> Self {
        let os = if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(windows) {
            Os::Windows
        } else {
            Os::Other
        };
        Self {
            os,
            mingw: cfg!(all(windows, target_env = "gnu")),
        }
    }

    #[inline]
    pub fn is_macos(&self) -> bool {
        self.os == Os::MacOs
    }

    #[inline]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    #[inline]
    pub fn is_mingw(&self) -> bool {
        self.mingw
    }

    /// Windows, compiling with MSVC `cl`
    #[inline]
    pub fn is_msvc(&self) -> bool {
        self.is_windows() && !self.mingw
    }
}

/// Parse `/etc/os-release` style `KEY=VALUE` lines.
pub fn parse_os_release(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_owned(), value.to_owned())
        })
        .collect()
}

/// Read and parse an os-release file. A missing file is an empty release.
pub fn read_os_release(path: &Path) -> io::Result<BTreeMap<String, String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(parse_os_release(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e),
    }
}

/// Is this Rocky Linux, and if `version` is given, that major version?
pub fn is_rocky(release: &BTreeMap<String, String>, version: Option<&str>) -> bool {
    if release.get("ID").map(String::as_str) != Some("rocky") {
        return false;
    }
    let Some(wanted) = version else {
        return true;
    };
    let Some(version_id) = release.get("VERSION_ID") else {
        return false;
    };
    // `8` matches `8.10` but not `80`
    version_id.strip_prefix(wanted).is_some_and(|rest| {
        !rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
    })
}

pub fn is_rocky_8(release: &BTreeMap<String, String>) -> bool {
    is_rocky(release, Some("8"))
}

/// Is there a sandbox mechanism `dot_sandbox` could use?
pub fn has_sandbox(platform: Platform, path: Option<&OsStr>) -> bool {
    which("bwrap", path).is_some() || platform.is_macos()
}

/// Is `binary` built with Address Sanitizer?
///
/// This gives false negatives when no symbol table inspection tool is
/// installed or the symbol table was stripped.
pub fn is_asan_instrumented(binary: &Path, path: Option<&OsStr>) -> Result<bool, ProcessError> {
    // A reference to `__asan_init` exists even with `-static-libasan`. The
    // symbol table is matched as bytes since it need not be UTF-8.
    let symbol_dumpers = ["objdump", "llvm-objdump"];
    if let Some(dumper) = symbol_dumpers.iter().find_map(|tool| which(tool, path)) {
        let symbols = process::run_raw(Command::new(dumper).arg("--syms").arg(binary), None)?;
        static ASAN_INIT: OnceLock<BytesRegex> = OnceLock::new();
        let asan_init = ASAN_INIT
            .get_or_init(|| BytesRegex::new(r"\b__asan_init\b").expect("valid symbol pattern"));
        return Ok(asan_init.is_match(&symbols));
    }

    if let Some(dumpbin) = which("dumpbin", path) {
        let dependencies =
            process::run_raw(Command::new(dumpbin).arg("/DEPENDENTS").arg(binary), None)?;
        static ASAN_DLL: OnceLock<BytesRegex> = OnceLock::new();
        let asan_dll = ASAN_DLL.get_or_init(|| {
            BytesRegex::new(r"\bclang_rt\.asan_dynamic-.*\.dll\b").expect("valid DLL pattern")
        });
        return Ok(asan_dll.is_match(&dependencies));
    }

    log::debug!("no symbol table tool found, assuming no ASan");
    Ok(false)
}

/// Remove the "Suppressions used" block Address Sanitizer prints, which gets
/// in the way of scanning output for expected content.
pub fn remove_asan_summary(text: &str) -> String {
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    SUMMARY
        .get_or_init(|| {
            Regex::new(r"-+\nSuppressions used:[^\-]+-+\n?\n?").expect("valid summary pattern")
        })
        .replace_all(text, "")
        .into_owned()
}

/// Remove the harmless XType warnings macOS CI prints. Other platforms'
/// output is returned untouched.
pub fn remove_xtype_warnings(platform: Platform, text: &str) -> String {
    if !platform.is_macos() {
        return text.to_owned();
    }
    static XTYPE: OnceLock<Regex> = OnceLock::new();
    XTYPE
        .get_or_init(|| Regex::new(r"(?m)^.* XType: .*\.$\n").expect("valid warning pattern"))
        .replace_all(text, "")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const LINUX: Platform = Platform {
        os: Os::Linux,
        mingw: false,
    };
    const MACOS: Platform = Platform {
        os: Os::MacOs,
        mingw: false,
    };

    fn rocky(version_id: &str) -> BTreeMap<String, String> {
        parse_os_release(&format!("ID=\"rocky\"\nVERSION_ID=\"{version_id}\"\n"))
    }

    #[test]
    fn os_release() {
        let release = parse_os_release(indoc!(
            r#"
            # a comment
            NAME="Rocky Linux"
            ID=rocky
            VERSION_ID = "8.9"
            nonsense
            EMPTY=
            "#
        ));
        assert_eq!(
            vec![
                ("EMPTY", ""),
                ("ID", "rocky"),
                ("NAME", "Rocky Linux"),
                ("VERSION_ID", "8.9"),
            ],
            release
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn missing_os_release_is_empty() {
        let release = read_os_release(Path::new("/nonexistent/os-release")).unwrap();
        assert!(release.is_empty());
    }

    #[test]
    fn rocky_versions() {
        assert!(is_rocky(&rocky("9.3"), None));
        assert!(is_rocky_8(&rocky("8.9")));
        assert!(is_rocky_8(&rocky("8")));
        assert!(!is_rocky_8(&rocky("9.3")));
        assert!(!is_rocky_8(&rocky("80")));
        assert!(!is_rocky(&parse_os_release("ID=ubuntu\n"), None));
        assert!(!is_rocky_8(&parse_os_release("ID=rocky\n")));
    }

    #[test]
    fn msvc_is_windows_without_mingw() {
        let msvc = Platform {
            os: Os::Windows,
            mingw: false,
        };
        let mingw = Platform {
            os: Os::Windows,
            mingw: true,
        };
        assert!(msvc.is_msvc());
        assert!(!mingw.is_msvc());
        assert!(!LINUX.is_msvc());
    }

    #[test]
    fn macos_always_has_a_sandbox() {
        assert!(has_sandbox(MACOS, None));
        assert!(!has_sandbox(LINUX, None));
    }

    #[test]
    fn asan_summary() {
        let output = indoc!(
            "
            warning: something
            -----------------------------------------------------
            Suppressions used:
              count      bytes template
                  1         24 libfontconfig
            -----------------------------------------------------

            done
            "
        );
        assert_eq!("warning: something\ndone\n", remove_asan_summary(output));
        assert_eq!("no summary\n", remove_asan_summary("no summary\n"));
    }

    #[test]
    fn xtype_warnings_only_removed_on_macos() {
        let output = "2024-01-01 dot[123] XType: Using static font registry.\nok\n";
        assert_eq!("ok\n", remove_xtype_warnings(MACOS, output));
        assert_eq!(output, remove_xtype_warnings(LINUX, output));
    }

    #[cfg(unix)]
    fn fake_objdump(symbols: &str) -> tempfile::TempDir {
        use std::os::unix::fs::PermissionsExt;
        let tools = tempfile::tempdir().unwrap();
        let objdump = tools.path().join("objdump");
        fs::write(&objdump, format!("#!/bin/sh\necho '{symbols}'\n")).unwrap();
        fs::set_permissions(&objdump, fs::Permissions::from_mode(0o755)).unwrap();
        tools
    }

    #[cfg(unix)]
    #[test]
    fn asan_init_symbol() {
        let tools = fake_objdump("0000000000000000 *UND* __asan_init");
        let path = Some(tools.path().as_os_str());
        assert!(is_asan_instrumented(Path::new("/bin/sh"), path).unwrap());

        let tools = fake_objdump("0000000000000000 *UND* __asan_init_v2");
        let path = Some(tools.path().as_os_str());
        assert!(!is_asan_instrumented(Path::new("/bin/sh"), path).unwrap());
    }

    #[test]
    fn no_tools_means_no_asan() {
        assert_eq!(Ok(false), is_asan_instrumented(Path::new("/bin/sh"), None).map_err(|_| ()));
    }
}
