use std::fmt;
use std::path::Path;

use super::{BuildDescription, Library};

/// Escape a path for use in a CMake file.
///
/// Windows paths typically contain backslashes, e.g. `C:\foo\bar`. CMake reads
/// those as escape sequences, so they are replaced with forward slashes.
pub fn safe_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Release year of a C standard as spelled in `/std:cNN`.
///
/// Two digit versions wrap at the century: `99` is C99, `11` is C11.
fn standard_year(standard: u32) -> u32 {
    match standard {
        70..=99 => 1900 + standard,
        0..=69 => 2000 + standard,
        year => year,
    }
}

impl fmt::Display for BuildDescription {
    /// Render as `CMakeLists.txt` content.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cmake_minimum_required(VERSION 3.21 FATAL_ERROR)")?;
        writeln!(f, "project(temp C)")?;

        if let Some(standard) = self.standard {
            writeln!(f, "set(CMAKE_C_STANDARD {standard})")?;
            writeln!(f, "set(CMAKE_C_STANDARD_REQUIRED ON)")?;
            if standard_year(standard) >= 2011 {
                writeln!(f, "if(${{CMAKE_C_COMPILER_ID}} STREQUAL MSVC)")?;
                writeln!(
                    f,
                    "  set(CMAKE_C_FLAGS \"${{CMAKE_C_FLAGS}} /experimental:c11atomics\")"
                )?;
                writeln!(f, "endif()")?;
            }
        }

        writeln!(f, "add_executable(main")?;
        for source in &self.sources {
            writeln!(f, "  {}", safe_path(source))?;
        }
        writeln!(f, ")")?;

        for definition in &self.definitions {
            writeln!(f, "target_compile_definitions(main PRIVATE {definition})")?;
        }

        if !self.compile_flags.is_empty() {
            writeln!(f, "include(CheckCCompilerFlag)")?;
        }
        for (index, flag) in self.compile_flags.iter().enumerate() {
            writeln!(f, "check_c_compiler_flag({flag} WAS_SUPPORTED{index})")?;
            writeln!(f, "if(NOT WAS_SUPPORTED{index})")?;
            writeln!(f, "  message(FATAL_ERROR \"compiler does not understand {flag}\")")?;
            writeln!(f, "endif()")?;
            writeln!(f, "target_compile_options(main PRIVATE {flag})")?;
        }

        for dir in &self.include_dirs {
            writeln!(f, "target_include_directories(main PRIVATE {})", safe_path(dir))?;
        }

        if let Some(runtime) = self.runtime_library {
            writeln!(
                f,
                "set_target_properties(main PROPERTIES MSVC_RUNTIME_LIBRARY {})",
                runtime.as_cmake_name()
            )?;
        }

        for (index, library) in self.libraries.iter().enumerate() {
            match library {
                Library::Named(name) => {
                    writeln!(f, "find_library(LIB{index} {name} REQUIRED)")?;
                }
                Library::Path(path) => {
                    writeln!(f, "find_library(")?;
                    writeln!(f, "  LIB{index} {}", file_name(path))?;
                    writeln!(f, "  PATHS {}", safe_path(parent(path)))?;
                    writeln!(f, "  REQUIRED")?;
                    writeln!(f, "  NO_DEFAULT_PATH")?;
                    writeln!(f, ")")?;
                }
            }
            writeln!(f, "target_link_libraries(main PRIVATE ${{LIB{index}}})")?;
        }

        writeln!(f, "install(PROGRAMS")?;
        writeln!(f, "  $<TARGET_FILE:main>")?;
        writeln!(f, "  DESTINATION {}", safe_path(parent(&self.destination)))?;
        writeln!(f, "  RENAME {}", file_name(&self.destination))?;
        writeln!(f, ")")
    }
}

fn parent(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::translator::translate;

    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn render(args: &[&str]) -> String {
        translate(args, Path::new("/work/tests")).unwrap().to_string()
    }

    /// Read the ordered lists back out of a rendered document.
    #[derive(Debug, Default, PartialEq)]
    struct Lists {
        sources: Vec<String>,
        definitions: Vec<String>,
        include_dirs: Vec<String>,
        libraries: Vec<String>,
    }

    fn read_back(document: &str) -> Lists {
        let mut lists = Lists::default();
        let mut lines = document.lines();
        while let Some(line) = lines.next() {
            if line == "add_executable(main" {
                lists.sources.extend(
                    lines
                        .by_ref()
                        .take_while(|l| *l != ")")
                        .map(|l| l.trim().to_owned()),
                );
            } else if let Some(d) = line.strip_prefix("target_compile_definitions(main PRIVATE ") {
                lists.definitions.push(d.trim_end_matches(')').to_owned());
            } else if let Some(i) = line.strip_prefix("target_include_directories(main PRIVATE ")
            {
                lists.include_dirs.push(i.trim_end_matches(')').to_owned());
            } else if let Some(rest) = line.strip_prefix("find_library(LIB") {
                let name = rest.split(' ').nth(1).unwrap_or_default();
                lists.libraries.push(format!("{name}.lib"));
            } else if line == "find_library(" {
                let name = lines.next().unwrap().split(' ').last().unwrap().to_owned();
                let dir = lines.next().unwrap().trim().trim_start_matches("PATHS ");
                lists.libraries.push(format!("{dir}/{name}"));
            }
        }
        lists
    }

    #[test]
    fn minimal_document() {
        assert_eq!(
            indoc!(
                "
                cmake_minimum_required(VERSION 3.21 FATAL_ERROR)
                project(temp C)
                add_executable(main
                )
                install(PROGRAMS
                  $<TARGET_FILE:main>
                  DESTINATION /work/tests
                  RENAME main
                )
                "
            ),
            render(&["cl"])
        );
    }

    #[test]
    fn typical_probe_compilation() {
        assert_eq!(
            indoc!(
                r#"
                cmake_minimum_required(VERSION 3.21 FATAL_ERROR)
                project(temp C)
                set(CMAKE_C_STANDARD 17)
                set(CMAKE_C_STANDARD_REQUIRED ON)
                if(${CMAKE_C_COMPILER_ID} STREQUAL MSVC)
                  set(CMAKE_C_FLAGS "${CMAKE_C_FLAGS} /experimental:c11atomics")
                endif()
                add_executable(main
                  /work/tests/2598.c
                )
                target_compile_definitions(main PRIVATE GVDLL=1)
                include(CheckCCompilerFlag)
                check_c_compiler_flag(/Wall WAS_SUPPORTED0)
                if(NOT WAS_SUPPORTED0)
                  message(FATAL_ERROR "compiler does not understand /Wall")
                endif()
                target_compile_options(main PRIVATE /Wall)
                check_c_compiler_flag(/wd4820 WAS_SUPPORTED1)
                if(NOT WAS_SUPPORTED1)
                  message(FATAL_ERROR "compiler does not understand /wd4820")
                endif()
                target_compile_options(main PRIVATE /wd4820)
                target_include_directories(main PRIVATE /work/lib)
                set_target_properties(main PROPERTIES MSVC_RUNTIME_LIBRARY MultiThreadedDLL)
                find_library(LIB0 cgraph REQUIRED)
                target_link_libraries(main PRIVATE ${LIB0})
                find_library(
                  LIB1 libbar.so
                  PATHS /x/y
                  REQUIRED
                  NO_DEFAULT_PATH
                )
                target_link_libraries(main PRIVATE ${LIB1})
                install(PROGRAMS
                  $<TARGET_FILE:main>
                  DESTINATION /tmp/probe
                  RENAME a.exe
                )
                "#
            ),
            render(&[
                "cl",
                "/std:c17",
                "2598.c",
                "-Fe:",
                "/tmp/probe/a.exe",
                "-nologo",
                "-MD",
                "/Wall",
                "/wd4820",
                "-DGVDLL=1",
                "/I",
                "../lib",
                "-link",
                "cgraph.lib",
                "/x/y/libbar.so",
            ])
        );
    }

    #[test]
    fn debug_runtime() {
        let expected =
            "set_target_properties(main PROPERTIES MSVC_RUNTIME_LIBRARY MultiThreadedDebugDLL)\n";
        assert!(render(&["cl", "/MDd"]).contains(expected));
    }

    #[test]
    fn old_standards_skip_atomics() {
        let document = render(&["cl", "/std:c99"]);
        assert!(document.contains("set(CMAKE_C_STANDARD 99)\n"));
        assert!(!document.contains("c11atomics"));
        assert!(render(&["cl", "/std:c11"]).contains("/experimental:c11atomics"));
        assert!(!render(&["cl"]).contains("CMAKE_C_STANDARD"));
    }

    #[test]
    fn standards_compare_by_year() {
        assert_eq!(1989, standard_year(89));
        assert_eq!(1999, standard_year(99));
        assert_eq!(2011, standard_year(11));
        assert_eq!(2023, standard_year(23));
        assert!(!render(&["cl", "/std:c89"]).contains("c11atomics"));
        assert!(render(&["cl", "/std:c23"]).contains("c11atomics"));
    }

    #[test]
    fn no_flag_check_without_flags() {
        assert!(!render(&["cl", "main.c"]).contains("CheckCCompilerFlag"));
    }

    #[test]
    fn one_probe_per_flag_in_order() {
        let document = render(&["cl", "-fsanitize=address", "/we4013"]);
        assert_eq!(1, document.matches("include(CheckCCompilerFlag)").count());
        let sanitize = document.find("check_c_compiler_flag(-fsanitize=address WAS_SUPPORTED0)");
        let warning = document.find("check_c_compiler_flag(/we4013 WAS_SUPPORTED1)");
        assert!(sanitize.is_some());
        assert!(sanitize < warning);
    }

    #[test]
    fn backslashes_are_escaped() {
        assert_eq!("C:/graphviz/lib", safe_path(Path::new(r"C:\graphviz\lib")));

        let mut description = crate::translator::BuildDescription::new(Path::new("/work"));
        description.sources.push(PathBuf::from(r"C:\gv\tests\2648.c"));
        assert!(description.to_string().contains("  C:/gv/tests/2648.c\n"));
    }

    #[test]
    fn lists_read_back_in_order() {
        let document = render(&[
            "cl",
            "b.c",
            "a.c",
            "/DZ",
            "/DA=1",
            "-Iinc",
            "/I",
            "/opt/include",
            "/link",
            "gvc.lib",
            "/usr/lib/libcdt.so",
            "cgraph.lib",
        ]);
        assert_eq!(
            Lists {
                sources: vec!["/work/tests/b.c".into(), "/work/tests/a.c".into()],
                definitions: vec!["Z".into(), "A=1".into()],
                include_dirs: vec!["/work/tests/inc".into(), "/opt/include".into()],
                libraries: vec![
                    "gvc.lib".into(),
                    "/usr/lib/libcdt.so".into(),
                    "cgraph.lib".into()
                ],
            },
            read_back(&document)
        );
    }
}
