use std::ffi::OsString;
use std::path::PathBuf;

use crate::platform::Platform;

/// Everything the harness would otherwise read from ambient process state.
///
/// Built once in `main` and handed down, so each component can be driven
/// with a fabricated configuration in tests.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub platform: Platform,
    /// This executable, re-entered as the `cl` wrapper on MSVC
    pub self_exe: PathBuf,
    /// `PATH` to search for programs
    pub path: Option<OsString>,
    /// C compiler for non-MSVC platforms
    pub cc: String,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Build system the Graphviz under test was built with
    pub build_system: Option<String>,
    pub build_shared_libs: Option<String>,
    /// Build configuration, e.g. `Debug`
    pub configuration: Option<String>,
    /// CMake `-A` architecture selector
    pub project_platform: Option<String>,
}

impl HarnessConfig {
    /// Defaults for everything but the platform and this executable's path.
    pub fn new(platform: Platform, self_exe: PathBuf) -> Self {
        Self {
            platform,
            self_exe,
            path: None,
            cc: "cc".to_owned(),
            cflags: Vec::new(),
            ldflags: Vec::new(),
            build_system: None,
            build_shared_libs: None,
            configuration: None,
            project_platform: None,
        }
    }

    pub fn build_system(&self) -> Option<&str> {
        if self.platform.is_windows() {
            return Some("cmake");
        }
        self.build_system.as_deref()
    }

    /// Was the Graphviz under test built with CMake?
    pub fn is_cmake(&self) -> bool {
        self.build_system() == Some("cmake")
    }

    /// Was the Graphviz under test built with Autotools?
    pub fn is_autotools(&self) -> bool {
        !self.platform.is_windows() && !self.is_cmake()
    }

    /// Only an explicit `BUILD_SHARED_LIBS=OFF` counts. Partially static
    /// builds do not affect the test suite.
    pub fn is_static_build(&self) -> bool {
        self.build_shared_libs.as_deref() == Some("OFF")
    }

    /// MSVC runtime library option matching the build configuration.
    pub fn runtime_flag(&self) -> &'static str {
        if self.configuration.as_deref() == Some("Debug") {
            "-MDd"
        } else {
            "-MD"
        }
    }
}
