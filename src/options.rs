use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ProgramArguments {
    #[command(flatten)]
    pub environment: EnvironmentArguments,

    #[command(subcommand)]
    pub command: HarnessCommand,
}

/// Settings normally inherited from the CI environment
#[derive(Args, Debug)]
pub struct EnvironmentArguments {
    /// C compiler for probe programs on non-MSVC platforms
    #[arg(long, env = "CC", default_value = "cc", global = true)]
    pub cc: String,

    /// Extra compiler flags, whitespace separated
    #[arg(long, env = "CFLAGS", default_value = "", global = true)]
    pub cflags: String,

    /// Extra linker flags, whitespace separated
    #[arg(long, env = "LDFLAGS", default_value = "", global = true)]
    pub ldflags: String,

    /// Build system Graphviz was built with (`cmake`, `autotools`)
    #[arg(long, env = "build_system", global = true)]
    pub build_system: Option<String>,

    /// `OFF` when Graphviz was linked statically
    #[arg(long, env = "BUILD_SHARED_LIBS", global = true)]
    pub build_shared_libs: Option<String>,

    /// Build configuration, `Debug` selects the debug C runtime on MSVC
    #[arg(long, env = "configuration", global = true)]
    pub configuration: Option<String>,

    /// CMake target architecture, e.g. `x64` or `Win32`
    #[arg(long, env = "project_platform", global = true)]
    pub project_platform: Option<String>,
}

/// Shared by the subcommands that compile probe programs
#[derive(Args, Debug)]
pub struct ProbeArguments {
    /// C source of the probe program
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Extra compiler flag, may be repeated
    #[arg(long = "cflag", value_name = "FLAG", allow_hyphen_values = true)]
    pub cflags: Vec<String>,

    /// Graphviz library name (e.g. `cgraph`) or library path, may be repeated
    #[arg(long, value_name = "LIBRARY")]
    pub link: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum HarnessCommand {
    /// Compile with MSVC-style `cl` options by way of CMake
    Cl {
        /// `cl` options and sources
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the CMakeLists.txt equivalent of `cl` options
    Translate {
        /// `cl` options and sources
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Compile a C probe program and print where the binary went
    Compile {
        #[command(flatten)]
        probe: ProbeArguments,

        /// Output binary
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compile and run a C probe program
    RunC {
        #[command(flatten)]
        probe: ProbeArguments,

        /// Text to feed the program on stdin
        #[arg(long)]
        input: Option<String>,

        /// Arguments for the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Lay out a graph with `dot`
    Dot {
        /// Output format
        #[arg(short = 'T', value_name = "FORMAT")]
        format: String,

        /// Graph file, or use --source
        #[arg(value_name = "FILE", conflicts_with = "source", required_unless_present = "source")]
        file: Option<PathBuf>,

        /// Graph source text
        #[arg(long)]
        source: Option<String>,
    },

    /// Run a GVPR program on empty input
    Gvpr {
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,
    },

    /// Locate a Graphviz program installed alongside the primary one
    Which {
        #[arg(value_name = "COMMAND")]
        command: String,

        /// Program whose directory results must share
        #[arg(long, default_value = "dot")]
        primary: String,
    },

    /// Describe the platform as the harness sees it
    Platform,

    /// Report whether a binary is built with Address Sanitizer
    CheckAsan {
        #[arg(value_name = "BINARY")]
        binary: PathBuf,
    },

    /// Strip ASan suppression summaries and macOS XType warnings from stdin
    Scrub,
}

pub fn parse_args() -> ProgramArguments {
    ProgramArguments::parse()
}
