mod cmake_build;
mod compile;
mod config;
mod discovery;
mod graphviz;
mod options;
mod platform;
mod process;
mod translator;

use std::error::Error;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use compile::CompileRequest;
use config::HarnessConfig;
use graphviz::DotInput;
use options::{EnvironmentArguments, HarnessCommand, ProbeArguments};
use platform::Platform;

fn split_flags(flags: &str) -> Vec<String> {
    flags.split_whitespace().map(str::to_owned).collect()
}

fn harness_config(environment: EnvironmentArguments) -> io::Result<HarnessConfig> {
    let mut config = HarnessConfig::new(Platform::host(), std::env::current_exe()?);
    config.path = std::env::var_os("PATH");
    config.cc = environment.cc;
    config.cflags = split_flags(&environment.cflags);
    config.ldflags = split_flags(&environment.ldflags);
    config.build_system = environment.build_system;
    config.build_shared_libs = environment.build_shared_libs;
    config.configuration = environment.configuration;
    config.project_platform = environment.project_platform;
    Ok(config)
}

fn compile_request(probe: ProbeArguments) -> CompileRequest {
    CompileRequest {
        cflags: probe.cflags,
        link: probe.link,
        ..CompileRequest::new(probe.source)
    }
}

/// `cl` options as an argument vector, `cl` itself first.
fn cl_argv(args: Vec<String>) -> Vec<String> {
    std::iter::once("cl".to_owned()).chain(args).collect()
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = options::parse_args();
    let config = harness_config(args.environment)?;
    let cwd = std::env::current_dir()?;

    match args.command {
        HarnessCommand::Cl { args } => {
            let description = translator::translate(&cl_argv(args), &cwd)?;
            // dump this for easier debugging
            println!("{} CMakeLists.txt {}", "-".repeat(37), "-".repeat(37));
            println!("{description}{}", "-".repeat(80));
            io::stdout().flush()?;
            cmake_build::build(&description, config.project_platform.as_deref())?;
        }
        HarnessCommand::Translate { args } => {
            print!("{}", translator::translate(&cl_argv(args), &cwd)?);
        }
        HarnessCommand::Compile { probe, output } => {
            let request = CompileRequest {
                destination: output,
                ..compile_request(probe)
            };
            let binary = compile::compile_c(&config, &request)?;
            println!("{}", binary.display());
        }
        HarnessCommand::RunC { probe, input, args } => {
            let request = compile_request(probe);
            let output = compile::run_c(&config, &request, &args, input.as_deref())?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
        }
        HarnessCommand::Dot {
            format,
            file,
            source,
        } => {
            let input = match (&file, &source) {
                (Some(file), _) => DotInput::File(file),
                (None, source) => DotInput::Source(source.as_deref().unwrap_or_default()),
            };
            io::stdout().write_all(graphviz::dot(&format, input)?.as_bytes())?;
        }
        HarnessCommand::Gvpr { program } => {
            print!("{}", graphviz::gvpr(&program, config.path.as_deref())?);
        }
        HarnessCommand::Which { command, primary } => {
            match discovery::which_colocated(&command, &primary, config.path.as_deref())? {
                Some(found) => println!("{}", found.display()),
                None => return Ok(ExitCode::FAILURE),
            }
        }
        HarnessCommand::Platform => print_platform(&config)?,
        HarnessCommand::CheckAsan { binary } => {
            println!(
                "{}",
                platform::is_asan_instrumented(&binary, config.path.as_deref())?
            );
        }
        HarnessCommand::Scrub => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            let text = platform::remove_asan_summary(&text);
            print!("{}", platform::remove_xtype_warnings(config.platform, &text));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_platform(config: &HarnessConfig) -> io::Result<()> {
    let release = platform::read_os_release(Path::new("/etc/os-release"))?;
    let path = config.path.as_deref();
    println!("os={:?}", config.platform.os);
    println!("mingw={}", config.platform.is_mingw());
    println!("build_system={}", config.build_system().unwrap_or(""));
    println!("cmake={}", config.is_cmake());
    println!("autotools={}", config.is_autotools());
    println!("static_build={}", config.is_static_build());
    println!("rocky={}", platform::is_rocky(&release, None));
    println!("rocky_8={}", platform::is_rocky_8(&release));
    println!("sandbox={}", platform::has_sandbox(config.platform, path));
    Ok(())
}
