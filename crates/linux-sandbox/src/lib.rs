use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::debug;

use lsb_cli::{ArgumentExpander, Invocation};
use lsb_logging::Level;
use lsb_sandbox::SandboxConfig;
use lsb_static::EnvVars;
use lsb_warnings::warn_user;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command succeeded.
    Success,

    /// The command failed due to an error in the user input.
    Failure,

    /// The command failed with an unexpected error.
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => Self::from(0),
            ExitStatus::Failure => Self::from(1),
            ExitStatus::Error => Self::from(2),
        }
    }
}

/// Run `linux-sandbox` with the given arguments, including the program name.
pub fn main<I>(args: I) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
{
    match run(args) {
        Ok(status) => status.into(),
        Err(err) => {
            report(&err);
            ExitStatus::Error.into()
        }
    }
}

fn run<I>(args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = OsString>,
{
    if std::env::var_os(EnvVars::LSB_NO_WARNINGS).is_some() {
        lsb_warnings::disable();
    } else {
        lsb_warnings::enable();
    }

    // The program name is never treated as an argument file.
    let mut args = args.into_iter();
    let program = args
        .next()
        .unwrap_or_else(|| OsString::from("linux-sandbox"));
    let args = match ArgumentExpander::from_env().expand(args) {
        Ok(args) => args,
        Err(err) => {
            report(&err.into());
            return Ok(ExitStatus::Failure);
        }
    };

    let invocation = match lsb_cli::parse_args(std::iter::once(program).chain(args)) {
        Ok(invocation) => invocation,
        Err(err) => {
            err.print()?;
            return Ok(if err.use_stderr() {
                ExitStatus::Failure
            } else {
                ExitStatus::Success
            });
        }
    };

    match invocation {
        Invocation::CheckNamespaces => {
            lsb_logging::setup_logging(Level::Default)?;
            Ok(check_namespaces())
        }
        Invocation::Prepare(options) => {
            lsb_logging::setup_logging(if options.debug {
                Level::Debug
            } else {
                Level::Default
            })?;

            let cwd =
                std::env::current_dir().context("Failed to determine the current directory")?;
            let config = match lsb_sandbox::resolve_sandbox_config(&options, &cwd) {
                Ok(config) => config,
                Err(err) => {
                    lsb_cli::usage_error(&err).print()?;
                    return Ok(ExitStatus::Failure);
                }
            };

            if config.timeout.is_zero() && !config.kill_delay.is_zero() {
                warn_user!("A kill delay (`-t`) has no effect without a timeout (`-T`)");
            }

            hand_off(&config)?;
            Ok(ExitStatus::Success)
        }
    }
}

#[cfg(target_os = "linux")]
fn check_namespaces() -> ExitStatus {
    match lsb_sandbox::check_namespaces_supported() {
        Ok(()) => ExitStatus::Success,
        Err(err) => {
            report(&err.into());
            ExitStatus::Failure
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn check_namespaces() -> ExitStatus {
    report(&anyhow::anyhow!("Namespaces are only available on Linux"));
    ExitStatus::Failure
}

/// Pass the configuration to the isolation executor as a single JSON object on stdout.
fn hand_off(config: &SandboxConfig) -> Result<()> {
    debug!("Resolved sandbox configuration: {config:#?}");
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, config).context("Failed to serialize configuration")?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[allow(clippy::print_stderr)]
fn report(err: &anyhow::Error) {
    let mut causes = err.chain();
    if let Some(err) = causes.next() {
        anstream::eprintln!("{}: {}", "error".red().bold(), err);
    }
    for err in causes {
        anstream::eprintln!("  {}: {}", "Caused by".red().bold(), err);
    }
}
