use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use lsb_sandbox::{MountToken, ResolveError, SandboxOptions, check_sandbox_options};
use lsb_static::EnvVars;

pub use expand::{ArgumentExpander, DEFAULT_MAX_DEPTH, ExpandError};

mod expand;

// Configures Clap v3-style help menu colors
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "linux-sandbox")]
#[command(about = "Prepare a sandbox for a single build or test action.")]
#[command(
    after_help = "Arguments of the form @FILE are replaced by the non-empty lines of FILE, up to the first `--`."
)]
#[command(disable_version_flag = true, args_override_self = true)]
#[command(styles=STYLES)]
#[allow(clippy::struct_excessive_bools)]
pub struct SandboxArgs {
    /// Check whether the kernel supports the required namespaces, then exit.
    ///
    /// Handled before clap sees the command line; see [`parse_args`].
    #[arg(short = 'C')]
    pub check_namespaces: bool,

    /// Use DIR as the root of the sandbox (absolute path).
    #[arg(short = 'S', value_name = "DIR")]
    pub sandbox_root: Vec<PathBuf>,

    /// Run the command in DIR (absolute path) [default: the current directory].
    #[arg(short = 'W', value_name = "DIR")]
    pub working_dir: Vec<PathBuf>,

    /// Stop the command after SECONDS.
    #[arg(short = 'T', value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Wait SECONDS after the timeout before sending SIGKILL.
    #[arg(short = 't', value_name = "SECONDS")]
    pub kill_delay: Option<u64>,

    /// Redirect the command's stdout to FILE.
    #[arg(short = 'l', value_name = "FILE")]
    pub stdout_path: Vec<PathBuf>,

    /// Redirect the command's stderr to FILE.
    #[arg(short = 'L', value_name = "FILE")]
    pub stderr_path: Vec<PathBuf>,

    /// Make PATH writable inside the sandbox; may be repeated.
    #[arg(short = 'w', value_name = "PATH")]
    pub writable_path: Vec<PathBuf>,

    /// Make PATH inaccessible inside the sandbox; may be repeated.
    #[arg(short = 'i', value_name = "PATH")]
    pub inaccessible_path: Vec<PathBuf>,

    /// Mount an empty tmpfs at DIR; may be repeated. `/tmp` is always included.
    #[arg(short = 'e', value_name = "DIR")]
    pub tmpfs_dir: Vec<PathBuf>,

    /// Bind-mount PATH into the sandbox at the same location.
    #[arg(short = 'M', value_name = "PATH")]
    pub bind_source: Vec<PathBuf>,

    /// Mount the directly preceding -M source at PATH instead.
    #[arg(short = 'm', value_name = "PATH")]
    pub bind_target: Vec<PathBuf>,

    /// Create a new network namespace.
    #[arg(short = 'N')]
    pub create_network_namespace: bool,

    /// Run as root inside the sandbox instead of nobody.
    #[arg(short = 'R')]
    pub fake_root: bool,

    /// Print debug messages.
    #[arg(short = 'D', env = EnvVars::LSB_DEBUG, value_parser = clap::builder::BoolishValueParser::new())]
    pub debug: bool,

    /// The command to run inside the sandbox, followed by its arguments.
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// `-C`: check namespace support and exit.
    CheckNamespaces,
    /// Resolve and hand off a sandbox configuration.
    Prepare(SandboxOptions),
}

/// Short options that consume a value, either attached (`-W/dir`) or as the next argument.
const VALUE_OPTIONS: &[u8] = b"SWTtlLwieMm";

/// Parse an expanded argument list, including the program name.
///
/// `-C` takes effect as soon as it is reached: the options before it are parsed and validated,
/// so their errors are reported first, and everything after it is ignored.
///
/// Otherwise only the shape of the command line is checked here; the values are validated when
/// the returned [`SandboxOptions`] are resolved.
pub fn parse_args<I>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = OsString>,
{
    let args: Vec<OsString> = args.into_iter().collect();

    if let Some(preceding) = arguments_before_check(&args) {
        let options = parse_options(preceding)?;
        check_sandbox_options(&options).map_err(|err| usage_error(&err))?;
        return Ok(Invocation::CheckNamespaces);
    }

    parse_options(args).map(Invocation::Prepare)
}

fn parse_options(args: Vec<OsString>) -> Result<SandboxOptions, clap::Error> {
    let matches = SandboxArgs::command()
        .try_get_matches_from(args)
        .map_err(with_usage)?;
    let args = SandboxArgs::from_arg_matches(&matches).map_err(with_usage)?;

    let mount_tokens = mount_tokens(&matches);
    Ok(SandboxOptions {
        sandbox_root_dirs: args.sandbox_root,
        working_dirs: args.working_dir,
        timeout: args.timeout,
        kill_delay: args.kill_delay,
        stdout_paths: args.stdout_path,
        stderr_paths: args.stderr_path,
        writable_paths: args.writable_path,
        inaccessible_paths: args.inaccessible_path,
        tmpfs_dirs: args.tmpfs_dir,
        mount_tokens,
        create_network_namespace: args.create_network_namespace,
        fake_root: args.fake_root,
        debug: args.debug,
        command: args.command,
    })
}

/// Find the first `-C` in option position and return the arguments that precede it.
///
/// Options are read the way `getopt` reads them: flags may be grouped (`-NC`), and a value
/// option consumes the rest of its group or the next argument, so the `C` in `-WC` or `-W -C`
/// is a directory. The scan ends at `--` or at the first argument that is not an option. Long
/// options such as `--help` are left to clap.
fn arguments_before_check(args: &[OsString]) -> Option<Vec<OsString>> {
    let (program, rest) = args.split_first()?;
    let mut tokens = rest.iter().enumerate();
    while let Some((position, token)) = tokens.next() {
        let bytes = token.as_bytes();
        if bytes == b"--" || bytes.len() < 2 || bytes[0] != b'-' {
            return None;
        }
        if bytes.starts_with(b"--") {
            continue;
        }
        for (offset, flag) in bytes.iter().enumerate().skip(1) {
            if *flag == b'C' {
                let mut preceding = Vec::with_capacity(position + 2);
                preceding.push(program.clone());
                preceding.extend_from_slice(&rest[..position]);
                // Flags grouped before the `C` still count.
                if offset > 1 {
                    preceding.push(OsString::from_vec(bytes[..offset].to_vec()));
                }
                return Some(preceding);
            }
            if VALUE_OPTIONS.contains(flag) {
                if offset + 1 == bytes.len() {
                    tokens.next();
                }
                break;
            }
        }
    }
    None
}

/// Add the usage banner to clap errors that don't carry one, such as a missing value.
fn with_usage(mut err: clap::Error) -> clap::Error {
    if err.use_stderr() && err.get(ContextKind::Usage).is_none() {
        let usage = SandboxArgs::command().render_usage();
        err.insert(ContextKind::Usage, ContextValue::StyledStr(usage));
    }
    err
}

/// Render a [`ResolveError`] like any other usage error, with the usage banner.
pub fn usage_error(err: &ResolveError) -> clap::Error {
    let kind = match err {
        ResolveError::NoCommand => ErrorKind::MissingRequiredArgument,
        ResolveError::RelativePath { .. } => ErrorKind::ValueValidation,
        ResolveError::MultipleRootDirectories
        | ResolveError::MultipleWorkingDirectories
        | ResolveError::MultipleStdoutPaths
        | ResolveError::MultipleStderrPaths
        | ResolveError::UnpairedMountTarget
        | ResolveError::MergingCommands => ErrorKind::ArgumentConflict,
    };
    SandboxArgs::command().error(kind, err)
}

/// Recover the command-line order of `-M` and `-m`, marking where other options intervene.
///
/// clap numbers every flag and every value, so an `-m` value that directly follows an `-M` value
/// is exactly two indices further along. A larger gap means some other option came in between.
fn mount_tokens(matches: &ArgMatches) -> Vec<MountToken> {
    let mut events: Vec<(usize, MountToken)> = Vec::new();
    for (id, token) in [
        ("bind_source", MountToken::Source as fn(PathBuf) -> MountToken),
        ("bind_target", MountToken::Target),
    ] {
        if matches.value_source(id) != Some(ValueSource::CommandLine) {
            continue;
        }
        if let (Some(indices), Some(paths)) =
            (matches.indices_of(id), matches.get_many::<PathBuf>(id))
        {
            events.extend(indices.zip(paths.cloned().map(token)));
        }
    }
    events.sort_by_key(|(index, _)| *index);

    let mut tokens = Vec::with_capacity(events.len());
    let mut previous = None;
    for (index, token) in events {
        if matches!(token, MountToken::Target(_))
            && previous.is_some_and(|previous| index > previous + 2)
        {
            tokens.push(MountToken::Other);
        }
        previous = Some(index);
        tokens.push(token);
    }
    tokens
}
