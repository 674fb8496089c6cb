//! Command-line interface for texcollab.
//!
//! Uses lexopt; unset options leave lower configuration layers untouched.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::session::KeyMode;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Bearer token to accept; enables authentication.
    pub token: Option<String>,
    /// Disable authentication.
    pub no_auth: bool,
    /// Session keying mode.
    pub key_mode: Option<KeyMode>,
    /// Echo snapshots back to their sender.
    pub echo: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("token") => {
                result.token = Some(parser.value()?.parse()?);
            }
            Long("no-auth") => {
                result.no_auth = true;
            }
            Long("key-mode") => {
                let value: String = parser.value()?.parse()?;
                result.key_mode = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("key-mode", value))?,
                );
            }
            Long("echo") => {
                result.echo = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"texcollab {version}
Collaborative LaTeX editing server

USAGE:
    texcollab [OPTIONS]

OPTIONS:
    -H, --host <ADDR>       Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 3000]
    -c, --config <FILE>     Path to configuration file (JSON)
    -k, --token <TOKEN>     Accept this bearer token (enables auth)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --no-auth           Disable authentication
        --key-mode <MODE>   Session keying: project | project_file [default: project_file]
        --echo              Echo snapshots back to their sender
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    TEXCOLLAB_HOST          Host address (overrides config)
    TEXCOLLAB_PORT          Port number (overrides config)
    TEXCOLLAB_TOKEN         Bearer token (overrides config)
    TEXCOLLAB_KEY_MODE      Session keying mode
    TEXCOLLAB_ECHO          Echo snapshots to sender (true/false)
    TEXCOLLAB_BUILDS_DIR    Compile output directory
    TEXCOLLAB_LOG_LEVEL     Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:3000, no auth)
    texcollab

    # All interfaces, token required
    texcollab -H 0.0.0.0 -p 8080 -k my-secret-token

    # One stream per project instead of per file
    texcollab --key-mode project

    # Start with config file
    texcollab -c /etc/texcollab/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("texcollab {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
