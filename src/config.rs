//! Configuration module for secret-server.
//!
//! Everything comes from the command line: three positional values
//! (port, password, secret) plus optional tuning flags. The resolved
//! `Config` is built once at startup and never mutated afterwards.

use crate::line::is_space;
use bytes::Bytes;
use clap::Parser;
use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Largest secret kept, in bytes. Longer secrets are truncated.
pub const MAX_SECRET_LEN: usize = 1023;

/// Default cap on a single password line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Command-line arguments for the secret server
#[derive(Parser, Debug)]
#[command(name = "secret-server")]
#[command(author = "secret-server authors")]
#[command(version = "0.1.0")]
#[command(about = "Reveals a secret to clients that know the password", long_about = None)]
pub struct CliArgs {
    /// TCP port to listen on
    pub port: u16,

    /// Password clients must send
    pub password: String,

    /// Secret revealed on a correct password
    pub secret: String,

    /// Address to bind to
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Maximum length of a password line in bytes; the rest is discarded
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    pub max_line_length: usize,

    /// Seconds to wait for the password line (0 = wait forever)
    #[arg(long, default_value_t = 30)]
    pub read_timeout: u64,

    /// Maximum number of clients served at the same time
    #[arg(long, default_value_t = 1024)]
    pub max_connections: usize,

    /// Listen backlog
    #[arg(long, default_value_t = 128)]
    pub backlog: i32,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub password: Bytes,
    pub secret: Bytes,
    pub max_line_length: usize,
    pub read_timeout: Option<Duration>,
    pub max_connections: usize,
    pub backlog: i32,
    pub workers: Option<usize>,
    pub log_level: String,
    /// Set when the password was longer than `max_line_length`.
    pub password_truncated: bool,
    /// Set when the secret was longer than `MAX_SECRET_LEN`.
    pub secret_truncated: bool,
    /// Set when the password ends in whitespace, which client lines never do.
    pub password_trailing_whitespace: bool,
}

impl Config {
    /// Load configuration from the process arguments.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args_os())
    }

    /// Parse and validate an argument list (first item is the program name).
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = CliArgs::try_parse_from(args).map_err(ConfigError::Args)?;
        Self::from_cli(cli)
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        if cli.max_line_length == 0 {
            return Err(ConfigError::Invalid("max-line-length", "must be at least 1"));
        }
        if cli.max_connections == 0 {
            return Err(ConfigError::Invalid("max-connections", "must be at least 1"));
        }
        if cli.backlog <= 0 {
            return Err(ConfigError::Invalid("backlog", "must be positive"));
        }
        if cli.workers == Some(0) {
            return Err(ConfigError::Invalid("workers", "must be at least 1"));
        }

        let (password, password_truncated) = bounded(cli.password, cli.max_line_length);
        let (secret, secret_truncated) = bounded(cli.secret, MAX_SECRET_LEN);
        let password_trailing_whitespace = password.last().is_some_and(|&b| is_space(b));

        Ok(Config {
            listen: SocketAddr::new(cli.bind, cli.port),
            password,
            secret,
            max_line_length: cli.max_line_length,
            read_timeout: match cli.read_timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_connections: cli.max_connections,
            backlog: cli.backlog,
            workers: cli.workers,
            log_level: cli.log_level,
            password_truncated,
            secret_truncated,
            password_trailing_whitespace,
        })
    }
}

/// Keep at most `limit` bytes of `value`.
fn bounded(value: String, limit: usize) -> (Bytes, bool) {
    let mut bytes = Bytes::from(value.into_bytes());
    let truncated = bytes.len() > limit;
    bytes.truncate(limit);
    (bytes, truncated)
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// Bad argument count, unparsable port, `--help`, `--version`.
    Args(clap::Error),
    Invalid(&'static str, &'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Args(e) => write!(f, "{e}"),
            ConfigError::Invalid(name, reason) => write!(f, "invalid --{name}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}
