//! Configuration management for webssh-tunnel
//!
//! Configuration comes from two sources: command-line flags and environment
//! variables. [`resolve`] merges them with precedence flag > environment >
//! default and validates the result. It performs no I/O of its own; the
//! environment is read through the [`Environment`] trait.

mod env;
mod resolver;

pub use env::{Environment, ProcessEnv};
pub use resolver::{parse_bool, resolve, split_remote};

use std::path::PathBuf;
use std::time::Duration;

/// Port assumed when the remote address has no usable port segment
pub const DEFAULT_REMOTE_PORT: u16 = 8088;

/// Host assumed when the remote address has no host segment
pub const DEFAULT_REMOTE_HOST: &str = "localhost";

/// Default terminal handshake timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default absolute runtime ceiling (24 hours)
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Environment variable names
pub mod vars {
    pub const NAME: &str = "NAME";
    pub const REMOTE: &str = "REMOTE";
    pub const TERMINAL: &str = "TERMINAL";
    pub const SAVE_PASS: &str = "SAVE_PASS";
    pub const USERNAME: &str = "USERNAME";
    pub const PASSWORD: &str = "PASSWORD";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const LOCAL_PORT: &str = "LOCAL_PORT";
    pub const MAX_RUNTIME: &str = "MAX_RUNTIME";
    pub const ASSETS_DIR: &str = "ASSETS_DIR";
}

/// Values given explicitly on the command line
///
/// `None` (or `false` for switches) means "not given", so the environment
/// and then the default apply.
#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    pub name: Option<String>,
    pub remote: Option<String>,
    pub save_pass: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<u64>,
    pub debug: bool,
    pub local_port: Option<u16>,
    pub terminal: Option<String>,
    pub max_runtime: Option<u64>,
    pub assets_dir: Option<PathBuf>,
}

/// Resolved client configuration
///
/// Created once at startup and read-only afterwards, except that
/// `local_port` is filled in by the orchestrator when it was not given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Client name: tunnel endpoint id and URL prefix of the web UI
    pub name: String,
    /// Remote tunnel server address as given (`host:port` or a URL)
    pub remote: String,
    /// Host part of `remote`
    pub remote_host: String,
    /// Port part of `remote`
    pub remote_port: u16,
    /// Local web server port; `None` until resolved
    pub local_port: Option<u16>,
    /// Shell used for terminal sessions
    pub terminal: Option<String>,
    /// Basic auth username for the UI shell
    pub username: String,
    /// Basic auth password for the UI shell; empty disables auth
    pub password: String,
    /// Whether the browser UI may remember credentials
    pub save_pass: bool,
    /// Terminal handshake timeout
    pub timeout: Duration,
    /// Absolute runtime ceiling enforced by the deadline watchdog
    pub max_runtime: Duration,
    /// Verbose logging requested
    pub debug: bool,
    /// Directory holding `index.html` and `static/`; built-in shell if unset
    pub assets_dir: Option<PathBuf>,
}

impl Config {
    /// URL handed to the tunnel connector
    pub fn tunnel_url(&self) -> String {
        if self.remote.starts_with("http://") || self.remote.starts_with("https://") {
            self.remote.clone()
        } else {
            format!("http://{}", self.remote)
        }
    }

    /// Whether the UI shell is protected by basic auth
    pub fn requires_auth(&self) -> bool {
        !self.password.is_empty()
    }

    /// URL path prefix the web UI is mounted under
    pub fn base_path(&self) -> String {
        format!("/{}", self.name)
    }
}
