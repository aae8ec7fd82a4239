//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use wt_core::ConfigFlags;

#[derive(Parser, Debug)]
#[command(name = "webssh-tunnel")]
#[command(author, version, about = "Expose a local web terminal through a remote tunnel server")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Print the version and exit
    Version,
}

/// Flags for running the service. Unset flags fall back to the
/// environment variable named in each help line, then to the default.
#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Client name: tunnel endpoint id and URL prefix of the web UI [env: NAME]
    #[arg(short, long)]
    pub name: Option<String>,

    /// Tunnel server address, host:port or URL [env: REMOTE]
    #[arg(short, long)]
    pub remote: Option<String>,

    /// Let the browser remember terminal passwords [env: SAVE_PASS]
    #[arg(long)]
    pub save_pass: bool,

    /// Basic auth username for the web UI [env: USERNAME]
    #[arg(short, long)]
    pub username: Option<String>,

    /// Basic auth password for the web UI; empty disables auth [env: PASSWORD]
    #[arg(short, long)]
    pub password: Option<String>,

    /// Seconds to wait for a terminal's first message [env: TIMEOUT] [default: 30]
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,

    /// Local web server port; first free port from 8080 if unset [env: LOCAL_PORT]
    #[arg(long, value_name = "PORT")]
    pub local_port: Option<u16>,

    /// Shell for terminal sessions [env: TERMINAL]
    #[arg(long, value_name = "SHELL")]
    pub terminal: Option<String>,

    /// Directory with index.html and static/ to serve instead of the built-in page [env: ASSETS_DIR]
    #[arg(long = "assets", value_name = "DIR")]
    pub assets_dir: Option<PathBuf>,

    /// Stop after this many seconds [env: MAX_RUNTIME] [default: 86400]
    #[arg(long, value_name = "SECONDS")]
    pub max_runtime: Option<u64>,
}

impl RunArgs {
    pub fn into_flags(self) -> ConfigFlags {
        ConfigFlags {
            name: self.name,
            remote: self.remote,
            save_pass: self.save_pass,
            username: self.username,
            password: self.password,
            timeout: self.timeout,
            debug: self.debug,
            local_port: self.local_port,
            terminal: self.terminal,
            max_runtime: self.max_runtime,
            assets_dir: self.assets_dir,
        }
    }
}

/// Log filter directive: `RUST_LOG` if set, else `debug` or `info`.
pub fn log_filter(debug: bool, rust_log: Option<String>) -> String {
    rust_log
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| if debug { "debug" } else { "info" }.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "webssh-tunnel",
            "-n",
            "box",
            "-r",
            "tunnel.example.com:8022",
            "-u",
            "admin",
            "-p",
            "secret",
        ])
        .unwrap();

        assert_eq!(cli.command, None);
        let flags = cli.run.into_flags();
        assert_eq!(flags.name.as_deref(), Some("box"));
        assert_eq!(flags.remote.as_deref(), Some("tunnel.example.com:8022"));
        assert_eq!(flags.username.as_deref(), Some("admin"));
        assert_eq!(flags.password.as_deref(), Some("secret"));
        assert!(!flags.save_pass);
        assert_eq!(flags.timeout, None);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "webssh-tunnel",
            "--name",
            "box",
            "--save-pass",
            "--timeout",
            "45",
            "--debug",
            "--local-port",
            "9000",
            "--terminal",
            "/bin/zsh",
            "--assets",
            "/srv/ui",
            "--max-runtime",
            "600",
        ])
        .unwrap();

        let flags = cli.run.into_flags();
        assert!(flags.save_pass);
        assert!(flags.debug);
        assert_eq!(flags.timeout, Some(45));
        assert_eq!(flags.local_port, Some(9000));
        assert_eq!(flags.terminal.as_deref(), Some("/bin/zsh"));
        assert_eq!(flags.assets_dir, Some(PathBuf::from("/srv/ui")));
        assert_eq!(flags.max_runtime, Some(600));
    }

    #[test]
    fn test_version_subcommand() {
        let cli = Cli::try_parse_from(["webssh-tunnel", "version"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Version));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(Cli::try_parse_from(["webssh-tunnel", "--timeout", "soon"]).is_err());
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(false, None), "info");
        assert_eq!(log_filter(true, None), "debug");
        assert_eq!(log_filter(true, Some("warn".to_string())), "warn");
        assert_eq!(log_filter(false, Some(String::new())), "info");
    }
}
