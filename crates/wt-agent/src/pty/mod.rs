//! Pseudo-terminal sessions backing the web terminal
//!
//! Uses the portable-pty crate. Each WebSocket gets one [`PtySession`];
//! output is read on a blocking thread and forwarded over a channel.

mod session;
mod shell;

pub use session::{spawn_reader, PtySession};
pub use shell::{default_shell, resolve_shell, validate_shell_path};

use thiserror::Error;

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// PTY errors
#[derive(Error, Debug)]
pub enum PtyError {
    /// Shell is neither in the allow-list nor in /etc/shells
    #[error("Shell '{0}' is not in the allowed shell list")]
    ShellNotAllowed(String),

    #[error("Shell '{0}' does not exist")]
    ShellNotFound(String),

    /// portable-pty failed to open the PTY or spawn the shell
    #[error("PTY error: {0}")]
    Pty(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
