//! A single PTY running a shell

use std::io::{Read, Write};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{PtyError, TerminalSize};

/// A shell attached to a pseudo-terminal
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    shell: String,
}

impl PtySession {
    /// Spawn `shell` (already validated) on a new PTY of `size`.
    ///
    /// Returns the session and a reader for the PTY's output, to be handed
    /// to [`spawn_reader`].
    pub fn spawn(shell: &str, size: TerminalSize) -> Result<(Self, Box<dyn Read + Send>), PtyError> {
        tracing::info!("Spawning {} on a {}x{} PTY", shell, size.cols, size.rows);

        let pair = native_pty_system()
            .openpty(pty_size(size))
            .map_err(|e| PtyError::Pty(format!("failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.env("TERM", "xterm-256color");
        if let Some(home) = dirs::home_dir() {
            cmd.cwd(home);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Pty(format!("failed to spawn {}: {}", shell, e)))?;
        tracing::debug!("Shell process started with PID {:?}", child.process_id());

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Pty(format!("failed to clone PTY reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Pty(format!("failed to take PTY writer: {}", e)))?;

        Ok((
            Self {
                master: pair.master,
                child,
                writer,
                shell: shell.to_string(),
            },
            reader,
        ))
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Write keyboard input to the shell
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        tracing::debug!("Resizing PTY to {}x{}", size.cols, size.rows);
        self.master
            .resize(pty_size(size))
            .map_err(|e| PtyError::Pty(format!("failed to resize PTY: {}", e)))
    }

    /// Kill the shell and reap it, returning its exit code if known.
    pub fn close(mut self) -> Option<u32> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Some(status.exit_code());
        }
        let _ = self.child.kill();
        self.child.wait().ok().map(|status| status.exit_code())
    }
}

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Forward PTY output to `tx` from a blocking thread.
///
/// The thread ends at EOF, on a read error, when `tx` is closed or when
/// `cancel` fires (checked between reads; closing the session unblocks a
/// pending read).
pub fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];
        loop {
            if cancel.is_cancelled() {
                tracing::debug!("PTY reader cancelled");
                break;
            }
            match reader.read(&mut buf) {
                Ok(0) => {
                    tracing::debug!("PTY reader reached EOF");
                    break;
                }
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        tracing::debug!("PTY output channel closed");
                        break;
                    }
                }
                Err(e) => {
                    if !cancel.is_cancelled() {
                        tracing::debug!("PTY reader closed: {}", e);
                    }
                    break;
                }
            }
        }
    })
}
