//! Shell selection and validation

use std::path::Path;

use super::PtyError;

/// Allowed shell paths (prevents arbitrary command execution)
const ALLOWED_SHELLS_UNIX: &[&str] = &[
    "/bin/sh",
    "/bin/bash",
    "/bin/zsh",
    "/bin/fish",
    "/bin/dash",
    "/bin/ksh",
    "/usr/bin/sh",
    "/usr/bin/bash",
    "/usr/bin/zsh",
    "/usr/bin/fish",
    "/usr/bin/dash",
    "/usr/bin/ksh",
    "/usr/local/bin/bash",
    "/usr/local/bin/zsh",
    "/usr/local/bin/fish",
    "/opt/homebrew/bin/bash",
    "/opt/homebrew/bin/zsh",
    "/opt/homebrew/bin/fish",
];

const ALLOWED_SHELLS_WINDOWS: &[&str] = &[
    "cmd.exe",
    "powershell.exe",
    "pwsh.exe",
    "C:\\Windows\\System32\\cmd.exe",
    "C:\\Windows\\System32\\WindowsPowerShell\\v1.0\\powershell.exe",
];

/// Platform default shell
pub fn default_shell() -> &'static str {
    if cfg!(windows) {
        "powershell.exe"
    } else if cfg!(target_os = "macos") {
        "/bin/zsh"
    } else {
        "/bin/bash"
    }
}

/// Pick the shell for a new session: configured, then `$SHELL`, then the
/// platform default. The result is validated.
pub fn resolve_shell(configured: Option<&str>) -> Result<String, PtyError> {
    let requested = configured
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| default_shell().to_string());

    validate_shell_path(&requested)
}

/// Check `shell` against the allow-list (and `/etc/shells` on Unix) and
/// make sure it exists.
pub fn validate_shell_path(shell: &str) -> Result<String, PtyError> {
    let allowed = if cfg!(windows) {
        ALLOWED_SHELLS_WINDOWS
    } else {
        ALLOWED_SHELLS_UNIX
    };

    let in_list = if cfg!(windows) {
        let lower = shell.to_lowercase();
        allowed.iter().any(|s| {
            let s = s.to_lowercase();
            lower == s || lower.ends_with(&format!("\\{}", s))
        })
    } else {
        allowed.contains(&shell) || listed_in_etc_shells(shell)
    };

    if !in_list {
        return Err(PtyError::ShellNotAllowed(shell.to_string()));
    }

    if !cfg!(windows) && !Path::new(shell).exists() {
        return Err(PtyError::ShellNotFound(shell.to_string()));
    }

    Ok(shell.to_string())
}

#[cfg(unix)]
fn listed_in_etc_shells(shell: &str) -> bool {
    std::fs::read_to_string("/etc/shells")
        .map(|shells| {
            shells
                .lines()
                .map(str::trim)
                .any(|line| !line.starts_with('#') && line == shell)
        })
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn listed_in_etc_shells(_shell: &str) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_sh_is_allowed() {
        assert_eq!(validate_shell_path("/bin/sh").unwrap(), "/bin/sh");
    }

    #[test]
    fn test_arbitrary_binary_rejected() {
        assert!(matches!(
            validate_shell_path("/usr/bin/python3"),
            Err(PtyError::ShellNotAllowed(_))
        ));
        assert!(matches!(
            validate_shell_path("rm -rf /"),
            Err(PtyError::ShellNotAllowed(_))
        ));
    }

    #[test]
    fn test_configured_shell_wins() {
        assert_eq!(resolve_shell(Some("/bin/sh")).unwrap(), "/bin/sh");
    }
}
