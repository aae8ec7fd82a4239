//! Flag / environment / default merging

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::env::Environment;
use super::{
    vars, Config, ConfigFlags, DEFAULT_MAX_RUNTIME, DEFAULT_REMOTE_HOST, DEFAULT_REMOTE_PORT,
    DEFAULT_TIMEOUT_SECS,
};
use crate::error::ConfigError;

/// Characters not allowed in a name: it becomes a URL path segment and is
/// embedded in the UI page
const RESERVED_NAME_CHARS: &[char] = &[
    '/', ':', '*', '?', '#', '%', '\\', '\'', '"', '<', '>', '`', '&',
];

/// Merge `flags` and `env` into a validated [`Config`].
///
/// Precedence per field is flag > environment > default. Environment values
/// that do not parse fall back to the default.
pub fn resolve(flags: ConfigFlags, env: &impl Environment) -> Result<Config, ConfigError> {
    let name = flags
        .name
        .or_else(|| env.get(vars::NAME))
        .filter(|n| !n.is_empty())
        .ok_or(ConfigError::MissingField("name"))?;
    validate_name(&name)?;

    let remote = flags
        .remote
        .or_else(|| env.get(vars::REMOTE))
        .filter(|r| !r.is_empty())
        .ok_or(ConfigError::MissingField("remote"))?;
    let (remote_host, remote_port) = split_remote(&remote);

    let save_pass = if flags.save_pass {
        true
    } else {
        env.get(vars::SAVE_PASS)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false)
    };

    let timeout_secs = flags
        .timeout
        .or_else(|| env_parsed(env, vars::TIMEOUT))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let max_runtime = flags
        .max_runtime
        .or_else(|| env_parsed(env, vars::MAX_RUNTIME))
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_MAX_RUNTIME);

    Ok(Config {
        name,
        remote,
        remote_host,
        remote_port,
        local_port: flags
            .local_port
            .or_else(|| env_parsed(env, vars::LOCAL_PORT)),
        terminal: flags.terminal.or_else(|| env.get(vars::TERMINAL)),
        username: flags
            .username
            .or_else(|| env.get(vars::USERNAME))
            .unwrap_or_default(),
        password: flags
            .password
            .or_else(|| env.get(vars::PASSWORD))
            .unwrap_or_default(),
        save_pass,
        timeout: Duration::from_secs(timeout_secs),
        max_runtime,
        debug: flags.debug,
        assets_dir: flags
            .assets_dir
            .or_else(|| env.get(vars::ASSETS_DIR).map(PathBuf::from)),
    })
}

/// Split a remote address into host and port.
///
/// An `http://` or `https://` scheme and anything after the authority are
/// ignored. The remainder is split on the first colon; a missing host
/// becomes `localhost` and a missing or unparsable port becomes 8088.
pub fn split_remote(remote: &str) -> (String, u16) {
    let authority = remote
        .strip_prefix("http://")
        .or_else(|| remote.strip_prefix("https://"))
        .unwrap_or(remote);
    let authority = authority.split('/').next().unwrap_or_default();

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, port.parse().ok()),
        None => (authority, None),
    };

    let host = if host.is_empty() {
        DEFAULT_REMOTE_HOST.to_string()
    } else {
        host.to_string()
    };
    (host, port.unwrap_or(DEFAULT_REMOTE_PORT))
}

/// Parse a boolean the way the `SAVE_PASS` variable is documented.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn env_parsed<T: FromStr>(env: &impl Environment, key: &str) -> Option<T> {
    let raw = env.get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            None
        }
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let reason = if name.chars().any(char::is_whitespace) {
        "must not contain whitespace"
    } else if name.contains(RESERVED_NAME_CHARS) {
        "must not contain any of / : * ? # % \\ ' \" < > ` &"
    } else {
        return Ok(());
    };

    Err(ConfigError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn flags(name: &str, remote: &str) -> ConfigFlags {
        ConfigFlags {
            name: Some(name.to_string()),
            remote: Some(remote.to_string()),
            ..Default::default()
        }
    }

    fn no_env() -> HashMap<&'static str, &'static str> {
        HashMap::new()
    }

    #[test]
    fn test_timeout_flag_beats_env() {
        let env = HashMap::from([("TIMEOUT", "10")]);
        let config = resolve(
            ConfigFlags {
                timeout: Some(45),
                ..flags("box", "example.com:8022")
            },
            &env,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_timeout_env_beats_default() {
        let env = HashMap::from([("TIMEOUT", "10")]);
        let config = resolve(flags("box", "example.com:8022"), &env).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_timeout_default() {
        let config = resolve(flags("box", "example.com:8022"), &no_env()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_runtime, DEFAULT_MAX_RUNTIME);
    }

    #[test]
    fn test_unparsable_env_numbers_fall_back() {
        let env = HashMap::from([
            ("TIMEOUT", "soon"),
            ("LOCAL_PORT", "99999"),
            ("MAX_RUNTIME", "-1"),
        ]);
        let config = resolve(flags("box", "example.com"), &env).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.local_port, None);
        assert_eq!(config.max_runtime, DEFAULT_MAX_RUNTIME);
    }

    #[test]
    fn test_save_pass_resolution() {
        let on = HashMap::from([("SAVE_PASS", "TRUE")]);
        let garbage = HashMap::from([("SAVE_PASS", "yes please")]);
        let off = HashMap::from([("SAVE_PASS", "0")]);

        assert!(resolve(flags("box", "h:1"), &on).unwrap().save_pass);
        assert!(!resolve(flags("box", "h:1"), &garbage).unwrap().save_pass);
        assert!(!resolve(flags("box", "h:1"), &off).unwrap().save_pass);

        let forced = ConfigFlags {
            save_pass: true,
            ..flags("box", "h:1")
        };
        assert!(resolve(forced, &off).unwrap().save_pass);
    }

    #[test]
    fn test_required_fields_from_env() {
        let env = HashMap::from([
            ("NAME", "from-env"),
            ("REMOTE", "tunnel.local:9000"),
            ("USERNAME", "admin"),
            ("PASSWORD", "secret"),
            ("TERMINAL", "/bin/bash"),
        ]);
        let config = resolve(ConfigFlags::default(), &env).unwrap();
        assert_eq!(config.name, "from-env");
        assert_eq!(config.remote_host, "tunnel.local");
        assert_eq!(config.remote_port, 9000);
        assert_eq!(config.username, "admin");
        assert!(config.requires_auth());
        assert_eq!(config.terminal.as_deref(), Some("/bin/bash"));
    }

    #[test]
    fn test_missing_required_fields() {
        let missing_name = ConfigFlags {
            remote: Some("h:1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve(missing_name, &no_env()),
            Err(ConfigError::MissingField("name"))
        );

        let empty_remote = HashMap::from([("REMOTE", "")]);
        let missing_remote = ConfigFlags {
            name: Some("box".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve(missing_remote, &empty_remote),
            Err(ConfigError::MissingField("remote"))
        );
    }

    #[test]
    fn test_invalid_name_rejected() {
        for name in ["a/b", "my box", "x:y", "*", "x';alert(1);'", "a<b", "q\"", "t`"] {
            assert!(matches!(
                resolve(flags(name, "h:1"), &no_env()),
                Err(ConfigError::InvalidName { .. })
            ));
        }
    }

    #[test]
    fn test_split_remote() {
        assert_eq!(split_remote("example.com"), ("example.com".to_string(), 8088));
        assert_eq!(split_remote("host:notanumber"), ("host".to_string(), 8088));
        assert_eq!(split_remote(":9000"), ("localhost".to_string(), 9000));
        assert_eq!(split_remote("10.0.0.5:8022"), ("10.0.0.5".to_string(), 8022));
        assert_eq!(
            split_remote("http://piko.example.com:8022/"),
            ("piko.example.com".to_string(), 8022)
        );
    }

    #[test]
    fn test_tunnel_url() {
        let plain = resolve(flags("box", "example.com:8022"), &no_env()).unwrap();
        assert_eq!(plain.tunnel_url(), "http://example.com:8022");

        let with_scheme = resolve(flags("box", "https://example.com"), &no_env()).unwrap();
        assert_eq!(with_scheme.tunnel_url(), "https://example.com");
        assert_eq!(with_scheme.base_path(), "/box");
    }
}
