use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, validate::validate_config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "BOLETERA_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Prefix of environment overrides. Nested keys are separated by a double
/// underscore, e.g. `BOLETERA_RESERVATION__MAX_HOLD_TTL_SECS`.
pub const ENV_PREFIX: &str = "BOLETERA_";

/// Config file named by `BOLETERA_CONFIG`, or `config.toml`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the config file, apply environment overrides and validate.
///
/// A relative `database.path` is taken relative to the config file, so the
/// same file opens the same database from any working directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    if config.database.path.is_relative() {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.database.path = dir.join(&config.database.path);
        }
    }

    validate_config(&config)?;
    Ok(config)
}

/// Parse a TOML string without env overrides or validation (tests).
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load(path: &str) -> figment::error::Result<Config> {
        load_config(Path::new(path)).map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[auth]
method = "none"

[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_config_from_str_missing_auth() {
        let err = load_config_from_str("[server]\nport = 8080\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "boletera.toml",
                r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 3000

[database]
path = "/var/lib/boletera/events.db"

[scheduler]
enabled = false
"#,
            )?;

            let config = load("boletera.toml")?;
            assert_eq!(config.server.port, 3000);
            assert_eq!(config.server.host.to_string(), "127.0.0.1");
            assert_eq!(config.database.path, Path::new("/var/lib/boletera/events.db"));
            assert!(!config.scheduler.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("config.toml", "[auth]\nmethod = \"none\"\n")?;
            jail.set_env("BOLETERA_SCHEDULER__SWEEP_INTERVAL_SECS", "15");
            jail.set_env("BOLETERA_RESERVATION__MAX_HOLD_TTL_SECS", "1200");
            jail.set_env("BOLETERA_CONFIG", "config.toml");

            let config = load("config.toml")?;
            assert_eq!(config.scheduler.sweep_interval_secs, 15);
            assert_eq!(config.reservation.max_hold_ttl_secs, 1200);
            Ok(())
        });
    }

    #[test]
    fn test_relative_database_path_follows_config_file() {
        Jail::expect_with(|jail| {
            jail.create_dir("etc")?;
            jail.create_file(
                "etc/boletera.toml",
                "[auth]\nmethod = \"none\"\n\n[database]\npath = \"data/boletera.db\"\n",
            )?;

            let config = load("etc/boletera.toml")?;
            assert_eq!(config.database.path, Path::new("etc/data/boletera.db"));

            // Next to a file in the working directory the path is unchanged.
            jail.create_file("config.toml", "[auth]\nmethod = \"none\"\n")?;
            let config = load("config.toml")?;
            assert_eq!(config.database.path, Path::new("boletera.db"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_is_rejected_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[auth]\nmethod = \"api_key\"\n")?;
            let err = load_config(Path::new("config.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)));

            jail.set_env("BOLETERA_AUTH__API_KEY", "door-key");
            assert_eq!(load("config.toml")?.auth.api_key.as_deref(), Some("door-key"));
            Ok(())
        });
    }

    #[test]
    fn test_config_path_from_env() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            assert_eq!(config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
            jail.set_env(CONFIG_PATH_ENV, "/etc/boletera/prod.toml");
            assert_eq!(config_path(), PathBuf::from("/etc/boletera/prod.toml"));
            Ok(())
        });
    }
}
