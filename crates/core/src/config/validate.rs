use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Largest UTC offset in use anywhere (UTC+14).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// Validate configuration beyond what deserialization enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(invalid("auth.api_key is required when auth.method = \"api_key\""));
    }

    let reservation = &config.reservation;
    if reservation.default_hold_ttl_secs == 0 || reservation.max_hold_ttl_secs == 0 {
        return Err(invalid("reservation hold TTLs must be positive"));
    }
    if reservation.default_hold_ttl_secs > reservation.max_hold_ttl_secs {
        return Err(invalid(
            "reservation.default_hold_ttl_secs cannot exceed reservation.max_hold_ttl_secs",
        ));
    }

    let scheduler = &config.scheduler;
    if scheduler.sweep_interval_secs == 0 || scheduler.classify_interval_secs == 0 {
        return Err(invalid("scheduler intervals must be positive"));
    }
    if scheduler.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(invalid("scheduler.utc_offset_minutes must be within ±840"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config() -> Config {
        load_config_from_str("[auth]\nmethod = \"none\"\n").unwrap()
    }

    fn assert_invalid(config: &Config) {
        assert!(matches!(
            validate_config(config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = config();
        config.server.port = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_api_key_required() {
        let mut config = config();
        config.auth.method = AuthMethod::ApiKey;
        assert_invalid(&config);

        config.auth.api_key = Some(String::new());
        assert_invalid(&config);

        config.auth.api_key = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_hold_ttls() {
        let mut config = config();
        config.reservation.default_hold_ttl_secs = 0;
        assert_invalid(&config);

        let mut config = self::config();
        config.reservation.default_hold_ttl_secs = 4000;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_scheduler() {
        let mut config = config();
        config.scheduler.sweep_interval_secs = 0;
        assert_invalid(&config);

        let mut config = self::config();
        config.scheduler.utc_offset_minutes = -15 * 60;
        assert_invalid(&config);

        let mut config = self::config();
        config.scheduler.utc_offset_minutes = -3 * 60;
        assert!(validate_config(&config).is_ok());
    }
}
