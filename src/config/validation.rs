use super::{ConfigError, Settings};
use std::str::FromStr;
use std::time::Duration;

/// Fetch a key that has no default
pub fn require(settings: &dyn Settings, key: &str) -> Result<String, ConfigError> {
    settings
        .get(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Parse a key with `FromStr`, falling back to `default` when absent or empty
pub fn parse_or<T>(settings: &dyn Settings, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match settings.get(key) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

/// Parse a duration given in (possibly fractional) seconds, e.g. `0.2`
pub fn seconds_or(
    settings: &dyn Settings,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = settings.get(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };

    let invalid = |reason: &str| ConfigError::Invalid {
        key: key.to_string(),
        value: value.clone(),
        reason: reason.to_string(),
    };

    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid("expected a number of seconds"))?;

    Duration::try_from_secs_f64(seconds).map_err(|_| invalid("must be finite and non-negative"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertiesConfig;

    #[test]
    fn test_parse_or_default() {
        let config = PropertiesConfig::new();
        assert_eq!(parse_or(&config, "worker.threads", 1usize).unwrap(), 1);
    }

    #[test]
    fn test_parse_or_invalid() {
        let config = PropertiesConfig::from_properties([("worker.threads", "many")]);

        let result = parse_or(&config, "worker.threads", 1usize);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_seconds_fractional() {
        let config = PropertiesConfig::from_properties([("worker.timeout", "0.05")]);

        let timeout = seconds_or(&config, "worker.timeout", Duration::from_millis(200)).unwrap();
        assert_eq!(timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_seconds_rejects_negative() {
        let config = PropertiesConfig::from_properties([("worker.join.timeout", "-1")]);

        let result = seconds_or(&config, "worker.join.timeout", Duration::from_secs(60));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_seconds_rejects_garbage() {
        let config = PropertiesConfig::from_properties([("worker.timeout", "soon")]);

        let result = seconds_or(&config, "worker.timeout", Duration::from_millis(200));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_require_missing() {
        let config = PropertiesConfig::from_properties([("files.provider", "")]);

        let result = require(&config, "files.provider");
        assert!(matches!(result, Err(ConfigError::Missing(key)) if key == "files.provider"));
    }
}
