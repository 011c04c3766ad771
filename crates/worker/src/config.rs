use std::time::Duration;

/// Errors raised while reading worker configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// How often the scheduler tick runs.
    pub scheduler_tick: Duration,
    /// How often the previous day's report is (re)generated.
    pub report_interval: Duration,
    /// Deadline applied to each job run.
    pub operation_timeout: Duration,
    /// How long to wait for running jobs after a shutdown signal.
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default  |
    /// |--------------------------|----------|
    /// | `DATABASE_URL`           | required |
    /// | `DB_MAX_CONNECTIONS`     | `20`     |
    /// | `SCHEDULER_TICK_SECS`    | `3600`   |
    /// | `REPORT_INTERVAL_SECS`   | `86400`  |
    /// | `OPERATION_TIMEOUT_SECS` | `30`     |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `10`     |
    /// | `LOG_FORMAT`             | `text`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let db_max_connections = parse_positive(&lookup, "DB_MAX_CONNECTIONS", 20)?;
        let scheduler_tick = parse_secs(&lookup, "SCHEDULER_TICK_SECS", 3600)?;
        let report_interval = parse_secs(&lookup, "REPORT_INTERVAL_SECS", 86_400)?;
        let operation_timeout = parse_secs(&lookup, "OPERATION_TIMEOUT_SECS", 30)?;
        let shutdown_timeout = parse_secs(&lookup, "SHUTDOWN_TIMEOUT_SECS", 10)?;

        let log_format = match lookup("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "LOG_FORMAT",
                        value,
                        reason: "expected 'text' or 'json'".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            database_url,
            db_max_connections,
            scheduler_tick,
            report_interval,
            operation_timeout,
            shutdown_timeout,
            log_format,
        })
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_secs<F>(lookup: &F, name: &'static str, default: u32) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_positive(lookup, name, default).map(|secs| Duration::from_secs(u64::from(secs)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/assetdesk")]).unwrap();
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.scheduler_tick, Duration::from_secs(3600));
        assert_eq!(config.report_interval, Duration::from_secs(86_400));
        assert_eq!(config.operation_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
        assert_eq!(
            load(&[("DATABASE_URL", "  ")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/assetdesk"),
            ("DB_MAX_CONNECTIONS", "5"),
            ("SCHEDULER_TICK_SECS", "60"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.scheduler_tick, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_values_are_rejected_not_defaulted() {
        let err = load(&[
            ("DATABASE_URL", "postgres://db/assetdesk"),
            ("SCHEDULER_TICK_SECS", "hourly"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SCHEDULER_TICK_SECS", .. }));

        let err = load(&[
            ("DATABASE_URL", "postgres://db/assetdesk"),
            ("OPERATION_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "OPERATION_TIMEOUT_SECS", .. }));

        let err = load(&[("DATABASE_URL", "postgres://db/assetdesk"), ("LOG_FORMAT", "xml")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LOG_FORMAT", .. }));
    }
}
