//! Environment-driven configuration for the orchestration layer.

use std::time::Duration;

use thiserror::Error;

use crate::signals::SignalTtls;

pub const DEFAULT_MAX_ACTIVE_JOBS_PER_USER: u32 = 3;
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_REDIS_KEY_PREFIX: &str = "docket";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Admission-control limit on non-terminal jobs per user.
    pub max_active_jobs_per_user: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_active_jobs_per_user: DEFAULT_MAX_ACTIVE_JOBS_PER_USER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long a finished item keeps deduplicating its job id.
    pub retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub redis_url: String,
    pub redis_key_prefix: String,
    pub orchestrator: OrchestratorConfig,
    pub signal_ttls: SignalTtls,
    pub queue: QueueConfig,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            use_persistent_stores: false,
            database_url: None,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            redis_key_prefix: DEFAULT_REDIS_KEY_PREFIX.to_string(),
            orchestrator: OrchestratorConfig::default(),
            signal_ttls: SignalTtls::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = Env(&lookup);

        let use_persistent_stores = env.parse_bool("USE_PERSISTENT_STORES")?.unwrap_or(false);
        let database_url = env.string("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let max_active_jobs_per_user = env
            .parse_u64("MAX_ACTIVE_JOBS_PER_USER")?
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(DEFAULT_MAX_ACTIVE_JOBS_PER_USER);
        if max_active_jobs_per_user == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_ACTIVE_JOBS_PER_USER",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let ttl_defaults = defaults.signal_ttls;
        let signal_ttls = SignalTtls {
            progress: env.secs("PROGRESS_TTL_SECS")?.unwrap_or(ttl_defaults.progress),
            two_factor: env.secs("TWO_FACTOR_TTL_SECS")?.unwrap_or(ttl_defaults.two_factor),
            cancellation: env
                .secs("CANCELLATION_TTL_SECS")?
                .unwrap_or(ttl_defaults.cancellation),
        };

        Ok(Self {
            use_persistent_stores,
            database_url,
            redis_url: env.string("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_key_prefix: env
                .string("REDIS_KEY_PREFIX")
                .unwrap_or(defaults.redis_key_prefix),
            orchestrator: OrchestratorConfig {
                max_active_jobs_per_user,
            },
            signal_ttls,
            queue: QueueConfig {
                retention: env
                    .secs("QUEUE_RETENTION_SECS")?
                    .unwrap_or(defaults.queue.retention),
            },
        })
    }
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Trimmed value; blank counts as unset.
    fn string(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_bool(&self, var: &'static str) -> Result<Option<bool>, ConfigError> {
        self.string(var)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(invalid(var, &v, "expected true or false")),
            })
            .transpose()
    }

    fn parse_u64(&self, var: &'static str) -> Result<Option<u64>, ConfigError> {
        self.string(var)
            .map(|v| v.parse::<u64>().map_err(|e| invalid(var, &v, &e.to_string())))
            .transpose()
    }

    /// A positive number of seconds.
    fn secs(&self, var: &'static str) -> Result<Option<Duration>, ConfigError> {
        match self.parse_u64(var)? {
            Some(0) => Err(invalid(var, "0", "must be at least 1 second")),
            other => Ok(other.map(Duration::from_secs)),
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<InfraConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        InfraConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), InfraConfig::default());
        let config = load(&[]).unwrap();
        assert_eq!(config.orchestrator.max_active_jobs_per_user, 3);
        assert_eq!(config.signal_ttls.two_factor, Duration::from_secs(300));
        assert_eq!(config.signal_ttls.cancellation, Duration::from_secs(3600));
        assert_eq!(config.signal_ttls.progress, Duration::from_secs(7200));
        assert_eq!(config.queue.retention, Duration::from_secs(86400));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("MAX_ACTIVE_JOBS_PER_USER", "5"),
            ("TWO_FACTOR_TTL_SECS", "120"),
            ("REDIS_KEY_PREFIX", "staging"),
        ])
        .unwrap();
        assert_eq!(config.orchestrator.max_active_jobs_per_user, 5);
        assert_eq!(config.signal_ttls.two_factor, Duration::from_secs(120));
        assert_eq!(config.redis_key_prefix, "staging");
    }

    #[test]
    fn persistent_mode_requires_database_url() {
        assert_eq!(
            load(&[("USE_PERSISTENT_STORES", "true")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
        let config = load(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/docket"),
        ])
        .unwrap();
        assert!(config.use_persistent_stores);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("MAX_ACTIVE_JOBS_PER_USER", "0")]).unwrap_err();
        assert!(err.to_string().contains("MAX_ACTIVE_JOBS_PER_USER"));

        let err = load(&[("PROGRESS_TTL_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PROGRESS_TTL_SECS", .. }));

        let err = load(&[("USE_PERSISTENT_STORES", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "USE_PERSISTENT_STORES", .. }));
    }
}
