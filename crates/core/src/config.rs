//! Orchestration settings resolved once at startup.
//!
//! Every TTL, timeout and pool size the registry, dispatcher and workers
//! honour lives in [`OrchestrationConfig`]. The struct is immutable after
//! construction and shared by `Arc`.

use std::str::FromStr;
use std::time::Duration;

use crate::job::ResponseMode;

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Orchestration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationConfig {
    /// How long a computed result stays retrievable.
    pub result_ttl: Duration,
    /// How long a terminal job record stays queryable.
    pub job_retention: Duration,
    /// Upper bound on the synchronous wait in the dispatcher.
    pub sync_execution_timeout: Duration,
    /// Advisory limit: the engine is asked to wrap up.
    pub soft_time_limit: Duration,
    /// Enforced limit: execution is dropped and the job fails with `timeout`.
    pub hard_time_limit: Duration,
    /// Maximum number of queued job references.
    pub queue_capacity: usize,
    /// Number of in-process workers. Zero is allowed.
    pub worker_concurrency: usize,
    /// Mode used when a request states no preference.
    pub default_response_mode: ResponseMode,
    /// How long a dismissal waits for the worker to acknowledge.
    pub dismiss_ack_timeout: Duration,
    /// Interval of the background retention sweep and lease reaper.
    pub sweep_interval: Duration,
    /// A running job whose lease is older than this is considered lost.
    pub worker_lease: Duration,
    /// How often a worker renews the lease of the job it executes.
    pub heartbeat_interval: Duration,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            result_ttl: Duration::from_secs(48 * SECS_PER_HOUR),
            job_retention: Duration::from_secs(7 * SECS_PER_DAY),
            sync_execution_timeout: Duration::from_secs(30),
            soft_time_limit: Duration::from_secs(900),
            hard_time_limit: Duration::from_secs(1200),
            queue_capacity: 256,
            worker_concurrency: 2,
            default_response_mode: ResponseMode::Async,
            dismiss_ack_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(300),
            worker_lease: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl OrchestrationConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `RESULTS_TTL_HOURS`              | `48`    |
    /// | `JOB_STATUS_TTL_DAYS`            | `7`     |
    /// | `SYNC_EXECUTION_TIMEOUT_SECS`    | `30`    |
    /// | `TASK_SOFT_TIME_LIMIT_SECS`      | `900`   |
    /// | `TASK_HARD_TIME_LIMIT_SECS`      | `1200`  |
    /// | `QUEUE_CAPACITY`                 | `256`   |
    /// | `WORKER_CONCURRENCY`             | `2`     |
    /// | `DEFAULT_RESPONSE_MODE`          | `async` |
    /// | `DISMISS_ACK_TIMEOUT_SECS`       | `10`    |
    /// | `RETENTION_SWEEP_INTERVAL_SECS`  | `300`   |
    /// | `WORKER_LEASE_SECS`              | `120`   |
    /// | `WORKER_HEARTBEAT_SECS`          | `30`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let hours = |d: Duration| d.as_secs() / SECS_PER_HOUR;
        let days = |d: Duration| d.as_secs() / SECS_PER_DAY;

        let result_ttl = scaled_secs_or(
            &lookup,
            "RESULTS_TTL_HOURS",
            hours(defaults.result_ttl),
            SECS_PER_HOUR,
            "an integer number of hours",
        )?;
        let job_retention = scaled_secs_or(
            &lookup,
            "JOB_STATUS_TTL_DAYS",
            days(defaults.job_retention),
            SECS_PER_DAY,
            "an integer number of days",
        )?;

        let default_response_mode = match lookup("DEFAULT_RESPONSE_MODE") {
            None => defaults.default_response_mode,
            Some(raw) => ResponseMode::parse(&raw).ok_or(ConfigError::Invalid {
                var: "DEFAULT_RESPONSE_MODE",
                expected: "`sync` or `async`",
                value: raw,
            })?,
        };

        let config = Self {
            result_ttl,
            job_retention,
            sync_execution_timeout: secs_or(
                &lookup,
                "SYNC_EXECUTION_TIMEOUT_SECS",
                defaults.sync_execution_timeout,
            )?,
            soft_time_limit: secs_or(&lookup, "TASK_SOFT_TIME_LIMIT_SECS", defaults.soft_time_limit)?,
            hard_time_limit: secs_or(&lookup, "TASK_HARD_TIME_LIMIT_SECS", defaults.hard_time_limit)?,
            queue_capacity: parse_or(
                &lookup,
                "QUEUE_CAPACITY",
                defaults.queue_capacity,
                "a positive integer",
            )?,
            worker_concurrency: parse_or(
                &lookup,
                "WORKER_CONCURRENCY",
                defaults.worker_concurrency,
                "a non-negative integer",
            )?,
            default_response_mode,
            dismiss_ack_timeout: secs_or(
                &lookup,
                "DISMISS_ACK_TIMEOUT_SECS",
                defaults.dismiss_ack_timeout,
            )?,
            sweep_interval: secs_or(
                &lookup,
                "RETENTION_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval,
            )?,
            worker_lease: secs_or(&lookup, "WORKER_LEASE_SECS", defaults.worker_lease)?,
            heartbeat_interval: secs_or(
                &lookup,
                "WORKER_HEARTBEAT_SECS",
                defaults.heartbeat_interval,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the orchestration cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Inconsistent(
                "QUEUE_CAPACITY must be at least 1".into(),
            ));
        }
        if self.soft_time_limit > self.hard_time_limit {
            return Err(ConfigError::Inconsistent(format!(
                "soft time limit ({}s) exceeds hard time limit ({}s)",
                self.soft_time_limit.as_secs(),
                self.hard_time_limit.as_secs()
            )));
        }
        if self.heartbeat_interval.is_zero() || self.heartbeat_interval >= self.worker_lease {
            return Err(ConfigError::Inconsistent(format!(
                "heartbeat interval ({}s) must be non-zero and shorter than the worker lease ({}s)",
                self.heartbeat_interval.as_secs(),
                self.worker_lease.as_secs()
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Inconsistent(
                "RETENTION_SWEEP_INTERVAL_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse `var` with `FromStr`, or return `default` when it is unset.
pub fn parse_or<T, F>(
    lookup: &F,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value: raw,
        }),
    }
}

fn secs_or<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, var, default.as_secs(), "an integer number of seconds").map(Duration::from_secs)
}

/// Parse a count of `unit`-second periods, rejecting values whose total
/// overflows `u64` seconds.
fn scaled_secs_or<F>(
    lookup: &F,
    var: &'static str,
    default: u64,
    unit: u64,
    expected: &'static str,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let count: u64 = parse_or(lookup, var, default, expected)?;
    count
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            var,
            expected,
            value: count.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = OrchestrationConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, OrchestrationConfig::default());
    }

    #[test]
    fn ttl_units_are_hours_and_days() {
        let config = OrchestrationConfig::from_lookup(lookup_from(&[
            ("RESULTS_TTL_HOURS", "2"),
            ("JOB_STATUS_TTL_DAYS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.result_ttl, Duration::from_secs(7200));
        assert_eq!(config.job_retention, Duration::from_secs(86_400));
    }

    #[test]
    fn overflowing_ttl_is_rejected() {
        let err = OrchestrationConfig::from_lookup(lookup_from(&[(
            "RESULTS_TTL_HOURS",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "RESULTS_TTL_HOURS", .. });

        let err = OrchestrationConfig::from_lookup(lookup_from(&[(
            "JOB_STATUS_TTL_DAYS",
            "300000000000000",
        )]))
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "JOB_STATUS_TTL_DAYS", .. });
    }

    #[test]
    fn non_numeric_value_is_reported_with_variable_name() {
        let err = OrchestrationConfig::from_lookup(lookup_from(&[(
            "SYNC_EXECUTION_TIMEOUT_SECS",
            "soon",
        )]))
        .unwrap_err();
        assert_matches!(
            err,
            ConfigError::Invalid { var: "SYNC_EXECUTION_TIMEOUT_SECS", .. }
        );
    }

    #[test]
    fn soft_limit_above_hard_limit_is_rejected() {
        let err = OrchestrationConfig::from_lookup(lookup_from(&[
            ("TASK_SOFT_TIME_LIMIT_SECS", "600"),
            ("TASK_HARD_TIME_LIMIT_SECS", "300"),
        ]))
        .unwrap_err();
        assert_matches!(err, ConfigError::Inconsistent(_));
    }

    #[test]
    fn zero_workers_is_allowed() {
        let config =
            OrchestrationConfig::from_lookup(lookup_from(&[("WORKER_CONCURRENCY", "0")])).unwrap();
        assert_eq!(config.worker_concurrency, 0);
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let err = OrchestrationConfig::from_lookup(lookup_from(&[("QUEUE_CAPACITY", "0")]))
            .unwrap_err();
        assert_matches!(err, ConfigError::Inconsistent(_));
    }

    #[test]
    fn response_mode_is_parsed() {
        let config =
            OrchestrationConfig::from_lookup(lookup_from(&[("DEFAULT_RESPONSE_MODE", "Sync")]))
                .unwrap();
        assert_eq!(config.default_response_mode, ResponseMode::Sync);

        let err =
            OrchestrationConfig::from_lookup(lookup_from(&[("DEFAULT_RESPONSE_MODE", "later")]))
                .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "DEFAULT_RESPONSE_MODE", .. });
    }

    #[test]
    fn heartbeat_must_be_shorter_than_lease() {
        let err = OrchestrationConfig::from_lookup(lookup_from(&[
            ("WORKER_LEASE_SECS", "30"),
            ("WORKER_HEARTBEAT_SECS", "30"),
        ]))
        .unwrap_err();
        assert_matches!(err, ConfigError::Inconsistent(_));
    }
}
