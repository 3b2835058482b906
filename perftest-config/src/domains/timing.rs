//! Settle delays and polling bounds

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interval and upper bound for a polling loop, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between probes
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub interval: Duration,

    /// Give up once this much time has passed
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause after restarting the virtualization daemon
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub cleanup_settle: Duration,

    /// Pause before log collection so monitoring output is flushed
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub collect_settle: Duration,

    /// Wait for the server's monitoring output to appear
    pub monitoring_poll: PollSettings,

    /// Wait for scheduled client commands to drain
    pub queue_poll: PollSettings,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cleanup_settle: Duration::from_secs(5),
            collect_settle: Duration::from_secs(60),
            monitoring_poll: PollSettings::new(Duration::from_secs(5), Duration::from_secs(600)),
            queue_poll: PollSettings::new(Duration::from_secs(5), Duration::from_secs(6 * 3600)),
        }
    }
}

impl Validatable for TimingConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (name, poll) in [
            ("monitoring_poll", &self.monitoring_poll),
            ("queue_poll", &self.queue_poll),
        ] {
            if poll.interval.is_zero() {
                return Err(self.validation_error(format!("{}.interval must be non-zero", name)));
            }
            if poll.timeout < poll.interval {
                return Err(self.validation_error(format!(
                    "{}.timeout must be at least one interval",
                    name
                )));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "timing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_in_seconds() {
        let yaml = r#"
collect_settle: 120
queue_poll:
  interval: 10
  timeout: 5400
"#;
        let timing: TimingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(timing.collect_settle, Duration::from_secs(120));
        assert_eq!(timing.queue_poll.interval, Duration::from_secs(10));
        assert_eq!(timing.queue_poll.timeout, Duration::from_secs(5400));
        // untouched fields keep their defaults
        assert_eq!(timing.cleanup_settle, Duration::from_secs(5));
        assert!(timing.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut timing = TimingConfig::default();
        timing.monitoring_poll.interval = Duration::ZERO;
        assert!(timing.validate().is_err());
    }

    #[test]
    fn test_timeout_shorter_than_interval_rejected() {
        let mut timing = TimingConfig::default();
        timing.queue_poll = PollSettings::new(Duration::from_secs(10), Duration::from_secs(1));
        assert!(timing.validate().is_err());
    }
}
