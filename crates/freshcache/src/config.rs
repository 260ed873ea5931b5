//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

/// Runtime settings for a cache instance.
///
/// All fields have defaults, so embedders can construct a cache with
/// [`Default::default`] or deserialize partial overrides from their own
/// configuration files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between registering a computation and its first run.
    #[serde(with = "humantime_serde")]
    pub startup_delay: Duration,

    /// Deadline applied to reads when the caller does not pass one.
    #[serde(with = "humantime_serde")]
    pub default_get_timeout: Duration,

    /// Capacity of each worker's mailbox.
    ///
    /// The mailbox carries reader subscriptions and refresh triggers; a full
    /// mailbox briefly blocks new readers, it never drops messages.
    pub mailbox_size: usize,

    /// Statsd metrics reporting. Metrics are disabled when unset.
    pub metrics: Option<MetricsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            startup_delay: Duration::from_millis(1000),
            default_get_timeout: Duration::from_secs(30),
            mailbox_size: 32,
            metrics: None,
        }
    }
}

impl Config {
    /// Wires up statsd reporting when a [`MetricsConfig`] is present.
    ///
    /// A no-op without one; metrics then stay disabled for the process.
    pub fn configure_metrics(&self) -> anyhow::Result<()> {
        if let Some(metrics) = &self.metrics {
            crate::metrics::configure_statsd(
                &metrics.prefix,
                metrics.statsd.as_str(),
                Default::default(),
            )?;
        }
        Ok(())
    }
}

/// Control the metrics.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// host/port of statsd instance
    pub statsd: String,
    /// The prefix that should be added to all metrics.
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "freshcache".into()
}
