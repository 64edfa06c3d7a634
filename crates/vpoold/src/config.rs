//! vpoold TOML configuration.
//!
//! ```toml
//! [pool]
//! name = "dispatcher"
//! capacity = 20
//! refresh_period = "30s"
//!
//! [cluster]
//! replicas = 2
//! zones = ["zone-a", "zone-b"]
//!
//! [[policy.priorities]]
//! name = "AvailabilityZonePriority"
//! weight = 10
//! args = '{"MaxSkew": 1}'
//!
//! [[vpods]]
//! name = "orders"
//! vreplicas = 12
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use vpool_autoscale::{AutoscalerConfig, RetryPolicy};
use vpool_plugins::PluginRegistry;
use vpool_state::{SchedulerPolicy, SchedulerStrategy, VPod, VPodKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub pool: PoolConfig,
    pub policy: Option<SchedulerPolicy>,
    pub deschedule_policy: Option<SchedulerPolicy>,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub vpods: Vec<VPodConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// StatefulSet name; pods are `<name>-<ordinal>`.
    pub name: String,
    /// Virtual replicas one pod can hold.
    pub capacity: i32,
    /// Defaults to `policy` when a `[policy]` table is present.
    pub strategy: Option<SchedulerStrategy>,
    #[serde(default = "default_refresh_period")]
    pub refresh_period: String,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: String,
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout: String,
    /// How often every VPod is rescheduled in `vpoold run`.
    #[serde(default = "default_reconcile_period")]
    pub reconcile_period: String,
}

/// The simulated pool the daemon schedules onto.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Ordinals of pods that take no new virtual replicas.
    #[serde(default)]
    pub cordoned: Vec<i32>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            zones: Vec::new(),
            nodes: Vec::new(),
            cordoned: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VPodConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub vreplicas: i32,
}

fn default_refresh_period() -> String {
    "30s".to_string()
}

fn default_retry_interval() -> String {
    "500ms".to_string()
}

fn default_retry_timeout() -> String {
    "5s".to_string()
}

fn default_reconcile_period() -> String {
    "2s".to_string()
}

fn default_replicas() -> i32 {
    1
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path, registry: &PluginRegistry) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content, registry).with_context(|| format!("loading {}", path.display()))
    }

    pub fn parse(content: &str, registry: &PluginRegistry) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate(registry)?;
        Ok(config)
    }

    pub fn validate(&self, registry: &PluginRegistry) -> anyhow::Result<()> {
        if self.pool.name.is_empty() {
            bail!("pool.name must not be empty");
        }
        if self.pool.capacity <= 0 {
            bail!("pool.capacity must be positive, got {}", self.pool.capacity);
        }
        if self.cluster.replicas < 0 {
            bail!("cluster.replicas must not be negative");
        }
        if let Some(ordinal) = self.cluster.cordoned.iter().find(|o| **o < 0) {
            bail!("cluster.cordoned: invalid ordinal {ordinal}");
        }
        if self.strategy() == SchedulerStrategy::Policy && self.policy.is_none() {
            bail!("strategy \"policy\" requires a [policy] table");
        }

        for (label, value) in [
            ("refresh_period", &self.pool.refresh_period),
            ("retry_interval", &self.pool.retry_interval),
            ("retry_timeout", &self.pool.retry_timeout),
            ("reconcile_period", &self.pool.reconcile_period),
        ] {
            let duration = parse_duration(value).with_context(|| format!("pool.{label}"))?;
            if duration.is_zero() {
                bail!("pool.{label} must be greater than zero");
            }
        }

        if let Some(policy) = &self.policy {
            registry.validate(policy).context("policy")?;
        }
        if let Some(policy) = &self.deschedule_policy {
            registry.validate(policy).context("deschedule_policy")?;
        }

        let mut seen = BTreeSet::new();
        for vpod in &self.vpods {
            if vpod.vreplicas < 0 {
                bail!("vpod {}/{}: vreplicas must not be negative", vpod.namespace, vpod.name);
            }
            if !seen.insert((vpod.namespace.as_str(), vpod.name.as_str())) {
                bail!("vpod {}/{} is declared twice", vpod.namespace, vpod.name);
            }
        }
        Ok(())
    }

    /// The effective scheduling strategy.
    pub fn strategy(&self) -> SchedulerStrategy {
        self.pool.strategy.unwrap_or(if self.policy.is_some() {
            SchedulerStrategy::Policy
        } else {
            SchedulerStrategy::MaxFillUp
        })
    }

    pub fn reconcile_period(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.pool.reconcile_period)
    }

    pub fn autoscaler_config(&self) -> anyhow::Result<AutoscalerConfig> {
        let refresh_period = parse_duration(&self.pool.refresh_period)?;
        let mut config = AutoscalerConfig::new(&self.pool.name, refresh_period);
        config.retry = RetryPolicy {
            interval: parse_duration(&self.pool.retry_interval)?,
            timeout: parse_duration(&self.pool.retry_timeout)?,
        };
        Ok(config)
    }

    /// Configured VPods, none placed yet.
    pub fn vpods(&self) -> Vec<VPod> {
        self.vpods
            .iter()
            .map(|v| VPod::new(VPodKey::new(&v.namespace, &v.name), v.vreplicas))
            .collect()
    }
}

/// Parse a duration string like "500ms", "30s", "5m" or "1h". A bare number
/// is seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (value, millis_per_unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1_000)
    };
    let value: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid duration {s:?}"))?;
    let millis = value
        .checked_mul(millis_per_unit)
        .with_context(|| format!("duration {s:?} is too large"))?;
    Ok(Duration::from_millis(millis))
}
