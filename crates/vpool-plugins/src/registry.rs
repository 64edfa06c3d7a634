//! Plugin registry — name → implementation, built at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use vpool_state::SchedulerPolicy;

use crate::error::{PluginError, PluginResult};
use crate::framework::{FilterPlugin, ScorePlugin};
use crate::plugins::*;

/// Named filter and score plugins available to the scheduler.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    filters: HashMap<String, Arc<dyn FilterPlugin>>,
    scores: HashMap<String, Arc<dyn ScorePlugin>>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in plugin.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let filters: [Arc<dyn FilterPlugin>; 2] =
            [Arc::new(PodFitsResources), Arc::new(EvenPodSpread)];
        let scores: [Arc<dyn ScorePlugin>; 5] = [
            Arc::new(LowestOrdinalPriority),
            Arc::new(RemoveWithEvenPodSpreadPriority),
            Arc::new(RemoveWithHighestOrdinalPriority),
            Arc::new(AvailabilityZonePriority),
            Arc::new(AvailabilityNodePriority),
        ];
        for plugin in filters {
            registry.filters.insert(plugin.name().to_string(), plugin);
        }
        for plugin in scores {
            registry.scores.insert(plugin.name().to_string(), plugin);
        }
        registry
    }

    pub fn register_filter(&mut self, plugin: Arc<dyn FilterPlugin>) -> PluginResult<()> {
        let name = plugin.name();
        if self.filters.contains_key(name) {
            return Err(PluginError::Duplicate(name.to_string()));
        }
        debug!(plugin = name, "filter plugin registered");
        self.filters.insert(name.to_string(), plugin);
        Ok(())
    }

    pub fn register_score(&mut self, plugin: Arc<dyn ScorePlugin>) -> PluginResult<()> {
        let name = plugin.name();
        if self.scores.contains_key(name) {
            return Err(PluginError::Duplicate(name.to_string()));
        }
        debug!(plugin = name, "score plugin registered");
        self.scores.insert(name.to_string(), plugin);
        Ok(())
    }

    pub fn filter(&self, name: &str) -> Option<&Arc<dyn FilterPlugin>> {
        self.filters.get(name)
    }

    pub fn score(&self, name: &str) -> Option<&Arc<dyn ScorePlugin>> {
        self.scores.get(name)
    }

    /// Registered filter names, sorted.
    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered score names, sorted.
    pub fn score_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every plugin named by `policy` exists and accepts its
    /// arguments.
    pub fn validate(&self, policy: &SchedulerPolicy) -> PluginResult<()> {
        for predicate in &policy.predicates {
            let plugin = self
                .filter(&predicate.name)
                .ok_or_else(|| PluginError::UnknownFilter(predicate.name.clone()))?;
            let status = plugin.validate_args(predicate.args.as_deref());
            if !status.is_success() {
                return Err(PluginError::InvalidArgs {
                    plugin: predicate.name.clone(),
                    reason: status.message(),
                });
            }
        }
        for priority in &policy.priorities {
            let plugin = self
                .score(&priority.name)
                .ok_or_else(|| PluginError::UnknownScore(priority.name.clone()))?;
            let status = plugin.validate_args(priority.args.as_deref());
            if !status.is_success() {
                return Err(PluginError::InvalidArgs {
                    plugin: priority.name.clone(),
                    reason: status.message(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpool_state::*;

    use crate::status::Status;

    struct AlwaysReject;

    impl FilterPlugin for AlwaysReject {
        fn name(&self) -> &'static str {
            "AlwaysReject"
        }

        fn filter(
            &self,
            _args: Option<&str>,
            _state: &State,
            _vpod: &VPodKey,
            _ordinal: i32,
        ) -> Status {
            Status::unschedulable("rejected")
        }
    }

    fn policy(
        filters: &[(&str, Option<&str>)],
        scores: &[(&str, Option<&str>)],
    ) -> SchedulerPolicy {
        SchedulerPolicy {
            predicates: filters
                .iter()
                .map(|(name, args)| PredicatePolicy {
                    name: name.to_string(),
                    args: args.map(str::to_string),
                })
                .collect(),
            priorities: scores
                .iter()
                .map(|(name, args)| PriorityPolicy {
                    name: name.to_string(),
                    weight: 1,
                    args: args.map(str::to_string),
                })
                .collect(),
        }
    }

    #[test]
    fn defaults_register_builtins() {
        let registry = PluginRegistry::with_defaults();
        assert_eq!(registry.filter_names(), vec![EVEN_POD_SPREAD, POD_FITS_RESOURCES]);
        assert!(registry.score(REMOVE_WITH_EVEN_POD_SPREAD_PRIORITY).is_some());
        assert!(registry.score(AVAILABILITY_ZONE_PRIORITY).is_some());
        assert_eq!(registry.score_names().len(), 5);
    }

    #[test]
    fn custom_plugins_can_be_injected() {
        let mut registry = PluginRegistry::new();
        registry.register_filter(Arc::new(AlwaysReject)).unwrap();
        assert!(registry.filter("AlwaysReject").is_some());
        assert_eq!(
            registry.register_filter(Arc::new(AlwaysReject)),
            Err(PluginError::Duplicate("AlwaysReject".to_string()))
        );
    }

    #[test]
    fn validate_accepts_known_plugins() {
        let registry = PluginRegistry::with_defaults();
        let p = policy(
            &[(POD_FITS_RESOURCES, None), (EVEN_POD_SPREAD, Some(r#"{"MaxSkew": 2}"#))],
            &[(AVAILABILITY_ZONE_PRIORITY, Some(r#"{"MaxSkew": 1}"#))],
        );
        assert!(registry.validate(&p).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_names() {
        let registry = PluginRegistry::with_defaults();
        let p = policy(&[("NoSuchFilter", None)], &[]);
        assert_eq!(
            registry.validate(&p),
            Err(PluginError::UnknownFilter("NoSuchFilter".to_string()))
        );

        let p = policy(&[], &[("NoSuchScore", None)]);
        assert_eq!(
            registry.validate(&p),
            Err(PluginError::UnknownScore("NoSuchScore".to_string()))
        );
    }

    #[test]
    fn validate_rejects_unknown_argument_fields() {
        let registry = PluginRegistry::with_defaults();
        let p = policy(
            &[],
            &[(REMOVE_WITH_EVEN_POD_SPREAD_PRIORITY, Some(r#"{"MaxSkewness": 2}"#))],
        );
        assert!(matches!(registry.validate(&p), Err(PluginError::InvalidArgs { .. })));
    }
}
