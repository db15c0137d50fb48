//! Compiled, immutable routing state of one environment.

use std::time::Instant;

use url::Url;

use crate::observability::metrics;
use crate::rollout::{self, ActiveDeployment};
use crate::rules::RuleSet;
use crate::store::EnvironmentRecord;

/// Everything the hot path needs for one environment, compiled once.
#[derive(Debug)]
pub struct EnvironmentSnapshot {
    pub env_id: String,
    pub rules: RuleSet,
    /// Deployments published to this environment, in stored order.
    pub deployments: Vec<ActiveDeployment>,
    pub api_prefix: Option<String>,
    pub api_location: Option<Url>,
    pub built_at: Instant,
}

impl EnvironmentSnapshot {
    /// Compile a record. Rules or settings that fail to compile are skipped
    /// and logged; the rest of the environment stays routable.
    pub fn build(record: EnvironmentRecord) -> Self {
        let (rules, errors) = RuleSet::compile_lenient(&record.redirects);
        for error in &errors {
            tracing::warn!(
                env_id = %record.env_id,
                rule = error.index,
                from = %error.from,
                error = %error.source,
                "Skipping rule that failed to compile"
            );
        }
        metrics::record_rules_skipped(errors.len());

        let api_location = record.api_location.as_deref().and_then(|raw| {
            Url::parse(raw)
                .map_err(|e| {
                    tracing::warn!(env_id = %record.env_id, api_location = raw, error = %e, "Ignoring invalid API location");
                })
                .ok()
        });

        let deployments = rollout::active_for(&record.env_id, &record.deployments);
        let total = rollout::published_total(&deployments);
        if total > 100 {
            tracing::warn!(env_id = %record.env_id, total, "Published percentages exceed 100");
        }

        tracing::debug!(
            env_id = %record.env_id,
            rules = rules.len(),
            deployments = deployments.len(),
            published_total = total,
            "Environment snapshot built"
        );

        Self {
            env_id: record.env_id,
            rules,
            deployments,
            api_prefix: record.api_prefix,
            api_location,
            built_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollout::{Deployment, PublishedInfo};
    use crate::rules::RedirectRule;

    #[test]
    fn test_build_skips_bad_rules_and_filters_deployments() {
        let record = EnvironmentRecord {
            env_id: "prod".into(),
            api_prefix: Some("/api".into()),
            api_location: Some("not a url".into()),
            redirects: vec![
                RedirectRule::new("/bad/*/x", "/y", 301),
                RedirectRule::new("/good", "/fine", 301),
            ],
            deployments: vec![
                Deployment {
                    id: "a".into(),
                    origin: None,
                    published: vec![PublishedInfo { env_id: "prod".into(), percentage: 60 }],
                },
                Deployment {
                    id: "b".into(),
                    origin: None,
                    published: vec![PublishedInfo { env_id: "staging".into(), percentage: 100 }],
                },
            ],
        };

        let snapshot = EnvironmentSnapshot::build(record);
        assert_eq!(snapshot.rules.len(), 1);
        assert_eq!(snapshot.deployments.len(), 1);
        assert_eq!(snapshot.deployments[0].id, "a");
        assert!(snapshot.api_location.is_none());
        assert_eq!(snapshot.api_prefix.as_deref(), Some("/api"));
    }
}
