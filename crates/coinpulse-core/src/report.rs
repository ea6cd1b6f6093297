//! Operator-facing health summary.

use serde::{Deserialize, Serialize};

use crate::health::{HealthTracker, ProviderHealth};
use crate::registry::SourceRegistry;
use crate::ProviderId;

/// Consecutive error count above which a provider gets its own warning.
pub const INVESTIGATE_AFTER_ERRORS: u32 = 5;

/// Primary source label used when no enabled provider is healthy.
pub const NO_PRIMARY_SOURCE: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub overall: OverallHealth,
    pub sources: Vec<SourceDetail>,
    /// Operator guidance, most severe first.
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    /// `round(100 * healthy_enabled / enabled)`, 0 with no enabled provider.
    pub health_score: u32,
    pub active_sources: usize,
    pub total_sources: usize,
    /// Highest-precedence healthy enabled provider, or `"none"`.
    pub primary_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDetail {
    pub name: String,
    pub priority: u32,
    pub enabled: bool,
    #[serde(flatten)]
    pub health: ProviderHealth,
}

impl HealthReport {
    /// Builds the report from a point-in-time health snapshot.
    pub fn build(registry: &SourceRegistry, health: &HealthTracker) -> Self {
        let snapshot = health.snapshot();
        let is_healthy = |id: ProviderId| {
            snapshot
                .iter()
                .find(|record| record.provider == id)
                .is_some_and(|record| record.is_healthy)
        };

        let enabled = registry.sorted_enabled();
        let healthy_enabled = enabled
            .iter()
            .filter(|config| is_healthy(config.id))
            .collect::<Vec<_>>();

        let overall = OverallHealth {
            health_score: health_score(healthy_enabled.len(), enabled.len()),
            active_sources: healthy_enabled.len(),
            total_sources: enabled.len(),
            primary_source: healthy_enabled
                .first()
                .map_or_else(|| NO_PRIMARY_SOURCE.to_owned(), |config| config.id.as_str().to_owned()),
        };

        let sources = snapshot
            .iter()
            .filter_map(|record| {
                let config = registry.get(record.provider)?;
                Some(SourceDetail {
                    name: record.provider.display_name().to_owned(),
                    priority: config.priority,
                    enabled: config.enabled,
                    health: record.clone(),
                })
            })
            .collect();

        Self {
            recommendations: recommendations(overall.active_sources, &snapshot),
            overall,
            sources,
        }
    }
}

fn health_score(healthy: usize, enabled: usize) -> u32 {
    if enabled == 0 {
        return 0;
    }
    // Integer round-half-up of 100 * healthy / enabled.
    let score = (200 * healthy + enabled) / (2 * enabled);
    u32::try_from(score).unwrap_or(100)
}

fn recommendations(healthy: usize, snapshot: &[ProviderHealth]) -> Vec<String> {
    let mut out = Vec::new();

    match healthy {
        0 => out.push(String::from(
            "CRITICAL: no data sources are healthy; only cached data can be served",
        )),
        1 => out.push(String::from(
            "WARNING: only one source available; there is no fail-over if it goes down",
        )),
        2 => {}
        _ => out.push(format!(
            "OK: {healthy} sources healthy; fail-over coverage is good"
        )),
    }

    for record in snapshot {
        if record.consecutive_errors > INVESTIGATE_AFTER_ERRORS {
            out.push(format!(
                "WARNING: investigate {}, {} consecutive errors",
                record.provider.display_name(),
                record.consecutive_errors
            ));
        }
    }

    out
}
