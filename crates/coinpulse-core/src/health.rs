use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ProviderId, UtcDateTime};

/// Health record of one provider.
///
/// `is_healthy == false` implies `consecutive_errors >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider: ProviderId,
    pub is_healthy: bool,
    pub consecutive_errors: u32,
    pub last_checked_at: UtcDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct HealthRecord {
    health: ProviderHealth,
    checked: Instant,
}

/// Per-provider two-state (healthy/unhealthy) tracker.
///
/// The provider set is fixed at construction, so each record sits behind its
/// own mutex and no map-wide lock exists. There is no timer: an unhealthy
/// provider only becomes eligible again through a success, or through the
/// optional re-probe interval elapsing since its last check.
#[derive(Debug)]
pub struct HealthTracker {
    records: HashMap<ProviderId, Mutex<HealthRecord>>,
    order: Vec<ProviderId>,
    reprobe_interval: Option<Duration>,
}

impl HealthTracker {
    pub fn new(providers: impl IntoIterator<Item = ProviderId>, reprobe_interval: Option<Duration>) -> Self {
        let now = UtcDateTime::now();
        let checked = Instant::now();
        let mut records = HashMap::new();
        let mut order = Vec::new();

        for provider in providers {
            if records.contains_key(&provider) {
                continue;
            }
            order.push(provider);
            records.insert(
                provider,
                Mutex::new(HealthRecord {
                    health: ProviderHealth {
                        provider,
                        is_healthy: true,
                        consecutive_errors: 0,
                        last_checked_at: now,
                        last_error: None,
                    },
                    checked,
                }),
            );
        }

        Self {
            records,
            order,
            reprobe_interval,
        }
    }

    pub const fn reprobe_interval(&self) -> Option<Duration> {
        self.reprobe_interval
    }

    /// Unhealthy → healthy (or no-op when already healthy). Unknown providers are ignored.
    pub fn record_success(&self, provider: ProviderId) {
        let Some(record) = self.records.get(&provider) else {
            return;
        };
        let mut record = lock(record);
        let recovered = !record.health.is_healthy;
        record.health.is_healthy = true;
        record.health.consecutive_errors = 0;
        record.health.last_checked_at = UtcDateTime::now();
        record.health.last_error = None;
        record.checked = Instant::now();
        drop(record);

        if recovered {
            debug!(%provider, "provider recovered");
        }
    }

    /// Healthy → unhealthy, incrementing the consecutive error count.
    pub fn record_failure(&self, provider: ProviderId, reason: &str) {
        let Some(record) = self.records.get(&provider) else {
            return;
        };
        let mut record = lock(record);
        record.health.is_healthy = false;
        record.health.consecutive_errors = record.health.consecutive_errors.saturating_add(1);
        record.health.last_checked_at = UtcDateTime::now();
        record.health.last_error = Some(reason.to_owned());
        record.checked = Instant::now();
        let consecutive_errors = record.health.consecutive_errors;
        drop(record);

        warn!(%provider, consecutive_errors, reason, "provider marked unhealthy");
    }

    /// Whether the aggregator may try this provider now.
    pub fn is_available(&self, provider: ProviderId) -> bool {
        let Some(record) = self.records.get(&provider) else {
            return false;
        };
        let record = lock(record);
        if record.health.is_healthy {
            return true;
        }

        self.reprobe_interval
            .is_some_and(|interval| record.checked.elapsed() >= interval)
    }

    pub fn get(&self, provider: ProviderId) -> Option<ProviderHealth> {
        self.records
            .get(&provider)
            .map(|record| lock(record).health.clone())
    }

    /// Detached copy of every record, in registration order.
    pub fn snapshot(&self) -> Vec<ProviderHealth> {
        self.order
            .iter()
            .filter_map(|provider| self.get(*provider))
            .collect()
    }
}

// A poisoned record is still consistent: every update above completes its
// field assignments before any code that could panic.
fn lock(record: &Mutex<HealthRecord>) -> MutexGuard<'_, HealthRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}
