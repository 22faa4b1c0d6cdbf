//! Telemetry collection (spec §4.4.4), grounded on
//! `CoreControlApplication::collect_statistics_result` and the
//! `COLLECT_GLOBAL_STATS`/`COLLECT_GLOBAL_STATS_AGGREGATED` southbound
//! requests it triggers through each local. The core only needs the latest
//! observed rate per job to drive DYNAMIC-LEFTOVER; older samples are not
//! retained.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::warn;

use crate::local_link::LocalLink;

#[derive(Debug, Default)]
pub struct TelemetryStore {
    rates: RwLock<HashMap<String, f64>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `collect_statistics_result`: pull aggregated stats from every
    /// connected local and fold "job+env" keys down to a per-job rate (the
    /// first `+`-delimited segment is the job name). A local that returns a
    /// sentinel (transport error) contributes nothing to the merged map and
    /// is returned so the caller can evict its session and decrement
    /// `active_locals`.
    pub async fn collect(
        &self,
        locals: &HashMap<String, std::sync::Arc<dyn LocalLink>>,
    ) -> Vec<String> {
        let mut merged: HashMap<String, f64> = HashMap::new();
        let mut failed = Vec::new();
        for (address, link) in locals {
            match link.collect_global_statistics_aggregated().await {
                Ok(stats) => {
                    for (key, rate) in stats.total_rate_by_key {
                        let job = key.split('+').next().unwrap_or(&key).to_string();
                        *merged.entry(job).or_insert(0.0) += rate;
                    }
                }
                Err(status) => {
                    warn!(local_address = %address, %status, "telemetry collection failed");
                    failed.push(address.clone());
                }
            }
        }
        *self.rates.write().await = merged;
        failed
    }

    pub async fn last_known_rate(&self, job: &str) -> Option<i64> {
        self.rates.read().await.get(job).map(|rate| *rate as i64)
    }
}
