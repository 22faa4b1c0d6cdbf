//! The administrator thread (`SystemAdmin::operator()` in
//! `system_admin.cpp`): plays back a loaded policy trace against the wall
//! clock, submitting each rule into the core's pending rule queue at its
//! recorded offset. The original busy-waits in 10ms increments; `tokio`
//! gives us a proper sleep instead.

use std::sync::Arc;
use std::time::Duration;

use ratectl_core::CoreControlApplication;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::policy_file::PolicyEntry;

/// Plays `entries` into `core` at their recorded offsets, starting from the
/// moment [`SystemAdmin::run`] is called. `entries` is assumed sorted by
/// offset; [`crate::policy_file::load`] preserves file order, which the
/// original's format relies on (it does not sort).
pub struct SystemAdmin {
    entries: Vec<PolicyEntry>,
}

impl SystemAdmin {
    pub fn new(entries: Vec<PolicyEntry>) -> Self {
        Self { entries }
    }

    /// Runs until every entry has been submitted or `shutdown` fires.
    pub async fn run(self, core: Arc<CoreControlApplication>, shutdown: CancellationToken) {
        let start = Instant::now();
        info!(rule_count = self.entries.len(), "administrator starting playback");

        for entry in self.entries {
            let deadline = start + entry.offset;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("administrator stopped before finishing playback");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
            debug!(rule = %entry.rule_text, "administrator submitting rule");
            core.enqueue_rule_in_queue(entry.rule_text);
        }

        info!("administrator finished playback");
    }
}

/// Convenience for tests: builds a [`SystemAdmin`] whose every entry fires
/// immediately, useful for driving a deterministic single cycle.
#[cfg(test)]
pub fn immediate(rule_texts: impl IntoIterator<Item = String>) -> SystemAdmin {
    SystemAdmin::new(
        rule_texts
            .into_iter()
            .map(|rule_text| PolicyEntry {
                offset: Duration::ZERO,
                rule_text,
            })
            .collect(),
    )
}
