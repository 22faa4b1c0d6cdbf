//! The core's view of a connected local controller: the `GlobalToLocal`
//! client-side calls `local_handshake`/`stage_handshake`/`mark_stage_ready`/
//! `create_enforcement_rule`/`collect_global_statistics[_aggregated]` make,
//! grounded on `include/cheferd/networking/local_interface.hpp`.
//!
//! Abstracted behind a trait so the feedback loop (`control_app.rs`) can run
//! against an in-memory fake in tests instead of a live `tonic` channel;
//! `ratectl-local`'s server implements the peer side, `crates/cli` wires the
//! real `tonic` client implementation in.

use std::collections::HashMap;

use async_trait::async_trait;
use ratectl_codec::Status;

/// One job's computed enforcement rates to a single local, keyed by
/// environment id (spec's nested `env:rate` list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvRates {
    pub rates: HashMap<i32, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageIdentity {
    pub name: String,
    pub env: String,
    pub pid: i32,
    pub ppid: i32,
    pub hostname: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStats {
    /// Keyed by "job+env", matching the southbound aggregate's key shape.
    pub total_rate_by_key: HashMap<String, f64>,
}

#[async_trait]
pub trait LocalLink: Send + Sync {
    async fn local_handshake(&self, housekeeping_rules: &[String]) -> Status;

    async fn stage_handshake(
        &self,
        stage_name: &str,
        stage_env: &str,
    ) -> Result<StageIdentity, Status>;

    async fn mark_stage_ready(&self, stage_name: &str, stage_env: &str) -> Status;

    async fn create_enforcement_rule(
        &self,
        rule_id: u64,
        stage_name: &str,
        operation: &str,
        env_rates: &EnvRates,
    ) -> Status;

    async fn collect_global_statistics(&self) -> Result<GlobalStats, Status>;

    async fn collect_global_statistics_aggregated(&self) -> Result<GlobalStats, Status>;
}
