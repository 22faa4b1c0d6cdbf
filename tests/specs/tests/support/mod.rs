//! Shared test fixture: a fake `LocalLink` that records every enforcement
//! RPC it receives instead of talking to a real `tonic` channel, the way
//! `crates/core/src/control_app.rs`'s own unit tests do.

use std::sync::Mutex;

use async_trait::async_trait;
use ratectl_core::{EnvRates, GlobalStats, LocalLink, StageIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforced {
    pub rule_id: u64,
    pub stage_name: String,
    pub operation: String,
    pub rate: i64,
}

#[derive(Default)]
pub struct RecordingLocal {
    enforced: Mutex<Vec<Enforced>>,
}

impl RecordingLocal {
    pub fn enforced(&self) -> Vec<Enforced> {
        self.enforced.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalLink for RecordingLocal {
    async fn local_handshake(&self, _rules: &[String]) -> ratectl_codec::Status {
        ratectl_codec::Status::Ok
    }

    async fn stage_handshake(
        &self,
        stage_name: &str,
        stage_env: &str,
    ) -> Result<StageIdentity, ratectl_codec::Status> {
        Ok(StageIdentity {
            name: stage_name.to_string(),
            env: stage_env.to_string(),
            pid: 1,
            ppid: 0,
            hostname: "node".into(),
            user: "root".into(),
        })
    }

    async fn mark_stage_ready(&self, _stage_name: &str, _stage_env: &str) -> ratectl_codec::Status {
        ratectl_codec::Status::Ok
    }

    async fn create_enforcement_rule(
        &self,
        rule_id: u64,
        stage_name: &str,
        operation: &str,
        env_rates: &EnvRates,
    ) -> ratectl_codec::Status {
        let rate = *env_rates.rates.get(&0).unwrap_or(&0);
        self.enforced.lock().unwrap().push(Enforced {
            rule_id,
            stage_name: stage_name.to_string(),
            operation: operation.to_string(),
            rate,
        });
        ratectl_codec::Status::Ok
    }

    async fn collect_global_statistics(&self) -> Result<GlobalStats, ratectl_codec::Status> {
        Ok(GlobalStats::default())
    }

    async fn collect_global_statistics_aggregated(
        &self,
    ) -> Result<GlobalStats, ratectl_codec::Status> {
        Ok(GlobalStats::default())
    }
}
