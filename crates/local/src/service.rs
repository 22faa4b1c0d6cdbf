//! The `GlobalToLocal` server: the RPC surface the core drives this local
//! controller through, grounded on
//! `include/cheferd/networking/local_connection_manager.hpp`. Every method
//! is a thin adapter translating protobuf messages into
//! [`LocalControlApplication`] calls and `ratectl_codec::Status` back into
//! `Ack`/`StageSimplifiedHandshakeRaw`/`StatsGlobalMap`.

use std::sync::Arc;

use ratectl_codec::Rule;
use ratectl_codec::Status;
use tonic::{Request, Response as TonicResponse, Status as TonicStatus};

use ratectl_proto::v1::global_to_local_server::GlobalToLocal;
use ratectl_proto::v1::{
    Ack, CollectStatsRequest, EnforcementRules, LocalHandshakeRequest, MarkStageReadyRequest,
    StageHandshakeRequest, StageSimplifiedHandshakeRaw, StatGlobal, StatsGlobalMap,
};

use crate::local_app::LocalControlApplication;

fn ack_from(status: Status) -> Result<TonicResponse<Ack>, TonicStatus> {
    match status {
        Status::Ok => Ok(TonicResponse::new(Ack { message: 1 })),
        Status::NotSupported => Ok(TonicResponse::new(Ack { message: 0 })),
        Status::Error(kind) => Err(TonicStatus::internal(kind.to_string())),
    }
}

fn rule_from_env_rates(request: EnforcementRules) -> Rule {
    Rule::Enforcement {
        rule_id: request.rule_id,
        stage_name: request.stage_name,
        operation: request.operation,
        channel_object: None,
        env_rates: request
            .env_rates
            .into_iter()
            .map(|er| ratectl_codec::EnvRate {
                env: er.env,
                rate: er.rate,
            })
            .collect(),
    }
}

pub struct LocalControlService {
    app: Arc<LocalControlApplication>,
}

impl LocalControlService {
    pub fn new(app: Arc<LocalControlApplication>) -> Self {
        Self { app }
    }
}

#[tonic::async_trait]
impl GlobalToLocal for LocalControlService {
    async fn local_handshake(
        &self,
        request: Request<LocalHandshakeRequest>,
    ) -> Result<TonicResponse<Ack>, TonicStatus> {
        let rules = request.into_inner().housekeeping_rules;
        ack_from(self.app.install_housekeeping(&rules).await)
    }

    async fn stage_handshake(
        &self,
        request: Request<StageHandshakeRequest>,
    ) -> Result<TonicResponse<StageSimplifiedHandshakeRaw>, TonicStatus> {
        let req = request.into_inner();
        let info = self
            .app
            .stage_handshake(&req.stage_name, &req.stage_env)
            .await
            .map_err(|status| TonicStatus::internal(status.to_string()))?;
        Ok(TonicResponse::new(StageSimplifiedHandshakeRaw {
            name: info.name,
            env: info.env,
            pid: info.pid,
            ppid: info.ppid,
            hostname: info.hostname,
            user: info.user,
        }))
    }

    async fn mark_stage_ready(
        &self,
        request: Request<MarkStageReadyRequest>,
    ) -> Result<TonicResponse<Ack>, TonicStatus> {
        let req = request.into_inner();
        ack_from(
            self.app
                .mark_stage_ready(&req.stage_name, &req.stage_env)
                .await,
        )
    }

    async fn create_enforcement_rule(
        &self,
        request: Request<EnforcementRules>,
    ) -> Result<TonicResponse<Ack>, TonicStatus> {
        let rule = rule_from_env_rates(request.into_inner());
        ack_from(self.app.create_enforcement_rule(rule).await)
    }

    async fn collect_global_statistics(
        &self,
        _request: Request<CollectStatsRequest>,
    ) -> Result<TonicResponse<StatsGlobalMap>, TonicStatus> {
        self.collect(false).await
    }

    async fn collect_global_statistics_aggregated(
        &self,
        _request: Request<CollectStatsRequest>,
    ) -> Result<TonicResponse<StatsGlobalMap>, TonicStatus> {
        self.collect(true).await
    }
}

impl LocalControlService {
    async fn collect(
        &self,
        aggregated: bool,
    ) -> Result<TonicResponse<StatsGlobalMap>, TonicStatus> {
        let collection = self
            .app
            .collect_statistics(aggregated)
            .await
            .map_err(|status| TonicStatus::internal(status.to_string()))?;
        let stats = collection
            .entries
            .into_iter()
            .map(|entry| {
                (
                    entry.entity,
                    StatGlobal {
                        total_rate: entry.rate,
                    },
                )
            })
            .collect();
        Ok(TonicResponse::new(StatsGlobalMap { stats }))
    }
}
