//! The core connection manager (spec §4.5), grounded on
//! `include/cheferd/networking/core_connection_manager.hpp`: the
//! `LocalToGlobal` gRPC service the core exposes for locals and stages to
//! register themselves, plus a `tonic`-backed [`LocalLink`] implementation
//! for the other direction (`GlobalToLocal`, called against each registered
//! local).

use std::sync::Arc;

use tonic::{Request, Response, Status as TonicStatus};

use ratectl_codec::Status;
use ratectl_proto::v1::global_to_local_client::GlobalToLocalClient;
use ratectl_proto::v1::local_to_global_server::LocalToGlobal;
use ratectl_proto::v1::{
    Ack, ConnectReply, ConnectRequest, EnvRate, LocalHandshakeRequest, MarkStageReadyRequest,
    StageHandshakeRequest, StageInfoConnect,
};

use crate::control_app::CoreControlApplication;
use crate::local_link::{EnvRates, GlobalStats, LocalLink, StageIdentity};

/// Implements `LocalLink` over a live `tonic` channel to one local
/// controller. One instance per registered local.
pub struct TonicLocalLink {
    client: tokio::sync::Mutex<GlobalToLocalClient<tonic::transport::Channel>>,
}

impl TonicLocalLink {
    pub async fn connect(local_address: &str) -> Result<Self, tonic::transport::Error> {
        let endpoint = format!("http://{local_address}");
        let client = GlobalToLocalClient::connect(endpoint).await?;
        Ok(Self {
            client: tokio::sync::Mutex::new(client),
        })
    }
}

fn status_from_tonic(error: tonic::Status) -> Status {
    Status::transport_error(error.message().to_string())
}

#[tonic::async_trait]
impl LocalLink for TonicLocalLink {
    async fn local_handshake(&self, housekeeping_rules: &[String]) -> Status {
        let request = LocalHandshakeRequest {
            housekeeping_rules: housekeeping_rules.to_vec(),
        };
        match self.client.lock().await.local_handshake(request).await {
            Ok(reply) if reply.into_inner().message == 1 => Status::Ok,
            Ok(_) => Status::protocol_error("local returned error ack"),
            Err(error) => status_from_tonic(error),
        }
    }

    async fn stage_handshake(
        &self,
        stage_name: &str,
        stage_env: &str,
    ) -> Result<StageIdentity, Status> {
        let request = StageHandshakeRequest {
            stage_name: stage_name.to_string(),
            stage_env: stage_env.to_string(),
        };
        match self.client.lock().await.stage_handshake(request).await {
            Ok(reply) => {
                let info = reply.into_inner();
                Ok(StageIdentity {
                    name: info.name,
                    env: info.env,
                    pid: info.pid,
                    ppid: info.ppid,
                    hostname: info.hostname,
                    user: info.user,
                })
            }
            Err(error) => Err(status_from_tonic(error)),
        }
    }

    async fn mark_stage_ready(&self, stage_name: &str, stage_env: &str) -> Status {
        let request = MarkStageReadyRequest {
            stage_name: stage_name.to_string(),
            stage_env: stage_env.to_string(),
        };
        match self.client.lock().await.mark_stage_ready(request).await {
            Ok(reply) if reply.into_inner().message == 1 => Status::Ok,
            Ok(_) => Status::protocol_error("local returned error ack"),
            Err(error) => status_from_tonic(error),
        }
    }

    async fn create_enforcement_rule(
        &self,
        rule_id: u64,
        stage_name: &str,
        operation: &str,
        env_rates: &EnvRates,
    ) -> Status {
        let request = ratectl_proto::v1::EnforcementRules {
            rule_id,
            stage_name: stage_name.to_string(),
            operation: operation.to_string(),
            env_rates: env_rates
                .rates
                .iter()
                .map(|(env, rate)| EnvRate {
                    env: *env,
                    rate: *rate,
                })
                .collect(),
        };
        match self
            .client
            .lock()
            .await
            .create_enforcement_rule(request)
            .await
        {
            Ok(reply) if reply.into_inner().message == 1 => Status::Ok,
            Ok(_) => Status::protocol_error("local returned error ack"),
            Err(error) => status_from_tonic(error),
        }
    }

    async fn collect_global_statistics(&self) -> Result<GlobalStats, Status> {
        self.collect(false).await
    }

    async fn collect_global_statistics_aggregated(&self) -> Result<GlobalStats, Status> {
        self.collect(true).await
    }
}

impl TonicLocalLink {
    async fn collect(&self, aggregated: bool) -> Result<GlobalStats, Status> {
        let request = ratectl_proto::v1::CollectStatsRequest {};
        let mut client = self.client.lock().await;
        let result = if aggregated {
            client.collect_global_statistics_aggregated(request).await
        } else {
            client.collect_global_statistics(request).await
        };
        match result {
            Ok(reply) => {
                let map = reply.into_inner();
                let total_rate_by_key = map
                    .stats
                    .into_iter()
                    .map(|(key, stat)| (key, stat.total_rate))
                    .collect();
                Ok(GlobalStats { total_rate_by_key })
            }
            Err(error) => Err(status_from_tonic(error)),
        }
    }
}

/// `CoreConnectionManager`: the `LocalToGlobal` service the core exposes.
/// Registration is just bookkeeping — the feedback loop (not this RPC
/// handler) performs the handshake on its next cycle, matching the
/// original's split between "accept the connection" and "run the
/// handshake".
pub struct CoreConnectionManager {
    control_app: Arc<CoreControlApplication>,
}

impl CoreConnectionManager {
    pub fn new(control_app: Arc<CoreControlApplication>) -> Self {
        Self { control_app }
    }
}

#[tonic::async_trait]
impl LocalToGlobal for CoreConnectionManager {
    async fn connect_local_to_global(
        &self,
        request: Request<ConnectRequest>,
    ) -> Result<Response<ConnectReply>, TonicStatus> {
        let local_address = request.into_inner().user_address;
        let link = TonicLocalLink::connect(&local_address)
            .await
            .map_err(|e| TonicStatus::unavailable(e.to_string()))?;
        self.control_app
            .register_local_controller_session(local_address, Arc::new(link))
            .await;
        Ok(Response::new(ConnectReply {
            ack: Some(Ack { message: 1 }),
        }))
    }

    async fn connect_stage_to_global(
        &self,
        request: Request<StageInfoConnect>,
    ) -> Result<Response<ConnectReply>, TonicStatus> {
        let info = request.into_inner();
        self.control_app.register_stage_session(
            info.local_address,
            info.stage_name,
            info.stage_env,
            info.stage_user,
        );
        Ok(Response::new(ConnectReply {
            ack: Some(Ack { message: 1 }),
        }))
    }
}
