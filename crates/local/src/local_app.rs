//! The local controller's own control application: the stage registry and
//! the handshake/housekeeping/enforcement bookkeeping the northbound
//! `GlobalToLocal` service (see `service.rs`) delegates to, grounded on
//! `include/cheferd/controller/local_control_application.hpp`.

use std::collections::HashMap;

use parking_lot::Mutex as SyncMutex;
use ratectl_codec::{decode, EnvRate, Rule};
use ratectl_session::{Response, StageHandshakeInfo, StatCollection, StatEntity};
use ratectl_codec::Status;
use tokio::sync::RwLock;
use tracing::warn;

use crate::handshake::{Handshake, HandshakeState};
use crate::stage_session::StageSession;
use std::sync::Arc;

/// A single registered stage: its southbound session plus its handshake
/// progress and the identity it reported back over the wire.
pub struct StageEntry {
    pub session: Arc<StageSession>,
    handshake: SyncMutex<Handshake>,
    identity: SyncMutex<Option<StageHandshakeInfo>>,
    /// `(channel_id, object_id)` pairs this stage had created for it during
    /// housekeeping (spec §4.3's "Enforcement fan-out" denominator `N`).
    housekeeping_pairs: SyncMutex<Vec<(i32, i32)>>,
}

impl StageEntry {
    fn new(session: Arc<StageSession>) -> Self {
        Self {
            session,
            handshake: SyncMutex::new(Handshake::new()),
            identity: SyncMutex::new(None),
            housekeeping_pairs: SyncMutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.handshake.lock().state()
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct StageKey {
    name: String,
    env: String,
}

/// The local controller's view of the world: which stages have connected
/// over its Unix-domain socket and where each stands in its handshake.
pub struct LocalControlApplication {
    local_address: String,
    stages: RwLock<HashMap<StageKey, Arc<StageEntry>>>,
}

impl LocalControlApplication {
    pub fn new(local_address: impl Into<String>) -> Self {
        Self {
            local_address: local_address.into(),
            stages: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    /// Called by `connection_manager.rs` once a stage's Unix socket has
    /// accepted and its worker task is running.
    pub async fn register_stage(&self, name: String, env: String, session: Arc<StageSession>) {
        let key = StageKey { name, env };
        self.stages
            .write()
            .await
            .insert(key, Arc::new(StageEntry::new(session)));
    }

    fn find(
        stages: &HashMap<StageKey, Arc<StageEntry>>,
        name: &str,
        env: &str,
    ) -> Option<Arc<StageEntry>> {
        stages
            .get(&StageKey {
                name: name.to_string(),
                env: env.to_string(),
            })
            .cloned()
    }

    /// `GlobalToLocal::StageHandshake`: forwards `STAGE_HANDSHAKE` to the
    /// named stage's own session and relays its identity back to the core.
    pub async fn stage_handshake(
        &self,
        name: &str,
        env: &str,
    ) -> Result<StageHandshakeInfo, Status> {
        let entry = {
            let stages = self.stages.read().await;
            Self::find(&stages, name, env)
                .ok_or_else(|| Status::protocol_error(format!("unknown stage {name}/{env}")))?
        };

        entry
            .session
            .submit(Rule::StageHandshake)
            .await
            .map_err(|_| Status::transport_error("stage session closed"))?;

        match entry.session.get_result().await {
            Some(Response::StageHandshake(info)) => {
                entry
                    .handshake
                    .lock()
                    .advance(HandshakeState::Identified)
                    .map_err(|e| Status::protocol_error(e.to_string()))?;
                *entry.identity.lock() = Some(info.clone());
                Ok(info)
            }
            Some(_) => Err(Status::protocol_error("unexpected stage response")),
            None => Err(Status::transport_error("stage session closed")),
        }
    }

    /// `GlobalToLocal::LocalHandshake`: installs housekeeping (channel and
    /// object creation) rules on every stage that has already identified
    /// itself but has not yet had housekeeping installed.
    pub async fn install_housekeeping(&self, housekeeping_rules: &[String]) -> Status {
        let rules: Vec<Rule> = match housekeeping_rules.iter().map(|s| decode(s)).collect() {
            Ok(rules) => rules,
            Err(error) => return Status::parse_error(error.to_string()),
        };

        let stages = self.stages.read().await;
        for entry in stages.values() {
            if entry.state() != HandshakeState::Identified {
                continue;
            }
            let mut pairs = Vec::new();
            for rule in &rules {
                if let Rule::CreateObject {
                    channel_id,
                    object_id,
                    ..
                } = rule
                {
                    pairs.push((*channel_id, *object_id));
                }
                if entry.session.submit(rule.clone()).await.is_err() {
                    return Status::transport_error("stage session closed");
                }
                match entry.session.get_result().await {
                    Some(Response::Ack(ack)) if ack == ratectl_session::AckCode::Ok => {}
                    Some(_) => return Status::protocol_error("unexpected housekeeping response"),
                    None => return Status::transport_error("stage session closed"),
                }
            }
            *entry.housekeeping_pairs.lock() = pairs;
            if let Err(error) = entry
                .handshake
                .lock()
                .advance(HandshakeState::HousekeepingInstalled)
            {
                warn!(%error, "housekeeping installed out of order");
            }
        }
        Status::Ok
    }

    /// `GlobalToLocal::MarkStageReady`.
    pub async fn mark_stage_ready(&self, name: &str, env: &str) -> Status {
        let entry = {
            let stages = self.stages.read().await;
            match Self::find(&stages, name, env) {
                Some(entry) => entry,
                None => return Status::protocol_error(format!("unknown stage {name}/{env}")),
            }
        };

        let submitted = entry
            .session
            .submit(Rule::StageReady {
                stage_name: name.to_string(),
                stage_env: env.to_string(),
            })
            .await;
        if submitted.is_err() {
            return Status::transport_error("stage session closed");
        }

        match entry.session.get_result().await {
            Some(Response::Ack(ack)) if ack == ratectl_session::AckCode::Ok => {
                if entry.handshake.lock().advance(HandshakeState::Ready).is_ok() {
                    let _ = entry.handshake.lock().advance(HandshakeState::Graduated);
                }
                Status::Ok
            }
            Some(_) => Status::protocol_error("unexpected stage response"),
            None => Status::transport_error("stage session closed"),
        }
    }

    /// `GlobalToLocal::CreateEnforcementRule`: finds the stage by name
    /// (across whichever environment it registered under) and expands the
    /// request into one southbound `CREATE_ENF_RULE` per `(channel_id,
    /// object_id)` pair learned for it during housekeeping, each carrying
    /// `rate / n_pairs` (spec §4.3's "Enforcement fan-out"). Every sub-rule
    /// must `ACK{ok}`; the first failure stops the fan-out and surfaces
    /// that failure northbound.
    pub async fn create_enforcement_rule(&self, rule: Rule) -> Status {
        let (rule_id, stage_name, operation, env_rates) = match rule {
            Rule::Enforcement {
                rule_id,
                stage_name,
                operation,
                env_rates,
                ..
            } => (rule_id, stage_name, operation, env_rates),
            _ => return Status::protocol_error("not an enforcement rule"),
        };

        let entry = {
            let stages = self.stages.read().await;
            stages
                .values()
                .find(|entry| {
                    matches!(entry.handshake.lock().state(), HandshakeState::Graduated)
                        && entry
                            .identity
                            .lock()
                            .as_ref()
                            .map(|info| info.name == stage_name)
                            .unwrap_or(false)
                })
                .cloned()
        };
        let Some(entry) = entry else {
            return Status::protocol_error(format!("unknown or ungraduated stage {stage_name}"));
        };

        let pairs = entry.housekeeping_pairs.lock().clone();
        if pairs.is_empty() {
            return Status::protocol_error(format!(
                "no housekeeping channel/object pairs for stage {stage_name}"
            ));
        }
        let n_pairs = pairs.len() as i64;

        for (channel_id, object_id) in pairs {
            let sub_rule = Rule::Enforcement {
                rule_id,
                stage_name: stage_name.clone(),
                operation: operation.clone(),
                channel_object: Some((channel_id, object_id)),
                env_rates: env_rates
                    .iter()
                    .map(|er| EnvRate {
                        env: er.env,
                        rate: er.rate / n_pairs,
                    })
                    .collect(),
            };
            if entry.session.submit(sub_rule).await.is_err() {
                return Status::transport_error("stage session closed");
            }
            match entry.session.get_result().await {
                Some(Response::Ack(ack)) if ack == ratectl_session::AckCode::Ok => {}
                Some(_) => return Status::protocol_error("unexpected stage response"),
                None => return Status::transport_error("stage session closed"),
            }
        }
        Status::Ok
    }

    /// `GlobalToLocal::CollectGlobalStatistics[Aggregated]`: polls every
    /// registered stage for its observed rates and merges them by entity
    /// key.
    pub async fn collect_statistics(&self, aggregated: bool) -> Result<StatCollection, Status> {
        let entries: Vec<Arc<StageEntry>> = self.stages.read().await.values().cloned().collect();
        let mut merged: HashMap<String, f64> = HashMap::new();

        for entry in entries {
            let rule = if aggregated {
                Rule::CollectGlobalStatsAggregated
            } else {
                Rule::CollectGlobalStats
            };
            if entry.session.submit(rule).await.is_err() {
                continue;
            }
            if let Some(Response::StatCollection(collection)) = entry.session.get_result().await {
                for stat in collection.entries {
                    *merged.entry(stat.entity).or_insert(0.0) += stat.rate;
                }
            }
        }

        Ok(StatCollection {
            entries: merged
                .into_iter()
                .map(|(entity, rate)| StatEntity { entity, rate })
                .collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_handshake_advances_state_and_returns_identity() {
        let app = LocalControlApplication::new("127.0.0.1:9000");
        let session: Arc<StageSession> = Arc::new(ratectl_session::Session::new());
        app.register_stage("tensor".into(), "prod".into(), session.clone())
            .await;

        let server = tokio::spawn({
            let session = session.clone();
            async move {
                let _rule = session.next_submission().await.unwrap();
                session
                    .complete(Response::StageHandshake(StageHandshakeInfo {
                        name: "tensor".into(),
                        env: "prod".into(),
                        pid: 10,
                        ppid: 1,
                        hostname: "node-a".into(),
                        user: "alice".into(),
                    }))
                    .await
                    .unwrap();
            }
        });

        let info = app.stage_handshake("tensor", "prod").await.unwrap();
        assert_eq!(info.pid, 10);
        server.await.unwrap();

        let stages = app.stages.read().await;
        let entry = LocalControlApplication::find(&stages, "tensor", "prod").unwrap();
        assert_eq!(entry.state(), HandshakeState::Identified);
    }

    #[tokio::test]
    async fn create_enforcement_rule_fans_out_across_housekeeping_pairs() {
        use ratectl_codec::encode;
        use ratectl_session::AckCode;

        let app = LocalControlApplication::new("127.0.0.1:9000");
        let session: Arc<StageSession> = Arc::new(ratectl_session::Session::new());
        app.register_stage("tensor".into(), "prod".into(), session.clone())
            .await;

        let responder = tokio::spawn({
            let session = session.clone();
            async move {
                // stage_handshake
                let _ = session.next_submission().await.unwrap();
                session
                    .complete(Response::StageHandshake(StageHandshakeInfo {
                        name: "tensor".into(),
                        env: "prod".into(),
                        pid: 1,
                        ppid: 1,
                        hostname: "node-a".into(),
                        user: "alice".into(),
                    }))
                    .await
                    .unwrap();

                // one create_channel + two create_object housekeeping rules
                for _ in 0..3 {
                    let _ = session.next_submission().await.unwrap();
                    session.complete(Response::Ack(AckCode::Ok)).await.unwrap();
                }

                // mark_stage_ready
                let _ = session.next_submission().await.unwrap();
                session.complete(Response::Ack(AckCode::Ok)).await.unwrap();

                // two enforcement sub-rules, one per (channel, object) pair
                let mut seen_pairs = Vec::new();
                for _ in 0..2 {
                    let rule = session.next_submission().await.unwrap();
                    let (channel_object, env_rates) = match rule {
                        Rule::Enforcement {
                            channel_object,
                            env_rates,
                            ..
                        } => (channel_object, env_rates),
                        _ => (None, Vec::new()),
                    };
                    assert!(channel_object.is_some());
                    assert_eq!(env_rates.len(), 1);
                    assert_eq!(env_rates[0].rate, 500); // floor(1000 / 2 pairs)
                    seen_pairs.push(channel_object.unwrap());
                    session.complete(Response::Ack(AckCode::Ok)).await.unwrap();
                }
                assert_eq!(seen_pairs, vec![(10, 1), (10, 2)]);
            }
        });

        app.stage_handshake("tensor", "prod").await.unwrap();

        let housekeeping = vec![
            encode(&Rule::CreateChannel {
                rule_id: 1,
                channel_id: 10,
                stage_name: "tensor".into(),
            }),
            encode(&Rule::CreateObject {
                rule_id: 2,
                channel_id: 10,
                object_id: 1,
                stage_name: "tensor".into(),
            }),
            encode(&Rule::CreateObject {
                rule_id: 3,
                channel_id: 10,
                object_id: 2,
                stage_name: "tensor".into(),
            }),
        ];
        assert_eq!(app.install_housekeeping(&housekeeping).await, Status::Ok);
        assert_eq!(app.mark_stage_ready("tensor", "prod").await, Status::Ok);

        let status = app
            .create_enforcement_rule(Rule::Enforcement {
                rule_id: 99,
                stage_name: "tensor".into(),
                operation: "read".into(),
                channel_object: None,
                env_rates: vec![EnvRate { env: 0, rate: 1000 }],
            })
            .await;
        assert_eq!(status, Status::Ok);

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn create_enforcement_rule_rejects_a_stage_with_no_housekeeping_pairs() {
        let app = LocalControlApplication::new("127.0.0.1:9000");
        let session: Arc<StageSession> = Arc::new(ratectl_session::Session::new());
        app.register_stage("tensor".into(), "prod".into(), session.clone())
            .await;

        let responder = tokio::spawn({
            let session = session.clone();
            async move {
                let _ = session.next_submission().await.unwrap();
                session
                    .complete(Response::StageHandshake(StageHandshakeInfo {
                        name: "tensor".into(),
                        env: "prod".into(),
                        pid: 1,
                        ppid: 1,
                        hostname: "node-a".into(),
                        user: "alice".into(),
                    }))
                    .await
                    .unwrap();

                let _ = session.next_submission().await.unwrap();
                session
                    .complete(Response::Ack(ratectl_session::AckCode::Ok))
                    .await
                    .unwrap();
            }
        });

        app.stage_handshake("tensor", "prod").await.unwrap();
        assert_eq!(app.install_housekeeping(&[]).await, Status::Ok);
        assert_eq!(app.mark_stage_ready("tensor", "prod").await, Status::Ok);

        let status = app
            .create_enforcement_rule(Rule::Enforcement {
                rule_id: 1,
                stage_name: "tensor".into(),
                operation: "read".into(),
                channel_object: None,
                env_rates: vec![EnvRate { env: 0, rate: 1000 }],
            })
            .await;
        assert!(matches!(status, Status::Error(_)));

        responder.await.unwrap();
    }
}
