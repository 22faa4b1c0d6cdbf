//! A single stage's session plus the worker task that pumps its submission
//! queue onto the wire and its completion queue off of it, grounded on
//! `include/cheferd/session/data_plane_session.hpp` (the steady-state
//! counterpart of [`crate::handshake::Handshake`]'s bring-up session).

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use ratectl_codec::{encode, OperationTag, Rule};
use ratectl_session::{read_frame, write_frame, AckCode, ControlOperation, Response, StageHandshakeInfo, StatCollection};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

pub type StageSession = ratectl_session::Session<Rule, Response>;

/// Maps a rule's operation tag to how its response payload should be
/// decoded. The FIFO invariant (spec §3) means there is never more than one
/// outstanding request per session, so the worker only needs to remember
/// what it just sent.
fn decode_response(op_type: OperationTag, mut payload: Bytes) -> Option<Response> {
    match op_type {
        OperationTag::StageHandshake => {
            StageHandshakeInfo::decode(&mut payload).map(Response::StageHandshake)
        }
        OperationTag::CollectGlobalStats
        | OperationTag::CollectGlobalStatsAggregated
        | OperationTag::CollectEntityStats => {
            StatCollection::decode(&mut payload).map(Response::StatCollection)
        }
        _ => AckCode::decode(&mut payload).map(Response::Ack),
    }
}

fn op_type_for(rule: &Rule) -> OperationTag {
    match rule {
        Rule::StageHandshake => OperationTag::StageHandshake,
        Rule::StageReady { .. } => OperationTag::StageReady,
        Rule::LocalHandshake { .. } => OperationTag::LocalHandshake,
        Rule::CreateChannel { .. } | Rule::CreateObject { .. } => OperationTag::CreateHskRule,
        Rule::Enforcement { .. } => OperationTag::CreateEnfRule,
        Rule::CollectGlobalStats => OperationTag::CollectGlobalStats,
        Rule::CollectGlobalStatsAggregated => OperationTag::CollectGlobalStatsAggregated,
        Rule::CollectEntityStats { .. } => OperationTag::CollectEntityStats,
        Rule::AdminPolicy(_) => OperationTag::AdminPolicy,
    }
}

/// Drives one stage connection: dequeues rules from `session`, writes them
/// framed to `writer`, reads the matching framed response from `reader`,
/// and completes `session` with it. Runs until the session shuts down or
/// the socket errors.
pub async fn run_stage_worker<R, W>(session: Arc<StageSession>, mut reader: R, mut writer: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let next_op_id = AtomicI32::new(1);

    while let Some(rule) = session.next_submission().await {
        let op_type = op_type_for(&rule);
        let encoded = encode(&rule);
        let op_id = next_op_id.fetch_add(1, Ordering::Relaxed);
        let header = ControlOperation::new(op_id, op_type, 0, encoded.len());

        if let Err(error) = write_frame(&mut writer, header, encoded.as_bytes()).await {
            warn!(%error, "stage write failed, ending session");
            session.shut_down();
            break;
        }

        match read_frame(&mut reader).await {
            Ok((_response_header, payload)) => match decode_response(op_type, payload) {
                Some(response) => {
                    if session.complete(response).await.is_err() {
                        break;
                    }
                }
                None => {
                    warn!("stage response payload did not decode, ending session");
                    session.shut_down();
                    break;
                }
            },
            Err(error) => {
                debug!(%error, "stage read failed, ending session");
                session.shut_down();
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ratectl_session::ControlOperation as WireHeader;

    #[tokio::test]
    async fn worker_round_trips_a_stage_ready_and_ack() {
        let session: Arc<StageSession> = Arc::new(ratectl_session::Session::new());
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        let worker_session = session.clone();
        let worker = tokio::spawn(async move {
            run_stage_worker(worker_session, client_read, client_write).await;
        });

        session
            .submit(Rule::StageReady {
                stage_name: "tensor".into(),
                stage_env: "prod".into(),
            })
            .await
            .unwrap();

        let (_header, _payload) = read_frame(&mut server_read).await.unwrap();
        let ack_payload = AckCode::Ok.encode();
        let ack_header = WireHeader::new(1, OperationTag::StageReady, 0, ack_payload.len());
        write_frame(&mut server_write, ack_header, &ack_payload)
            .await
            .unwrap();

        let response = session.get_result().await;
        assert_eq!(response, Some(Response::Ack(AckCode::Ok)));

        session.shut_down();
        worker.await.unwrap();
    }
}
