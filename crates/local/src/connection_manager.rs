//! The local controller's southbound acceptor: a Unix-domain socket that
//! data-plane stages connect to, grounded on
//! `include/cheferd/networking/local_connection_manager.hpp`'s accept loop.
//!
//! A stage's very first contact needs to identify itself before the core
//! even knows it exists (the core's `ConnectStageToGlobal` registration
//! needs a name and environment to carry), so this loop performs the stage
//! handshake itself at accept time, then tells the core about the stage
//! through [`LocalInterface`]. The core's own `GlobalToLocal::StageHandshake`
//! RPC (handled in `service.rs`) re-issues the same rule later as part of
//! its own feedback cycle; stages are expected to answer it idempotently.

use std::sync::Arc;

use ratectl_codec::Rule;
use ratectl_session::Response;
use tokio::net::UnixListener;
use tracing::{error, info, warn};

use crate::local_app::LocalControlApplication;
use crate::local_interface::LocalInterface;
use crate::stage_session::{run_stage_worker, StageSession};

/// Accepts stage connections on `socket_path` until `shutdown` fires,
/// registering each stage with `app` and announcing it to the core at
/// `core_address`.
pub async fn run_stage_acceptor(
    socket_path: &str,
    local_address: String,
    core_address: String,
    app: Arc<LocalControlApplication>,
    shutdown: tokio_util::sync::CancellationToken,
) -> std::io::Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    info!(socket_path, "listening for stage connections");

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, _addr) = match accepted {
            Ok(pair) => pair,
            Err(error) => {
                warn!(%error, "failed to accept stage connection");
                continue;
            }
        };

        let app = app.clone();
        let local_address = local_address.clone();
        let core_address = core_address.clone();
        tokio::spawn(async move {
            if let Err(error) =
                onboard_stage(stream, local_address, core_address, app).await
            {
                error!(%error, "stage onboarding failed");
            }
        });
    }
    Ok(())
}

async fn onboard_stage(
    stream: tokio::net::UnixStream,
    local_address: String,
    core_address: String,
    app: Arc<LocalControlApplication>,
) -> anyhow::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let session: Arc<StageSession> = Arc::new(ratectl_session::Session::new());

    let worker_session = session.clone();
    tokio::spawn(async move {
        run_stage_worker(worker_session, read_half, write_half).await;
    });

    session.submit(Rule::StageHandshake).await?;
    let identity = match session.get_result().await {
        Some(Response::StageHandshake(info)) => info,
        Some(_) => anyhow::bail!("stage sent an unexpected handshake response"),
        None => anyhow::bail!("stage session closed before handshake completed"),
    };

    info!(name = %identity.name, env = %identity.env, "stage connected");
    app.register_stage(identity.name.clone(), identity.env.clone(), session.clone())
        .await;

    let mut interface = LocalInterface::connect(&core_address).await?;
    interface
        .register_stage(&local_address, &identity.name, &identity.env, &identity.user)
        .await?;

    Ok(())
}
