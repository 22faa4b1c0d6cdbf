//! Wires the core and local controller roles together from a resolved
//! [`ratectl_admin::RuntimeConfig`], grounded on the teacher's
//! `coop_mux::run` entrypoint (bind, spawn the background loop, serve until
//! shutdown).

use std::sync::Arc;

use anyhow::Context;
use ratectl_admin::{ControllerRole, RuntimeConfig};
use ratectl_core::{CoreConnectionManager, CoreControlApplication};
use ratectl_local::{run_stage_acceptor, LocalControlApplication, LocalControlService, LocalInterface};
use ratectl_proto::v1::global_to_local_server::GlobalToLocalServer;
use ratectl_proto::v1::local_to_global_server::LocalToGlobalServer;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Dispatches to the configured role and runs until `shutdown` fires (or a
/// fatal error occurs).
pub async fn run(config: RuntimeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    match config.controller {
        ControllerRole::Core => run_core(config, shutdown).await,
        ControllerRole::Local => run_local(config, shutdown).await,
    }
}

async fn run_core(config: RuntimeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let housekeeping_rules = match &config.housekeeping_rules_file {
        Some(path) => ratectl_admin::load_housekeeping_file(path)
            .with_context(|| format!("loading housekeeping rules file {}", path.display()))?,
        None => Vec::new(),
    };

    let app = Arc::new(
        CoreControlApplication::new(config.control_type, config.cycle_sleep_time)
            .with_housekeeping_rules(housekeeping_rules),
    );
    app.set_maximum_iops(config.system_limit);

    if let Some(path) = &config.policies_rules_file {
        let entries = ratectl_admin::load_policy_file(path)
            .with_context(|| format!("loading policy rules file {}", path.display()))?;
        let admin = ratectl_admin::SystemAdmin::new(entries);
        let admin_app = app.clone();
        let admin_shutdown = shutdown.clone();
        tokio::spawn(async move { admin.run(admin_app, admin_shutdown).await });
    }

    let feedback_app = app.clone();
    let feedback_shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = feedback_shutdown.cancelled() => {}
            _ = feedback_app.execute_feedback_loop() => {}
        }
    });

    let addr = config
        .core_address
        .parse()
        .with_context(|| format!("invalid core_address {}", config.core_address))?;
    info!(%addr, "core controller listening");
    let service = LocalToGlobalServer::new(CoreConnectionManager::new(app.clone()));
    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_shutdown(addr, shutdown.cancelled())
        .await
        .context("core gRPC server failed")?;

    app.stop_feedback_loop();
    Ok(())
}

async fn run_local(config: RuntimeConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let local_address = config
        .local_address
        .clone()
        .context("local_address is required for the local controller role")?;

    let app = Arc::new(LocalControlApplication::new(local_address.clone()));

    let mut interface = LocalInterface::connect(&config.core_address)
        .await
        .with_context(|| format!("connecting to core at {}", config.core_address))?;
    interface
        .register_local(&local_address)
        .await
        .context("registering local controller with the core")?;

    let socket_path = format!("/tmp/{local_address}.socket");
    let acceptor_app = app.clone();
    let acceptor_shutdown = shutdown.clone();
    let acceptor_core_address = config.core_address.clone();
    let acceptor_local_address = local_address.clone();
    tokio::spawn(async move {
        if let Err(error) = run_stage_acceptor(
            &socket_path,
            acceptor_local_address,
            acceptor_core_address,
            acceptor_app,
            acceptor_shutdown,
        )
        .await
        {
            tracing::error!(%error, "stage acceptor stopped");
        }
    });

    let addr = local_address
        .parse()
        .with_context(|| format!("invalid local_address {local_address}"))?;
    info!(%addr, "local controller listening");
    let service = GlobalToLocalServer::new(LocalControlService::new(app));
    tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_shutdown(addr, shutdown.cancelled())
        .await
        .context("local gRPC server failed")?;

    Ok(())
}
