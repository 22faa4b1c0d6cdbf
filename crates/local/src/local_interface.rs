//! The local controller's outbound calls to the core, grounded on
//! `include/cheferd/networking/local_to_global_interface.hpp`: a thin
//! `tonic` client wrapper used once at startup (to announce the local
//! itself) and again each time a new stage connects over the Unix socket.

use ratectl_proto::v1::local_to_global_client::LocalToGlobalClient;
use ratectl_proto::v1::{ConnectRequest, StageInfoConnect};

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("could not reach core at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("core rejected registration: {0}")]
    Rejected(String),
}

/// One-shot client used to register this local (and, per connection, each
/// stage it hosts) with the core's `LocalToGlobal` service.
pub struct LocalInterface {
    client: LocalToGlobalClient<tonic::transport::Channel>,
}

impl LocalInterface {
    pub async fn connect(core_address: &str) -> Result<Self, RegistrationError> {
        let endpoint = format!("http://{core_address}");
        let client = LocalToGlobalClient::connect(endpoint)
            .await
            .map_err(|source| RegistrationError::Connect {
                address: core_address.to_string(),
                source,
            })?;
        Ok(Self { client })
    }

    /// Announces this local controller to the core, carrying the address
    /// the core should dial back on for `GlobalToLocal` RPCs.
    pub async fn register_local(&mut self, local_address: &str) -> Result<(), RegistrationError> {
        let reply = self
            .client
            .connect_local_to_global(ConnectRequest {
                user_address: local_address.to_string(),
            })
            .await
            .map_err(|e| RegistrationError::Rejected(e.to_string()))?
            .into_inner();
        match reply.ack {
            Some(ack) if ack.message == 1 => Ok(()),
            _ => Err(RegistrationError::Rejected("core returned error ack".into())),
        }
    }

    /// Announces a newly-connected stage to the core so its next feedback
    /// cycle can drive the stage through its handshake.
    pub async fn register_stage(
        &mut self,
        local_address: &str,
        stage_name: &str,
        stage_env: &str,
        stage_user: &str,
    ) -> Result<(), RegistrationError> {
        let reply = self
            .client
            .connect_stage_to_global(StageInfoConnect {
                local_address: local_address.to_string(),
                stage_name: stage_name.to_string(),
                stage_env: stage_env.to_string(),
                stage_user: stage_user.to_string(),
            })
            .await
            .map_err(|e| RegistrationError::Rejected(e.to_string()))?
            .into_inner();
        match reply.ack {
            Some(ack) if ack.message == 1 => Ok(()),
            _ => Err(RegistrationError::Rejected("core returned error ack".into())),
        }
    }
}
