//! The local controller (spec §4.3): the stage handshake state machine, the
//! Unix-socket session fabric to each data-plane stage, and the
//! `GlobalToLocal`/`LocalToGlobal` gRPC plumbing that connects it to the
//! core.

mod connection_manager;
mod handshake;
mod local_app;
mod local_interface;
mod service;
mod stage_session;

pub use connection_manager::run_stage_acceptor;
pub use handshake::{Handshake, HandshakeError, HandshakeState};
pub use local_app::{LocalControlApplication, StageEntry};
pub use local_interface::{LocalInterface, RegistrationError};
pub use service::LocalControlService;
pub use stage_session::{run_stage_worker, StageSession};
