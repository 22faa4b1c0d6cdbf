//! The session/queueing fabric (spec §3, §4.1) and the southbound framed
//! wire format (spec §4.2). No RPC or business logic lives here — `core`
//! and `local` own what gets submitted and how responses get interpreted.

mod control_operation;
mod response;
mod session;
mod wire;

pub use control_operation::{AckCode, ControlOperation, HEADER_LEN};
pub use response::{Response, StageHandshakeInfo, StatCollection, StatEntity, StatGlobal};
pub use session::{Session, SessionClosed, SESSION_QUEUE_CAPACITY};
pub use wire::{read_frame, write_frame, WireError};
