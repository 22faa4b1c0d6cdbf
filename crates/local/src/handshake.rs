//! The stage bring-up handshake, modeled as an explicit state machine
//! (spec §4.3.2's "if all three succeed" condition, made testable as
//! discrete transitions — see `SPEC_FULL.md` §5), grounded on
//! `include/cheferd/session/handshake_session.hpp` and
//! `include/cheferd/session/data_plane_session.hpp`.

/// A stage progresses through these states in order; any state can fail
/// back to [`HandshakeState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// The stage has opened its socket and sent `STAGE_HANDSHAKE`.
    Connected,
    /// The stage has replied with its `StageSimplifiedHandshakeRaw` identity.
    Identified,
    /// Housekeeping (channel/object creation) rules have been installed.
    HousekeepingInstalled,
    /// `STAGE_READY` has been sent and acknowledged.
    Ready,
    /// The stage has been registered with the core and is receiving
    /// enforcement rules in the steady state.
    Graduated,
    Failed,
}

impl HandshakeState {
    pub fn can_advance_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;
        matches!(
            (self, next),
            (Connected, Identified)
                | (Identified, HousekeepingInstalled)
                | (HousekeepingInstalled, Ready)
                | (Ready, Graduated)
                | (_, Failed)
        )
    }
}

#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Connected,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn advance(&mut self, next: HandshakeState) -> Result<(), HandshakeError> {
        if self.state.can_advance_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(HandshakeError {
                from: self.state,
                to: next,
            })
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid handshake transition {from:?} -> {to:?}")]
pub struct HandshakeError {
    pub from: HandshakeState,
    pub to: HandshakeState,
}
