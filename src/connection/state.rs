//! Handshake state machine

use crate::{Error, Result};

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Connected, greeting not yet read
    AwaitingInitialHandshake,

    /// SSL request sent, TLS handshake in progress
    AwaitingTlsUpgrade,

    /// Handshake response sent, awaiting OK / ERR / switch / more data
    AwaitingAuthResult,

    /// Auth switch response sent with the new plugin
    AwaitingAuthSwitch,

    /// Plugin-specific continuation in progress
    AwaitingAuthMoreData,

    /// Authentication succeeded
    Authenticated,

    /// Server error or transport failure during the handshake
    Failed,

    /// Closed
    Closed,
}

impl HandshakeState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: HandshakeState) -> bool {
        use HandshakeState::*;

        matches!(
            (self, next),
            (AwaitingInitialHandshake, AwaitingTlsUpgrade)
                | (AwaitingInitialHandshake, AwaitingAuthResult)
                | (AwaitingTlsUpgrade, AwaitingAuthResult)
                | (
                    AwaitingAuthResult | AwaitingAuthSwitch | AwaitingAuthMoreData,
                    AwaitingAuthSwitch | AwaitingAuthMoreData | Authenticated
                )
                | (
                    AwaitingInitialHandshake
                        | AwaitingTlsUpgrade
                        | AwaitingAuthResult
                        | AwaitingAuthSwitch
                        | AwaitingAuthMoreData,
                    Failed
                )
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: HandshakeState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        tracing::trace!(from = %self, to = %next, "handshake state");
        *self = next;
        Ok(())
    }

    /// Whether the handshake is over, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed | Self::Closed)
    }
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingInitialHandshake => write!(f, "awaiting_initial_handshake"),
            Self::AwaitingTlsUpgrade => write!(f, "awaiting_tls_upgrade"),
            Self::AwaitingAuthResult => write!(f, "awaiting_auth_result"),
            Self::AwaitingAuthSwitch => write!(f, "awaiting_auth_switch"),
            Self::AwaitingAuthMoreData => write!(f, "awaiting_auth_more_data"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
