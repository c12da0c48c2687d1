//! Role and finite-state-machine types.
//!
//! A session has two orthogonal roles: who opened the connection
//! ([`HandshakeRole`]) and which way file content flows ([`DataRole`]).  The
//! usual binding is Responder + Source, but nothing in the engine relies on
//! it.
//!
//! Transitions are driven by [`crate::handshake`] and
//! [`crate::termination`]; this module only names the states.

/// Which side emitted the first SYN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    /// Sends SYN, awaits SYN+ACK.
    Initiator,
    /// Awaits SYN, answers with SYN+ACK.
    Responder,
}

/// Which side pushes file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRole {
    /// Runs the Go-Back-N window controller and starts teardown.
    Source,
    /// Accepts in-order segments and answers teardown.
    Sink,
}

/// Connection establishment.
///
/// ```text
///  Initiator:  IDLE ──SYN sent──▶ SYN_SENT ──SYN+ACK rcvd, ACK sent──▶ ESTABLISHED
///  Responder:  IDLE ──SYN rcvd, SYN+ACK sent──▶ SYN_RECEIVED ──ACK rcvd──▶ ESTABLISHED
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HandshakeState {
    #[default]
    Idle,
    SynSent,
    SynReceived,
    Established,
}

/// Orderly close, always started by the Source.
///
/// ```text
///  Source:  ACTIVE ──FIN sent──▶ FIN_SENT ──ACK rcvd──▶ FIN_ACKED ──ACK sent──▶ CLOSED
///  Sink:    ACTIVE ──FIN rcvd, ACK sent──▶ FIN_RECEIVED ──ACK rcvd──▶ CLOSED
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminationState {
    #[default]
    Active,
    FinSent,
    FinAcked,
    FinReceived,
    Closed,
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::Established => "ESTABLISHED",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for TerminationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::FinSent => "FIN_SENT",
            Self::FinAcked => "FIN_ACKED",
            Self::FinReceived => "FIN_RECEIVED",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_initial_states() {
        assert_eq!(HandshakeState::default(), HandshakeState::Idle);
        assert_eq!(TerminationState::default(), TerminationState::Active);
    }

    #[test]
    fn display_uses_protocol_names() {
        assert_eq!(HandshakeState::SynReceived.to_string(), "SYN_RECEIVED");
        assert_eq!(TerminationState::FinAcked.to_string(), "FIN_ACKED");
    }
}
