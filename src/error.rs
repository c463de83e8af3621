//! STP error types.
//!
//! Every fault the mediation engine can produce is a distinct variant
//! here; each maps to exactly one wire status code (see
//! [`crate::proxy::Status`]). Normal protocol termination (both sides
//! reaching `End`) is never represented as an error.

use thiserror::Error;

use crate::session::Role;

/// Which party a timeout or disconnect is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// The downstream message client.
    Client,
    /// The upstream message server.
    Server,
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Party::Client => write!(f, "client"),
            Party::Server => write!(f, "server"),
        }
    }
}

/// STP protocol engine errors.
#[derive(Error, Debug)]
pub enum StpError {
    /// Malformed session text during protocol definition.
    #[error("session syntax error near '{0}'")]
    Syntax(String),

    /// Malformed payload type text.
    #[error("payload type syntax error near '{0}'")]
    TypeSyntax(String),

    /// A payload did not conform to its declared type.
    #[error("invalid payload: expected {expected}, got {got}")]
    Validation {
        /// Canonical text of the declared type, with location context.
        expected: String,
        /// Short rendering of the offending value.
        got: String,
    },

    /// Sender and receiver declared different payload types for one step.
    #[error("payload types differ between parties: sender declared {sender}, receiver declared {receiver}")]
    TypeMismatchBetweenParties {
        /// Canonical text of the sender's declared type.
        sender: String,
        /// Canonical text of the receiver's declared type.
        receiver: String,
    },

    /// Registering an already-present `(name, role)` pair.
    #[error("protocol '{name}' already defined for role {role}")]
    DuplicateProtocol {
        /// Protocol name as registered.
        name: String,
        /// Role the duplicate was registered under.
        role: Role,
    },

    /// A `Ref` named a protocol the registry does not hold.
    #[error("protocol '{name}' not found for role {role}")]
    ProtocolNotFound {
        /// The unresolved protocol name.
        name: String,
        /// Role the lookup was made under.
        role: Role,
    },

    /// The two session views declared non-dual directions for one step.
    #[error("direction mismatch: server {server}, client {client}")]
    DirectionMismatch {
        /// Direction on the server-side view.
        server: crate::session::Direction,
        /// Direction on the client-side view.
        client: crate::session::Direction,
    },

    /// The client selected an action absent from the current choice.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// The client's command frame was not a string or `[string, payload]`.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// The handshake produced something other than a `Def` session.
    #[error("protocol definition error: {0}")]
    ProtocolDefinition(String),

    /// The two session views reached kinds that cannot advance together.
    #[error("session kinds mismatched: server {server}, client {client}")]
    ProtocolMismatch {
        /// Kind name on the server-side view.
        server: &'static str,
        /// Kind name on the client-side view.
        client: &'static str,
    },

    /// A bounded receive expired.
    #[error("{0} timeout")]
    Timeout(Party),

    /// A peer closed its connection mid-session.
    #[error("{0} disconnected")]
    Disconnected(Party),

    /// Catch-all for unexpected internal failures.
    #[error("internal proxy error: {0}")]
    Internal(String),

    /// JSON framing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error on either transport leg.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for STP operations.
pub type Result<T> = std::result::Result<T, StpError>;
