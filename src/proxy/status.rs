//! Status/error code taxonomy.
//!
//! A fixed, versionless vocabulary of outcome codes emitted to the two
//! parties. Code families follow the wire protocol this proxy
//! mediates: 1xx payload faults, 2xx definition faults, 3xx session
//! faults, 4xx timeouts and proxy faults, 5xx success. The last digit
//! marks the causing party where it matters (0 client, 1 server,
//! 2 proxy/general).
//!
//! Each code determines which party receives which message and which
//! legs of the connection are torn down; the mediator never invents
//! message routing outside this table.

/// Success text recognized by endpoints (they match on the `502`
/// prefix).
pub const SUCCESS_TEXT: &str = "502: Operation successful.";

/// Generic notification that the other party caused a failure.
const CLIENT_PROBLEM: &str = "600: there was an error with the client.";
/// Generic notification that the other party caused a failure.
const SERVER_PROBLEM: &str = "601: there was an error with the server.";

/// One outcome category of a mediation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Step succeeded; both parties acknowledged.
    SuccessBoth,
    /// Step succeeded; acknowledge the client only.
    SuccessClient,
    /// Step succeeded; acknowledge the server only.
    SuccessServer,
    /// The client's payload failed validation.
    ClientPayloadInvalid,
    /// The server's payload failed validation.
    ServerPayloadInvalid,
    /// Protocol definition text was malformed or not a `Def`.
    ProtocolDefinition,
    /// The two session views reached kinds that cannot advance together.
    SessionMismatch,
    /// Declared directions were invalid or not dual.
    DirectionMismatch,
    /// The client selected an action the choice does not offer.
    UnknownAction,
    /// The client's command was not a string.
    MalformedCommand,
    /// The selected protocol is not registered.
    ProtocolNotFound,
    /// The client did not respond within the receive bound.
    ClientTimeout,
    /// The server did not respond within the receive bound.
    ServerTimeout,
    /// Unexpected failure inside the proxy itself.
    InternalError,
}

impl Status {
    /// Numeric wire code.
    pub fn code(self) -> u16 {
        match self {
            Status::SuccessBoth => 502,
            Status::SuccessClient => 500,
            Status::SuccessServer => 501,
            Status::ClientPayloadInvalid => 100,
            Status::ServerPayloadInvalid => 101,
            Status::ProtocolDefinition => 201,
            Status::SessionMismatch => 312,
            Status::DirectionMismatch => 321,
            Status::UnknownAction => 330,
            Status::MalformedCommand => 340,
            Status::ProtocolNotFound => 350,
            Status::ClientTimeout => 400,
            Status::ServerTimeout => 401,
            Status::InternalError => 402,
        }
    }

    /// Message for the client leg, if this status addresses it.
    pub fn client_text(self, detail: &str) -> Option<String> {
        let text = match self {
            Status::SuccessBoth | Status::SuccessClient => SUCCESS_TEXT.to_string(),
            Status::SuccessServer => return None,
            Status::ClientPayloadInvalid => format!(
                "100: the sent payload does not match the one defined in the session ({detail})."
            ),
            Status::ServerPayloadInvalid
            | Status::ProtocolDefinition
            | Status::DirectionMismatch => SERVER_PROBLEM.to_string(),
            Status::SessionMismatch => "312: defined sessions not matched.".to_string(),
            Status::UnknownAction => {
                "330: this action is not defined in the protocol.".to_string()
            }
            Status::MalformedCommand => "340: the action must be given as a string.".to_string(),
            Status::ProtocolNotFound => "350: this protocol cannot be found.".to_string(),
            Status::ClientTimeout => "400: timeout error.".to_string(),
            Status::ServerTimeout => "401: server timeout error.".to_string(),
            Status::InternalError => "402: unexpected error in proxy.".to_string(),
        };
        Some(text)
    }

    /// Message for the server leg, if this status addresses it.
    pub fn server_text(self, detail: &str) -> Option<String> {
        let text = match self {
            Status::SuccessBoth | Status::SuccessServer => SUCCESS_TEXT.to_string(),
            Status::SuccessClient | Status::SessionMismatch => return None,
            Status::ClientPayloadInvalid
            | Status::UnknownAction
            | Status::MalformedCommand
            | Status::ProtocolNotFound => CLIENT_PROBLEM.to_string(),
            Status::ServerPayloadInvalid => format!(
                "101: the sent payload does not match the one defined in the session ({detail})."
            ),
            Status::ProtocolDefinition => format!(
                "201: there was an error defining the protocol ({detail})."
            ),
            Status::DirectionMismatch => {
                "321: invalid direction or it does not match the defined one.".to_string()
            }
            Status::ClientTimeout => "400: client timeout error.".to_string(),
            Status::ServerTimeout => "401: timeout error.".to_string(),
            Status::InternalError => "402: unexpected error in proxy.".to_string(),
        };
        Some(text)
    }

    /// Whether this status tears down the client leg.
    pub fn closes_client(self) -> bool {
        !matches!(
            self,
            Status::SuccessBoth | Status::SuccessClient | Status::SuccessServer
        )
    }

    /// Whether this status tears down the server leg.
    ///
    /// Client-caused faults close only the client side; the server leg
    /// is merely notified.
    pub fn closes_server(self) -> bool {
        matches!(
            self,
            Status::ServerPayloadInvalid
                | Status::ProtocolDefinition
                | Status::DirectionMismatch
                | Status::ServerTimeout
                | Status::InternalError
        )
    }

    /// Whether this status terminates the mediation.
    pub fn is_fault(self) -> bool {
        self.closes_client() || self.closes_server()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_addresses_the_right_parties() {
        assert_eq!(Status::SuccessBoth.client_text(""), Some(SUCCESS_TEXT.to_string()));
        assert_eq!(Status::SuccessBoth.server_text(""), Some(SUCCESS_TEXT.to_string()));
        assert_eq!(Status::SuccessClient.server_text(""), None);
        assert_eq!(Status::SuccessServer.client_text(""), None);
        assert!(!Status::SuccessBoth.is_fault());
    }

    #[test]
    fn test_client_faults_close_client_only() {
        for status in [
            Status::ClientPayloadInvalid,
            Status::UnknownAction,
            Status::MalformedCommand,
            Status::ProtocolNotFound,
            Status::ClientTimeout,
        ] {
            assert!(status.closes_client(), "{status:?}");
            assert!(!status.closes_server(), "{status:?}");
            // The server is told the client caused it.
            assert!(status.server_text("").unwrap().starts_with("600")
                || status == Status::ClientTimeout);
        }
    }

    #[test]
    fn test_fatal_faults_close_both() {
        for status in [
            Status::ServerPayloadInvalid,
            Status::ProtocolDefinition,
            Status::DirectionMismatch,
            Status::ServerTimeout,
            Status::InternalError,
        ] {
            assert!(status.closes_client(), "{status:?}");
            assert!(status.closes_server(), "{status:?}");
        }
    }

    #[test]
    fn test_detail_is_embedded() {
        let text = Status::ClientPayloadInvalid
            .client_text("expected { type: \"number\" }, got \"5\"")
            .unwrap();
        assert!(text.contains("expected { type: \"number\" }"));
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Status::ClientPayloadInvalid.code(), 100);
        assert_eq!(Status::ProtocolDefinition.code(), 201);
        assert_eq!(Status::UnknownAction.code(), 330);
        assert_eq!(Status::ProtocolNotFound.code(), 350);
        assert_eq!(Status::ClientTimeout.code(), 400);
        assert_eq!(Status::SuccessBoth.code(), 502);
    }
}
