//! Session type model.
//!
//! A protocol is a graph of [`Session`] nodes declared by the upstream
//! server from its own perspective. The proxy keeps two views of every
//! protocol, one per [`Role`], derived by mirroring the directions of
//! the declared one (see [`codec::decode_for_role`]). The mediator
//! advances both views in lockstep, so a `send` on one side is always
//! matched against a `recv` on the other.
//!
//! Graphs are immutable once built: decoded during the handshake,
//! registered, and only read afterwards.

pub mod codec;
pub mod registry;

pub use registry::Registry;

use crate::schema::PayloadType;

/// Transfer direction of a single step, relative to the party owning
/// the session view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The owning party sends the payload.
    Send,
    /// The owning party receives the payload.
    Recv,
}

impl Direction {
    /// The wire keyword for this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Send => "send",
            Direction::Recv => "recv",
        }
    }

    /// The opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            Direction::Send => Direction::Recv,
            Direction::Recv => Direction::Send,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which party's view of a protocol a session graph represents.
///
/// Protocols are declared from the server's perspective, so the server
/// view keeps declared directions and the client view flips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The upstream server's view.
    Server,
    /// The downstream client's view.
    Client,
}

impl Role {
    /// Suffix appended to protocol names registered under this role.
    pub fn suffix(self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Identifier of a branch alternative (an "action") inside a choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub String);

impl Label {
    /// Create a label from anything string-like.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::new(s)
    }
}

/// One node of the protocol state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    /// One payload transfer, then the continuation.
    Single {
        /// Who sends, from the owning view's perspective.
        dir: Direction,
        /// Declared structural type of the payload.
        payload: PayloadType,
        /// What follows the transfer.
        cont: Box<Session>,
    },
    /// A branch point; the client selects one labelled alternative.
    Choice {
        /// Declared direction of the choice (kept for the wire format;
        /// the mediator always lets the client drive the selection).
        dir: Direction,
        /// Insertion-ordered alternatives. Order is part of the
        /// encoding, so this is a list rather than a map.
        alternatives: Vec<(Label, Session)>,
    },
    /// Declares a named protocol entry point.
    Def {
        /// Protocol name (role-suffixed once registered).
        name: String,
        /// The session registered under `name`.
        cont: Box<Session>,
    },
    /// A placeholder resolved through the registry; resolution always
    /// yields a `Choice`.
    Ref {
        /// Name of the referenced protocol.
        name: String,
    },
    /// Terminal node.
    End,
}

impl Session {
    /// Short kind name, used in mismatch reporting and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Session::Single { .. } => "single",
            Session::Choice { .. } => "choice",
            Session::Def { .. } => "def",
            Session::Ref { .. } => "ref",
            Session::End => "end",
        }
    }

    /// Whether this node is terminal.
    pub fn is_end(&self) -> bool {
        matches!(self, Session::End)
    }

    /// Look up an alternative by label. Returns `None` for non-choice
    /// nodes as well as missing labels.
    pub fn alternative(&self, label: &Label) -> Option<&Session> {
        match self {
            Session::Choice { alternatives, .. } => alternatives
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, s)| s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_flip() {
        assert_eq!(Direction::Send.flipped(), Direction::Recv);
        assert_eq!(Direction::Recv.flipped(), Direction::Send);
    }

    #[test]
    fn test_label_equality() {
        assert_eq!(Label::new("Hello"), Label::from("Hello"));
        assert_ne!(Label::new("Hello"), Label::new("Goodbye"));
    }

    #[test]
    fn test_choice_alternative_lookup() {
        let choice = Session::Choice {
            dir: Direction::Send,
            alternatives: vec![(Label::new("Quit"), Session::End)],
        };
        assert_eq!(choice.alternative(&Label::new("Quit")), Some(&Session::End));
        assert_eq!(choice.alternative(&Label::new("Add")), None);
    }

    #[test]
    fn test_alternative_on_non_choice() {
        assert_eq!(Session::End.alternative(&Label::new("Quit")), None);
    }
}
