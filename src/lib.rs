//! # STP - Session-Typed Mediation Proxy
//!
//! A mediating proxy that sits between a message client and a
//! message-oriented server and enforces that their exchange follows a
//! previously agreed **session-type protocol**: an explicit grammar of
//! who must send, who must receive, what structural type of payload is
//! allowed at each step, and which named actions are available at a
//! branch point. Every payload is validated against a recursive
//! structural type schema before it is forwarded.
//!
//! ## Protocol Overview
//!
//! The upstream server declares its protocols during a handshake,
//! encoded as session text:
//!
//! ```text
//! Session: Def, Name: A, Cont: Session: Choice, Dir: send, Alternatives: [
//!   (Label: Neg, Session: Single, Dir: recv, Payload: { type: "number" }, Cont:
//!     Session: Single, Dir: send, Payload: { type: "number" }, Cont:
//!     Session: Ref, Name: A),
//!   (Label: Quit, Session: End)]
//! ```
//!
//! The proxy registers two mirrored views of each protocol (the
//! client's view flips every transfer direction) and then advances
//! them in lockstep while the client drives protocol and action
//! selection:
//!
//! ```text
//! Client                    STP Proxy                       Server
//!    |                          |<==== Session: Def ... ======|
//!    |                          |<==== Session: End ==========|
//!    |--- "Protocol: A" ------->|                             |
//!    |--- ["Neg", 5] ---------->|-- validate -- ["502..", 5]->|
//!    |<-- ["502..", -5] --- validate --<------------- -5 -----|
//!    |--- "Quit" -------------->|                             |
//! ```
//!
//! ## Session kinds
//!
//! | kind   | meaning                                             |
//! |--------|-----------------------------------------------------|
//! | Single | one payload transfer, then a continuation           |
//! | Choice | a branch point over labelled alternatives           |
//! | Def    | declares a named protocol entry point               |
//! | Ref    | resolves through the registry back to a Choice      |
//! | End    | terminal                                            |
//!
//! ## Quick Start
//!
//! ### Decoding and mirroring a protocol
//!
//! ```rust,ignore
//! use stp::session::{codec, Role};
//!
//! let text = r#"Session: Single, Dir: send, Payload: { type: "number" }, Cont: Session: End"#;
//! let server_view = codec::decode_for_role(text, Role::Server)?;
//! let client_view = codec::decode_for_role(text, Role::Client)?;
//! // server sends, client receives
//! ```
//!
//! ### Validating a payload
//!
//! ```rust,ignore
//! use stp::schema::{parse_type, validate};
//! use serde_json::json;
//!
//! let ty = parse_type(r#"{ type: "array", payload: { type: "number" } }"#)?;
//! validate(&json!([1, 2, 3]), &ty)?;
//! ```
//!
//! ### Running the proxy
//!
//! ```rust,ignore
//! use stp::proxy::{ProxyConfig, ProxyServer};
//!
//! let config = ProxyConfig::default();
//! ProxyServer::new(config).run().await?;
//! ```
//!
//! ## Modules
//!
//! - [`session`]: session type model, text codec, protocol registry
//! - [`schema`]: structural payload types and validation
//! - [`proxy`]: mediation interpreter, status taxonomy, proxy server
//! - [`transport`]: ndjson framing over byte streams
//! - [`config`]: configuration management
//! - [`error`]: error types and result alias

pub mod config;
pub mod error;
pub mod proxy;
pub mod schema;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use error::{Party, Result, StpError};
pub use proxy::{Mediator, MessageHooks, ProxyConfig, ProxyServer, Status};
pub use schema::{check_transfer, parse_type, validate, PayloadType};
pub use session::{codec::decode, codec::decode_for_role, codec::encode};
pub use session::{Direction, Label, Registry, Role, Session};
pub use transport::{Frame, Peer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
