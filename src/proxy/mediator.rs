//! Mediation interpreter.
//!
//! The per-connection engine: performs the protocol-definition
//! handshake with the upstream server, then repeatedly lets the client
//! select a protocol and walks the two mirrored session views in
//! lockstep, forwarding and validating payloads and emitting coded
//! status to both parties.
//!
//! The two views are only ever advanced as a pair; at any moment the
//! mediator is blocked on at most one pending receive. Every fault is
//! mapped to exactly one [`Status`], reported per the taxonomy table,
//! and tears the affected legs down; nothing is retried. Reaching
//! `End` on both sides is normal termination, not a fault, and hands
//! control back to protocol selection.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Party, Result, StpError};
use crate::schema::{declared_types_match, validate, PayloadType};
use crate::session::{codec, Direction, Label, Registry, Role, Session};
use crate::transport::{Frame, Peer};

use super::status::{Status, SUCCESS_TEXT};

/// Payload transformation hook.
pub type PayloadHook = Box<dyn Fn(Value) -> Value + Send + Sync>;

/// Optional pass-through transforms applied to payloads after
/// validation, just before forwarding. Identity by default; the
/// mediator itself never inspects payload content beyond validation.
pub struct MessageHooks {
    /// Applied to payloads travelling server -> client.
    pub server_to_client: PayloadHook,
    /// Applied to payloads travelling client -> server.
    pub client_to_server: PayloadHook,
}

impl Default for MessageHooks {
    fn default() -> Self {
        Self {
            server_to_client: Box::new(|v| v),
            client_to_server: Box::new(|v| v),
        }
    }
}

/// The per-connection mediation engine.
///
/// Owns both transport legs and a private [`Registry`]; instances for
/// distinct connections are fully independent.
pub struct Mediator<S, C> {
    server: Peer<S>,
    client: Peer<C>,
    registry: Registry,
    hooks: MessageHooks,
}

impl<S, C> Mediator<S, C>
where
    S: AsyncRead + AsyncWrite + Send,
    C: AsyncRead + AsyncWrite + Send,
{
    /// Create a mediator over the two legs of one proxied connection.
    pub fn new(server_stream: S, client_stream: C, recv_timeout: Duration) -> Self {
        Self {
            server: Peer::new(server_stream, Party::Server, recv_timeout),
            client: Peer::new(client_stream, Party::Client, recv_timeout),
            registry: Registry::new(),
            hooks: MessageHooks::default(),
        }
    }

    /// Install payload transformation hooks.
    pub fn with_hooks(mut self, hooks: MessageHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run the connection to completion.
    ///
    /// Both legs are closed before returning, whatever the outcome.
    pub async fn run(mut self) -> Result<()> {
        let result = self.mediate().await;
        self.server.close().await;
        self.client.close().await;
        match &result {
            Ok(()) => tracing::info!("mediation finished"),
            Err(e) => tracing::warn!(error = %e, "mediation ended with fault"),
        }
        result
    }

    async fn mediate(&mut self) -> Result<()> {
        self.define_protocols().await?;
        while self.select_protocol().await? {}
        Ok(())
    }

    // --- handshake -----------------------------------------------------

    /// Receive protocol definitions from the server until the
    /// `Session: End` sentinel, registering each under both roles and
    /// acknowledging it.
    async fn define_protocols(&mut self) -> Result<()> {
        loop {
            let frame = match self.server.recv().await {
                Ok(frame) => frame,
                Err(e) => return self.fault(Self::handshake_status(&e), e).await,
            };
            let text = match frame {
                Frame::Text(text) => text,
                Frame::Tagged(..) => {
                    let err = StpError::ProtocolDefinition(
                        "expected a bare session text frame".to_string(),
                    );
                    return self.fault(Some(Status::ProtocolDefinition), err).await;
                }
            };
            if text == "Session: End" {
                tracing::info!(protocols = self.registry.len() / 2, "handshake complete");
                return Ok(());
            }
            if let Err(e) = self.register_protocol(&text) {
                return self.fault(Some(Status::ProtocolDefinition), e).await;
            }
            self.ok_server().await?;
        }
    }

    /// Decode one definition under both roles and register both views.
    fn register_protocol(&mut self, text: &str) -> Result<()> {
        for role in [Role::Server, Role::Client] {
            match codec::decode_for_role(text, role)? {
                Session::Def { name, cont } => self.registry.add(&name, role, *cont)?,
                other => {
                    return Err(StpError::ProtocolDefinition(format!(
                        "expected a Def session, got {}",
                        other.kind()
                    )))
                }
            }
        }
        Ok(())
    }

    // --- protocol selection --------------------------------------------

    /// One selection round: the client picks a protocol, the mediator
    /// resolves the initial `(Ref, Ref)` pair and steps it until both
    /// views reach `End`.
    ///
    /// Returns `Ok(false)` when the client hangs up between protocols,
    /// which is the one clean way for a connection to finish.
    async fn select_protocol(&mut self) -> Result<bool> {
        let frame = match self.client.recv().await {
            Ok(frame) => frame,
            Err(StpError::Disconnected(_)) => {
                tracing::info!("client left, closing connection");
                return Ok(false);
            }
            Err(e) => return self.fault(Self::client_command_status(&e), e).await,
        };
        let command = match frame {
            Frame::Text(command) => command,
            Frame::Tagged(head, _) => {
                let err = StpError::MalformedCommand(format!(
                    "expected 'Protocol: <name>', got a payload frame '{head}'"
                ));
                return self.fault(Some(Status::MalformedCommand), err).await;
            }
        };
        let Some(name) = command.strip_prefix("Protocol: ") else {
            let err =
                StpError::MalformedCommand(format!("expected 'Protocol: <name>', got '{command}'"));
            return self.fault(Some(Status::MalformedCommand), err).await;
        };
        let name = name.trim().to_string();
        tracing::info!(protocol = %name, "executing protocol");

        // The initial (Ref, Ref) transition; always yields a Choice pair.
        let resolved =
            self.resolve_refs(&format!("{name}_server"), &format!("{name}_client"));
        let (mut ses_server, mut ses_client) = match resolved {
            Ok(pair) => pair,
            Err(e) => return self.fault(Some(Status::ProtocolNotFound), e).await,
        };
        self.ok_client().await?;

        while !ses_server.is_end() && !ses_client.is_end() {
            // Each round the server is told which protocol it belongs to.
            self.server
                .send(&Frame::Tagged(SUCCESS_TEXT.to_string(), json!(name)))
                .await?;
            let command = match self.client.recv().await {
                Ok(frame) => frame,
                Err(e) => return self.fault(Self::client_command_status(&e), e).await,
            };
            (ses_server, ses_client) = self.step(ses_server, ses_client, command).await?;
        }
        Ok(true)
    }

    fn resolve_refs(&self, server_name: &str, client_name: &str) -> Result<(Session, Session)> {
        let server = self.registry.lookup(server_name, Role::Server)?.clone();
        let client = self.registry.lookup(client_name, Role::Client)?.clone();
        Ok((server, client))
    }

    // --- step loop -----------------------------------------------------

    /// Advance the session pair until it needs the selection loop
    /// again: either both views reached `End`, or a `Ref` pair resolved
    /// back to a branch point.
    async fn step(
        &mut self,
        ses_server: Session,
        ses_client: Session,
        command: Frame,
    ) -> Result<(Session, Session)> {
        let mut ses_server = ses_server;
        let mut ses_client = ses_client;
        let mut command = Some(command);
        // A payload the client attached to its action, held until the
        // single step that consumes it.
        let mut pending: Option<Value> = None;

        while !ses_server.is_end() && !ses_client.is_end() {
            match (ses_server, ses_client) {
                (
                    Session::Single {
                        dir: server_dir,
                        payload: server_ty,
                        cont: server_cont,
                    },
                    Session::Single {
                        dir: client_dir,
                        payload: client_ty,
                        cont: client_cont,
                    },
                ) => {
                    match (server_dir, client_dir) {
                        (Direction::Recv, Direction::Send) => {
                            self.forward_client_payload(&client_ty, &server_ty, &mut pending)
                                .await?;
                        }
                        (Direction::Send, Direction::Recv) => {
                            self.forward_server_payload(&server_ty, &client_ty).await?;
                        }
                        _ => {
                            let err = StpError::DirectionMismatch {
                                server: server_dir,
                                client: client_dir,
                            };
                            return self.fault(Some(Status::DirectionMismatch), err).await;
                        }
                    }
                    ses_server = *server_cont;
                    ses_client = *client_cont;
                }
                (
                    Session::Choice {
                        alternatives: server_alts,
                        ..
                    },
                    Session::Choice {
                        alternatives: client_alts,
                        ..
                    },
                ) => {
                    let frame = match command.take() {
                        Some(frame) => frame,
                        None => match self.client.recv().await {
                            Ok(frame) => frame,
                            Err(e) => {
                                return self.fault(Self::client_command_status(&e), e).await
                            }
                        },
                    };
                    let (action, payload) = match frame {
                        Frame::Text(action) => (action, None),
                        Frame::Tagged(action, value) => (action, Some(value)),
                    };
                    let label = Label::new(action.clone());
                    let next_server = take_alternative(server_alts, &label);
                    let next_client = take_alternative(client_alts, &label);
                    let (Some(next_server), Some(next_client)) = (next_server, next_client)
                    else {
                        let err = StpError::UnknownAction(action);
                        return self.fault(Some(Status::UnknownAction), err).await;
                    };
                    tracing::debug!(action = %label, "carrying out action");
                    // The client's action is acknowledged to the server
                    // only once it is known to be valid on both views.
                    self.server
                        .send(&Frame::Tagged(SUCCESS_TEXT.to_string(), json!(label.as_str())))
                        .await?;
                    if payload.is_none() {
                        // Server drives the next transfer; tell the
                        // client its action was accepted.
                        self.ok_client().await?;
                    }
                    pending = payload;
                    ses_server = next_server;
                    ses_client = next_client;
                }
                (Session::Ref { name: server_name }, Session::Ref { name: client_name }) => {
                    // Ref resolution re-enters at a branch point: the
                    // resolved Choice pair goes back to the selection
                    // loop rather than being consumed here.
                    return match self.resolve_refs(&server_name, &client_name) {
                        Ok(pair) => Ok(pair),
                        Err(e) => self.fault(Some(Status::ProtocolNotFound), e).await,
                    };
                }
                (server, client) => {
                    let err = StpError::ProtocolMismatch {
                        server: server.kind(),
                        client: client.kind(),
                    };
                    return self.fault(Some(Status::SessionMismatch), err).await;
                }
            }
        }
        Ok((Session::End, Session::End))
    }

    /// Client -> server transfer: take the payload attached to the
    /// action (or read a fresh frame), validate, forward.
    async fn forward_client_payload(
        &mut self,
        client_ty: &PayloadType,
        server_ty: &PayloadType,
        pending: &mut Option<Value>,
    ) -> Result<()> {
        // Declaration mismatch is caught before any data is read.
        if let Err(e) = declared_types_match(client_ty, server_ty) {
            return self.fault(Some(Status::ClientPayloadInvalid), e).await;
        }
        let value = match pending.take() {
            Some(value) => value,
            None => match self.client.recv_value().await {
                Ok(value) => value,
                Err(e) => return self.fault(Self::client_payload_status(&e), e).await,
            },
        };
        if let Err(e) = validate(&value, client_ty) {
            return self.fault(Some(Status::ClientPayloadInvalid), e).await;
        }
        let value = (self.hooks.client_to_server)(value);
        self.ok_client().await?;
        self.server
            .send(&Frame::Tagged(SUCCESS_TEXT.to_string(), value))
            .await?;
        tracing::debug!("forwarded payload client -> server");
        Ok(())
    }

    /// Server -> client transfer: read from the server, validate,
    /// forward.
    async fn forward_server_payload(
        &mut self,
        server_ty: &PayloadType,
        client_ty: &PayloadType,
    ) -> Result<()> {
        // Declaration mismatch is caught before any data is read.
        if let Err(e) = declared_types_match(server_ty, client_ty) {
            return self.fault(Some(Status::ServerPayloadInvalid), e).await;
        }
        let value = match self.server.recv_value().await {
            Ok(value) => value,
            Err(e) => return self.fault(Self::server_payload_status(&e), e).await,
        };
        if let Err(e) = validate(&value, server_ty) {
            return self.fault(Some(Status::ServerPayloadInvalid), e).await;
        }
        let value = (self.hooks.server_to_client)(value);
        self.client
            .send(&Frame::Tagged(SUCCESS_TEXT.to_string(), value))
            .await?;
        self.ok_server().await?;
        tracing::debug!("forwarded payload server -> client");
        Ok(())
    }

    // --- status emission -----------------------------------------------

    async fn ok_client(&mut self) -> Result<()> {
        self.client.send_text(SUCCESS_TEXT).await
    }

    async fn ok_server(&mut self) -> Result<()> {
        self.server.send_text(SUCCESS_TEXT).await
    }

    /// Report a fault per the status table and propagate it.
    ///
    /// `None` means a quiet teardown (the leg that failed has nobody
    /// left to notify). Send failures during reporting are ignored;
    /// the connection is coming down regardless.
    async fn fault<T>(&mut self, status: Option<Status>, err: StpError) -> Result<T> {
        if let Some(status) = status {
            tracing::warn!(code = status.code(), error = %err, "mediation fault");
            let detail = err.to_string();
            if let Some(text) = status.client_text(&detail) {
                let _ = self.client.send_text(&text).await;
            }
            if let Some(text) = status.server_text(&detail) {
                let _ = self.server.send_text(&text).await;
            }
            if status.closes_client() {
                self.client.close().await;
            }
            if status.closes_server() {
                self.server.close().await;
            }
        } else {
            tracing::debug!(error = %err, "closing without status report");
        }
        Err(err)
    }

    fn handshake_status(err: &StpError) -> Option<Status> {
        match err {
            StpError::Timeout(Party::Server) => Some(Status::ServerTimeout),
            StpError::Disconnected(_) | StpError::Io(_) => None,
            _ => Some(Status::ProtocolDefinition),
        }
    }

    fn client_command_status(err: &StpError) -> Option<Status> {
        match err {
            StpError::Timeout(Party::Client) => Some(Status::ClientTimeout),
            StpError::MalformedCommand(_) | StpError::Json(_) => Some(Status::MalformedCommand),
            StpError::Disconnected(_) | StpError::Io(_) => None,
            _ => Some(Status::InternalError),
        }
    }

    fn client_payload_status(err: &StpError) -> Option<Status> {
        match err {
            StpError::Timeout(Party::Client) => Some(Status::ClientTimeout),
            StpError::MalformedCommand(_) | StpError::Json(_) => Some(Status::MalformedCommand),
            StpError::Disconnected(_) | StpError::Io(_) => None,
            _ => Some(Status::InternalError),
        }
    }

    fn server_payload_status(err: &StpError) -> Option<Status> {
        match err {
            StpError::Timeout(Party::Server) => Some(Status::ServerTimeout),
            StpError::Disconnected(_) | StpError::Io(_) => None,
            _ => Some(Status::InternalError),
        }
    }
}

/// Move one alternative out of a choice's list by label.
fn take_alternative(alternatives: Vec<(Label, Session)>, label: &Label) -> Option<Session> {
    alternatives
        .into_iter()
        .find(|(l, _)| l == label)
        .map(|(_, session)| session)
}
