//! Framed text transport.
//!
//! Protocol: newline-delimited JSON (ndjson) over any byte stream. Each
//! frame is either a bare JSON string (a status or command) or a
//! two-element array `[statusOrCommand, payload]` where the payload is
//! an arbitrary JSON value.
//!
//! The mediator treats both legs of a connection uniformly through
//! [`Peer`], which works over `tokio::net::TcpStream` in production and
//! `tokio::io::duplex` in tests. Every receive is bounded by a timeout
//! and a frame-size cap; expiry is a first-class fault attributed to
//! the owning party, never a silent retry.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};

use crate::error::{Party, Result, StpError};

/// Default bound on every blocking receive, in seconds.
pub const RECV_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a single frame. A peer that exceeds it is treated as
/// sending a malformed frame, bounding per-connection memory.
pub const MAX_FRAME_BYTES: u64 = 1024 * 1024;

/// One wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A bare status or command string.
    Text(String),
    /// A status or command paired with a payload value.
    Tagged(String, Value),
}

impl Frame {
    /// The status/command part of the frame.
    pub fn head(&self) -> &str {
        match self {
            Frame::Text(s) | Frame::Tagged(s, _) => s,
        }
    }

    /// The payload, if the frame carries one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Frame::Text(_) => None,
            Frame::Tagged(_, payload) => Some(payload),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Frame::Text(s) => Value::String(s.clone()),
            Frame::Tagged(s, payload) => {
                Value::Array(vec![Value::String(s.clone()), payload.clone()])
            }
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Frame::Text(s)),
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(Value::String(head)), Some(payload)) => {
                        Ok(Frame::Tagged(head, payload))
                    }
                    _ => Err(StpError::MalformedCommand(
                        "first element of a tagged frame must be a string".to_string(),
                    )),
                }
            }
            other => Err(StpError::MalformedCommand(format!(
                "frame must be a string or a two-element array, got {other}"
            ))),
        }
    }
}

/// One leg of a mediated connection.
///
/// Owns the stream; [`Peer::recv`] is bounded by the configured
/// timeout and attributes expiry (and disconnects) to the peer's
/// [`Party`].
pub struct Peer<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    party: Party,
    timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite> Peer<S> {
    /// Wrap a stream as a peer attributed to `party`.
    pub fn new(stream: S, party: Party, timeout: Duration) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read),
            writer: write,
            party,
            timeout,
        }
    }

    /// Which party this leg talks to.
    pub fn party(&self) -> Party {
        self.party
    }

    /// Send one frame.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        let mut line = serde_json::to_string(&frame.to_value())?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive one frame, bounded by the timeout.
    ///
    /// Expiry yields [`StpError::Timeout`], an EOF
    /// [`StpError::Disconnected`], both attributed to this peer's
    /// party.
    pub async fn recv(&mut self) -> Result<Frame> {
        Frame::from_value(self.recv_value().await?)
    }

    /// Receive one frame as a bare payload value, bounded by the
    /// timeout.
    ///
    /// Used in payload positions, where the whole frame is the value
    /// being transferred (an endpoint answering an action sends the
    /// result on its own, not wrapped in an envelope).
    pub async fn recv_value(&mut self) -> Result<Value> {
        let mut line = String::new();
        let mut limited = (&mut self.reader).take(MAX_FRAME_BYTES);
        let read = tokio::time::timeout(self.timeout, limited.read_line(&mut line))
            .await
            .map_err(|_| StpError::Timeout(self.party))??;
        if read == 0 {
            return Err(StpError::Disconnected(self.party));
        }
        // The limit reached without a newline means the frame keeps
        // going; refuse it rather than buffering without bound.
        if read as u64 == MAX_FRAME_BYTES && !line.ends_with('\n') {
            return Err(StpError::MalformedCommand(format!(
                "frame exceeds {MAX_FRAME_BYTES} bytes"
            )));
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Send a bare text frame.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(&Frame::Text(text.to_string())).await
    }

    /// Shut down the write side. Errors are ignored; the connection is
    /// being torn down anyway.
    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_send_recv_text_frame() {
        let (a, b) = tokio::io::duplex(1024);
        let mut left = Peer::new(a, Party::Client, Duration::from_secs(1));
        let mut right = Peer::new(b, Party::Server, Duration::from_secs(1));

        left.send(&Frame::Text("Protocol: A".to_string())).await.unwrap();
        let frame = right.recv().await.unwrap();
        assert_eq!(frame, Frame::Text("Protocol: A".to_string()));
    }

    #[tokio::test]
    async fn test_send_recv_tagged_frame() {
        let (a, b) = tokio::io::duplex(1024);
        let mut left = Peer::new(a, Party::Client, Duration::from_secs(1));
        let mut right = Peer::new(b, Party::Server, Duration::from_secs(1));

        left.send(&Frame::Tagged("Neg".to_string(), json!(5))).await.unwrap();
        let frame = right.recv().await.unwrap();
        assert_eq!(frame.head(), "Neg");
        assert_eq!(frame.payload(), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_recv_timeout_attributed_to_party() {
        let (a, _b) = tokio::io::duplex(1024);
        let mut peer = Peer::new(a, Party::Server, Duration::from_millis(20));
        let err = peer.recv().await.unwrap_err();
        assert!(matches!(err, StpError::Timeout(Party::Server)));
    }

    #[tokio::test]
    async fn test_recv_eof_is_disconnect() {
        let (a, b) = tokio::io::duplex(1024);
        drop(b);
        let mut peer = Peer::new(a, Party::Client, Duration::from_secs(1));
        let err = peer.recv().await.unwrap_err();
        assert!(matches!(err, StpError::Disconnected(Party::Client)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let mut sender = Peer::new(a, Party::Server, Duration::from_secs(5));
        let mut peer = Peer::new(b, Party::Client, Duration::from_secs(5));

        let frame = Frame::Text("a".repeat(MAX_FRAME_BYTES as usize + 16));
        let write = async {
            sender.send(&frame).await.unwrap();
        };
        let read = async {
            let err = peer.recv().await.unwrap_err();
            assert!(matches!(err, StpError::MalformedCommand(_)));
        };
        tokio::join!(write, read);
    }

    #[tokio::test]
    async fn test_rejects_malformed_frames() {
        let (a, b) = tokio::io::duplex(1024);
        let mut raw = Peer::new(a, Party::Client, Duration::from_secs(1));
        let mut peer = Peer::new(b, Party::Client, Duration::from_secs(1));

        // A three-element array is not a valid envelope.
        let mut line = serde_json::to_string(&json!([1, 2, 3])).unwrap();
        line.push('\n');
        raw.writer.write_all(line.as_bytes()).await.unwrap();
        raw.writer.flush().await.unwrap();
        let err = peer.recv().await.unwrap_err();
        assert!(matches!(err, StpError::MalformedCommand(_)));
    }
}
