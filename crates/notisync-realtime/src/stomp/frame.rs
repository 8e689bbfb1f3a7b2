//! STOMP frame model.

use std::fmt;
use std::str::FromStr;

use notisync_core::error::AppError;

use super::heartbeat::HeartBeat;

/// Client and server commands used by the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StompCommand {
    /// Client handshake.
    Connect,
    /// Alternative client handshake spelling.
    Stomp,
    /// Server handshake reply.
    Connected,
    /// Client publish (unused by the notification flow, accepted for completeness).
    Send,
    /// Client subscription request.
    Subscribe,
    /// Client subscription removal.
    Unsubscribe,
    /// Graceful client close.
    Disconnect,
    /// Server delivery on a subscription.
    Message,
    /// Server receipt.
    Receipt,
    /// Server error; the server closes the connection afterwards.
    Error,
}

impl StompCommand {
    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Handshake frames carry their headers unescaped.
    pub(crate) fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StompCommand {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "DISCONNECT" => Ok(Self::Disconnect),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(AppError::decode(format!("Unknown STOMP command '{other}'"))),
        }
    }
}

/// One STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    /// Frame command.
    pub command: StompCommand,
    /// Headers in wire order. Repeated names are allowed; the first wins.
    pub headers: Vec<(String, String)>,
    /// Frame body.
    pub body: String,
}

impl StompFrame {
    /// An empty frame.
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Builder-style header append.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder-style body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `CONNECT` for STOMP 1.2 with the offered heart-beat and optional
    /// bearer token.
    pub fn connect(host: &str, heartbeat: HeartBeat, auth_token: Option<&str>) -> Self {
        let mut frame = Self::new(StompCommand::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", heartbeat.to_string());
        if let Some(token) = auth_token {
            frame = frame.header("Authorization", format!("Bearer {token}"));
        }
        frame
    }

    /// `SUBSCRIBE` with auto acknowledgement.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(StompCommand::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// `UNSUBSCRIBE`.
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(StompCommand::Unsubscribe).header("id", id)
    }

    /// `DISCONNECT`.
    pub fn disconnect() -> Self {
        Self::new(StompCommand::Disconnect)
    }
}

/// One decoded unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A bare end-of-line keep-alive.
    Heartbeat,
    /// A complete frame.
    Frame(StompFrame),
}
