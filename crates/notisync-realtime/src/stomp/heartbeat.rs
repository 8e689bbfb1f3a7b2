//! STOMP heart-beat negotiation.

use std::fmt;
use std::time::Duration;

use notisync_core::error::AppError;

/// A `heart-beat` header value: `outgoing,incoming` in milliseconds, where
/// 0 means "cannot send" / "does not want to receive".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which the sender can emit heart-beats.
    pub outgoing_ms: u64,
    /// Desired interval between heart-beats from the peer.
    pub incoming_ms: u64,
}

/// Intervals in effect on one connection after negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedHeartBeat {
    /// How often the client must send a heart-beat.
    pub send_every: Option<Duration>,
    /// How often the server promised to send something.
    pub expect_every: Option<Duration>,
}

impl HeartBeat {
    /// Create a heart-beat setting.
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    /// Parse a header value such as `10000,10000`.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        let (out, inc) = value
            .split_once(',')
            .ok_or_else(|| AppError::decode(format!("Malformed heart-beat header '{value}'")))?;
        let parse = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| AppError::decode(format!("Malformed heart-beat header '{value}'")))
        };
        Ok(Self::new(parse(out)?, parse(inc)?))
    }

    /// Combine the client's offer with the server's reply.
    ///
    /// Each direction is disabled when either side declares 0, and
    /// otherwise runs at the larger of the two declared intervals.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> NegotiatedHeartBeat {
        let pick = |a: u64, b: u64| (a != 0 && b != 0).then(|| Duration::from_millis(a.max(b)));
        NegotiatedHeartBeat {
            send_every: pick(client.outgoing_ms, server.incoming_ms),
            expect_every: pick(server.outgoing_ms, client.incoming_ms),
        }
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing_ms, self.incoming_ms)
    }
}
