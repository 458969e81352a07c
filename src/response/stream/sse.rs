//! One Server Sent Events connection.
//!
//! A `Session` owns its client's `Registration` and loops over a three-way wait: the
//! next payload from the hub, the client (or the whole server) going away, and the
//! keepalive timer.  Whichever fires first wins; the timer is re-armed after every
//! frame.  The registration is dropped when the loop ends, on every path, which
//! deregisters the client exactly once.
use crate::response::hub::{Payload, Registration};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

/// How many frames may wait for the HTTP body to be written out
pub const OUTBOUND_BUFFER: usize = 16;

/// One record written to the event stream
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Data(Payload),
    KeepAlive,
}

impl Frame {
    /// The bytes this frame puts on the wire
    pub fn to_wire(&self) -> String {
        match self {
            Frame::Data(payload) => {
                // one `data:` field per line, so a newline in the payload can't end the event early
                let mut wire = String::with_capacity(payload.len() + 8);
                for line in payload.split('\n') {
                    wire.push_str("data: ");
                    wire.push_str(line.strip_suffix('\r').unwrap_or(line));
                    wire.push('\n');
                }
                wire.push('\n');
                wire
            }
            Frame::KeepAlive => ":keepalive\n\n".to_string(),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    /// The HTTP response was dropped, which is how a disconnect shows up
    ClientGone,
    /// Writing a frame failed because the response is gone
    WriteFailed,
    /// The server is shutting down
    Shutdown,
    /// The hub released this client's queue
    Released,
}

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use Closed::*;
        let reason = match self {
            ClientGone => "client disconnected",
            WriteFailed => "write failed",
            Shutdown => "server shutting down",
            Released => "released by the hub",
        };
        write!(f, "{}", reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Registered,
    Streaming,
    IdleTick,
}

#[derive(Debug)]
pub struct Session {
    registration: Registration,
    keepalive: Duration,
    nickname: String,
    pod: Arc<str>,
    state: State,
}

impl Session {
    pub fn new(
        registration: Registration,
        keepalive: Duration,
        nickname: String,
        pod: Arc<str>,
    ) -> Self {
        log::info!("Connected: {} attached to {}", nickname, pod);
        Self {
            registration,
            keepalive,
            nickname,
            pod,
            state: State::Registered,
        }
    }

    /// Write frames to `out` until the client, the hub, or the server ends the session.
    pub async fn run(mut self, out: mpsc::Sender<Frame>, mut shutdown: watch::Receiver<bool>) -> Closed {
        let timer = time::sleep(self.keepalive);
        tokio::pin!(timer);

        let closed = loop {
            self.state = State::Streaming;
            let frame = tokio::select! {
                biased;
                _ = out.closed() => break Closed::ClientGone,
                _ = shutdown.changed() => break Closed::Shutdown,
                payload = self.registration.recv() => match payload {
                    Some(payload) => Frame::Data(payload),
                    None => break Closed::Released,
                },
                _ = &mut timer => {
                    self.state = State::IdleTick;
                    Frame::KeepAlive
                }
            };
            timer.as_mut().reset(Instant::now() + self.keepalive);

            // a client that stops reading fills the body; shutdown must still get through
            let slot = tokio::select! {
                biased;
                _ = shutdown.changed() => break Closed::Shutdown,
                slot = out.reserve() => slot,
            };
            match slot {
                Ok(slot) => slot.send(frame),
                Err(_) => break Closed::WriteFailed,
            }
        };

        log::trace!("Session {} left {:?}", self.registration.id(), self.state);
        log::info!(
            "Disconnected: {} detached from {} ({})",
            self.nickname,
            self.pod,
            closed
        );
        closed
    }
}
