mod err;
pub use err::RedisConnErr;

use super::msg::{RedisParseErr, RedisParseOutput};
use super::RedisCmd;
use crate::config::Redis;
use crate::response::hub::Payload;

use std::convert::TryFrom;
use std::str;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

type Result<T> = std::result::Result<T, RedisConnErr>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection subscribed to the chat topic
#[derive(Debug)]
pub(super) struct RedisConn {
    stream: TcpStream,
    addr: String,
    topic: String,
    redis_input: Vec<u8>,
}

impl RedisConn {
    /// Connect, authenticate if a password is configured, check that the far end is Redis,
    /// and subscribe to the topic.
    pub(super) async fn subscribe(redis_cfg: &Redis) -> Result<Self> {
        let addr = redis_cfg.addr();
        let topic = redis_cfg.topic();
        let handshake = async {
            let mut stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| RedisConnErr::with_addr(&addr, e))?;
            if let Some(password) = redis_cfg.password.as_ref() {
                Self::auth_connection(&mut stream, &addr, password).await?;
            }
            Self::validate_connection(&mut stream, &addr).await?;
            stream
                .write_all(&RedisCmd::Subscribe(&topic).into_sendable())
                .await
                .map_err(|e| RedisConnErr::with_addr(&addr, e))?;
            Ok::<_, RedisConnErr>(stream)
        };
        let stream = timeout(HANDSHAKE_TIMEOUT, handshake)
            .await
            .map_err(|_| RedisConnErr::with_addr(&addr, std::io::ErrorKind::TimedOut.into()))??;

        Ok(Self {
            stream,
            addr,
            topic,
            redis_input: Vec::with_capacity(5000),
        })
    }

    pub(super) fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next payload published on the topic.
    ///
    /// Reading is cancel-safe: bytes already read stay buffered on `self`.
    pub(super) async fn next_payload(&mut self) -> Result<Payload> {
        let mut chunk = [0_u8; 4096];
        loop {
            if let Some(payload) = take_payload(&mut self.redis_input, &self.topic)? {
                return Ok(payload);
            }
            match self.stream.read(&mut chunk).await? {
                0 => return Err(RedisConnErr::Closed(self.addr.clone())),
                n => self.redis_input.extend_from_slice(&chunk[..n]),
            }
        }
    }

    async fn auth_connection(conn: &mut TcpStream, addr: &str, pass: &str) -> Result<()> {
        conn.write_all(&RedisCmd::Auth(pass).into_sendable())
            .await
            .map_err(|e| RedisConnErr::with_addr(addr, e))?;
        let mut buffer = vec![0_u8; 5];
        conn.read_exact(&mut buffer)
            .await
            .map_err(|e| RedisConnErr::with_addr(addr, e))?;
        check_auth_reply(&buffer)
    }

    async fn validate_connection(conn: &mut TcpStream, addr: &str) -> Result<()> {
        conn.write_all(&RedisCmd::Ping.into_sendable())
            .await
            .map_err(|e| RedisConnErr::with_addr(addr, e))?;
        let mut buffer = vec![0_u8; 7];
        conn.read_exact(&mut buffer)
            .await
            .map_err(|e| RedisConnErr::with_addr(addr, e))?;
        check_ping_reply(&buffer, addr)
    }
}

pub(super) fn check_auth_reply(reply: &[u8]) -> Result<()> {
    match reply {
        b"+OK\r\n" => Ok(()),
        other => Err(RedisConnErr::IncorrectPassword(
            String::from_utf8_lossy(other).to_string(),
        )),
    }
}

pub(super) fn check_ping_reply(reply: &[u8], addr: &str) -> Result<()> {
    match reply {
        b"+PONG\r\n" => Ok(()),
        b"-NOAUTH" => Err(RedisConnErr::MissingPassword),
        b"HTTP/1." => Err(RedisConnErr::NotRedis(addr.to_string())),
        other => Err(RedisConnErr::InvalidRedisReply(
            String::from_utf8_lossy(other).to_string(),
        )),
    }
}

/// Parse buffered replies until one is a message on `topic`.
///
/// Everything parsed is drained from `input`, including subscription confirmations and
/// messages for other channels.  An incomplete reply, and any trailing bytes that are not
/// yet valid UTF-8, stay in `input` for the next read.
pub(super) fn take_payload(
    input: &mut Vec<u8>,
    topic: &str,
) -> std::result::Result<Option<Payload>, RedisParseErr> {
    loop {
        // a sequence cut off at the end of the buffer may still complete; anything else is corrupt
        let (valid, corrupt) = match str::from_utf8(input) {
            Ok(valid) => (valid, false),
            Err(e) => (
                str::from_utf8(&input[..e.valid_up_to()]).map_err(|_| RedisParseErr::InvalidUtf8)?,
                e.error_len().is_some(),
            ),
        };
        if valid.is_empty() {
            return if corrupt { Err(RedisParseErr::InvalidUtf8) } else { Ok(None) };
        }

        use RedisParseOutput::*;
        let (payload, leftover_len) = match RedisParseOutput::try_from(valid) {
            Ok(Msg(msg)) if msg.channel_txt == topic => {
                (Some(Arc::from(msg.payload_txt)), msg.leftover_input.len())
            }
            Ok(Msg(msg)) => {
                log::warn!("Ignoring a message on the unexpected channel {}", msg.channel_txt);
                (None, msg.leftover_input.len())
            }
            Ok(NonMsg(leftover)) => (None, leftover.len()),
            Err(RedisParseErr::Incomplete) if corrupt => return Err(RedisParseErr::InvalidUtf8),
            Err(RedisParseErr::Incomplete) => return Ok(None),
            Err(e) => return Err(e),
        };

        let consumed = valid.len() - leftover_len;
        input.drain(..consumed);
        if payload.is_some() {
            return Ok(payload);
        }
    }
}
