//! Publishing a chat message to every replica.
mod err;
pub use err::PublishErr;

use super::connection::{check_auth_reply, check_ping_reply};
use super::{RedisCmd, RedisConnErr};
use crate::config;

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Result<T> = std::result::Result<T, PublishErr>;

/// Something that can put an encoded chat message on the inter-replica topic.
///
/// Implementations block; async callers run them on `spawn_blocking`.
pub trait Publish: Send + Sync {
    /// Publish `payload` and return how many subscribers Redis handed it to
    fn publish(&self, payload: &str) -> Result<usize>;
}

/// Publishes over one blocking connection, opened on first use and reopened after a failure
#[derive(Debug)]
pub struct RedisPublisher {
    redis_cfg: config::Redis,
    topic: String,
    conn: Mutex<Option<BufReader<TcpStream>>>,
}

impl RedisPublisher {
    pub fn new(redis_cfg: &config::Redis) -> Self {
        Self {
            topic: redis_cfg.topic(),
            redis_cfg: redis_cfg.clone(),
            conn: Mutex::new(None),
        }
    }

    fn connect(&self) -> Result<BufReader<TcpStream>> {
        let addr = self.redis_cfg.addr();
        let with_addr = |e| RedisConnErr::with_addr(&addr, e);

        let mut conn = TcpStream::connect(&addr).map_err(with_addr)?;
        conn.set_read_timeout(Some(Duration::from_secs(5)))
            .map_err(with_addr)?;
        conn.set_write_timeout(Some(Duration::from_secs(5)))
            .map_err(with_addr)?;

        if let Some(password) = self.redis_cfg.password.as_ref() {
            conn.write_all(&RedisCmd::Auth(password).into_sendable())
                .map_err(with_addr)?;
            let mut buffer = [0_u8; 5];
            conn.read_exact(&mut buffer).map_err(with_addr)?;
            check_auth_reply(&buffer)?;
        }

        conn.write_all(&RedisCmd::Ping.into_sendable())
            .map_err(with_addr)?;
        let mut buffer = [0_u8; 7];
        conn.read_exact(&mut buffer).map_err(with_addr)?;
        check_ping_reply(&buffer, &addr)?;

        log::info!("Connected to Redis at {} for publishing", addr);
        Ok(BufReader::new(conn))
    }

    fn send(conn: &mut BufReader<TcpStream>, cmd: &[u8]) -> Result<usize> {
        conn.get_mut().write_all(cmd)?;
        let mut reply = String::new();
        if conn.read_line(&mut reply)? == 0 {
            return Err(PublishErr::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        parse_publish_reply(&reply)
    }

    fn lock(&self) -> MutexGuard<Option<BufReader<TcpStream>>> {
        self.conn.lock().unwrap_or_else(Self::recover)
    }

    fn recover<T>(poisoned: PoisonError<MutexGuard<T>>) -> MutexGuard<T> {
        log::error!("{}", &poisoned);
        poisoned.into_inner()
    }
}

impl Publish for RedisPublisher {
    fn publish(&self, payload: &str) -> Result<usize> {
        let cmd = RedisCmd::Publish(&self.topic, payload).into_sendable();
        let mut conn = self.lock();

        for attempt in 0..2 {
            if conn.is_none() {
                *conn = Some(self.connect()?);
            }
            let sent = match conn.as_mut() {
                Some(stream) => Self::send(stream, &cmd),
                None => Err(PublishErr::Unavailable),
            };
            match sent {
                Ok(receivers) => return Ok(receivers),
                Err(PublishErr::Io(e)) if attempt == 0 => {
                    log::warn!("Publishing to Redis failed ({}); reconnecting", e);
                    *conn = None;
                }
                Err(e) => {
                    *conn = None;
                    return Err(e);
                }
            }
        }
        Err(PublishErr::Unavailable)
    }
}

/// `PUBLISH` answers with the number of subscribers that received the message, e.g. `:3\r\n`
fn parse_publish_reply(reply: &str) -> Result<usize> {
    let line = reply.trim_end_matches("\r\n");
    match (line.get(..1), line.get(1..)) {
        (Some(":"), Some(n)) => n
            .parse()
            .map_err(|_| PublishErr::UnexpectedReply(reply.to_string())),
        (Some("-"), Some(err)) => Err(PublishErr::Rejected(err.to_string())),
        _ => Err(PublishErr::UnexpectedReply(reply.to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn publish_reply_counts_receivers() {
        assert!(matches!(parse_publish_reply(":3\r\n"), Ok(3)));
        assert!(matches!(parse_publish_reply(":0\r\n"), Ok(0)));
    }

    #[test]
    fn publish_reply_errors() {
        assert!(matches!(
            parse_publish_reply("-ERR wrong number of arguments\r\n"),
            Err(PublishErr::Rejected(_))
        ));
        assert!(matches!(
            parse_publish_reply("+OK\r\n"),
            Err(PublishErr::UnexpectedReply(_))
        ));
        assert!(matches!(
            parse_publish_reply(""),
            Err(PublishErr::UnexpectedReply(_))
        ));
    }

    #[test]
    fn unreachable_redis_is_an_error() {
        // nothing listens on port 1 in a test environment
        let vars = [("REDIS_HOST", "127.0.0.1"), ("REDIS_PORT", "1")]
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let redis_cfg = config::Redis::from_env(config::EnvVar::new(vars)).expect("valid config");
        let publisher = RedisPublisher::new(&redis_cfg);
        assert!(publisher.publish("{}").is_err());
    }
}
