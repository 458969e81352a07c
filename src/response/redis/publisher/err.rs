use super::super::RedisConnErr;
use std::fmt;

#[derive(Debug)]
pub enum PublishErr {
    Connection(RedisConnErr),
    Io(std::io::Error),
    Rejected(String),
    UnexpectedReply(String),
    Unavailable,
}

impl std::error::Error for PublishErr {}

impl fmt::Display for PublishErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use PublishErr::*;
        match self {
            Connection(inner) => write!(f, "{}", inner),
            Io(inner) => write!(f, "Publishing to Redis failed: {}", inner),
            Rejected(reply) => write!(f, "Redis rejected the message: {}", reply),
            UnexpectedReply(reply) => write!(
                f,
                "Expected the number of receivers from Redis, got `{}`",
                reply.trim_end()
            ),
            Unavailable => write!(f, "Redis is unavailable for publishing"),
        }
    }
}

impl From<RedisConnErr> for PublishErr {
    fn from(e: RedisConnErr) -> Self {
        Self::Connection(e)
    }
}

impl From<std::io::Error> for PublishErr {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
