use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum RedisParseErr {
    Incomplete,
    InvalidNumber(std::num::ParseIntError),
    InvalidLineStart(String),
    InvalidLineEnd,
    IncorrectRedisType,
    MissingField,
    UnknownCommand(String),
    ErrorReply(String),
    InvalidUtf8,
    ArrayTooLong(usize),
}

impl fmt::Display for RedisParseErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use RedisParseErr::*;
        let msg = match self {
            Incomplete => "The input from Redis does not form a complete message, likely because \
                           the input buffer filled partway through a message.  Save this input \
                           and try again with additional input from Redis."
                .to_string(),
            InvalidNumber(parse_int_err) => format!(
                "Redis indicated that an item would be a number, but it could not be parsed: {}",
                parse_int_err
            ),
            InvalidLineStart(line_start_char) => format!(
                "A line from Redis started with `{}`, which is not a valid character to indicate \
                 the type of the Redis line.",
                line_start_char
            ),
            InvalidLineEnd => "A Redis line ended before expected line length".to_string(),
            IncorrectRedisType => "Received a Redis type that is not supported in this context.  \
                                   A subscriber expects each reply from Redis to be a Redis \
                                   array consisting of bulk strings or integers."
                .to_string(),
            MissingField => "Redis input was missing an expected field (e.g., a `message` \
                             without a payload line)"
                .to_string(),
            UnknownCommand(cmd) => format!(
                "Redis sent a `{}` reply, which a pub/sub subscriber does not expect",
                cmd
            ),
            ErrorReply(reply) => format!("Redis replied with an error: {}", reply),
            InvalidUtf8 => "Redis sent bytes that are not valid UTF-8".to_string(),
            ArrayTooLong(len) => format!(
                "Redis announced an array of {} items, far more than any pub/sub reply holds",
                len
            ),
        };
        write!(f, "{}", msg)
    }
}

impl Error for RedisParseErr {}

impl From<std::num::ParseIntError> for RedisParseErr {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::InvalidNumber(error)
    }
}
