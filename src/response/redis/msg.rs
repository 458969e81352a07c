//! Methods for parsing input in the small subset of the Redis Serialization Protocol a
//! pub/sub subscriber sees.
//!
//! Once subscribed, everything Redis sends is a Redis Array whose elements are Bulk
//! Strings or Integers (see the [Redis protocol documentation](https://redis.io/topics/protocol)).
//! A published chat message looks like this (line breaks added between fields):
//!
//! ```text
//! *3\r\n
//! $7\r\n
//! message\r\n
//! $11\r\n
//! chat.global\r\n
//! $42\r\n{"id":1,"content":"hi","sender_nick":"bo"}\r\n
//! ```
//!
//! Read that as: an array with three elements: a bulk string with seven characters, a
//! bulk string with eleven characters, and a bulk string with 42 characters.

mod err;
pub use err::RedisParseErr;

use self::RedisParseOutput::*;

use std::convert::{TryFrom, TryInto};

#[derive(Debug, Clone, PartialEq)]
pub enum RedisParseOutput<'a> {
    Msg(RedisMsg<'a>),
    NonMsg(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedisMsg<'a> {
    pub channel_txt: &'a str,
    pub payload_txt: &'a str,
    pub leftover_input: &'a str,
}

impl<'a> TryFrom<&'a str> for RedisParseOutput<'a> {
    type Error = RedisParseErr;
    fn try_from(utf8: &'a str) -> Result<RedisParseOutput<'a>, Self::Error> {
        let (structured_txt, leftover_utf8) = utf8_to_redis_data(utf8)?;
        let structured_txt = RedisStructuredText {
            structured_txt,
            leftover_input: leftover_utf8,
        };
        structured_txt.try_into()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RedisStructuredText<'a> {
    structured_txt: RedisData<'a>,
    leftover_input: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
enum RedisData<'a> {
    RedisArray(Vec<RedisData<'a>>),
    BulkString(&'a str),
    Integer(usize),
}

use RedisData::*;
use RedisParseErr::*;
type RedisParser<'a, Item> = Result<Item, RedisParseErr>;

/// Pub/sub replies are arrays of at most four items (`pmessage`); anything much longer is corrupt
const MAX_ARRAY_LEN: usize = 16;

fn utf8_to_redis_data(s: &str) -> Result<(RedisData, &str), RedisParseErr> {
    if s.len() < 4 {
        return Err(Incomplete);
    };
    let (first_char, s) = s.split_at(1);
    match first_char {
        ":" => parse_redis_int(s),
        "$" => parse_redis_bulk_string(s),
        "*" => parse_redis_array(s),
        "-" => Err(parse_redis_error(s)),
        e => Err(InvalidLineStart(e.to_string())),
    }
}

fn after_newline_at(s: &str, start: usize) -> RedisParser<&str> {
    let s = s.get(start..).ok_or(Incomplete)?;
    if s.len() < "\r\n".len() {
        return Err(Incomplete);
    }
    if !s.starts_with("\r\n") {
        return Err(InvalidLineEnd);
    }
    Ok(&s["\r\n".len()..])
}

fn parse_number_at(s: &str) -> RedisParser<(usize, &str)> {
    let len = s.chars().position(|c| !c.is_ascii_digit()).ok_or(Incomplete)?;
    Ok((s[..len].parse()?, after_newline_at(s, len)?))
}

/// Parse a Redis bulk string and return the content of that string and the unparsed remainder.
///
/// All bulk strings have the format `$[LENGTH_OF_ITEM_BODY]\r\n[ITEM_BODY]\r\n`
fn parse_redis_bulk_string(s: &str) -> RedisParser<(RedisData, &str)> {
    let (len, rest) = parse_number_at(s)?;
    let content = rest.get(..len).ok_or(Incomplete)?;
    Ok((BulkString(content), after_newline_at(rest, len)?))
}

fn parse_redis_int(s: &str) -> RedisParser<(RedisData, &str)> {
    let (number, rest) = parse_number_at(s)?;
    Ok((Integer(number), rest))
}

fn parse_redis_array(s: &str) -> RedisParser<(RedisData, &str)> {
    let (number_of_elements, mut rest) = parse_number_at(s)?;
    if number_of_elements > MAX_ARRAY_LEN {
        return Err(ArrayTooLong(number_of_elements));
    }

    let mut inner = Vec::with_capacity(number_of_elements);
    for _ in 0..number_of_elements {
        let (next_el, new_rest) = utf8_to_redis_data(rest)?;
        rest = new_rest;
        inner.push(next_el);
    }
    // stored back to front so that `pop` yields the fields in order
    inner.reverse();
    Ok((RedisData::RedisArray(inner), rest))
}

fn parse_redis_error(s: &str) -> RedisParseErr {
    match s.find("\r\n") {
        Some(end) => ErrorReply(s[..end].to_string()),
        None => Incomplete,
    }
}

impl<'a> TryFrom<RedisData<'a>> for &'a str {
    type Error = RedisParseErr;

    fn try_from(val: RedisData<'a>) -> Result<Self, Self::Error> {
        match val {
            RedisData::BulkString(inner) => Ok(inner),
            _ => Err(IncorrectRedisType),
        }
    }
}

impl<'a> TryFrom<RedisStructuredText<'a>> for RedisParseOutput<'a> {
    type Error = RedisParseErr;

    fn try_from(input: RedisStructuredText<'a>) -> Result<RedisParseOutput<'a>, Self::Error> {
        if let RedisData::RedisArray(mut redis_strings) = input.structured_txt {
            let command: &str = redis_strings.pop().ok_or(MissingField)?.try_into()?;
            match command {
                // subscription statuses look like:
                // $11\r\nchat.global\r\n
                // :1\r\n
                // and a PING while subscribed is answered with `pong` and an empty string
                "subscribe" | "unsubscribe" | "pong" => Ok(NonMsg(input.leftover_input)),
                // Messages look like:
                // $11\r\nchat.global\r\n
                // $42\r\n{"id":1,"content":"hi","sender_nick":"bo"}\r\n
                "message" => Ok(Msg(RedisMsg {
                    channel_txt: redis_strings.pop().ok_or(MissingField)?.try_into()?,
                    payload_txt: redis_strings.pop().ok_or(MissingField)?.try_into()?,
                    leftover_input: input.leftover_input,
                })),
                cmd => Err(UnknownCommand(cmd.to_string())),
            }
        } else {
            Err(IncorrectRedisType)
        }
    }
}
