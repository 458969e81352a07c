//! The Redis pub/sub channel every replica publishes chat messages to and receives them from.
mod bridge;
mod connection;
mod msg;
mod publisher;

pub use bridge::TopicBridge;
pub use connection::RedisConnErr;
pub use msg::RedisParseErr;
pub use publisher::{Publish, PublishErr, RedisPublisher};

#[cfg(feature = "bench")]
pub use msg::{RedisMsg, RedisParseOutput};

enum RedisCmd<'a> {
    Auth(&'a str),
    Ping,
    Subscribe(&'a str),
    Publish(&'a str, &'a str),
}

impl RedisCmd<'_> {
    fn into_sendable(self) -> Vec<u8> {
        match self {
            RedisCmd::Auth(pass) => bulk_array(&[b"auth", pass.as_bytes()]),
            RedisCmd::Ping => b"PING\r\n".to_vec(),
            RedisCmd::Subscribe(channel) => bulk_array(&[b"subscribe", channel.as_bytes()]),
            RedisCmd::Publish(channel, payload) => {
                bulk_array(&[b"publish", channel.as_bytes(), payload.as_bytes()])
            }
        }
    }
}

fn bulk_array(items: &[&[u8]]) -> Vec<u8> {
    let mut cmd = [b"*", items.len().to_string().as_bytes(), b"\r\n"].concat();
    for &item in items {
        cmd.extend_from_slice(
            &[
                b"$",
                item.len().to_string().as_bytes(),
                b"\r\n",
                item,
                b"\r\n",
            ]
            .concat(),
        );
    }
    cmd
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subscribe_cmd() {
        let cmd = RedisCmd::Subscribe("chat.global").into_sendable();
        assert_eq!(cmd, b"*2\r\n$9\r\nsubscribe\r\n$11\r\nchat.global\r\n".to_vec());
    }

    #[test]
    fn publish_cmd_counts_bytes_not_chars() {
        let cmd = RedisCmd::Publish("ns:chat.global", "héllo").into_sendable();
        assert_eq!(
            cmd,
            "*3\r\n$7\r\npublish\r\n$14\r\nns:chat.global\r\n$6\r\nhéllo\r\n"
                .as_bytes()
                .to_vec()
        );
    }

    #[test]
    fn auth_cmd() {
        let cmd = RedisCmd::Auth("secret").into_sendable();
        assert_eq!(cmd, b"*2\r\n$4\r\nauth\r\n$6\r\nsecret\r\n".to_vec());
    }
}
