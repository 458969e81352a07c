//! The single subscription that feeds this replica's hub.
use super::connection::RedisConn;
use crate::config;
use crate::response::hub::BroadcastTx;

use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

const MIN_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Subscribes to the topic and forwards every payload, undecoded, to the broadcaster.
#[derive(Debug)]
pub struct TopicBridge {
    redis_cfg: config::Redis,
    input: BroadcastTx,
}

impl TopicBridge {
    pub fn new(redis_cfg: &config::Redis, input: BroadcastTx) -> Self {
        Self {
            redis_cfg: redis_cfg.clone(),
            input,
        }
    }

    /// Stay subscribed until shutdown, reconnecting with exponential backoff after any
    /// failure.  The backoff resets once a subscription succeeds.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = MIN_BACKOFF;
        loop {
            let subscribed = tokio::select! {
                conn = RedisConn::subscribe(&self.redis_cfg) => conn,
                _ = shutdown.changed() => break,
            };

            match subscribed {
                Ok(mut conn) => {
                    log::info!("Subscribed to `{}` at {}", conn.topic(), self.redis_cfg.addr());
                    backoff = MIN_BACKOFF;
                    loop {
                        tokio::select! {
                            next = conn.next_payload() => match next {
                                Ok(payload) => {
                                    self.input.forward(payload);
                                }
                                Err(e) => {
                                    log::error!("Lost the Redis subscription: {}", e);
                                    break;
                                }
                            },
                            _ = shutdown.changed() => {
                                log::info!("Topic bridge stopped");
                                return;
                            }
                        }
                    }
                }
                Err(e) => log::error!("Could not subscribe to Redis: {}", e),
            }

            log::info!("Resubscribing in {:?}", backoff);
            tokio::select! {
                _ = time::sleep(backoff) => {},
                _ = shutdown.changed() => break,
            }
            backoff = next_backoff(backoff);
        }
        log::info!("Topic bridge stopped");
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::hub::{broadcast_channel, Hub, Payload};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const WAIT: Duration = Duration::from_secs(5);

    fn redis_at(port: &str) -> config::Redis {
        let vars = [("REDIS_HOST", "127.0.0.1"), ("REDIS_PORT", port)]
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Redis::from_env(config::EnvVar::new(vars)).expect("valid config")
    }

    /// Read what the bridge sends until `needle` has arrived
    async fn read_until(conn: &mut TcpStream, needle: &str) -> String {
        let mut seen = Vec::new();
        let mut chunk = [0_u8; 256];
        while !String::from_utf8_lossy(&seen).contains(needle) {
            let n = time::timeout(WAIT, conn.read(&mut chunk))
                .await
                .expect("bridge wrote in time")
                .expect("read from the bridge");
            assert!(n > 0, "bridge hung up before sending {:?}", needle);
            seen.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&seen).into_owned()
    }

    /// Play Redis for one subscription handshake
    async fn accept_subscription(listener: &TcpListener) -> TcpStream {
        let (mut conn, _) = time::timeout(WAIT, listener.accept())
            .await
            .expect("bridge connected in time")
            .expect("accept");
        read_until(&mut conn, "PING\r\n").await;
        conn.write_all(b"+PONG\r\n").await.expect("write pong");
        let cmd = read_until(&mut conn, "$11\r\nchat.global\r\n").await;
        assert!(cmd.contains("$9\r\nsubscribe\r\n"), "expected a subscribe, got {:?}", cmd);
        conn.write_all(b"*3\r\n$9\r\nsubscribe\r\n$11\r\nchat.global\r\n:1\r\n")
            .await
            .expect("write subscribe confirmation");
        conn
    }

    fn message(payload: &str) -> String {
        format!(
            "*3\r\n$7\r\nmessage\r\n$11\r\nchat.global\r\n${}\r\n{}\r\n",
            payload.len(),
            payload
        )
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut delays = vec![MIN_BACKOFF];
        while delays.len() < 10 {
            let last = delays[delays.len() - 1];
            delays.push(next_backoff(last));
        }
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[6], Duration::from_millis(6400));
        assert_eq!(delays[7], MAX_BACKOFF);
        assert_eq!(delays[9], MAX_BACKOFF);
    }

    #[tokio::test]
    async fn forwards_payloads_and_resubscribes_after_losing_redis() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port().to_string();

        let hub = Hub::new(10);
        let mut client = hub.register();
        let (input, broadcaster) = broadcast_channel(Arc::clone(&hub), 10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(broadcaster.run(shutdown_rx.clone()));
        let bridge = tokio::spawn(TopicBridge::new(&redis_at(&port), input).run(shutdown_rx));

        let mut first = accept_subscription(&listener).await;
        first.write_all(message("hello").as_bytes()).await.expect("publish");
        let delivered = time::timeout(WAIT, client.recv()).await.expect("delivered in time");
        assert_eq!(delivered, Some(Payload::from("hello")));

        drop(first);
        let mut second = accept_subscription(&listener).await;
        second.write_all(message("again").as_bytes()).await.expect("publish");
        let delivered = time::timeout(WAIT, client.recv()).await.expect("delivered in time");
        assert_eq!(delivered, Some(Payload::from("again")));

        shutdown_tx.send(true).expect("bridge is listening");
        time::timeout(WAIT, bridge)
            .await
            .expect("bridge should stop on shutdown")
            .expect("bridge panicked");
    }

    #[tokio::test]
    async fn shutdown_stops_a_bridge_that_cannot_connect() {
        let (input, _broadcaster) = broadcast_channel(Hub::new(10), 10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bridge = tokio::spawn(TopicBridge::new(&redis_at("1"), input).run(shutdown_rx));
        time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).expect("bridge is listening");

        time::timeout(WAIT, bridge)
            .await
            .expect("bridge should stop on shutdown")
            .expect("bridge panicked");
    }
}
