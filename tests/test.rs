use cotalk::message::ChatMessage;
use cotalk::request::Handler;
use cotalk::response::hub::{broadcast_channel, BroadcastTx, Hub};
use cotalk::response::redis::{Publish, PublishErr};
use cotalk::store::{MemStore, Store};

use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

/// Publishes straight into this replica's broadcaster, the way Redis echoes a publish back
/// to the publishing replica's own subscription.
struct Loopback {
    input: BroadcastTx,
    published: AtomicUsize,
}

impl Publish for Loopback {
    fn publish(&self, payload: &str) -> Result<usize, PublishErr> {
        self.published.fetch_add(1, Ordering::SeqCst);
        self.input.forward(Arc::from(payload));
        Ok(1)
    }
}

struct Unreachable;

impl Publish for Unreachable {
    fn publish(&self, _payload: &str) -> Result<usize, PublishErr> {
        Err(PublishErr::Unavailable)
    }
}

struct Relay {
    store: Arc<MemStore>,
    publisher: Arc<Loopback>,
    hub: Arc<Hub>,
    handler: Handler,
    _shutdown: watch::Sender<bool>,
}

fn relay() -> Relay {
    let hub = Hub::new(10);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (input, broadcaster) = broadcast_channel(Arc::clone(&hub), 100);
    tokio::spawn(broadcaster.run(shutdown_rx.clone()));

    let store = Arc::new(MemStore::new());
    let publisher = Arc::new(Loopback {
        input,
        published: AtomicUsize::new(0),
    });
    let handler = Handler::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&publisher) as Arc<dyn Publish>,
        Arc::clone(&hub),
        "pod-a",
        Duration::from_secs(15),
        shutdown_rx,
    );
    Relay {
        store,
        publisher,
        hub,
        handler,
        _shutdown: shutdown_tx,
    }
}

async fn post(relay: &Relay, path: &str, body: &str) -> warp::http::Response<warp::hyper::body::Bytes> {
    warp::test::request()
        .method("POST")
        .path(path)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(body.to_string())
        .reply(&relay.handler.routes())
        .await
}

async fn get_json(relay: &Relay, path: &str) -> Value {
    let res = warp::test::request()
        .path(path)
        .reply(&relay.handler.routes())
        .await;
    assert_eq!(res.status(), 200, "GET {}", path);
    serde_json::from_slice(res.body()).expect("JSON body")
}

#[tokio::test]
async fn send_without_msg_or_nick_does_nothing() {
    let relay = relay();
    for body in &["msg=&nick=ana&color=", "msg=hi&nick=&color=", "msg=hi", ""] {
        let res = post(&relay, "/send", body).await;
        assert_eq!(res.status(), 200, "body `{}`", body);
    }
    assert_eq!(relay.store.message_count(), 0);
    assert_eq!(relay.publisher.published.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sent_message_is_stored_published_and_delivered() {
    let relay = relay();
    let mut client = relay.hub.register();

    let res = post(&relay, "/send", "msg=hi&nick=ana&color=").await;
    assert_eq!(res.status(), 200);

    let payload = timeout(Duration::from_secs(1), client.recv())
        .await
        .expect("delivery")
        .expect("registration is open");
    let msg: ChatMessage = serde_json::from_str(&payload).expect("a chat message");
    assert_eq!(msg.id, 1);
    assert_eq!(msg.content, "hi");
    assert_eq!(msg.sender_nickname, "ana");
    assert_eq!(msg.sender_color, "#ffffff");
    assert_eq!(msg.sender_pod, "pod-a");
    assert!(Regex::new(r"^\d{2}:\d{2}:\d{2}$")
        .expect("valid regex")
        .is_match(&msg.timestamp));

    assert_eq!(relay.store.message_count(), 1);
    assert_eq!(relay.store.select_user_color("ana").expect("store"), Some("#ffffff".to_string()));
}

#[tokio::test]
async fn failed_append_is_a_500_and_nothing_is_published() {
    let relay = relay();
    relay.store.fail(true);

    let res = post(&relay, "/send", "msg=hi&nick=ana&color=%23ff0000").await;

    assert_eq!(res.status(), 500);
    assert!(String::from_utf8_lossy(res.body()).contains("storage is unavailable"));
    assert_eq!(relay.publisher.published.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_publish_is_a_500_but_the_message_is_kept() {
    let relay = relay();
    let store = Arc::new(MemStore::new());
    let (_shutdown, shutdown_rx) = watch::channel(false);
    let handler = Handler::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(Unreachable),
        Arc::clone(&relay.hub),
        "pod-a",
        Duration::from_secs(15),
        shutdown_rx,
    );

    let res = warp::test::request()
        .method("POST")
        .path("/send")
        .header("content-type", "application/x-www-form-urlencoded")
        .body("msg=hi&nick=ana")
        .reply(&handler.routes())
        .await;

    assert_eq!(res.status(), 500);
    assert_eq!(store.message_count(), 1);
}

#[tokio::test]
async fn history_pages_back_newest_first() -> Result<(), Box<dyn std::error::Error>> {
    let relay = relay();
    relay.store.upsert_user_color("ana", "#ff0000")?;
    for i in 1..=35 {
        let nick = if i % 2 == 0 { "bo" } else { "ana" };
        relay.store.append_message(&format!("msg {}", i), "pod-b", nick)?;
    }

    let ids = |page: &Value| -> Vec<i64> {
        page.as_array()
            .expect("array")
            .iter()
            .map(|msg| msg["id"].as_i64().expect("id"))
            .collect()
    };

    let newest = get_json(&relay, "/history").await;
    assert_eq!(ids(&newest), (6..=35).rev().collect::<Vec<_>>());
    assert_eq!(newest[0]["sender_nick"], "ana");
    assert_eq!(newest[0]["sender_color"], "#ff0000");
    assert_eq!(newest[1]["sender_color"], "#ffffff");
    assert_eq!(newest[0]["sender_pod"], "pod-b");

    let older = get_json(&relay, "/history?before_id=6").await;
    assert_eq!(ids(&older), vec![5, 4, 3, 2, 1]);

    let empty = get_json(&relay, "/history?before_id=").await;
    assert_eq!(ids(&empty), ids(&newest));

    let not_a_number = get_json(&relay, "/history?before_id=abc").await;
    assert!(ids(&not_a_number).is_empty());
    Ok(())
}

#[tokio::test]
async fn login_and_update_round_trip_a_color() {
    let relay = relay();

    let unknown = get_json(&relay, "/login?nick=zoe").await;
    assert_eq!(unknown, serde_json::json!({"nickname": "zoe", "color_code": ""}));

    assert_eq!(post(&relay, "/update", "nick=zoe&color=%2300ff00").await.status(), 200);
    let known = get_json(&relay, "/login?nick=zoe").await;
    assert_eq!(known["color_code"], "#00ff00");

    assert_eq!(post(&relay, "/update", "nick=zoe&color=").await.status(), 200);
    let reset = get_json(&relay, "/login?nick=zoe").await;
    assert_eq!(reset["color_code"], "#ffffff");

    assert_eq!(post(&relay, "/update", "nick=&color=%23000000").await.status(), 200);
    assert_eq!(relay.store.select_user_color("").expect("store"), None);
}

#[tokio::test]
async fn failed_update_is_a_500() {
    let relay = relay();
    relay.store.fail(true);
    assert_eq!(post(&relay, "/update", "nick=zoe&color=%2300ff00").await.status(), 500);
}

#[tokio::test]
async fn health_and_status() {
    let relay = relay();
    let res = warp::test::request()
        .path("/health")
        .reply(&relay.handler.routes())
        .await;
    assert_eq!(res.status(), 200);
    assert_eq!(&res.body()[..], b"OK");

    let _clients = (relay.hub.register(), relay.hub.register());
    let status = get_json(&relay, "/status").await;
    assert_eq!(status["pod"], "pod-a");
    assert_eq!(status["connections"], 2);
    assert_eq!(status["registered"], 2);
    assert_eq!(status["dropped"], 0);
}

#[tokio::test]
async fn unknown_routes_are_rejected() {
    let relay = relay();
    let res = warp::test::request()
        .path("/nope")
        .reply(&relay.handler.routes())
        .await;
    assert_eq!(res.status(), 404);

    let res = warp::test::request()
        .method("GET")
        .path("/send")
        .reply(&relay.handler.routes())
        .await;
    assert_eq!(res.status(), 405);
}

/// Read from `conn` until `needle` shows up, returning everything read so far
async fn read_until(conn: &mut TcpStream, seen: &mut String, needle: &str) {
    let mut buf = [0_u8; 1024];
    while !seen.contains(needle) {
        let n = timeout(Duration::from_secs(2), conn.read(&mut buf))
            .await
            .expect("server answered in time")
            .expect("read");
        assert!(n > 0, "server closed the stream; got {:?}", seen);
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
}

#[tokio::test]
async fn stream_delivers_posted_messages_as_events() {
    let relay = relay();
    let (addr, server) = warp::serve(relay.handler.routes()).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    let mut conn = TcpStream::connect(addr).await.expect("connect");
    conn.write_all(b"GET /stream?nick=ana HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .expect("write request");

    let mut seen = String::new();
    read_until(&mut conn, &mut seen, "\r\n\r\n").await;
    let head = seen.to_lowercase();
    assert!(head.starts_with("http/1.1 200"));
    assert!(head.contains("content-type: text/event-stream"));
    assert!(head.contains("cache-control: no-cache"));
    assert_eq!(relay.hub.len(), 1);

    assert_eq!(post(&relay, "/send", "msg=hi&nick=bo&color=%23123456").await.status(), 200);
    read_until(&mut conn, &mut seen, r##""sender_color":"#123456""##).await;
    assert!(seen.contains(r#"data: {"id":1,"content":"hi""#));

    drop(conn);
    timeout(Duration::from_secs(2), async {
        while !relay.hub.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("the session deregisters once the client goes away");
    assert_eq!(relay.hub.stats().deregistered, 1);
}
