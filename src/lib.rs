//! A real-time chat relay.
//!
//! Browsers post chat messages over HTTP and follow a Server Sent Events stream to see
//! everyone's messages as they arrive.  Any number of relay replicas can run behind a load
//! balancer: each message is recorded in Postgres and then published on a Redis pub/sub
//! channel that every replica subscribes to, so every browser sees every message no
//! matter which replica it is connected to.
//!
//! # Notes on data flow
//! * **Client POST → Postgres → Redis**:
//! The `/send` handler stores the message (Postgres assigns its id), encodes it as JSON,
//! and publishes the JSON on the topic.  A message that could not be stored is never
//! published.
//!
//! * **Redis → TopicBridge → Broadcaster**:
//! Each replica holds exactly one subscription.  The `TopicBridge` hands every payload,
//! still encoded, to the `Broadcaster`'s bounded input queue; if the broadcaster falls
//! behind, payloads are dropped and counted rather than stalling the subscription.
//!
//! * **Broadcaster → Hub → Session**:
//! The `Hub` offers each payload once to every connected client's small private queue.
//! A full queue means that client misses the message; no client ever waits on another.
//!
//! * **Session → Browser**:
//! One `Session` task per open `/stream` request writes `data:` frames as payloads arrive
//! and a `:keepalive` comment whenever the connection has been idle for the keepalive
//! interval.  When the browser goes away (or the server shuts down) the session ends and
//! its registration is released.
pub mod config;
pub mod err;
pub mod message;
pub mod request;
pub mod response;
pub mod store;
