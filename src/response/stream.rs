//! Stream hub deliveries to one connected browser.
pub use sse::{Closed, Frame, Session, OUTBOUND_BUFFER};

mod sse;
