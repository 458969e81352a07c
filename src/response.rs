//! Getting published messages from the topic out to every connected browser.
pub mod hub;
pub mod redis;
pub mod stream;
