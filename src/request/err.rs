use crate::response::redis::PublishErr;
use crate::store::StoreErr;
use std::fmt;

/// A request that could not be completed; answered with `500` and this text
#[derive(Debug)]
pub enum RequestErr {
    Store(StoreErr),
    Publish(PublishErr),
    Task(String),
}

impl std::error::Error for RequestErr {}
impl warp::reject::Reject for RequestErr {}

impl fmt::Display for RequestErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use RequestErr::*;
        match self {
            Store(e) => write!(f, "{}", e),
            Publish(e) => write!(f, "{}", e),
            Task(e) => write!(f, "request handler failed: {}", e),
        }
    }
}

impl From<StoreErr> for RequestErr {
    fn from(e: StoreErr) -> Self {
        Self::Store(e)
    }
}

impl From<PublishErr> for RequestErr {
    fn from(e: PublishErr) -> Self {
        Self::Publish(e)
    }
}

impl From<tokio::task::JoinError> for RequestErr {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
