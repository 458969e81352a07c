//! The HTTP surface: the event stream plus the small JSON/form API around it.
mod err;
mod query;

pub use err::RequestErr;

use crate::message::{color_or_default, timestamp_now, ChatMessage, UserProfile};
use crate::response::hub::{Hub, Stats};
use crate::response::redis::Publish;
use crate::response::stream::{self, Session};
use crate::store::{Store, HISTORY_PAGE};

use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_stream::wrappers::ReceiverStream;
use warp::filters::BoxedFilter;
use warp::http::{header, HeaderValue, StatusCode};
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Helper macro to match on the first of any of the provided filters
macro_rules! any_of {
    ($filter:expr, $($other_filter:expr),*) => {
        $filter$(.or($other_filter).unify())*.boxed()
    };
}

/// What `GET /status` reports
#[derive(Debug, Serialize)]
struct Status<'a> {
    pod: &'a str,
    #[serde(flatten)]
    hub: Stats,
}

#[derive(Clone)]
pub struct Handler {
    store: Arc<dyn Store>,
    publisher: Arc<dyn Publish>,
    hub: Arc<Hub>,
    pod: Arc<str>,
    keepalive: Duration,
    shutdown: watch::Receiver<bool>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Handler")
            .field("hub", &self.hub)
            .field("pod", &self.pod)
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

impl Handler {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn Publish>,
        hub: Arc<Hub>,
        pod: &str,
        keepalive: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            publisher,
            hub,
            pod: Arc::from(pod),
            keepalive,
            shutdown,
        }
    }

    /// Every API route, with request failures turned into `500` responses
    pub fn routes(&self) -> BoxedFilter<(Response,)> {
        any_of!(
            self.stream(),
            self.send(),
            self.history(),
            self.login(),
            self.update(),
            self.health(),
            self.status()
        )
        .recover(Self::err)
        .unify()
        .boxed()
    }

    /// `GET /stream?nick=`
    pub fn stream(&self) -> BoxedFilter<(Response,)> {
        let handler = self.clone();
        warp::path!("stream")
            .and(warp::get())
            .and(query::Nick::to_filter())
            .map(move |q: query::Nick| handler.open_stream(q.nick))
            .boxed()
    }

    /// `POST /send` with the form fields `msg`, `nick`, and `color`
    pub fn send(&self) -> BoxedFilter<(Response,)> {
        let handler = self.clone();
        warp::path!("send")
            .and(warp::post())
            .and(query::form())
            .and_then(move |form: query::SendForm| handler.clone().send_message(form))
            .boxed()
    }

    /// `GET /history?before_id=`
    pub fn history(&self) -> BoxedFilter<(Response,)> {
        let store = Arc::clone(&self.store);
        warp::path!("history")
            .and(warp::get())
            .and(query::BeforeId::to_filter())
            .and_then(move |q: query::BeforeId| {
                let store = Arc::clone(&store);
                async move {
                    let before_id = q.parsed();
                    let page = blocking(move || Ok(store.select_history(before_id, HISTORY_PAGE)?))
                        .await?;
                    Ok::<_, Rejection>(warp::reply::json(&page).into_response())
                }
            })
            .boxed()
    }

    /// `GET /login?nick=`
    pub fn login(&self) -> BoxedFilter<(Response,)> {
        let store = Arc::clone(&self.store);
        warp::path!("login")
            .and(warp::get())
            .and(query::Nick::to_filter())
            .and_then(move |q: query::Nick| {
                let store = Arc::clone(&store);
                async move {
                    let nickname = q.nick;
                    let profile = blocking(move || {
                        let color_code = store.select_user_color(&nickname)?.unwrap_or_default();
                        Ok(UserProfile {
                            nickname,
                            color_code,
                        })
                    })
                    .await?;
                    Ok::<_, Rejection>(warp::reply::json(&profile).into_response())
                }
            })
            .boxed()
    }

    /// `POST /update` with the form fields `nick` and `color`
    pub fn update(&self) -> BoxedFilter<(Response,)> {
        let store = Arc::clone(&self.store);
        warp::path!("update")
            .and(warp::post())
            .and(query::form())
            .and_then(move |form: query::UpdateForm| {
                let store = Arc::clone(&store);
                async move {
                    if !form.nick.is_empty() {
                        let color = color_or_default(&form.color).to_string();
                        blocking(move || Ok(store.upsert_user_color(&form.nick, &color)?)).await?;
                    }
                    Ok::<_, Rejection>(StatusCode::OK.into_response())
                }
            })
            .boxed()
    }

    pub fn health(&self) -> BoxedFilter<(Response,)> {
        warp::path!("health")
            .and(warp::get())
            .map(|| "OK".into_response())
            .boxed()
    }

    pub fn status(&self) -> BoxedFilter<(Response,)> {
        let (hub, pod) = (Arc::clone(&self.hub), Arc::clone(&self.pod));
        warp::path!("status")
            .and(warp::get())
            .map(move || {
                let status = Status {
                    pod: &pod,
                    hub: hub.stats(),
                };
                warp::reply::json(&status).into_response()
            })
            .boxed()
    }

    /// Answer a failed request with `500` and the error's text; leave other rejections
    /// (unknown path, wrong method) to the next filter.
    pub async fn err(rejection: Rejection) -> Result<Response, Rejection> {
        match rejection.find::<RequestErr>() {
            Some(e) => {
                log::error!("{}", e);
                let reply = warp::reply::with_status(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR);
                Ok(reply.into_response())
            }
            None => Err(rejection),
        }
    }

    fn open_stream(&self, nick: String) -> Response {
        let nickname = match nick.trim() {
            "" => "Unknown".to_string(),
            nick => nick.to_string(),
        };
        let (out, frames) = mpsc::channel(stream::OUTBOUND_BUFFER);
        let session = Session::new(self.hub.register(), self.keepalive, nickname, Arc::clone(&self.pod));
        task::spawn(session.run(out, self.shutdown.clone()));

        let body = ReceiverStream::new(frames).map(|frame| Ok::<_, Infallible>(frame.to_wire()));
        let mut res = Response::new(Body::wrap_stream(body));
        let headers = res.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        res
    }

    /// Record the message, then publish it to every replica (this one included).
    ///
    /// Nothing is published unless the message was stored.
    async fn send_message(self, form: query::SendForm) -> Result<Response, Rejection> {
        if form.msg.is_empty() || form.nick.is_empty() {
            return Ok(StatusCode::OK.into_response());
        }
        let (store, publisher) = (self.store, self.publisher);
        let pod = self.pod.to_string();
        let color = color_or_default(&form.color).to_string();

        let (msg, receivers) = blocking(move || {
            if let Err(e) = store.upsert_user_color(&form.nick, &color) {
                log::warn!("Could not save the color for {}: {}", form.nick, e);
            }
            let id = store.append_message(&form.msg, &pod, &form.nick)?;
            let msg = ChatMessage {
                id,
                content: form.msg,
                sender_pod: pod,
                sender_nickname: form.nick,
                sender_color: color,
                timestamp: timestamp_now(),
            };
            let receivers = publisher.publish(&msg.to_json_string())?;
            Ok((msg, receivers))
        })
        .await?;

        log::debug!(
            "Message {} from {} published to {} replica(s)",
            msg.id,
            msg.sender_nickname,
            receivers
        );
        Ok(StatusCode::OK.into_response())
    }
}

/// Run blocking storage or publish work off the async executor
async fn blocking<T, F>(work: F) -> Result<T, Rejection>
where
    F: FnOnce() -> Result<T, RequestErr> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(warp::reject::custom(e)),
        Err(e) => Err(warp::reject::custom(RequestErr::from(e))),
    }
}
