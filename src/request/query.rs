//! Query parameters and form bodies, each with lenient defaults.
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::Filter as WarpFilter;

/// Form bodies are a few short fields; anything larger is not a chat message
const FORM_LIMIT: u64 = 64 * 1024;

macro_rules! make_query_type {
    ($name:tt => $parameter:tt:$type:ty) => {
        #[derive(Deserialize, Debug, Default)]
        pub(crate) struct $name {
            #[serde(default)]
            pub(crate) $parameter: $type,
        }
        impl $name {
            pub(crate) fn to_filter() -> BoxedFilter<(Self,)> {
                warp::query()
                    .or(warp::any().map(Self::default))
                    .unify()
                    .boxed()
            }
        }
    };
}
make_query_type!(Nick => nick: String);
make_query_type!(BeforeId => before_id: String);
impl BeforeId {
    /// A missing `before_id` means "from the newest message"; one that is not a number
    /// counts as 0, which selects nothing.
    pub(crate) fn parsed(&self) -> Option<i64> {
        match self.before_id.trim() {
            "" => None,
            id => Some(id.parse().unwrap_or(0)),
        }
    }
}

/// The body of `POST /send`
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(crate) struct SendForm {
    pub(crate) msg: String,
    pub(crate) nick: String,
    pub(crate) color: String,
}

/// The body of `POST /update`
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub(crate) struct UpdateForm {
    pub(crate) nick: String,
    pub(crate) color: String,
}

pub(crate) fn form<T>() -> BoxedFilter<(T,)>
where
    T: for<'de> Deserialize<'de> + Send + 'static,
{
    warp::body::content_length_limit(FORM_LIMIT)
        .and(warp::body::form())
        .boxed()
}
