use crate::store::StoreErr;
use std::fmt;

/// Errors that prevent the relay from starting
pub enum FatalErr {
    Logger(log::SetLoggerError),
    Dotenv(dotenv::Error),
    UrlParse(url::ParseError),
    ConfigErr(String),
    Postgres(StoreErr),
    Server(warp::Error),
    Task(tokio::task::JoinError),
    StdIo(std::io::Error),
}

impl FatalErr {
    pub fn config<V, T, A>(var: V, value: T, allowed_vals: A) -> Self
    where
        V: fmt::Display,
        T: fmt::Display,
        A: fmt::Display,
    {
        Self::ConfigErr(format!(
            "{0} is set to `{1}`, which is invalid.\n{3:7}{0} must be {2}.",
            var, value, allowed_vals, ""
        ))
    }
}

impl std::error::Error for FatalErr {}
impl fmt::Debug for FatalErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl fmt::Display for FatalErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use FatalErr::*;
        write!(
            f,
            "{}",
            match self {
                Logger(e) => format!("{}", e),
                Dotenv(e) => format!("could not read the .env file.\n{:7}{}", "", e),
                UrlParse(e) => format!("could not parse the database or Redis URL.\n{:7}{}", "", e),
                ConfigErr(e) => e.to_string(),
                Postgres(e) => format!("could not set up Postgres.\n{:7}{}", "", e),
                Server(e) => format!("could not start the HTTP server.\n{:7}{}", "", e),
                Task(e) => format!("a startup task did not complete.\n{:7}{}", "", e),
                StdIo(e) => format!("{}", e),
            }
        )
    }
}

impl From<log::SetLoggerError> for FatalErr {
    fn from(e: log::SetLoggerError) -> Self {
        Self::Logger(e)
    }
}
impl From<dotenv::Error> for FatalErr {
    fn from(e: dotenv::Error) -> Self {
        Self::Dotenv(e)
    }
}
impl From<url::ParseError> for FatalErr {
    fn from(e: url::ParseError) -> Self {
        Self::UrlParse(e)
    }
}
impl From<StoreErr> for FatalErr {
    fn from(e: StoreErr) -> Self {
        Self::Postgres(e)
    }
}
impl From<warp::Error> for FatalErr {
    fn from(e: warp::Error) -> Self {
        Self::Server(e)
    }
}
impl From<tokio::task::JoinError> for FatalErr {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e)
    }
}
impl From<std::io::Error> for FatalErr {
    fn from(e: std::io::Error) -> Self {
        Self::StdIo(e)
    }
}
