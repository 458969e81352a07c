use crate::from_env_var;
use std::{fmt, net::{IpAddr, Ipv4Addr}, path::PathBuf, str::FromStr, time::Duration};
use strum::VariantNames;

from_env_var!(
    /// The current environment, which controls what file to read other ENV vars from
    let name = Env;
    let default: EnvInner = EnvInner::Development;
    let (env_var, allowed_values) = ("ENV", format!("one of: {:?}", EnvInner::VARIANTS));
    let from_str = |s| EnvInner::from_str(s).ok();
);
#[derive(strum_macros::EnumString, strum_macros::VariantNames, Debug, Clone, Copy, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum EnvInner {
    Production,
    Development,
}

from_env_var!(
    /// The address to run the relay on; all interfaces, so a load balancer can reach it
    let name = BindAddr;
    let default: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    let (env_var, allowed_values) = ("BIND", "a valid address (e.g., 127.0.0.1)");
    let from_str = |s| match s {
        "localhost" => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        _ => s.parse().ok(),
    };
);

from_env_var!(
    /// The port to run the relay on
    let name = Port;
    let default: u16 = 8080;
    let (env_var, allowed_values) = ("PORT", "a number between 0 and 65535");
    let from_str = |s| s.parse().ok();
);

from_env_var!(
    /// The directory the chat client's static files are served from
    let name = StaticDir;
    let default: PathBuf = PathBuf::from("./static");
    let (env_var, allowed_values) = ("STATIC_DIR", "a directory path");
    let from_str = |s| Some(PathBuf::from(s));
);

from_env_var!(
    /// How long a stream may sit idle before it is sent a keepalive comment
    let name = KeepaliveInterval;
    let default: Duration = Duration::from_secs(15);
    let (env_var, allowed_values) = ("KEEPALIVE_INTERVAL", "a positive number of milliseconds");
    let from_str = |s| s.parse().ok().filter(|ms| *ms > 0).map(Duration::from_millis);
);

from_env_var!(
    /// How many undelivered messages each connected client may have queued
    let name = QueueCapacity;
    let default: usize = 10;
    let (env_var, allowed_values) = ("CLIENT_QUEUE_CAPACITY", "a number greater than 0");
    let from_str = |s| s.parse().ok().filter(|n| *n > 0);
);

from_env_var!(
    /// How many messages from the topic may wait for the broadcaster
    let name = BroadcastBuffer;
    let default: usize = 100;
    let (env_var, allowed_values) = ("BROADCAST_BUFFER", "a number greater than 0");
    let from_str = |s| s.parse().ok().filter(|n| *n > 0);
);

from_env_var!(
    /// The name this replica reports as the sender of the messages it stores
    let name = PodName;
    let default: Option<String> = None;
    let (env_var, allowed_values) = ("POD_NAME", "any string");
    let from_str = |s| Some(Some(s.to_string()));
);

impl PodName {
    /// `POD_NAME`, falling back to the hostname
    pub fn resolve(&self) -> String {
        match &self.0 {
            Some(name) => name.clone(),
            None => hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// Permissions for Cross Origin Resource Sharing (CORS)
pub struct Cors<'a> {
    pub allowed_headers: Vec<&'a str>,
    pub allowed_methods: Vec<&'a str>,
}
impl fmt::Debug for Cors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allowed headers: {:?}\n      allowed methods: {:?}",
            self.allowed_headers, self.allowed_methods
        )
    }
}
impl std::default::Default for Cors<'_> {
    fn default() -> Self {
        Self {
            allowed_methods: vec!["GET", "POST", "OPTIONS"],
            allowed_headers: vec!["Accept", "Cache-Control", "Content-Type"],
        }
    }
}
