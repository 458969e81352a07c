use crate::from_env_var;

from_env_var!(
    /// The host where Redis is running
    let name = RedisHost;
    let default: String = "127.0.0.1".to_string();
    let (env_var, allowed_values) = ("REDIS_HOST", "a host name or address (e.g., 127.0.0.1)");
    let from_str = |s| Some(s.to_string());
);

from_env_var!(
    /// The port Redis is running on
    let name = RedisPort;
    let default: u16 = 6379;
    let (env_var, allowed_values) = ("REDIS_PORT", "a number between 0 and 65535");
    let from_str = |s| s.parse().ok();
);

from_env_var!(
    /// The password to use for Redis
    let name = RedisPass;
    let default: Option<String> = None;
    let (env_var, allowed_values) = ("REDIS_PASSWORD", "any string");
    let from_str = |s| Some(Some(s.to_string()));
);

from_env_var!(
    /// A prefix for the pub/sub channel, for sharing one Redis between deployments
    let name = RedisNamespace;
    let default: Option<String> = None;
    let (env_var, allowed_values) = ("REDIS_NAMESPACE", "any string");
    let from_str = |s| Some(Some(s.to_string()));
);

from_env_var!(
    /// The pub/sub channel every replica publishes to and subscribes on
    let name = RedisChannel;
    let default: String = "chat.global".to_string();
    let (env_var, allowed_values) = ("REDIS_CHANNEL", "a channel name without whitespace");
    let from_str = |s| Some(s.to_string()).filter(|s| !s.chars().any(char::is_whitespace));
);
