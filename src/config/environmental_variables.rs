use hashbrown::HashMap;
use std::fmt;
use url::Url;

#[derive(Debug, Clone)]
pub struct EnvVar(pub HashMap<String, String>);
impl std::ops::Deref for EnvVar {
    type Target = HashMap<String, String>;
    fn deref(&self) -> &HashMap<String, String> {
        &self.0
    }
}

impl EnvVar {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self(vars)
    }

    pub(crate) fn maybe_add_env_var(&mut self, key: &str, maybe_value: Option<impl ToString>) {
        if let Some(value) = maybe_value {
            self.0.insert(key.to_string(), value.to_string());
        }
    }

    /// Fill in `DB_*` variables from a `postgres://` URL.  Explicit variables win.
    pub(crate) fn update_with_postgres_url(mut self, url_str: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url_str)?;
        let none_if_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        let ssl_mode = url
            .query_pairs()
            .find(|(key, _)| key == "sslmode")
            .map(|(_, val)| val.to_string());

        let from_url = [
            ("DB_USER", none_if_empty(url.username())),
            ("DB_PASSWORD", url.password().map(String::from)),
            ("DB_HOST", url.host_str().map(String::from)),
            ("DB_PORT", url.port().map(|p| p.to_string())),
            ("DB_NAME", none_if_empty(url.path().trim_start_matches('/'))),
            ("DB_SSLMODE", ssl_mode),
        ];
        for (key, value) in from_url.iter() {
            if !self.contains_key(*key) {
                self.maybe_add_env_var(key, value.clone());
            }
        }
        Ok(self)
    }

    /// Fill in `REDIS_*` variables from a `redis://` URL.  Explicit variables win.
    pub(crate) fn update_with_redis_url(mut self, url_str: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url_str)?;
        let from_url = [
            ("REDIS_PASSWORD", url.password().map(String::from)),
            ("REDIS_HOST", url.host_str().map(String::from)),
            ("REDIS_PORT", url.port().map(|p| p.to_string())),
        ];
        for (key, value) in from_url.iter() {
            if !self.contains_key(*key) {
                self.maybe_add_env_var(key, value.clone());
            }
        }
        Ok(self)
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut result = String::new();
        for env_var in &[
            "ENV",
            "RUST_LOG",
            "BIND",
            "PORT",
            "STATIC_DIR",
            "KEEPALIVE_INTERVAL",
            "CLIENT_QUEUE_CAPACITY",
            "BROADCAST_BUFFER",
            "POD_NAME",
            "DATABASE_URL",
            "DB_USER",
            "DB_PORT",
            "DB_HOST",
            "DB_NAME",
            "DB_SSLMODE",
            "REDIS_URL",
            "REDIS_HOST",
            "REDIS_PORT",
            "REDIS_NAMESPACE",
            "REDIS_CHANNEL",
        ] {
            if let Some(value) = self.get(*env_var) {
                result = format!("{}\n    {}: {}", result, env_var, value)
            }
        }
        write!(f, "{}", result)
    }
}

#[macro_export]
macro_rules! from_env_var {
    ($(#[$outer:meta])*
     let name = $name:ident;
     let default: $type:ty = $inner:expr;
     let (env_var, allowed_values) = ($env_var:tt, $allowed_values:expr);
     let from_str = |$arg:ident| $body:expr;
    ) => {
        $(#[$outer])*
        #[derive(Clone)]
        pub struct $name(pub $type);
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }
        impl std::ops::Deref for $name {
            type Target = $type;
            fn deref(&self) -> &$type {
                &self.0
            }
        }
        impl std::default::Default for $name {
            fn default() -> Self {
                $name($inner)
            }
        }
        impl $name {
            fn inner_from_str($arg: &str) -> Option<$type> {
                $body
            }
            pub(crate) fn maybe_update(
                self,
                var: Option<&String>,
            ) -> Result<Self, crate::err::FatalErr> {
                Ok(match var {
                    Some(empty_string) if empty_string.is_empty() => Self::default(),
                    Some(value) => Self(Self::inner_from_str(value).ok_or_else(|| {
                        crate::err::FatalErr::config($env_var, value, &$allowed_values)
                    })?),
                    None => self,
                })
            }
        }
    };
}
