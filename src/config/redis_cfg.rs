use super::{redis_cfg_types::*, EnvVar};
use crate::err::FatalErr;

#[derive(Debug, Default, Clone)]
pub struct Redis {
    pub password: RedisPass,
    pub port: RedisPort,
    pub host: RedisHost,
    pub namespace: RedisNamespace,
    pub channel: RedisChannel,
}

impl Redis {
    pub fn from_env(env: EnvVar) -> Result<Self, FatalErr> {
        let env = match env.get("REDIS_URL").cloned() {
            Some(url_str) => env.update_with_redis_url(&url_str)?,
            None => env,
        };

        let cfg = Self {
            password: RedisPass::default().maybe_update(env.get("REDIS_PASSWORD"))?,
            port: RedisPort::default().maybe_update(env.get("REDIS_PORT"))?,
            host: RedisHost::default().maybe_update(env.get("REDIS_HOST"))?,
            namespace: RedisNamespace::default().maybe_update(env.get("REDIS_NAMESPACE"))?,
            channel: RedisChannel::default().maybe_update(env.get("REDIS_CHANNEL"))?,
        };

        log::info!("Redis configuration:\n{:#?}", &cfg.redacted());
        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", *self.host, *self.port)
    }

    /// The channel name on the wire, including the namespace (if any)
    pub fn topic(&self) -> String {
        match &*self.namespace {
            Some(ns) => format!("{}:{}", ns, *self.channel),
            None => self.channel.0.clone(),
        }
    }

    fn redacted(&self) -> Self {
        Self {
            password: RedisPass(self.password.as_ref().map(|_| "********".to_string())),
            ..self.clone()
        }
    }
}
