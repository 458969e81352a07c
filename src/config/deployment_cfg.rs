use super::{deployment_cfg_types::*, EnvVar};
use crate::err::FatalErr;

#[derive(Debug, Default)]
pub struct Deployment<'a> {
    pub env: Env,
    pub address: BindAddr,
    pub port: Port,
    pub static_dir: StaticDir,
    pub keepalive: KeepaliveInterval,
    pub queue_capacity: QueueCapacity,
    pub broadcast_buffer: BroadcastBuffer,
    pub pod_name: PodName,
    pub cors: Cors<'a>,
}

impl Deployment<'_> {
    pub fn from_env(env: &EnvVar) -> Result<Self, FatalErr> {
        let cfg = Self {
            env: Env::default().maybe_update(env.get("ENV"))?,
            address: BindAddr::default().maybe_update(env.get("BIND"))?,
            port: Port::default().maybe_update(env.get("PORT"))?,
            static_dir: StaticDir::default().maybe_update(env.get("STATIC_DIR"))?,
            keepalive: KeepaliveInterval::default().maybe_update(env.get("KEEPALIVE_INTERVAL"))?,
            queue_capacity: QueueCapacity::default()
                .maybe_update(env.get("CLIENT_QUEUE_CAPACITY"))?,
            broadcast_buffer: BroadcastBuffer::default()
                .maybe_update(env.get("BROADCAST_BUFFER"))?,
            pod_name: PodName::default().maybe_update(env.get("POD_NAME"))?,
            cors: Cors::default(),
        };
        log::info!("Using deployment configuration:\n {:#?}", &cfg);
        Ok(cfg)
    }
}
