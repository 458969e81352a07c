//! Configuration, read from environmental variables (optionally merged from a `.env` file).
//!
//! Every setting is a newtype generated by `from_env_var!`, which supplies the default,
//! the parser, and the message shown when a variable is set to an invalid value.
pub use deployment_cfg::Deployment;
pub use deployment_cfg_types::{Cors, EnvInner};
pub use environmental_variables::EnvVar;
pub use postgres_cfg::Postgres;
pub use postgres_cfg_types::PgSslInner;
pub use redis_cfg::Redis;

use crate::err::FatalErr;
use hashbrown::HashMap;
use std::env;

mod deployment_cfg;
mod deployment_cfg_types;
mod environmental_variables;
mod postgres_cfg;
mod postgres_cfg_types;
mod redis_cfg;
mod redis_cfg_types;

/// Load `.env` (or `.env.production` when `ENV=production`) into the environment.
///
/// Running without the file is fine; variables set in the real environment take precedence.
pub fn merge_dotenv() -> Result<(), FatalErr> {
    let env_file = match env::var("ENV").ok().as_deref() {
        Some("production") => ".env.production",
        Some("development") | None => ".env",
        Some(unsupported) => Err(FatalErr::config("ENV", unsupported, "`production` or `development`"))?,
    };
    match dotenv::from_filename(env_file) {
        Ok(_) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No {} file found; using the environment as-is", env_file);
            Ok(())
        }
        Err(e) => Err(e)?,
    }
}

pub fn from_env<'a>(
    env_vars: HashMap<String, String>,
) -> Result<(Postgres, Redis, Deployment<'a>), FatalErr> {
    let env_vars = EnvVar::new(env_vars);
    log::info!("Environmental variables the relay received: {}", &env_vars);
    Ok((
        Postgres::from_env(env_vars.clone())?,
        Redis::from_env(env_vars.clone())?,
        Deployment::from_env(&env_vars)?,
    ))
}
