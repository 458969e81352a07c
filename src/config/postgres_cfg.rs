use super::{postgres_cfg_types::*, EnvVar};
use crate::err::FatalErr;

#[derive(Debug, Clone)]
pub struct Postgres {
    pub user: PgUser,
    pub host: PgHost,
    pub password: PgPass,
    pub database: PgDatabase,
    pub port: PgPort,
    pub ssl_mode: PgSslMode,
}

impl Postgres {
    /// Configure Postgres and return a new `Postgres` struct.
    ///
    /// `DATABASE_URL` fills in any of the `DB_*` variables that are not set explicitly.
    pub fn from_env(env: EnvVar) -> Result<Self, FatalErr> {
        let env = match env.get("DATABASE_URL").cloned() {
            Some(url_str) => env.update_with_postgres_url(&url_str)?,
            None => env,
        };

        let cfg = Self {
            user: PgUser::default().maybe_update(env.get("DB_USER"))?,
            host: PgHost::default().maybe_update(env.get("DB_HOST"))?,
            password: PgPass::default().maybe_update(env.get("DB_PASSWORD"))?,
            database: PgDatabase::default().maybe_update(env.get("DB_NAME"))?,
            port: PgPort::default().maybe_update(env.get("DB_PORT"))?,
            ssl_mode: PgSslMode::default().maybe_update(env.get("DB_SSLMODE"))?,
        };

        log::info!("Postgres configuration:\n{:#?}", &cfg.redacted());
        Ok(cfg)
    }

    fn redacted(&self) -> Self {
        Self {
            password: PgPass(self.password.as_ref().map(|_| "********".to_string())),
            ..self.clone()
        }
    }
}
