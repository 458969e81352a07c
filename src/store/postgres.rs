//! Postgres queries
use super::{Result, Store};
use crate::config::{self, PgSslInner};
use crate::message::{ChatMessage, DEFAULT_COLOR};

use ::postgres::{self, config::SslMode, NoTls};
use r2d2_postgres::PostgresConnectionManager;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS messages (
        id SERIAL PRIMARY KEY,
        content TEXT,
        sender_pod TEXT,
        sender_nick TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS users (
        nickname TEXT PRIMARY KEY,
        color_code TEXT
    )",
];

const SELECT_HISTORY: &str = "
SELECT m.id, m.content, m.sender_pod, m.sender_nick,
       COALESCE(u.color_code, $1), to_char(m.created_at, 'HH24:MI:SS')
  FROM messages m
LEFT JOIN users u ON m.sender_nick = u.nickname";

#[derive(Clone, Debug)]
pub struct PgPool(r2d2::Pool<PostgresConnectionManager<NoTls>>);

impl PgPool {
    /// Connect to Postgres, creating the database and its tables if they are missing.
    ///
    /// Blocks; call from `spawn_blocking` inside the runtime.
    pub fn new(pg_cfg: &config::Postgres) -> Result<Self> {
        Self::ensure_database(pg_cfg)?;

        let mut cfg = Self::base_config(pg_cfg);
        cfg.dbname(&*pg_cfg.database);
        cfg.connect(NoTls)?;

        let manager = PostgresConnectionManager::new(cfg, NoTls);
        let pool = r2d2::Pool::builder().max_size(10).build(manager)?;

        let mut conn = pool.get()?;
        for statement in SCHEMA.iter() {
            if let Err(e) = conn.batch_execute(statement) {
                log::warn!("Schema warning: {}", e);
            }
        }
        Ok(Self(pool))
    }

    fn base_config(pg_cfg: &config::Postgres) -> postgres::Config {
        let mut cfg = postgres::Config::new();
        cfg.user(&*pg_cfg.user)
            .host(&*pg_cfg.host)
            .port(*pg_cfg.port)
            .ssl_mode(match *pg_cfg.ssl_mode {
                PgSslInner::Disable => SslMode::Disable,
                PgSslInner::Prefer => SslMode::Prefer,
            });
        if let Some(password) = &*pg_cfg.password {
            cfg.password(password);
        };
        cfg
    }

    /// `CREATE DATABASE` cannot run inside the target database, so check from `postgres`.
    fn ensure_database(pg_cfg: &config::Postgres) -> Result<()> {
        let mut cfg = Self::base_config(pg_cfg);
        cfg.dbname("postgres");
        let mut client = cfg.connect(NoTls)?;

        let exists: bool = client
            .query_one(
                "SELECT EXISTS(SELECT datname FROM pg_catalog.pg_database WHERE datname = $1)",
                &[&*pg_cfg.database],
            )?
            .get(0);
        if !exists {
            log::info!("Creating database {}", *pg_cfg.database);
            // the name is restricted to `[A-Za-z0-9_]` by the config parser
            client.batch_execute(&format!("CREATE DATABASE {}", *pg_cfg.database))?;
        }
        Ok(())
    }
}

impl Store for PgPool {
    fn append_message(&self, content: &str, pod: &str, nickname: &str) -> Result<i64> {
        let mut conn = self.0.get()?;
        let row = conn.query_one(
            "INSERT INTO messages (content, sender_pod, sender_nick) VALUES ($1, $2, $3) RETURNING id",
            &[&content, &pod, &nickname],
        )?;
        Ok(i64::from(row.get::<_, i32>(0)))
    }

    fn upsert_user_color(&self, nickname: &str, color: &str) -> Result<()> {
        let mut conn = self.0.get()?;
        conn.execute(
            "INSERT INTO users (nickname, color_code) VALUES ($1, $2)
             ON CONFLICT (nickname) DO UPDATE SET color_code = $2",
            &[&nickname, &color],
        )?;
        Ok(())
    }

    fn select_user_color(&self, nickname: &str) -> Result<Option<String>> {
        let mut conn = self.0.get()?;
        let rows = conn.query(
            "SELECT color_code FROM users WHERE nickname = $1",
            &[&nickname],
        )?;
        Ok(rows
            .get(0)
            .and_then(|row| row.get::<_, Option<String>>(0)))
    }

    fn select_history(&self, before_id: Option<i64>, limit: i64) -> Result<Vec<ChatMessage>> {
        let mut conn = self.0.get()?;
        let rows = match before_id {
            Some(id) => {
                // `id` is a SERIAL (INT4) column
                let id = i32::try_from(id).unwrap_or(i32::MAX);
                conn.query(
                    &*format!("{} WHERE m.id < $2 ORDER BY m.id DESC LIMIT $3", SELECT_HISTORY),
                    &[&DEFAULT_COLOR, &id, &limit],
                )?
            }
            None => conn.query(
                &*format!("{} ORDER BY m.id DESC LIMIT $2", SELECT_HISTORY),
                &[&DEFAULT_COLOR, &limit],
            )?,
        };

        Ok(rows
            .iter()
            .map(|row| ChatMessage {
                id: i64::from(row.get::<_, i32>(0)),
                content: row.get::<_, Option<String>>(1).unwrap_or_default(),
                sender_pod: row.get::<_, Option<String>>(2).unwrap_or_default(),
                sender_nickname: row.get::<_, Option<String>>(3).unwrap_or_default(),
                sender_color: row.get::<_, Option<String>>(4).unwrap_or_default(),
                timestamp: row.get::<_, Option<String>>(5).unwrap_or_default(),
            })
            .collect())
    }
}
