use crate::from_env_var;
use std::str::FromStr;
use strum::VariantNames;

from_env_var!(
    /// The user to use for Postgres
    let name = PgUser;
    let default: String = "postgres".to_string();
    let (env_var, allowed_values) = ("DB_USER", "any string");
    let from_str = |s| Some(s.to_string());
);

from_env_var!(
    /// The host address where Postgres is running
    let name = PgHost;
    let default: String = "localhost".to_string();
    let (env_var, allowed_values) = ("DB_HOST", "any string");
    let from_str = |s| Some(s.to_string());
);

from_env_var!(
    /// The password to use with Postgres
    let name = PgPass;
    let default: Option<String> = None;
    let (env_var, allowed_values) = ("DB_PASSWORD", "any string");
    let from_str = |s| Some(Some(s.to_string()));
);

from_env_var!(
    /// The Postgres database holding chat messages and user profiles
    let name = PgDatabase;
    let default: String = "cotalk".to_string();
    let (env_var, allowed_values) = ("DB_NAME", "a database name made of letters, digits and `_`");
    let from_str = |s| Some(s.to_string()).filter(|name| {
        name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
);

from_env_var!(
    /// The port Postgres is running on
    let name = PgPort;
    let default: u16 = 5432;
    let (env_var, allowed_values) = ("DB_PORT", "a number between 0 and 65535");
    let from_str = |s| s.parse().ok();
);

from_env_var!(
    let name = PgSslMode;
    let default: PgSslInner = PgSslInner::Disable;
    let (env_var, allowed_values) = ("DB_SSLMODE", format!("one of: {:?}", PgSslInner::VARIANTS));
    let from_str = |s| PgSslInner::from_str(s).ok();
);

#[derive(strum_macros::EnumString, strum_macros::VariantNames, Debug, Clone, Copy, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum PgSslInner {
    Disable,
    Prefer,
}
