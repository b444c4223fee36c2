//! Database connection configuration.
//!
//! A connection is described either by a full `dsn` or by individual server
//! fields (`host`, `port`, `user`, `password`, `dbname`), never both for
//! SQLite. `${VAR}` references in the DSN and password are expanded from the
//! process environment when the DSN is built, so secrets stay out of config
//! files.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{ConnectOpts, DbError, Result};

/// Connection settings as they appear under `database:` in the app config.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DbConnConfig {
    /// Full DSN, e.g. `sqlite::memory:` or `postgres://user:${PW}@db/app`.
    pub dsn: Option<String>,

    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Literal password or `${VAR}`.
    pub password: Option<String>,
    pub dbname: Option<String>,

    /// Extra query parameters appended to the DSN.
    #[serde(default)]
    pub params: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub pool: Option<PoolCfg>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PoolCfg {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    #[serde(with = "humantime_serde", default)]
    pub acquire_timeout: Option<Duration>,
    #[serde(with = "humantime_serde", default)]
    pub idle_timeout: Option<Duration>,
    #[serde(with = "humantime_serde", default)]
    pub max_lifetime: Option<Duration>,
    pub test_before_acquire: Option<bool>,
}

impl From<&PoolCfg> for ConnectOpts {
    fn from(cfg: &PoolCfg) -> Self {
        let defaults = ConnectOpts::default();
        ConnectOpts {
            max_conns: cfg.max_conns.or(defaults.max_conns),
            min_conns: cfg.min_conns.or(defaults.min_conns),
            acquire_timeout: cfg.acquire_timeout.or(defaults.acquire_timeout),
            idle_timeout: cfg.idle_timeout.or(defaults.idle_timeout),
            max_lifetime: cfg.max_lifetime.or(defaults.max_lifetime),
            test_before_acquire: cfg
                .test_before_acquire
                .unwrap_or(defaults.test_before_acquire),
            ..defaults
        }
    }
}

impl DbConnConfig {
    /// Convenience for a config that is just a DSN.
    pub fn from_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: Some(dsn.into()),
            ..Self::default()
        }
    }

    /// Pool options with defaults for anything not configured.
    pub fn connect_opts(&self) -> ConnectOpts {
        self.pool.as_ref().map(ConnectOpts::from).unwrap_or_default()
    }

    /// Final DSN with env references expanded and `params` appended.
    pub fn to_dsn(&self) -> Result<String> {
        self.validate()?;

        let base = match &self.dsn {
            Some(dsn) => expand_env_vars(dsn)?,
            None => self.server_dsn()?,
        };

        Ok(match &self.params {
            Some(params) if !params.is_empty() => append_params(&base, params),
            _ => base,
        })
    }

    fn validate(&self) -> Result<()> {
        let has_server_fields = self.host.is_some() || self.port.is_some();
        match &self.dsn {
            Some(dsn) if dsn.trim_start().starts_with("sqlite") && has_server_fields => {
                Err(DbError::InvalidConfig(
                    "SQLite DSN cannot be combined with host/port fields".into(),
                ))
            }
            Some(_) if has_server_fields || self.user.is_some() || self.dbname.is_some() => {
                Err(DbError::InvalidConfig(
                    "use either `dsn` or individual server fields, not both".into(),
                ))
            }
            None if self.host.is_none() => Err(DbError::InvalidConfig(
                "either `dsn` or `host` must be set".into(),
            )),
            _ => Ok(()),
        }
    }

    /// PostgreSQL URL from individual fields.
    fn server_dsn(&self) -> Result<String> {
        let host = self.host.as_deref().unwrap_or("localhost");
        let dbname = self.dbname.as_deref().ok_or_else(|| {
            DbError::InvalidConfig("`dbname` is required for server connections".into())
        })?;

        let mut url = url::Url::parse(&format!("postgres://{host}"))
            .map_err(|e| DbError::InvalidConfig(format!("invalid host `{host}`: {e}")))?;
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|_| DbError::InvalidConfig("cannot set port".into()))?;
        }
        if let Some(user) = &self.user {
            url.set_username(user)
                .map_err(|_| DbError::InvalidConfig("cannot set user".into()))?;
        }
        if let Some(password) = &self.password {
            let password = expand_env_vars(password)?;
            url.set_password(Some(&password))
                .map_err(|_| DbError::InvalidConfig("cannot set password".into()))?;
        }
        url.set_path(&format!("/{dbname}"));
        Ok(url.to_string())
    }
}

fn append_params(dsn: &str, params: &BTreeMap<String, String>) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let sep = if dsn.contains('?') { '&' } else { '?' };
    format!("{dsn}{sep}{query}")
}

fn env_ref() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
    })
}

/// Replace every `${VAR}` with the variable's value; unset variables are an
/// error rather than an empty string.
pub(crate) fn expand_env_vars(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in env_ref().captures_iter(input) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = std::env::var(name.as_str()).map_err(|_| {
            DbError::InvalidConfig(format!(
                "environment variable `{}` is not set",
                name.as_str()
            ))
        })?;
        out.push_str(&input[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

/// Mask the password of a DSN for logging.
pub fn redact_credentials_in_dsn(dsn: Option<&str>) -> String {
    match dsn {
        Some(dsn) if dsn.contains('@') => match url::Url::parse(dsn) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "***".to_string(),
        },
        Some(dsn) => dsn.to_string(),
        None => "none".to_string(),
    }
}
