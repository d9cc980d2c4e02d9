//! Connection parameters from item-key params and `PG*` environment.

use std::time::Duration;

use super::ConnectionError;

/// Number of leading item-key params reserved for the connection:
/// host, port, database, user, password.
pub const CONNECTION_PARAM_COUNT: usize = 5;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// Transport security, with libpq meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SslMode {
    /// Plain TCP only.
    #[default]
    Disable,
    /// TLS when the server offers it.
    Prefer,
    /// TLS or fail.
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "allow" | "prefer" => Ok(SslMode::Prefer),
            "require" | "verify-ca" | "verify-full" => Ok(SslMode::Require),
            other => Err(ConnectionError::InvalidParam(format!(
                "unsupported sslmode '{}'",
                other
            ))),
        }
    }
}

/// Resolved connection settings for one request.
///
/// Each value comes from the item key when the param is present and
/// non-empty, else from the environment:
/// - PGHOST (default: localhost)
/// - PGPORT (default: 5432)
/// - PGUSER (default: $USER)
/// - PGPASSWORD (default: none)
/// - PGDATABASE (default: same as user)
/// - PGSSLMODE (default: disable)
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub sslmode: SslMode,
    pub connect_timeout: Option<Duration>,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("sslmode", &self.sslmode)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ConnectionParams {
    /// Builds parameters from the leading item-key params and the process
    /// environment.
    pub fn from_item_params(params: &[String]) -> Result<Self, ConnectionError> {
        Self::resolve(params, |var| std::env::var(var).ok())
    }

    /// Same as [`from_item_params`](Self::from_item_params) with an explicit
    /// environment lookup.
    pub fn resolve(
        params: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConnectionError> {
        let param = |idx: usize| {
            params
                .get(idx)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let env = |var: &str| env(var).filter(|s| !s.is_empty());

        let host = param(0)
            .or_else(|| env("PGHOST"))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match param(1).or_else(|| env("PGPORT")) {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ConnectionError::InvalidParam(format!("invalid port '{}'", p)))?,
            None => DEFAULT_PORT,
        };

        let user = param(3)
            .or_else(|| env("PGUSER"))
            .or_else(|| env("USER"))
            .ok_or_else(|| ConnectionError::EnvNotSet("PGUSER or USER".to_string()))?;

        let dbname = param(2)
            .or_else(|| env("PGDATABASE"))
            .unwrap_or_else(|| user.clone());

        let password = param(4).or_else(|| env("PGPASSWORD"));

        let sslmode = match env("PGSSLMODE") {
            Some(mode) => mode.parse()?,
            None => SslMode::default(),
        };

        Ok(Self {
            host,
            port,
            dbname,
            user,
            password,
            sslmode,
            connect_timeout: None,
        })
    }

    pub fn with_sslmode(mut self, sslmode: SslMode) -> Self {
        self.sslmode = sslmode;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Driver configuration for these settings.
    pub fn to_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .application_name("pgzbx")
            .ssl_mode(match self.sslmode {
                SslMode::Disable => postgres::config::SslMode::Disable,
                SslMode::Prefer => postgres::config::SslMode::Prefer,
                SslMode::Require => postgres::config::SslMode::Require,
            });
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        config
    }

    /// `user@host:port/dbname`, safe for logs.
    pub fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn item_params_win_over_env() {
        let p = ConnectionParams::resolve(
            &params(&["db1", "5433", "shop", "zabbix", "secret"]),
            env_of(&[("PGHOST", "other"), ("PGUSER", "postgres")]),
        )
        .unwrap();
        assert_eq!(p.host, "db1");
        assert_eq!(p.port, 5433);
        assert_eq!(p.dbname, "shop");
        assert_eq!(p.user, "zabbix");
        assert_eq!(p.password.as_deref(), Some("secret"));
    }

    #[test]
    fn empty_params_fall_back_to_env() {
        let p = ConnectionParams::resolve(
            &params(&["", "", "", "", ""]),
            env_of(&[
                ("PGHOST", "pg.internal"),
                ("PGPORT", "6432"),
                ("PGUSER", "monitor"),
                ("PGPASSWORD", "pw"),
                ("PGSSLMODE", "require"),
            ]),
        )
        .unwrap();
        assert_eq!(p.host, "pg.internal");
        assert_eq!(p.port, 6432);
        assert_eq!(p.dbname, "monitor");
        assert_eq!(p.password.as_deref(), Some("pw"));
        assert_eq!(p.sslmode, SslMode::Require);
    }

    #[test]
    fn defaults_when_nothing_set() {
        let p = ConnectionParams::resolve(&[], env_of(&[("USER", "alice")])).unwrap();
        assert_eq!(p.host, "localhost");
        assert_eq!(p.port, 5432);
        assert_eq!(p.user, "alice");
        assert_eq!(p.dbname, "alice");
        assert_eq!(p.password, None);
        assert_eq!(p.sslmode, SslMode::Disable);
    }

    #[test]
    fn missing_user_is_error() {
        let err = ConnectionParams::resolve(&[], env_of(&[])).unwrap_err();
        assert_eq!(err, ConnectionError::EnvNotSet("PGUSER or USER".into()));
    }

    #[test]
    fn bad_port_is_error() {
        let err =
            ConnectionParams::resolve(&params(&["h", "pg"]), env_of(&[("USER", "a")])).unwrap_err();
        assert_eq!(err, ConnectionError::InvalidParam("invalid port 'pg'".into()));
    }

    #[test]
    fn describe_hides_password() {
        let p = ConnectionParams::resolve(
            &params(&["h", "5432", "d", "u", "hunter2"]),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(p.describe(), "u@h:5432/d");
        assert!(!format!("{:?}", p).contains("hunter2"));
    }

    #[test]
    fn sslmode_parsing() {
        assert_eq!("disable".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!("prefer".parse::<SslMode>().unwrap(), SslMode::Prefer);
        assert_eq!("verify-full".parse::<SslMode>().unwrap(), SslMode::Require);
        assert!("sometimes".parse::<SslMode>().is_err());
    }
}
