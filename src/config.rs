use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use chrono::Duration;

pub const DEFAULT_AVATAR: &str = "http://ouecw69lw.bkt.clouddn.com/profile_big.jpg";

/// Runtime settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    /// Rows per page when `row` is absent or unusable.
    pub page_limit: i64,
    pub page_limit_max: i64,
    pub default_avatar: String,
    pub token_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: None,
            page_limit: 10,
            page_limit_max: 100,
            default_avatar: DEFAULT_AVATAR.to_string(),
            token_ttl: Duration::hours(48),
        }
    }
}

impl Config {
    /// Loads `.env` from the working directory if there is one, then reads
    /// the process environment.
    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                log::warn!("could not load .env: {}", err);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`] with an explicit env file. Variables already
    /// set in the process win over the file.
    pub fn from_env_file(path: &Path) -> Result<Self, dotenvy::Error> {
        dotenvy::from_path(path)?;
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Unset or unparseable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let page_limit = parsed(&lookup, "PAGE_LIMIT")
            .filter(|n: &i64| *n > 0)
            .unwrap_or(defaults.page_limit);
        let page_limit_max = parsed(&lookup, "PAGE_LIMIT_MAX")
            .filter(|n: &i64| *n > 0)
            .unwrap_or(defaults.page_limit_max)
            .max(page_limit);
        Self {
            bind_addr: parsed(&lookup, "BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            page_limit,
            page_limit_max,
            default_avatar: lookup("DEFAULT_AVATAR")
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.default_avatar),
            token_ttl: parsed(&lookup, "TOKEN_TTL_HOURS")
                .filter(|h: &i64| *h > 0)
                .map(Duration::hours)
                .unwrap_or(defaults.token_ttl),
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.page_limit, 10);
        assert_eq!(config.default_avatar, DEFAULT_AVATAR);
        assert_eq!(config.token_ttl, Duration::hours(48));
    }

    #[test]
    fn values_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/mentor"),
            ("PAGE_LIMIT", "25"),
            ("TOKEN_TTL_HOURS", "1"),
        ]));
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/mentor"));
        assert_eq!(config.page_limit, 25);
        assert_eq!(config.token_ttl, Duration::hours(1));
    }

    #[test]
    fn garbage_falls_back() {
        let config = Config::from_lookup(lookup(&[
            ("PAGE_LIMIT", "-3"),
            ("PAGE_LIMIT_MAX", "many"),
            ("BIND_ADDR", "nowhere"),
        ]));
        assert_eq!(config.page_limit, 10);
        assert_eq!(config.page_limit_max, 100);
        assert_eq!(config.bind_addr.port(), 3000);
    }

    #[test]
    fn env_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("mentor-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, "PAGE_LIMIT_MAX=77\nDEFAULT_AVATAR=http://cdn.example/a.png\n").unwrap();
        let config = Config::from_env_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.page_limit_max, 77);
        assert_eq!(config.default_avatar, "http://cdn.example/a.png");
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("mentor-{}.env", uuid::Uuid::new_v4()));
        assert!(Config::from_env_file(&path).is_err());
    }

    #[test]
    fn max_never_below_default() {
        let config = Config::from_lookup(lookup(&[("PAGE_LIMIT", "50"), ("PAGE_LIMIT_MAX", "20")]));
        assert_eq!(config.page_limit_max, 50);
    }
}
