use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;

use threadboard_auth::session::ssr::DB_URL_ENV;

pub const SITE_ADDR_ENV: &str = "SITE_ADDR";
pub const DB_MAX_CONNECTIONS_ENV: &str = "DB_MAX_CONNECTIONS";
pub const TARGET_LOCK_CACHE_SIZE_ENV: &str = "TARGET_LOCK_CACHE_SIZE";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

pub const DEFAULT_SITE_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TARGET_LOCK_CACHE_SIZE: usize = 100000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_url: Option<String>,
    pub site_addr: String,
    pub db_max_connections: u32,
    pub target_lock_cache_size: NonZeroUsize,
    pub log_level: log::Level,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, invalid or missing values fall back to their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_url = lookup(DB_URL_ENV);
        if db_url.is_none() {
            log::warn!("Could not find {DB_URL_ENV} in env variables, content will be kept in memory.");
        }
        let default_lock_cache_size = NonZeroUsize::new(DEFAULT_TARGET_LOCK_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            db_url,
            site_addr: lookup(SITE_ADDR_ENV).unwrap_or_else(|| {
                log::debug!("Could not find {SITE_ADDR_ENV} in env variables, take default value.");
                String::from(DEFAULT_SITE_ADDR)
            }),
            db_max_connections: parse_or_default(&lookup, DB_MAX_CONNECTIONS_ENV, DEFAULT_DB_MAX_CONNECTIONS),
            target_lock_cache_size: parse_or_default(&lookup, TARGET_LOCK_CACHE_SIZE_ENV, default_lock_cache_size),
            log_level: parse_or_default(&lookup, LOG_LEVEL_ENV, log::Level::Info),
        }
    }
}

fn parse_or_default<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_value: T,
) -> T {
    match lookup(key) {
        Some(value) => match T::from_str(&value) {
            Ok(value) => {
                log::debug!("Got {key} from env variables.");
                value
            },
            Err(_) => {
                log::error!("Could not parse {key}, take default value.");
                default_value
            }
        },
        None => {
            log::debug!("Could not find {key} in env variables, take default value.");
            default_value
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::num::NonZeroUsize;

    use crate::config::*;

    fn lookup_from(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let value_map: HashMap<String, String> = values
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| value_map.get(key).cloned()
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.db_url, None);
        assert_eq!(config.site_addr, DEFAULT_SITE_ADDR);
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(config.target_lock_cache_size.get(), DEFAULT_TARGET_LOCK_CACHE_SIZE);
        assert_eq!(config.log_level, log::Level::Info);
    }

    #[test]
    fn test_server_config_from_lookup() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/threadboard"),
            (SITE_ADDR_ENV, "0.0.0.0:8080"),
            (DB_MAX_CONNECTIONS_ENV, "12"),
            (TARGET_LOCK_CACHE_SIZE_ENV, "64"),
            (LOG_LEVEL_ENV, "debug"),
        ]));
        assert_eq!(config.db_url.as_deref(), Some("postgres://localhost/threadboard"));
        assert_eq!(config.site_addr, "0.0.0.0:8080");
        assert_eq!(config.db_max_connections, 12);
        assert_eq!(config.target_lock_cache_size, NonZeroUsize::new(64).expect("64 is non zero"));
        assert_eq!(config.log_level, log::Level::Debug);
    }

    #[test]
    fn test_server_config_invalid_values() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            (DB_MAX_CONNECTIONS_ENV, "many"),
            (TARGET_LOCK_CACHE_SIZE_ENV, "0"),
            (LOG_LEVEL_ENV, "loud"),
        ]));
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(config.target_lock_cache_size.get(), DEFAULT_TARGET_LOCK_CACHE_SIZE);
        assert_eq!(config.log_level, log::Level::Info);
    }
}
