use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::validator::Limits;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: String, value: String },

    #[error("malformed token entry {0:?}, expected user:token")]
    MalformedToken(String),
}

/// Server configuration
///
/// Read from `CALC_*` environment variables, each falling back to a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub limits: Limits,
    /// Records kept per user before the oldest are dropped.
    pub max_history_per_user: usize,
    /// Bearer token -> user id.
    pub tokens: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            limits: Limits::default(),
            max_history_per_user: DEFAULT_HISTORY_CAPACITY,
            tokens: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source.
    ///
    /// # Examples
    /// ```
    /// use calculator::config::Config;
    ///
    /// let config = Config::from_lookup(|name| match name {
    ///     "CALC_PORT" => Some("8080".to_string()),
    ///     "CALC_API_TOKENS" => Some("alice:s3cret".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.port, 8080);
    /// assert_eq!(config.tokens["s3cret"], "alice");
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let host = lookup("CALC_HOST").unwrap_or(defaults.host);
        let port = parse_or("CALC_PORT", &lookup, defaults.port)?;
        let limits = Limits {
            max_text_len: parse_or("CALC_MAX_TEXT_LEN", &lookup, defaults.limits.max_text_len)?,
            max_tree_slots: parse_or(
                "CALC_MAX_TREE_SLOTS",
                &lookup,
                defaults.limits.max_tree_slots,
            )?,
            max_batch_items: parse_or(
                "CALC_MAX_BATCH_ITEMS",
                &lookup,
                defaults.limits.max_batch_items,
            )?,
        };
        let max_history_per_user =
            parse_or("CALC_MAX_HISTORY", &lookup, defaults.max_history_per_user)?;
        let tokens = match lookup("CALC_API_TOKENS") {
            Some(raw) => parse_tokens(&raw)?,
            None => HashMap::new(),
        };

        Ok(Config {
            host,
            port,
            limits,
            max_history_per_user,
            tokens,
        })
    }

    /// Apply `host port` positional arguments over the loaded values.
    pub fn with_args(mut self, args: &[String]) -> Result<Self, ConfigError> {
        if let Some(host) = args.first() {
            self.host = host.clone();
        }
        if let Some(port) = args.get(1) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "port".to_string(),
                value: port.clone(),
            })?;
        }
        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    name: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Parse `user:token,user:token` into a token -> user map.
fn parse_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once(':') {
            Some((user, token)) if !user.trim().is_empty() && !token.trim().is_empty() => {
                tokens.insert(token.trim().to_string(), user.trim().to_string());
            }
            _ => return Err(ConfigError::MalformedToken(entry.to_string())),
        }
    }
    Ok(tokens)
}
