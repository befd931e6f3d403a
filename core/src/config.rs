//! Immutable client configuration.
//!
//! # Design
//! Defaults are resolved once, at construction. Nothing here validates the
//! address: a malformed address surfaces later as a transport error.

use std::time::Duration;

use crate::error::ConfigError;

/// Address used when none (or an empty one) is supplied.
pub const DEFAULT_ADDRESS: &str = "http://localhost:8080";

/// Per-call deadline used when a zero timeout is supplied.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const ENV_ADDRESS: &str = "ACCOUNT_API_ADDRESS";
pub const ENV_TIMEOUT_MS: &str = "ACCOUNT_API_TIMEOUT_MS";
pub const ENV_SKIP_VERIFY: &str = "ACCOUNT_API_SKIP_VERIFY";

/// Endpoint address, per-call deadline and TLS verification policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    address: String,
    timeout: Duration,
    skip_verify: bool,
}

impl Config {
    /// Build a configuration, substituting defaults for an absent or empty
    /// address and a zero timeout.
    ///
    /// `skip_verify` accepts servers presenting unverifiable certificates.
    /// Never enable it in production.
    pub fn new(address: Option<&str>, timeout: Duration, skip_verify: bool) -> Self {
        let address = match address {
            Some(a) if !a.is_empty() => a,
            _ => DEFAULT_ADDRESS,
        };
        let timeout = if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout };
        Self {
            address: address.trim_end_matches('/').to_string(),
            timeout,
            skip_verify,
        }
    }

    /// Read `ACCOUNT_API_ADDRESS`, `ACCOUNT_API_TIMEOUT_MS` and
    /// `ACCOUNT_API_SKIP_VERIFY` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], with variables resolved through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = lookup(ENV_ADDRESS);

        let timeout = match lookup(ENV_TIMEOUT_MS) {
            Some(raw) => {
                let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                    key: ENV_TIMEOUT_MS,
                    value: raw.clone(),
                })?;
                Duration::from_millis(millis)
            }
            None => Duration::ZERO,
        };

        let skip_verify = match lookup(ENV_SKIP_VERIFY) {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                key: ENV_SKIP_VERIFY,
                value: raw,
            })?,
            None => false,
        };

        Ok(Self::new(address.as_deref(), timeout, skip_verify))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn skip_verify(&self) -> bool {
        self.skip_verify
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, Duration::ZERO, false)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
