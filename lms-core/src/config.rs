//! # Configuration
//!
//! A string key/value store, read through immutable snapshots.
//!
//! ```rust
//! use lms_core::LmsConfig;
//!
//! let mut config = LmsConfig::new();
//! config.set("tenancy.default_tenant", "acme");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get("tenancy.default_tenant"), Some("acme"));
//! ```
//!
//! Environment overrides use a prefix and double underscores as the key
//! separator: `LMS__TENANCY__REQUIRE_HEADER=true` becomes
//! `tenancy.require_header`.
//!
//! Keys read by this crate:
//!
//! | key                      | meaning                                         |
//! |--------------------------|-------------------------------------------------|
//! | `tenancy.default_tenant` | tenant used when a request names none           |
//! | `tenancy.require_header` | `true` disables the default-tenant fallback     |
//! | `http.host`              | listen host, `127.0.0.1` when unset             |
//! | `http.port`              | listen port, `3030` when unset                  |

use std::collections::HashMap;

pub const DEFAULT_TENANT_KEY: &str = "tenancy.default_tenant";
pub const REQUIRE_HEADER_KEY: &str = "tenancy.require_header";
pub const HTTP_HOST_KEY: &str = "http.host";
pub const HTTP_PORT_KEY: &str = "http.port";

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3030;

#[derive(Debug, Default, Clone)]
pub struct LmsConfig {
    values: HashMap<String, String>,
}

impl LmsConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Load every `PREFIX__A__B=value` pair as `a.b = value`.
    ///
    /// Returns how many keys were set.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    /// Same as [`LmsConfig::load_env`] over an explicit variable list.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}__", prefix.trim_end_matches('_'));
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                tracing::debug!(key = %normalized, "config override from environment");
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> LmsConfigSnapshot {
        LmsConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LmsConfigSnapshot {
    map: HashMap<String, String>,
}

impl LmsConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse::<bool>().ok())
    }
}
