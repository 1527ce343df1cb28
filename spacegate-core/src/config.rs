//! # Configuration
//!
//! A minimal string key/value store, set on the app with `app.set()` and read
//! back with `app.get()`. Hooks receive an immutable [`GateConfigSnapshot`]
//! taken when the call started, so a reconfiguration never changes the rules
//! halfway through a request.
//!
//! ```rust
//! use spacegate_core::GateApp;
//! let app = GateApp::<(), ()>::new();
//!
//! app.set("store.timeoutMs", "2000");
//! assert_eq!(app.get("store.timeoutMs"), Some("2000".to_string()));
//! ```
//!
//! ## Environment overrides
//! [`GateConfig::load_env`] maps `PREFIX__A__B=value` onto the key `a.b`:
//!
//! ```bash
//! export SPACEGATE__STORE__TIMEOUTMS=500   # store.timeoutms
//! ```
//!
//! Keys are lowercased by the mapping. Setting a key replaces any value stored
//! under a differently-cased spelling of it, so an override always wins over
//! a default such as `store.timeoutMs`.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct GateConfig {
    values: HashMap<String, String>,
}

impl GateConfig {
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
        let key = key.into();
        self.values.retain(|k, _| !k.eq_ignore_ascii_case(&key));
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.values, key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copy every `PREFIX__A__B` variable from `vars` into the key `a.b`.
    pub fn load_env<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&marker) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> GateConfigSnapshot {
        GateConfigSnapshot::new(self.values.clone())
    }
}

fn lookup<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key)
        .or_else(|| map.get(&key.to_lowercase()))
        .map(|s| s.as_str())
}

#[derive(Debug, Clone, Default)]
pub struct GateConfigSnapshot {
    map: HashMap<String, String>,
}

impl GateConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.map, key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|s| s.to_string())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    /// All `(rest, value)` pairs whose key starts with `prefix.`, lowercase
    /// and mixed-case keys alike.
    pub fn with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let marker = format!("{}.", prefix.to_lowercase());
        let mut out: Vec<(String, String)> = self
            .map
            .iter()
            .filter_map(|(k, v)| {
                let lower = k.to_lowercase();
                lower
                    .strip_prefix(&marker)
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect();
        out.sort();
        out
    }
}
