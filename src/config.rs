// src/config.rs

//! Configuration loading utilities.
//!
//! Resolves the configuration file and the environment into the immutable
//! values a run needs. Everything here happens once, before any user is
//! processed.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, UserContext};

/// Resolved startup state.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub users: Vec<UserContext>,
}

/// Load, override and validate configuration, then resolve user credentials.
pub fn load_settings(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let mut config = Config::load(path)?;
    config.apply_env(&env);
    config.validate()?;

    let users = config.resolve_users(&env);
    for user in users.iter().filter(|u| u.credentials.is_none()) {
        log::warn!(
            "No credentials for '{}' in the environment, it will be reported as failed",
            user.id
        );
    }

    Ok(Settings { config, users })
}

/// Environment lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Variables read from a `.env` file.
///
/// The file is parsed into a map and never written into the process
/// environment. Variables set in the process take precedence.
#[derive(Debug, Clone, Default)]
pub struct DotEnv {
    vars: HashMap<String, String>,
}

impl DotEnv {
    /// Parse a `.env` file. A missing file yields an empty set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                log::debug!("No env file at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                AppError::config(format!("invalid env file {}: {}", path.display(), e))
            })?;
            vars.insert(key, value);
        }
        log::info!("Loaded {} variables from {}", vars.len(), path.display());
        Ok(Self { vars })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Look up `key` in the process environment, then in the file.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.lookup_with(key, process_env)
    }

    fn lookup_with(&self, key: &str, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(key).or_else(|| self.vars.get(key).cloned())
    }
}
