//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Credentials, UserContext};

/// Environment variable overriding `notify.topic_url`.
pub const TOPIC_URL_ENV: &str = "NTFY_TOPIC_URL";

/// Root application configuration.
///
/// Built once at startup and handed to the run coordinator by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Grade portal connection settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Batch run settings
    #[serde(default)]
    pub run: RunConfig,

    /// Watched users, processed in this order
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides taken from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(TOPIC_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.notify.topic_url = Some(url);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.portal.user_agent.trim().is_empty() {
            return Err(AppError::validation("portal.user_agent is empty"));
        }
        if self.portal.timeout_secs == 0 {
            return Err(AppError::validation("portal.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.portal.base_url)?;

        match self.notify.topic_url.as_deref() {
            None => {
                return Err(AppError::validation(format!(
                    "notify.topic_url is not set (config file or {TOPIC_URL_ENV})"
                )));
            }
            Some(topic) => {
                url::Url::parse(topic)?;
            }
        }

        if self.users.is_empty() {
            return Err(AppError::validation("No users defined"));
        }
        let mut seen = HashSet::new();
        for user in &self.users {
            if user.id.trim().is_empty() {
                return Err(AppError::validation("users.id is empty"));
            }
            if !is_valid_user_id(&user.id) {
                return Err(AppError::validation(format!(
                    "User id '{}' may only contain ASCII letters, digits, '_' and '-'",
                    user.id
                )));
            }
            // Case-insensitive file systems would map `a` and `A` to one file.
            if !seen.insert(user.id.to_ascii_lowercase()) {
                return Err(AppError::validation(format!(
                    "Duplicate user id '{}'",
                    user.id
                )));
            }
        }
        Ok(())
    }

    /// Build user contexts, reading credentials through `lookup`.
    ///
    /// A user without credentials is still returned; the coordinator reports
    /// it as failed instead of aborting the batch.
    pub fn resolve_users(&self, lookup: impl Fn(&str) -> Option<String>) -> Vec<UserContext> {
        self.users
            .iter()
            .map(|entry| {
                let username = lookup(&entry.username_var()).filter(|v| !v.is_empty());
                let password = lookup(&entry.password_var()).filter(|v| !v.is_empty());
                log::debug!(
                    "'{}' loaded: {}, '{}' loaded: {}",
                    entry.username_var(),
                    if username.is_some() { "yes" } else { "no" },
                    entry.password_var(),
                    if password.is_some() { "yes" } else { "no" },
                );
                let credentials = match (username, password) {
                    (Some(username), Some(password)) => Some(Credentials::new(username, password)),
                    _ => None,
                };
                UserContext::new(&entry.id, credentials)
            })
            .collect()
    }

    /// Topic URL, checked by `validate`.
    pub fn topic_url(&self) -> Result<&str> {
        self.notify
            .topic_url
            .as_deref()
            .ok_or_else(|| AppError::config("notify.topic_url is not set"))
    }
}

/// User ids name both the credential variables and the snapshot file.
fn is_valid_user_id(id: &str) -> bool {
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Grade portal connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the grade application (pages are resolved against it)
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// ntfy topic URL
    #[serde(default)]
    pub topic_url: Option<String>,

    /// Send an alert when a user could not be processed
    #[serde(default)]
    pub alert_on_failure: bool,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            topic_url: None,
            alert_on_failure: false,
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Batch run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pause between two users, in seconds
    #[serde(default = "defaults::delay_between_users")]
    pub delay_between_users_secs: u64,

    /// Directory holding one snapshot file per user
    #[serde(default = "defaults::state_dir")]
    pub state_dir: PathBuf,
}

impl RunConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_between_users_secs)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            delay_between_users_secs: defaults::delay_between_users(),
            state_dir: defaults::state_dir(),
        }
    }
}

/// A watched user as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    /// Nickname used in logs, notifications and the snapshot file name
    pub id: String,
}

impl UserEntry {
    /// Environment variable holding the portal username.
    pub fn username_var(&self) -> String {
        format!("{}_WEBSINU_USERNAME", self.id)
    }

    /// Environment variable holding the portal password.
    pub fn password_var(&self) -> String {
        format!("{}_WEBSINU_PASSWORD", self.id)
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn base_url() -> String {
        "https://websinu.utcluj.ro/note/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; gradewatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn delay_between_users() -> u64 {
        5
    }
    pub fn state_dir() -> PathBuf {
        PathBuf::from("state")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sample() -> Config {
        toml::from_str(
            r#"
            [notify]
            topic_url = "https://ntfy.sh/grades"

            [[users]]
            id = "STUDENT_A"

            [[users]]
            id = "STUDENT_B"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn parse_fills_defaults() {
        let config = sample();
        assert_eq!(config.portal.base_url, "https://websinu.utcluj.ro/note/");
        assert_eq!(config.portal.timeout_secs, 30);
        assert_eq!(config.run.delay(), Duration::from_secs(5));
        assert_eq!(config.run.state_dir, PathBuf::from("state"));
        assert!(!config.notify.alert_on_failure);
        assert_eq!(config.users.len(), 2);
    }

    #[test]
    fn validate_sample_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_topic() {
        let mut config = sample();
        config.notify.topic_url = None;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_duplicate_users() {
        let mut config = sample();
        config.users[1].id = "STUDENT_A".into();
        assert!(config.validate().is_err());

        config.users[1].id = "student_a".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_ids_outside_file_name_charset() {
        let mut config = sample();
        config.users[0].id = "ana.pop".into();
        config.users[1].id = "ana_pop".into();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));

        config.users[0].id = "ana-pop".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_no_users() {
        let mut config = sample();
        config.users.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = sample();
        config.portal.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_topic() {
        let mut config = sample();
        config.apply_env(|key| (key == TOPIC_URL_ENV).then(|| "https://ntfy.sh/other".into()));
        assert_eq!(config.topic_url().unwrap(), "https://ntfy.sh/other");
    }

    #[test]
    fn resolve_users_reads_prefixed_vars() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STUDENT_A_WEBSINU_USERNAME", "alice"),
            ("STUDENT_A_WEBSINU_PASSWORD", "secret"),
            ("STUDENT_B_WEBSINU_USERNAME", "bob"),
        ]);
        let users = sample().resolve_users(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "STUDENT_A");
        assert_eq!(users[0].credentials.as_ref().unwrap().username, "alice");
        assert!(users[1].credentials.is_none());
    }
}
