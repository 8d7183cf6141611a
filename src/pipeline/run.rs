// src/pipeline/run.rs

//! Run coordinator.
//!
//! Processes the configured users one after another:
//!
//! ```text
//! LOAD -> FETCH -> DIFF -> [NOTIFY] -> PERSIST
//! ```
//!
//! Every failure is caught at the user boundary and recorded in the report.
//! The stored snapshot only moves forward after a successful fetch and diff,
//! and a notification failure does not stop it from moving.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, GradeSnapshot, UserContext};
use crate::pipeline::compute_changes;
use crate::services::{GradeSource, NotificationTransport, Notifier};
use crate::storage::SnapshotStore;

/// Stage of a user's lifecycle where processing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Fetch,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Fetch => "fetch",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Terminal state of one user in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserStatus {
    /// Changes found, notified and persisted
    Done { changes: usize },
    /// Nothing changed, snapshot persisted
    DoneNoChanges,
    /// Changes found and persisted, but the notification was not delivered
    DoneNotifyFailed { changes: usize, reason: String },
    /// Stopped before the snapshot could be persisted
    Failed { stage: Stage, reason: String },
}

impl UserStatus {
    fn failed(stage: Stage, error: &AppError) -> Self {
        Self::Failed {
            stage,
            reason: format!("{} ({})", error, error.kind()),
        }
    }

    /// Whether the user's snapshot was advanced.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done { changes } => write!(f, "DONE ({changes} changes)"),
            Self::DoneNoChanges => f.write_str("DONE-no-changes"),
            Self::DoneNotifyFailed { changes, reason } => {
                write!(f, "DONE-notify-failed ({changes} changes): {reason}")
            }
            Self::Failed { stage, reason } => write!(f, "FAILED: {stage}: {reason}"),
        }
    }
}

/// Outcome for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserOutcome {
    pub user: String,
    #[serde(flatten)]
    pub status: UserStatus,
}

/// Outcome of a whole run, in user order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<UserOutcome>,
}

impl RunReport {
    pub fn done_count(&self) -> usize {
        self.count(|s| matches!(s, UserStatus::Done { .. }))
    }

    pub fn no_change_count(&self) -> usize {
        self.count(|s| matches!(s, UserStatus::DoneNoChanges))
    }

    pub fn notify_failed_count(&self) -> usize {
        self.count(|s| matches!(s, UserStatus::DoneNotifyFailed { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, UserStatus::Failed { .. }))
    }

    /// Changes detected across all users.
    pub fn total_changes(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                UserStatus::Done { changes } | UserStatus::DoneNotifyFailed { changes, .. } => {
                    changes
                }
                _ => 0,
            })
            .sum()
    }

    pub fn get(&self, user: &str) -> Option<&UserStatus> {
        self.outcomes
            .iter()
            .find(|o| o.user == user)
            .map(|o| &o.status)
    }

    fn count(&self, pred: impl Fn(&UserStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Write the per-user statuses and totals to the log.
    pub fn log_summary(&self) {
        for outcome in &self.outcomes {
            match outcome.status {
                UserStatus::Failed { .. } => log::error!("{}: {}", outcome.user, outcome.status),
                UserStatus::DoneNotifyFailed { .. } => {
                    log::warn!("{}: {}", outcome.user, outcome.status)
                }
                _ => log::info!("{}: {}", outcome.user, outcome.status),
            }
        }
        log::info!(
            "Run complete: {} done, {} without changes, {} notify failed, {} failed, {} changes",
            self.done_count(),
            self.no_change_count(),
            self.notify_failed_count(),
            self.failed_count(),
            self.total_changes()
        );
    }
}

/// Drives one batch run over all users.
pub struct RunCoordinator<'a> {
    source: &'a dyn GradeSource,
    store: &'a dyn SnapshotStore,
    notifier: Notifier<'a>,
    delay: Duration,
    alert_on_failure: bool,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(
        source: &'a dyn GradeSource,
        store: &'a dyn SnapshotStore,
        transport: &'a dyn NotificationTransport,
    ) -> Self {
        Self {
            source,
            store,
            notifier: Notifier::new(transport),
            delay: Duration::ZERO,
            alert_on_failure: false,
        }
    }

    /// Apply the run settings of a configuration.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_delay(config.run.delay())
            .with_failure_alerts(config.notify.alert_on_failure)
    }

    /// Pause between two users.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Send an alert message for every failed user.
    pub fn with_failure_alerts(mut self, enabled: bool) -> Self {
        self.alert_on_failure = enabled;
        self
    }

    /// Process every user once, in order.
    pub async fn run_once(&self, users: &[UserContext]) -> RunReport {
        let mut report = RunReport::default();

        for (index, user) in users.iter().enumerate() {
            log::info!("Processing grades for '{}'", user.id);
            let status = self.process_user(user).await;

            if let UserStatus::Failed { reason, .. } = &status {
                if self.alert_on_failure {
                    if let Err(e) = self.notifier.alert(&user.id, reason).await {
                        log::warn!("Failure alert for '{}' not delivered: {}", user.id, e);
                    }
                }
            }

            report.outcomes.push(UserOutcome {
                user: user.id.clone(),
                status,
            });

            if index + 1 < users.len() && !self.delay.is_zero() {
                log::info!("Pausing {:?} before next user", self.delay);
                tokio::time::sleep(self.delay).await;
            }
        }

        report
    }

    async fn process_user(&self, user: &UserContext) -> UserStatus {
        let previous = match self.store.load(&user.id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Cannot load previous grades for '{}': {}", user.id, e);
                return UserStatus::failed(Stage::Load, &e);
            }
        };

        let current = match self.fetch(user).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Cannot fetch grades for '{}': {}", user.id, e);
                return UserStatus::failed(Stage::Fetch, &e);
            }
        };
        log::info!("Found {} current grades for '{}'", current.len(), user.id);

        let changes = compute_changes(&previous, &current);

        let notify_error = if changes.is_empty() {
            log::info!("No new or changed grades for '{}'", user.id);
            None
        } else {
            log::info!(
                "'{}': {} new, {} changed",
                user.id,
                changes.new_count(),
                changes.changed_count()
            );
            for record in &changes {
                log::info!("  {}", record.describe());
            }
            match self.notifier.notify(&user.id, &changes).await {
                Ok(()) => None,
                Err(e) => {
                    log::error!("Notification for '{}' failed: {}", user.id, e);
                    Some(e)
                }
            }
        };

        if let Err(e) = self.store.save(&user.id, &current).await {
            log::error!("Cannot save grades for '{}': {}", user.id, e);
            return UserStatus::failed(Stage::Persist, &e);
        }

        match notify_error {
            Some(e) => UserStatus::DoneNotifyFailed {
                changes: changes.len(),
                reason: format!("{} ({})", e, e.kind()),
            },
            None if changes.is_empty() => UserStatus::DoneNoChanges,
            None => UserStatus::Done {
                changes: changes.len(),
            },
        }
    }

    /// Fetch a non-empty snapshot for the user.
    async fn fetch(&self, user: &UserContext) -> Result<GradeSnapshot> {
        let credentials = user.credentials.as_ref().ok_or_else(|| {
            AppError::authentication(format!("no credentials configured for '{}'", user.id))
        })?;

        let snapshot = self.source.fetch_grades(credentials).await?;
        if snapshot.is_empty() {
            return Err(AppError::parse("portal returned no grades"));
        }
        Ok(snapshot)
    }
}
