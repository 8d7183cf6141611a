//! Notifier adapter.
//!
//! Turns a user's change set into one message and hands it to the transport.

use crate::error::Result;
use crate::models::ChangeSet;
use crate::services::{Message, NotificationTransport};

/// Formats change sets and delivers them through a transport.
#[derive(Clone, Copy)]
pub struct Notifier<'a> {
    transport: &'a dyn NotificationTransport,
}

impl<'a> Notifier<'a> {
    pub fn new(transport: &'a dyn NotificationTransport) -> Self {
        Self { transport }
    }

    /// Send one message covering every change of one user.
    pub async fn notify(&self, user: &str, changes: &ChangeSet) -> Result<()> {
        self.transport.send(&Self::build_message(user, changes)).await
    }

    /// Send a failure alert for a user that could not be processed.
    pub async fn alert(&self, user: &str, reason: &str) -> Result<()> {
        let message = Message {
            title: format!("Grade check failed for {user}"),
            body: format!("Could not check grades for {user}: {reason}"),
            tags: vec!["warning".into(), "x".into()],
        };
        self.transport.send(&message).await
    }

    /// Build the message for a change set.
    pub fn build_message(user: &str, changes: &ChangeSet) -> Message {
        let body = changes
            .iter()
            .map(|record| record.describe())
            .collect::<Vec<_>>()
            .join("\n");

        let mut tags = Vec::new();
        if changes.new_count() > 0 {
            tags.push("sparkles".to_string());
        }
        if changes.changed_count() > 0 {
            tags.push("warning".to_string());
        }

        let title = match (changes.new_count(), changes.changed_count()) {
            (_, 0) => format!("New grades for {user}"),
            (0, _) => format!("Grades changed for {user}"),
            _ => format!("New and changed grades for {user}"),
        };

        Message { title, body, tags }
    }
}
