//! Service layer for the grade watcher.
//!
//! This module contains the collaborators of the run coordinator:
//! - Grade fetching (`GradeSource`, implemented by `PortalClient`)
//! - Message delivery (`NotificationTransport`, implemented by `NtfyTransport`)
//! - Change formatting (`Notifier`)

mod notifier;
mod ntfy;
mod portal;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Credentials, GradeSnapshot};

pub use notifier::Notifier;
pub use ntfy::NtfyTransport;
pub use portal::PortalClient;

/// Source of a user's current grades.
#[async_trait]
pub trait GradeSource: Send + Sync {
    /// Fetch the full current snapshot.
    ///
    /// Fails with `Authentication`, `Network` or `Parse`.
    async fn fetch_grades(&self, credentials: &Credentials) -> Result<GradeSnapshot>;
}

/// Outbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// Delivery channel for notifications.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver one message. Fails with `Delivery`.
    async fn send(&self, message: &Message) -> Result<()>;
}
