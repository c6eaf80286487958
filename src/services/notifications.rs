//! Outbound email for approval decisions.
//!
//! Mutations only enqueue [`NotificationEvent`]s after their write commits.
//! A [`NotificationDispatcher`] task drains the queue and retries delivery on
//! its own schedule, so a mail outage never fails a mutation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::OvertimeSubmission;
use crate::services::state_machine::ApprovalStage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationKind {
    Approved { stage: ApprovalStage },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub submission_id: Uuid,
    pub internal_id: String,
    pub recipient: String,
    pub kind: NotificationKind,
}

impl NotificationEvent {
    pub fn approved(submission: &OvertimeSubmission, stage: ApprovalStage) -> Self {
        Self {
            submission_id: submission.id,
            internal_id: submission.internal_id.clone(),
            recipient: submission.submitted_by.clone(),
            kind: NotificationKind::Approved { stage },
        }
    }

    pub fn rejected(submission: &OvertimeSubmission, reason: &str) -> Self {
        Self {
            submission_id: submission.id,
            internal_id: submission.internal_id.clone(),
            recipient: submission.submitted_by.clone(),
            kind: NotificationKind::Rejected {
                reason: reason.to_string(),
            },
        }
    }

    pub fn to_email(&self, client_base_url: &str) -> EmailMessage {
        let link = format!(
            "{}/overtime-submissions/{}",
            client_base_url.trim_end_matches('/'),
            self.submission_id
        );

        let (subject, body) = match &self.kind {
            NotificationKind::Approved {
                stage: ApprovalStage::Supervisor,
            } => (
                format!("Overtime {} approved by supervisor", self.internal_id),
                "Your overtime request was approved by your supervisor and now awaits the plant manager's decision.".to_string(),
            ),
            NotificationKind::Approved {
                stage: ApprovalStage::Final,
            } => (
                format!("Overtime {} approved", self.internal_id),
                "Your overtime submission was approved.".to_string(),
            ),
            NotificationKind::Rejected { reason } => (
                format!("Overtime {} rejected", self.internal_id),
                format!(
                    "Your overtime submission was rejected.</p><p>Reason: {}",
                    escape_html(reason)
                ),
            ),
        };

        EmailMessage {
            to: self.recipient.clone(),
            subject,
            html: format!("<p>{}</p><p><a href=\"{}\">Open submission</a></p>", body, link),
        }
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Writes messages to the log instead of an SMTP relay.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        log::info!(
            "mail from={} to={} subject={:?}",
            self.from,
            message.to,
            message.subject
        );
        log::debug!("mail body: {}", message.html);
        Ok(())
    }
}

/// Producer side of the notification outbox.
#[derive(Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: NotificationEvent) {
        if let Err(e) = self.sender.send(event) {
            log::warn!(
                "Notification for {} dropped, dispatcher is gone",
                e.0.internal_id
            );
        }
    }
}

pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    max_attempts: u32,
    base_backoff: Duration,
    client_base_url: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        Self {
            mailer,
            max_attempts: config.notification_max_attempts.max(1),
            base_backoff: Duration::from_millis(config.notification_backoff_ms),
            client_base_url: config.client_base_url.clone(),
        }
    }

    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<NotificationEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Drain the queue until every [`Notifier`] is dropped.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<NotificationEvent>) {
        log::info!("Notification dispatcher started");
        while let Some(event) = receiver.recv().await {
            self.deliver(&event).await;
        }
        log::info!("Notification dispatcher stopped");
    }

    /// Try to deliver one event, backing off exponentially between attempts.
    /// Returns whether the mailer eventually accepted it.
    pub async fn deliver(&self, event: &NotificationEvent) -> bool {
        let message = event.to_email(&self.client_base_url);

        for attempt in 1..=self.max_attempts {
            match self.mailer.send(&message).await {
                Ok(()) => {
                    log::debug!(
                        "Notification for {} delivered to {} (attempt {})",
                        event.internal_id,
                        message.to,
                        attempt
                    );
                    return true;
                }
                Err(e) if attempt < self.max_attempts => {
                    let backoff = self
                        .base_backoff
                        .saturating_mul(2u32.saturating_pow(attempt - 1));
                    log::warn!(
                        "Notification for {} failed (attempt {}/{}): {}; retrying in {:?}",
                        event.internal_id,
                        attempt,
                        self.max_attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    log::error!(
                        "Giving up on notification for {} to {} after {} attempts: {}",
                        event.internal_id,
                        message.to,
                        attempt,
                        e
                    );
                }
            }
        }
        false
    }
}
