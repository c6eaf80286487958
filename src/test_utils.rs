use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::database::memory::InMemorySubmissionStore;
use crate::database::models::*;
use crate::database::store::{StatusChange, SubmissionStore};
use crate::middleware::CacheLayer;
use crate::services::notifications::{EmailMessage, Mailer, NotificationEvent, Notifier};
use crate::services::overtime::OvertimeService;
use crate::services::policy::Actor;

pub fn actor(email: &str, roles: &[&str]) -> Actor {
    Actor::new(email, roles.iter().map(|r| r.to_string()).collect())
}

/// A valid submission of `kind` owned by `owner@plant.test` and supervised by
/// `boss@plant.test`, in `status`.
pub fn submission(kind: SubmissionKind, status: OvertimeStatus) -> OvertimeSubmission {
    let created_at = Utc::now();
    let mut details = SubmissionDetails {
        supervisor: "boss@plant.test".to_string(),
        responsible_employee: None,
        date: NaiveDate::from_ymd_opt(2026, 10, 5),
        work_start_time: None,
        work_end_time: None,
        hours: Hours::worked(4.0),
        payment: true,
        scheduled_day_off: None,
        reason: Some("line changeover".to_string()),
        note: None,
        production: None,
    };

    if kind != SubmissionKind::Standard {
        details.date = None;
        details.work_start_time = Utc.with_ymd_and_hms(2026, 10, 5, 14, 0, 0).single();
        details.work_end_time = Utc.with_ymd_and_hms(2026, 10, 5, 18, 0, 0).single();
    }
    if kind == SubmissionKind::Production {
        details.production = Some(ProductionDetails {
            number_of_employees: 2,
            planned_articles: vec![Article {
                number: "A-100".to_string(),
                quantity: 50,
            }],
            ..Default::default()
        });
    }

    OvertimeSubmission {
        id: Uuid::new_v4(),
        internal_id: "1/26".to_string(),
        kind,
        status,
        submitted_by: "owner@plant.test".to_string(),
        details,
        audit: AuditTrail {
            requested: Some(Stamp::new("owner@plant.test", created_at)),
            ..Default::default()
        },
        edit_history: Vec::new(),
        correction_history: Vec::new(),
        version: 1,
        created_at,
    }
}

/// Input that passes validation for a standard submission.
pub fn standard_input() -> SubmissionInput {
    SubmissionInput {
        kind: SubmissionKind::Standard,
        supervisor: "boss@plant.test".to_string(),
        responsible_employee: None,
        date: NaiveDate::from_ymd_opt(2026, 10, 5),
        work_start_time: None,
        work_end_time: None,
        hours: Hours::worked(2.5),
        payment: true,
        scheduled_day_off: None,
        reason: Some("inventory".to_string()),
        note: None,
        production: None,
        status: None,
    }
}

/// The engine wired to an in-memory store, with the notification queue kept
/// for inspection instead of a dispatcher.
pub struct ServiceHarness {
    pub store: Arc<InMemorySubmissionStore>,
    pub service: OvertimeService,
    notifications: Mutex<UnboundedReceiver<NotificationEvent>>,
}

impl ServiceHarness {
    pub fn new() -> Self {
        let store = Arc::new(InMemorySubmissionStore::new());
        let (notifier, receiver) = Notifier::channel();
        let service = OvertimeService::new(store.clone(), notifier, CacheLayer::new(100, 60));
        Self {
            store,
            service,
            notifications: Mutex::new(receiver),
        }
    }

    /// Like `new`, but every conditional status write loses to another writer.
    pub fn contended() -> Self {
        let store = Arc::new(InMemorySubmissionStore::new());
        let (notifier, receiver) = Notifier::channel();
        let contended = Arc::new(ContendedStore {
            inner: store.clone(),
        });
        let service = OvertimeService::new(contended, notifier, CacheLayer::new(100, 60));
        Self {
            store,
            service,
            notifications: Mutex::new(receiver),
        }
    }

    pub async fn seed(&self, submission: OvertimeSubmission) -> Uuid {
        let id = submission.id;
        self.store.seed(submission).await;
        id
    }

    pub async fn get(&self, id: Uuid) -> OvertimeSubmission {
        self.store
            .find_by_id(id)
            .await
            .unwrap()
            .expect("seeded submission should exist")
    }

    pub async fn status(&self, id: Uuid) -> OvertimeStatus {
        self.get(id).await.status
    }

    pub fn drain_notifications(&self) -> Vec<NotificationEvent> {
        let mut receiver = self.notifications.lock().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Reads through to `inner`; status writes never match.
pub struct ContendedStore {
    inner: Arc<InMemorySubmissionStore>,
}

#[async_trait]
impl SubmissionStore for ContendedStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OvertimeSubmission>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OvertimeSubmission>> {
        self.inner.find_by_ids(ids).await
    }

    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<OvertimeSubmission>> {
        self.inner.find(filter).await
    }

    async fn insert(&self, submission: NewOvertimeSubmission) -> Result<OvertimeSubmission> {
        self.inner.insert(submission).await
    }

    async fn replace(&self, submission: &OvertimeSubmission) -> Result<bool> {
        self.inner.replace(submission).await
    }

    async fn apply_status_change(&self, _ids: &[Uuid], _change: &StatusChange) -> Result<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn next_internal_sequence(&self, year_suffix: &str) -> Result<u32> {
        self.inner.next_internal_sequence(year_suffix).await
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Fails the first `failures` sends, then delivers.
pub struct FlakyMailer {
    failures: u32,
    attempts: Mutex<u32>,
    delivered: Mutex<Vec<EmailMessage>>,
}

impl FlakyMailer {
    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures,
            attempts: Mutex::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }

    pub fn delivered(&self) -> Vec<EmailMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FlakyMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if attempt <= self.failures {
            return Err(anyhow!("smtp relay unavailable"));
        }
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}
