#![allow(dead_code)]

use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    dev::ServiceResponse,
    http::StatusCode,
    test::{self, TestRequest},
};
use fake::{Fake, faker::internet::en::SafeEmail};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use overtime::database::InMemorySubmissionStore;
use overtime::services::AuthService;
use overtime::services::notifications::{NotificationEvent, Notifier};
use overtime::{AppState, Config};

pub fn setup_test_env() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// App state over an in-memory store, with the notification queue kept for
/// inspection instead of a dispatcher.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<InMemorySubmissionStore>,
    pub auth_service: AuthService,
    pub notifications: UnboundedReceiver<NotificationEvent>,
}

impl TestContext {
    pub fn new() -> Self {
        setup_test_env();
        let config = Config::test_config();
        let store = Arc::new(InMemorySubmissionStore::new());
        let (notifier, notifications) = Notifier::channel();

        TestContext {
            state: AppState::new(config.clone(), store.clone(), notifier),
            store,
            auth_service: AuthService::new(config),
            notifications,
        }
    }

    pub fn token(&self, email: &str, roles: &[&str]) -> String {
        self.auth_service
            .generate_token(email, roles)
            .expect("token generation should succeed")
    }

    pub fn drain_notifications(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.notifications.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn random_email() -> String {
    SafeEmail().fake()
}

pub fn auth_header(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn standard_submission(supervisor: &str) -> Value {
    json!({
        "kind": "standard",
        "supervisor": supervisor,
        "date": "2026-10-05",
        "hours": { "kind": "worked", "amount": 2.5 },
        "payment": true,
        "reason": "inventory"
    })
}

pub fn production_submission(supervisor: &str, headcount: u32) -> Value {
    json!({
        "kind": "production",
        "supervisor": supervisor,
        "workStartTime": "2026-10-05T14:00:00Z",
        "workEndTime": "2026-10-05T18:00:00Z",
        "hours": { "kind": "worked", "amount": 4.0 },
        "production": {
            "numberOfEmployees": headcount,
            "plannedArticles": [{ "number": "A-100", "quantity": 50 }]
        }
    })
}

pub fn insert_request(token: &str, body: &Value) -> TestRequest {
    TestRequest::post()
        .uri("/api/v1/overtime-submissions")
        .insert_header(auth_header(token))
        .set_json(body)
}

pub fn post(uri: &str, token: &str, body: Value) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .insert_header(auth_header(token))
        .set_json(body)
}

pub fn get(uri: &str, token: &str) -> TestRequest {
    TestRequest::get().uri(uri).insert_header(auth_header(token))
}

pub async fn read_json<B: MessageBody>(resp: ServiceResponse<B>) -> (StatusCode, Value) {
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

pub fn id_of(inserted: &Value) -> Uuid {
    inserted["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("insert response should carry an id")
}
