#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use natours_api::auth::password::hash_password;
use natours_api::config::{AppConfig, Environment};
use natours_api::database::models::{Role, TOUR_SCHEMA, USER_SCHEMA};
use natours_api::database::{Document, DocumentStore, MemoryStore};
use natours_api::services::{CheckoutRequest, Mailer, MailerError, PaymentError, PaymentGateway, Recipient};
use natours_api::{app, AppState};

pub const PASSWORD: &str = "pass1234";

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub kind: &'static str,
    pub to: String,
    pub url: String,
}

/// Records every delivery; can be switched to fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    fn record(&self, kind: &'static str, to: &Recipient, url: &str) -> Result<(), MailerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError::Delivery("smtp unavailable".into()));
        }
        self.sent.lock().unwrap().push(SentMail { kind, to: to.email.clone(), url: url.to_string() });
        Ok(())
    }

    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<(), MailerError> {
        self.record("welcome", to, url)
    }

    async fn send_password_reset(&self, to: &Recipient, reset_url: &str) -> Result<(), MailerError> {
        self.record("password_reset", to, reset_url)
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<Value, PaymentError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(json!({
            "id": "cs_test_a1b2c3",
            "object": "checkout.session",
            "client_reference_id": request.client_reference_id,
        }))
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<dyn DocumentStore>,
    pub mailer: Arc<RecordingMailer>,
    pub payments: Arc<FakeGateway>,
}

pub fn test_config(environment: Environment) -> AppConfig {
    let mut config = match environment {
        Environment::Production => AppConfig::production(),
        Environment::Development => AppConfig::development(),
    };
    config.security.jwt_secret = "integration-test-secret".into();
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(Environment::Development, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(environment: Environment, store: Arc<dyn DocumentStore>) -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let payments = Arc::new(FakeGateway::default());
        let state = AppState::new(test_config(environment), store.clone(), mailer.clone(), payments.clone());
        Self { router: app(state.clone()), state, store, mailer, payments }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri).header(header::HOST, "localhost:3000");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Stores a user directly and returns (token, id).
    pub async fn user(&self, name: &str, email: &str, role: Role) -> (String, String) {
        let body = object(json!({
            "name": name,
            "email": email,
            "role": role.as_str(),
            "password": hash_password(PASSWORD).unwrap(),
        }));
        let user = self.store.insert(&USER_SCHEMA, body).await.unwrap();
        let id = user["id"].as_str().unwrap().to_string();
        (self.state.tokens.sign(&id).unwrap(), id)
    }

    pub async fn admin(&self) -> (String, String) {
        self.user("Jonas Schmedtmann", "admin@natours.io", Role::Admin).await
    }

    /// Stores a tour directly and returns its id.
    pub async fn tour(&self, name: &str, price: f64, extra: Value) -> String {
        let mut body = object(json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": price,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
        }));
        body.extend(object(extra));
        let tour = self.store.insert(&TOUR_SCHEMA, body).await.unwrap();
        tour["id"].as_str().unwrap().to_string()
    }
}

pub fn object(value: Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}
