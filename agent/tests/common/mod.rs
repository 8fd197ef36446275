//! Shared test helpers

#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use pushagent::deploy::memory::InMemoryTransfer;
use pushagent::deploy::retry::RetryPolicy;
use pushagent::deploy::uploader::Uploader;
use pushagent::errors::UploadError;
use pushagent::http::control_plane::ControlPlane;
use pushagent::models::upload::{RegistryCredential, UploadOutcome};

/// A recorded control-plane call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaneCall {
    FetchCredential {
        deployment_id: String,
        artifact_id: String,
    },
    Notify {
        deployment_id: String,
        outcome: UploadOutcome,
    },
}

/// In-memory control plane that hands out a fixed credential
pub struct FakeControlPlane {
    url: String,
    username: String,
    password: String,
    fetch_error: Option<String>,
    notify_error: Option<String>,
    calls: Mutex<Vec<PlaneCall>>,
}

impl FakeControlPlane {
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            fetch_error: None,
            notify_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_fetch(mut self, error: &str) -> Self {
        self.fetch_error = Some(error.to_string());
        self
    }

    pub fn failing_notify(mut self, error: &str) -> Self {
        self.notify_error = Some(error.to_string());
        self
    }

    pub fn calls(&self) -> Vec<PlaneCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<UploadOutcome> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlaneCall::Notify { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn fetch_credential(
        &self,
        deployment_id: &str,
        artifact_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<RegistryCredential, UploadError> {
        self.calls.lock().unwrap().push(PlaneCall::FetchCredential {
            deployment_id: deployment_id.to_string(),
            artifact_id: artifact_id.to_string(),
        });
        if let Some(e) = &self.fetch_error {
            return Err(UploadError::RemoteError(e.clone()));
        }
        Ok(RegistryCredential {
            url: self.url.clone(),
            username: self.username.clone(),
            password: SecretString::from(self.password.clone()),
        })
    }

    async fn notify(
        &self,
        deployment_id: &str,
        outcome: UploadOutcome,
        _cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        self.calls.lock().unwrap().push(PlaneCall::Notify {
            deployment_id: deployment_id.to_string(),
            outcome,
        });
        match &self.notify_error {
            Some(e) => Err(UploadError::RemoteError(e.clone())),
            None => Ok(()),
        }
    }
}

pub const SCENARIO_PAYLOAD: &str = r#"{
    "artifactId": "a1",
    "img": "myrepo/app",
    "tag": "v1",
    "deploymentId": "d1",
    "type": "push_docker_image"
}"#;

pub fn scenario_plane() -> FakeControlPlane {
    FakeControlPlane::new("ecr.example/d1", "u", "p")
}

pub fn uploader(plane: &Arc<FakeControlPlane>, transfer: &Arc<InMemoryTransfer>) -> Uploader {
    Uploader::new(plane.clone(), transfer.clone(), RetryPolicy::immediate())
}

/// A tracing event seen by [`LogCapture`]
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Layer that keeps every event emitted while it is the default subscriber
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Make this the subscriber for the current thread until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn events_at(&self, level: Level) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == level)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}
