//! In-memory image transfer for tests and dry runs

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

use crate::deploy::docker::ImageTransfer;
use crate::errors::UploadError;
use crate::models::upload::RegistryCredential;

/// A recorded transfer invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    Tag { local_ref: String, registry_url: String },
    Login { url: String, username: String, password: String },
    Push { registry_url: String },
}

/// Records every call instead of running a tool.
///
/// Failures are scripted: each queued push error is consumed by one push
/// attempt, after which pushes succeed.
#[derive(Debug, Default)]
pub struct InMemoryTransfer {
    calls: Mutex<Vec<TransferCall>>,
    tag_error: Option<String>,
    login_error: Option<String>,
    push_errors: Mutex<VecDeque<String>>,
}

impl InMemoryTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_tag(mut self, error: impl Into<String>) -> Self {
        self.tag_error = Some(error.into());
        self
    }

    pub fn failing_login(mut self, error: impl Into<String>) -> Self {
        self.login_error = Some(error.into());
        self
    }

    /// Fail the next `errors.len()` push attempts, in order
    pub fn failing_pushes<I, S>(self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut queue = self.push_errors.lock().unwrap_or_else(|e| e.into_inner());
            queue.extend(errors.into_iter().map(Into::into));
        }
        self
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<TransferCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn push_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, TransferCall::Push { .. }))
            .count()
    }

    fn record(&self, call: TransferCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

fn ensure_live(cancel: &CancellationToken, what: &str) -> Result<(), UploadError> {
    if cancel.is_cancelled() {
        return Err(UploadError::Cancelled(format!("docker {} interrupted", what)));
    }
    Ok(())
}

#[async_trait]
impl ImageTransfer for InMemoryTransfer {
    async fn tag(
        &self,
        local_ref: &str,
        registry_url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        ensure_live(cancel, "tag")?;
        self.record(TransferCall::Tag {
            local_ref: local_ref.to_string(),
            registry_url: registry_url.to_string(),
        });
        match &self.tag_error {
            Some(e) => Err(UploadError::TagError(e.clone())),
            None => Ok(()),
        }
    }

    async fn login(
        &self,
        credential: &RegistryCredential,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        ensure_live(cancel, "login")?;
        self.record(TransferCall::Login {
            url: credential.login_url(),
            username: credential.username.clone(),
            password: credential.password.expose_secret().to_string(),
        });
        match &self.login_error {
            Some(e) => Err(UploadError::LoginError(e.clone())),
            None => Ok(()),
        }
    }

    async fn push(&self, registry_url: &str, cancel: &CancellationToken) -> Result<(), UploadError> {
        ensure_live(cancel, "push")?;
        self.record(TransferCall::Push {
            registry_url: registry_url.to_string(),
        });
        let scripted = self
            .push_errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(e) => Err(UploadError::PushError(e)),
            None => Ok(()),
        }
    }
}
