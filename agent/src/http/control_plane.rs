//! Control-plane seam used by the upload workflow

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::UploadError;
use crate::http::client::HttpClient;
use crate::models::upload::{RegistryCredential, UploadOutcome};

/// Control-plane operations the upload needs, as a trait for testability
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetch registry credentials scoped to a deployment and artifact
    async fn fetch_credential(
        &self,
        deployment_id: &str,
        artifact_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RegistryCredential, UploadError>;

    /// Report the terminal outcome of an upload
    async fn notify(
        &self,
        deployment_id: &str,
        outcome: UploadOutcome,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError>;
}

#[async_trait]
impl ControlPlane for HttpClient {
    async fn fetch_credential(
        &self,
        deployment_id: &str,
        artifact_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RegistryCredential, UploadError> {
        self.get_docker_login(deployment_id, artifact_id, cancel).await
    }

    async fn notify(
        &self,
        deployment_id: &str,
        outcome: UploadOutcome,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        self.notify_docker_upload_completed(deployment_id, &outcome.into(), cancel)
            .await
    }
}
