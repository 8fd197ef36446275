//! Upload completion API client

use openapi_client::models::NotifyUploadCompleteRequest;
use tokio_util::sync::CancellationToken;

use crate::errors::UploadError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Tell the control plane how the docker upload for a deployment ended
    pub async fn notify_docker_upload_completed(
        &self,
        deployment_id: &str,
        body: &NotifyUploadCompleteRequest,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let path = format!("/deployments/{}/docker-upload-completed", deployment_id);
        self.post(&path, body, cancel).await
    }
}
