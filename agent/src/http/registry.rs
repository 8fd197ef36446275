//! Registry credential API client

use openapi_client::models::DockerLoginResponse;
use tokio_util::sync::CancellationToken;

use crate::errors::UploadError;
use crate::http::client::HttpClient;
use crate::models::upload::RegistryCredential;

impl HttpClient {
    /// Request a short-lived registry login for one deployment artifact
    pub async fn get_docker_login(
        &self,
        deployment_id: &str,
        artifact_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RegistryCredential, UploadError> {
        let path = format!(
            "/deployments/{}/artifacts/{}/docker-login",
            deployment_id, artifact_id
        );
        let response: DockerLoginResponse = self.get(&path, cancel).await?;
        Ok(response.into())
    }
}
