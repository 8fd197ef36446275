//! API models

use serde::{Deserialize, Serialize};

/// Short-lived registry login issued for one deployment artifact
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerLoginResponse {
    /// Registry-qualified repository, without scheme
    pub url: String,
    pub user_name: String,
    pub password: String,
}

impl std::fmt::Debug for DockerLoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerLoginResponse")
            .field("url", &self.url)
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Completion report for a docker image upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyUploadCompleteRequest {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
