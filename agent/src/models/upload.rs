//! Upload models

use openapi_client::models::{DockerLoginResponse, NotifyUploadCompleteRequest};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Kind of poller command carried in the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandType {
    /// Push a user supplied docker image to the deployment registry
    PushDockerImage,

    /// Any command this agent does not handle
    Unknown(String),
}

impl CommandType {
    pub const PUSH_DOCKER_IMAGE: &'static str = "push_docker_image";
}

impl From<String> for CommandType {
    fn from(s: String) -> Self {
        if s == Self::PUSH_DOCKER_IMAGE {
            CommandType::PushDockerImage
        } else {
            CommandType::Unknown(s)
        }
    }
}

impl From<CommandType> for String {
    fn from(t: CommandType) -> Self {
        match t {
            CommandType::PushDockerImage => CommandType::PUSH_DOCKER_IMAGE.to_string(),
            CommandType::Unknown(s) => s,
        }
    }
}

/// A decoded docker push command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub artifact_id: String,

    /// Image name as the user built it, without tag
    #[serde(rename = "img")]
    pub image: String,

    pub tag: String,

    /// Correlation key for every control-plane call
    pub deployment_id: String,

    #[serde(rename = "type")]
    pub command_type: CommandType,
}

impl UploadRequest {
    /// The user supplied `image:tag` reference
    pub fn local_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Registry login issued by the control plane.
///
/// Never persisted. The password is only exposed when it is handed to the
/// transfer tool.
#[derive(Debug)]
pub struct RegistryCredential {
    pub url: String,
    pub username: String,
    pub password: SecretString,
}

impl RegistryCredential {
    /// Address the transfer tool authenticates against
    pub fn login_url(&self) -> String {
        format!("https://{}", self.url)
    }
}

impl From<DockerLoginResponse> for RegistryCredential {
    fn from(response: DockerLoginResponse) -> Self {
        Self {
            url: response.url,
            username: response.user_name,
            password: SecretString::from(response.password),
        }
    }
}

/// Terminal result of one upload, reported to the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub error_detail: Option<String>,
}

impl UploadOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error_detail: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error_detail: Some(error.into()),
        }
    }
}

impl From<UploadOutcome> for NotifyUploadCompleteRequest {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            success: outcome.success,
            error: outcome.error_detail,
        }
    }
}
