//! Docker image upload orchestration

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, field, info, info_span, Instrument, Span};

use crate::deploy::command::decode;
use crate::deploy::docker::ImageTransfer;
use crate::deploy::fsm::{UploadEvent, UploadFsm, UploadState};
use crate::deploy::retry::RetryPolicy;
use crate::errors::UploadError;
use crate::http::control_plane::ControlPlane;
use crate::models::upload::{CommandType, UploadOutcome, UploadRequest};
use crate::utils::generate_uuid;

/// Summary of a finished upload
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub invocation_id: String,
    pub deployment_id: String,
    pub artifact_id: String,
    pub registry_url: String,
    pub final_state: UploadState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs one upload: decode, fetch credentials, tag, login, push, notify
pub struct Uploader {
    control_plane: Arc<dyn ControlPlane>,
    transfer: Arc<dyn ImageTransfer>,
    retry: RetryPolicy,
}

impl Uploader {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        transfer: Arc<dyn ImageTransfer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            control_plane,
            transfer,
            retry,
        }
    }

    /// Upload the image described by `payload`.
    ///
    /// The control plane hears about the result only on success or when the
    /// push retry budget runs out. Earlier failures are only returned.
    pub async fn run(
        &self,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let invocation_id = generate_uuid();
        let span = info_span!(
            "upload",
            invocation = %invocation_id,
            deployment = field::Empty,
            artifact = field::Empty,
        );

        async {
            let mut fsm = UploadFsm::new();
            let result = self
                .execute(&invocation_id, payload, &mut fsm, cancel)
                .await;

            if let Err(e) = &result {
                if let Err(t) = fsm.process(UploadEvent::Fail(e.to_string())) {
                    error!("{}", t);
                }
                error!(
                    stage = ?fsm.failed_in(),
                    reported = e.is_reported(),
                    "Docker image upload failed: {}",
                    fsm.error().unwrap_or_default()
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        invocation_id: &str,
        payload: &str,
        fsm: &mut UploadFsm,
        cancel: &CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        let started_at = Utc::now();
        info!("Starting process to push your docker image to the registry...");

        // Decoding
        let request = decode(payload)?;
        validate(&request)?;
        Span::current().record("deployment", request.deployment_id.as_str());
        Span::current().record("artifact", request.artifact_id.as_str());
        advance(fsm)?;

        // FetchingCredential
        let credential = self
            .control_plane
            .fetch_credential(&request.deployment_id, &request.artifact_id, cancel)
            .await?;
        advance(fsm)?;

        // Tagging
        self.transfer
            .tag(&request.local_ref(), &credential.url, cancel)
            .await?;
        advance(fsm)?;

        // LoggingIn
        info!("Logging in to docker");
        self.transfer.login(&credential, cancel).await?;
        advance(fsm)?;

        // Pushing
        self.retry
            .push_with_retry(
                self.transfer.as_ref(),
                self.control_plane.as_ref(),
                &request.deployment_id,
                &credential.url,
                cancel,
            )
            .await?;
        info!("Successfully pushed your image to the registry!");
        advance(fsm)?;

        // NotifyingSuccess
        self.control_plane
            .notify(&request.deployment_id, UploadOutcome::success(), cancel)
            .await?;
        info!("Control plane notified that the docker image has been uploaded.");
        let final_state = advance(fsm)?;

        Ok(UploadReport {
            invocation_id: invocation_id.to_string(),
            deployment_id: request.deployment_id,
            artifact_id: request.artifact_id,
            registry_url: credential.url,
            final_state,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn advance(fsm: &mut UploadFsm) -> Result<UploadState, UploadError> {
    fsm.process(UploadEvent::Advance)
        .map_err(UploadError::TransitionError)
}

/// Checks the decoder leaves to the uploader
fn validate(request: &UploadRequest) -> Result<(), UploadError> {
    if let CommandType::Unknown(kind) = &request.command_type {
        return Err(UploadError::ValidationError(format!(
            "Unsupported command type: {}",
            kind
        )));
    }
    if request.image.trim().is_empty() {
        return Err(UploadError::ValidationError("Image must not be empty".to_string()));
    }
    if request.tag.trim().is_empty() {
        return Err(UploadError::ValidationError("Tag must not be empty".to_string()));
    }
    Ok(())
}
