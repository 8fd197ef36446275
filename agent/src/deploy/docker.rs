//! Docker CLI image transfer

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::UploadError;
use crate::models::upload::RegistryCredential;

/// Tag, login and push against a container registry
#[async_trait]
pub trait ImageTransfer: Send + Sync {
    /// Retag the local `image:tag` reference as `registry_url`
    async fn tag(
        &self,
        local_ref: &str,
        registry_url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError>;

    /// Authenticate to `https://{credential.url}`
    async fn login(
        &self,
        credential: &RegistryCredential,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError>;

    /// Upload the image previously tagged as `registry_url`
    async fn push(&self, registry_url: &str, cancel: &CancellationToken) -> Result<(), UploadError>;
}

/// Runs the `docker` binary, forwarding its stdout and stderr
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// Wait for the child, killing and reaping it if the invocation is cancelled
async fn wait_or_kill(
    mut child: Child,
    what: &str,
    cancel: &CancellationToken,
) -> Result<ExitStatus, UploadError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Cancelling docker {}", what);
            // kill() also waits, so the process is reaped here
            if let Err(e) = child.kill().await {
                warn!("Failed to kill docker {}: {}", what, e);
            }
            Err(UploadError::Cancelled(format!("docker {} interrupted", what)))
        }
        status = child.wait() => Ok(status?),
    }
}

fn check_status(status: ExitStatus, what: &str) -> Result<(), String> {
    if status.success() {
        Ok(())
    } else {
        Err(format!("docker {} exited with {}", what, status))
    }
}

#[async_trait]
impl ImageTransfer for DockerCli {
    async fn tag(
        &self,
        local_ref: &str,
        registry_url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        info!("Tagging image [{}] with [{}]", local_ref, registry_url);

        let child = self
            .command(&["tag", local_ref, registry_url])
            .spawn()
            .map_err(|e| UploadError::TagError(format!("Failed to run docker tag: {}", e)))?;

        let status = wait_or_kill(child, "tag", cancel).await?;
        check_status(status, "tag").map_err(UploadError::TagError)
    }

    async fn login(
        &self,
        credential: &RegistryCredential,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let registry_url = credential.login_url();
        info!("Logging in to {}", registry_url);

        let mut child = self
            .command(&[
                "login",
                "--username",
                credential.username.as_str(),
                "--password-stdin",
                registry_url.as_str(),
            ])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| UploadError::LoginError(format!("Failed to run docker login: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let write = async {
                stdin
                    .write_all(credential.password.expose_secret().as_bytes())
                    .await?;
                stdin.shutdown().await
            };
            // On cancel the write is abandoned and wait_or_kill reaps the child
            let written = tokio::select! {
                biased;
                _ = cancel.cancelled() => Ok(()),
                written = write => written,
            };
            // stdin is dropped here so docker sees EOF. A closed pipe means
            // the process already exited; its status decides the result.
            match written {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(UploadError::LoginError(format!(
                        "Failed to pass password to docker login: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        let status = wait_or_kill(child, "login", cancel).await?;
        check_status(status, "login").map_err(UploadError::LoginError)
    }

    async fn push(&self, registry_url: &str, cancel: &CancellationToken) -> Result<(), UploadError> {
        debug!("Pushing image: {}", registry_url);

        let child = self
            .command(&["push", registry_url])
            .spawn()
            .map_err(|e| UploadError::PushError(format!("Failed to run docker push: {}", e)))?;

        let status = wait_or_kill(child, "push", cancel).await?;
        check_status(status, "push").map_err(UploadError::PushError)
    }
}
