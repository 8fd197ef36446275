//! Bounded retry for the registry push

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::deploy::docker::ImageTransfer;
use crate::errors::UploadError;
use crate::http::control_plane::ControlPlane;
use crate::models::upload::UploadOutcome;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Total push attempts, including the first one
pub const PUSH_ATTEMPTS: u32 = 3;

/// Backoff for the push step. The attempt budget is always [`PUSH_ATTEMPTS`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff between attempts
    pub cooldown: CooldownOptions,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            cooldown: CooldownOptions {
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
            },
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError {
    /// Every attempt failed
    Exhausted { attempts: u32, last_error: UploadError },

    /// Stopped early without using the whole budget (cancellation)
    Aborted(UploadError),
}

impl RetryPolicy {
    /// Policy that retries without waiting between attempts
    pub fn immediate() -> Self {
        Self {
            cooldown: CooldownOptions {
                base_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                multiplier: 1.0,
            },
        }
    }

    /// Run `op` until it succeeds or [`PUSH_ATTEMPTS`] attempts have failed.
    ///
    /// `on_retry` is called before every attempt after the first with the
    /// attempt number (starting at 2) and the error of the previous attempt.
    pub async fn retry<T, F, Fut, R>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        mut on_retry: R,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
        R: FnMut(u32, &UploadError),
    {
        let attempts = PUSH_ATTEMPTS;
        let mut attempt = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e @ UploadError::Cancelled(_)) => return Err(RetryError::Aborted(e)),
                Err(e) => e,
            };

            if attempt >= attempts {
                return Err(RetryError::Exhausted {
                    attempts,
                    last_error: err,
                });
            }

            let delay = calc_exp_backoff(&self.cooldown, attempt - 1);
            attempt += 1;
            on_retry(attempt, &err);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Aborted(UploadError::Cancelled(
                        "retry backoff interrupted".to_string(),
                    )));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Push `registry_url`, retrying transient failures.
    ///
    /// When the budget is spent the control plane is told about the failure
    /// here, before the error is returned. Callers must not notify again.
    pub async fn push_with_retry(
        &self,
        transfer: &dyn ImageTransfer,
        control_plane: &dyn ControlPlane,
        deployment_id: &str,
        registry_url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let result = self
            .retry(
                cancel,
                || transfer.push(registry_url, cancel),
                |attempt, err| {
                    warn!(
                        attempt,
                        "Unable to push docker image to registry. Retrying request after error: {}",
                        err
                    );
                },
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Aborted(e)) => Err(e),
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                let last_error = last_error.to_string();
                error!("Giving up on docker push after {} attempts: {}", attempts, last_error);

                let outcome = UploadOutcome::failure(last_error.clone());
                let notified = match control_plane.notify(deployment_id, outcome, cancel).await {
                    Ok(()) => {
                        info!("Control plane notified of failed docker upload");
                        true
                    }
                    Err(e) => {
                        error!("Failed to notify control plane of failed upload: {}", e);
                        false
                    }
                };

                Err(UploadError::PushExhausted {
                    attempts,
                    last_error,
                    notified,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let policy = RetryPolicy::immediate();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();

        let result = policy
            .retry(
                &cancel,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if n < 3 {
                            Err(UploadError::PushError(format!("attempt {}", n)))
                        } else {
                            Ok(n)
                        }
                    }
                },
                |attempt, err| retries.push((attempt, err.to_string())),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.len(), 2);
        assert_eq!(retries[0], (2, "Push error: attempt 1".to_string()));
        assert_eq!(retries[1], (3, "Push error: attempt 2".to_string()));
    }

    #[tokio::test]
    async fn test_retry_stops_at_budget() {
        let policy = RetryPolicy::immediate();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let mut retries = 0;

        let result: Result<(), _> = policy
            .retry(
                &cancel,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Err(UploadError::PushError(format!("attempt {}", n))) }
                },
                |_, _| retries += 1,
            )
            .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.to_string(), "Push error: attempt 3");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_retried() {
        let policy = RetryPolicy::immediate();
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .retry(
                &cancel,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(UploadError::Cancelled("stop".to_string())) }
                },
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(RetryError::Aborted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_backoff() {
        let cooldown = RetryPolicy::default().cooldown;
        assert_eq!(cooldown.base_delay, Duration::from_millis(100));
        assert_eq!(cooldown.max_delay, Duration::from_secs(10));
    }
}
