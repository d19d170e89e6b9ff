//! Session ownership: login, logout, exclusivity.
//!
//! The registry allows one operator session per login, and the engine holds
//! exactly one browsing context, so every logged-in operation serializes on
//! a single-permit semaphore. Login and logout bracket every attempt; the
//! retry executor re-runs the whole bracket, never the bare body.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use caseflow_core_types::OperationId;
use page_adapter::RegistryUi;

use crate::classify::ErrorClassifier;
use crate::config::AuthSettings;
use crate::errors::{AutomationError, StepResult};
use crate::metrics;
use crate::retry::{RetryExecutor, RetryPolicy};

/// Per-operation options for [`SessionController::perform_logged_in_operation`].
#[derive(Clone, Debug)]
pub struct OperationOptions {
    pub as_admin: bool,
    pub retry_on_failure: bool,
    pub cancel: CancellationToken,
}

impl OperationOptions {
    /// Standard credentials, retry enabled.
    pub fn standard() -> Self {
        Self {
            as_admin: false,
            retry_on_failure: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Standard credentials, single attempt. For operations where a blind
    /// re-run could duplicate a record the engine cannot reconcile.
    pub fn without_retry() -> Self {
        Self {
            retry_on_failure: false,
            ..Self::standard()
        }
    }

    pub fn as_admin(mut self) -> Self {
        self.as_admin = true;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Owns the registry session and the right to use it.
pub struct SessionController {
    ui: Arc<dyn RegistryUi>,
    auth: AuthSettings,
    classifier: ErrorClassifier,
    retry: RetryExecutor,
    guard: Arc<Semaphore>,
}

impl SessionController {
    pub fn new(ui: Arc<dyn RegistryUi>, auth: AuthSettings, retry_policy: RetryPolicy) -> Self {
        Self {
            classifier: ErrorClassifier::new(ui.clone()),
            retry: RetryExecutor::new(retry_policy),
            guard: Arc::new(Semaphore::new(1)),
            ui,
            auth,
        }
    }

    /// Run `operation` inside an exclusive, authenticated session.
    ///
    /// Queues behind any in-flight operation, logs in with the selected
    /// credential pair, runs the body, and always logs out afterwards.
    /// Transient failures are re-attempted under a fresh login when
    /// `retry_on_failure` is set.
    pub async fn perform_logged_in_operation<T, F, Fut>(
        &self,
        options: OperationOptions,
        operation: F,
    ) -> Result<T, AutomationError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = StepResult<T>> + Send,
        T: Send,
    {
        let _permit = self
            .guard
            .acquire()
            .await
            .map_err(|_| AutomationError::interrupted("session guard closed"))?;

        if options.cancel.is_cancelled() {
            return Err(AutomationError::interrupted(
                "cancelled before the session started",
            ));
        }

        let operation_id = OperationId::new();
        info!(%operation_id, as_admin = options.as_admin, "starting logged-in operation");

        let result = self
            .retry
            .invoke(options.retry_on_failure, || {
                self.run_attempt(&options, &operation)
            })
            .await;

        match &result {
            Ok(_) => metrics::record_operation("success"),
            Err(err) => {
                metrics::record_operation("failure");
                error!(%operation_id, error = %err, "logged-in operation failed");
            }
        }
        result
    }

    /// One full session lifecycle: login, body, logout. Logout runs on every
    /// exit path and never replaces the body's outcome. Classification of a
    /// failed body happens before logout, while the browser still shows
    /// whatever the failure left behind.
    async fn run_attempt<T, F, Fut>(
        &self,
        options: &OperationOptions,
        operation: &F,
    ) -> Result<T, AutomationError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = StepResult<T>> + Send,
        T: Send,
    {
        let outcome = if options.cancel.is_cancelled() {
            Err(AutomationError::interrupted("cancelled before login"))
        } else {
            match self.log_in(options.as_admin).await {
                Ok(()) => match operation().await {
                    Ok(value) => Ok(value),
                    Err(failure) => Err(self.classifier.resolve(failure).await),
                },
                Err(err) => Err(err),
            }
        };
        self.log_out().await;
        outcome
    }

    async fn log_in(&self, as_admin: bool) -> Result<(), AutomationError> {
        let (username, password, role) = if as_admin {
            (
                self.auth.admin_username.as_str(),
                self.auth.admin_password.as_str(),
                "admin",
            )
        } else {
            (self.auth.username.as_str(), self.auth.password.as_str(), "standard")
        };
        metrics::record_login(role);
        let result = self.try_log_in(username, password).await;
        if result.is_err() {
            metrics::record_login_failure();
        }
        result
    }

    async fn try_log_in(&self, username: &str, password: &str) -> Result<(), AutomationError> {
        if let Err(err) = self.ui.open_login().await {
            return Err(self.classifier.classify(err).await);
        }
        if let Err(err) = self.ui.submit_credentials(username, password).await {
            return Err(self.classifier.classify(err).await);
        }
        match self.ui.login_failure_message().await {
            Ok(Some(message)) => return Err(AutomationError::Authentication { message }),
            Ok(None) => {}
            Err(err) => return Err(self.classifier.classify(err).await),
        }
        if let Err(err) = self.ui.verify_landing().await {
            return Err(self.classifier.classify(err).await);
        }
        Ok(())
    }

    /// Logout failures are logged and swallowed. By the time logout runs the
    /// operation's outcome is already decided, and a failed logout must not
    /// mask it.
    async fn log_out(&self) {
        if let Err(err) = self.ui.open_logout().await {
            metrics::record_logout_failure();
            error!(error = %err, "error attempting to log out of the registry");
        }
    }
}
