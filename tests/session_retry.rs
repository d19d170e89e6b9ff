//! Session lifecycle and retry semantics, driven against the scripted
//! in-memory registry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use caseflow_cli::config::AuthSettings;
use caseflow_cli::errors::{AutomationError, StepError};
use caseflow_cli::retry::RetryPolicy;
use caseflow_cli::session::{OperationOptions, SessionController};
use page_adapter::{MockRegistry, PageError, RegistryUi};

fn auth() -> AuthSettings {
    AuthSettings {
        username: "caseflow-user".into(),
        password: "pw".into(),
        admin_username: "caseflow-admin".into(),
        admin_password: "admin-pw".into(),
    }
}

fn mock() -> Arc<MockRegistry> {
    Arc::new(MockRegistry::new(
        "caseflow-user",
        "pw",
        "caseflow-admin",
        "admin-pw",
    ))
}

fn controller(mock: &Arc<MockRegistry>) -> SessionController {
    SessionController::new(mock.clone(), auth(), RetryPolicy::default())
}

#[tokio::test]
async fn disabled_retry_attempts_once_and_propagates_the_error() {
    let mock = mock();
    let session = controller(&mock);
    let invocations = Arc::new(AtomicU32::new(0));

    let counter = invocations.clone();
    let result: Result<(), _> = session
        .perform_logged_in_operation(OperationOptions::without_retry(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Page(PageError::WaitTimeout("postback".into())))
            }
        })
        .await;

    assert!(matches!(result, Err(AutomationError::Operation { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(mock.count_calls("open_login"), 1);
    assert_eq!(mock.count_calls("open_logout"), 1);
}

#[tokio::test]
async fn transient_failure_triggers_one_fresh_login_and_reattempt() {
    let mock = mock();
    let session = controller(&mock);
    let invocations = Arc::new(AtomicU32::new(0));

    let counter = invocations.clone();
    let result = session
        .perform_logged_in_operation(OperationOptions::standard(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StepError::Page(PageError::WaitTimeout("postback".into())))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    // Each attempt is a full session lifecycle.
    assert_eq!(mock.count_calls("open_login"), 2);
    assert_eq!(mock.count_calls("open_logout"), 2);
}

#[tokio::test]
async fn repeated_transient_failures_stop_at_the_bound() {
    let mock = mock();
    let session = controller(&mock);
    let invocations = Arc::new(AtomicU32::new(0));

    let counter = invocations.clone();
    let result: Result<(), _> = session
        .perform_logged_in_operation(OperationOptions::standard(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Page(PageError::WaitTimeout("postback".into())))
            }
        })
        .await;

    assert!(result.is_err());
    // Default policy: one retry, two attempts in total.
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert_eq!(mock.count_calls("open_logout"), 2);
}

#[tokio::test]
async fn registry_reported_errors_are_never_retried() {
    let mock = mock();
    mock.show_error_page("An unexpected error occurred");
    let session = controller(&mock);
    let invocations = Arc::new(AtomicU32::new(0));

    let counter = invocations.clone();
    let result: Result<(), _> = session
        .perform_logged_in_operation(OperationOptions::standard(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StepError::Page(PageError::WaitTimeout("postback".into())))
            }
        })
        .await;

    match result {
        Err(AutomationError::RegistryReported { details, .. }) => {
            assert_eq!(details, "An unexpected error occurred");
        }
        other => panic!("expected RegistryReported, got {other:?}"),
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(mock.count_calls("open_logout"), 1);
}

#[tokio::test]
async fn logout_runs_exactly_once_on_the_success_path() {
    let mock = mock();
    let session = controller(&mock);

    let result = session
        .perform_logged_in_operation(OperationOptions::standard(), || async { Ok(1) })
        .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(mock.count_calls("open_logout"), 1);
}

#[tokio::test]
async fn logout_failures_never_mask_the_operation_result() {
    let mock = mock();
    mock.fail_once("open_logout", PageError::NavTimeout("logout".into()));
    let session = controller(&mock);

    let result = session
        .perform_logged_in_operation(OperationOptions::without_retry(), || async { Ok(11) })
        .await;

    assert_eq!(result.unwrap(), 11);
}

#[tokio::test]
async fn as_admin_selects_the_admin_credential_pair() {
    let mock = mock();
    let session = controller(&mock);

    session
        .perform_logged_in_operation(OperationOptions::standard().as_admin(), || async { Ok(()) })
        .await
        .unwrap();

    assert_eq!(mock.count_calls("submit_credentials:caseflow-admin"), 1);
    assert_eq!(mock.count_calls("submit_credentials:caseflow-user"), 0);
}

#[tokio::test]
async fn rejected_login_surfaces_the_registry_message_and_stops() {
    let mock = mock();
    mock.set_inline_login_error("Invalid username or password");
    let session = controller(&mock);
    let invocations = Arc::new(AtomicU32::new(0));

    let counter = invocations.clone();
    let result: Result<(), _> = session
        .perform_logged_in_operation(OperationOptions::standard(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

    match result {
        Err(AutomationError::Authentication { message }) => {
            assert_eq!(message, "Invalid username or password");
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
    // The operation body never ran and the landing page was never checked.
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    assert_eq!(mock.count_calls("verify_landing"), 0);
    // The session is still released.
    assert_eq!(mock.count_calls("open_logout"), 1);
}

#[tokio::test]
async fn cancellation_before_the_session_starts_skips_login() {
    let mock = mock();
    let session = controller(&mock);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result: Result<(), _> = session
        .perform_logged_in_operation(
            OperationOptions::standard().with_cancel(cancel),
            || async { Ok(()) },
        )
        .await;

    assert!(matches!(result, Err(AutomationError::Interrupted { .. })));
    assert_eq!(mock.count_calls("open_login"), 0);
}

#[tokio::test]
async fn cancellation_inside_the_critical_section_still_logs_out() {
    let mock = mock();
    let session = controller(&mock);
    let cancel = CancellationToken::new();

    let token = cancel.clone();
    let result: Result<(), _> = session
        .perform_logged_in_operation(
            OperationOptions::standard().with_cancel(cancel),
            move || {
                let token = token.clone();
                async move {
                    // The caller cancels while the operation is mid-flight.
                    token.cancel();
                    Err(StepError::Fatal(AutomationError::interrupted(
                        "cancelled mid-flight",
                    )))
                }
            },
        )
        .await;

    assert!(matches!(result, Err(AutomationError::Interrupted { .. })));
    // Cancellation is fatal to retry, and the session is still released.
    assert_eq!(mock.count_calls("open_login"), 1);
    assert_eq!(mock.count_calls("open_logout"), 1);
}

#[tokio::test]
async fn concurrent_operations_serialize_on_the_single_session() {
    let mock = mock();
    let session = Arc::new(controller(&mock));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let session = session.clone();
        let ui = mock.clone();
        handles.push(tokio::spawn(async move {
            session
                .perform_logged_in_operation(OperationOptions::standard(), move || {
                    let ui = ui.clone();
                    async move {
                        // A body with several suspension points; without the
                        // session guard these would interleave.
                        ui.verify_landing().await?;
                        ui.current_url().await;
                        ui.verify_landing().await?;
                        Ok(())
                    }
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let calls = mock.calls();
    let logins: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_str() == "open_login")
        .map(|(i, _)| i)
        .collect();
    let logouts: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_str() == "open_logout")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(logins.len(), 2);
    assert_eq!(logouts.len(), 2);
    // The first operation fully releases the session before the second
    // operation's login begins.
    assert!(logouts[0] < logins[1]);
}
