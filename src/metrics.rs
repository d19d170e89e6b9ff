//! Engine metrics: operation outcomes, retries, session lifecycle.

use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounter, IntCounterVec, Registry};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub operations: u64,
    pub operation_failures: u64,
    pub retries: u64,
    pub logins: u64,
    pub login_failures: u64,
    pub logout_failures: u64,
}

static OPERATIONS: AtomicU64 = AtomicU64::new(0);
static OPERATION_FAILURES: AtomicU64 = AtomicU64::new(0);
static RETRIES: AtomicU64 = AtomicU64::new(0);
static LOGINS: AtomicU64 = AtomicU64::new(0);
static LOGIN_FAILURES: AtomicU64 = AtomicU64::new(0);
static LOGOUT_FAILURES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "caseflow_operations_total",
            "Logged-in operations executed"
        ),
        &["outcome"]
    )
    .unwrap();
    static ref RETRIES_TOTAL: IntCounter = IntCounter::new(
        "caseflow_operation_retries_total",
        "Attempts retried after a transient failure"
    )
    .unwrap();
    static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("caseflow_logins_total", "Registry login attempts"),
        &["role"]
    )
    .unwrap();
    static ref LOGIN_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "caseflow_login_failures_total",
        "Registry login attempts that failed"
    )
    .unwrap();
    static ref LOGOUT_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "caseflow_logout_failures_total",
        "Logout attempts that failed (swallowed)"
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register engine metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, OPERATIONS_TOTAL.clone());
    register(registry, RETRIES_TOTAL.clone());
    register(registry, LOGINS_TOTAL.clone());
    register(registry, LOGIN_FAILURES_TOTAL.clone());
    register(registry, LOGOUT_FAILURES_TOTAL.clone());
}

pub fn record_operation(outcome: &str) {
    OPERATIONS.fetch_add(1, Ordering::Relaxed);
    if outcome != "success" {
        OPERATION_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
    OPERATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_retry() {
    RETRIES.fetch_add(1, Ordering::Relaxed);
    RETRIES_TOTAL.inc();
}

pub fn record_login(role: &str) {
    LOGINS.fetch_add(1, Ordering::Relaxed);
    LOGINS_TOTAL.with_label_values(&[role]).inc();
}

pub fn record_login_failure() {
    LOGIN_FAILURES.fetch_add(1, Ordering::Relaxed);
    LOGIN_FAILURES_TOTAL.inc();
}

pub fn record_logout_failure() {
    LOGOUT_FAILURES.fetch_add(1, Ordering::Relaxed);
    LOGOUT_FAILURES_TOTAL.inc();
}

pub fn snapshot() -> EngineMetricsSnapshot {
    EngineMetricsSnapshot {
        operations: OPERATIONS.load(Ordering::Relaxed),
        operation_failures: OPERATION_FAILURES.load(Ordering::Relaxed),
        retries: RETRIES.load(Ordering::Relaxed),
        logins: LOGINS.load(Ordering::Relaxed),
        login_failures: LOGIN_FAILURES.load(Ordering::Relaxed),
        logout_failures: LOGOUT_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    OPERATIONS.store(0, Ordering::Relaxed);
    OPERATION_FAILURES.store(0, Ordering::Relaxed);
    RETRIES.store(0, Ordering::Relaxed);
    LOGINS.store(0, Ordering::Relaxed);
    LOGIN_FAILURES.store(0, Ordering::Relaxed);
    LOGOUT_FAILURES.store(0, Ordering::Relaxed);
}
