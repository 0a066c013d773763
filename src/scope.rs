// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test scopes with guaranteed cleanup on exit.

use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// How the test body of a scope ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    Passed,
    Failed,
}

impl ScopeOutcome {
    pub fn is_failed(self) -> bool {
        self == ScopeOutcome::Failed
    }
}

/// When a deferred cleanup runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    Always,
    /// Skip when the scope failed, leaving resources for post-mortem debugging
    KeepOnFailure,
}

impl CleanupPolicy {
    pub fn from_no_cleanup_on_failure(no_cleanup_on_failure: bool) -> Self {
        if no_cleanup_on_failure {
            CleanupPolicy::KeepOnFailure
        } else {
            CleanupPolicy::Always
        }
    }
}

type CleanupFn = Box<dyn FnOnce(ScopeOutcome) -> BoxFuture<'static, Result<()>> + Send>;

struct Cleanup {
    label: String,
    policy: CleanupPolicy,
    run: CleanupFn,
}

/// Tracks cleanups registered during a test. Cleanups run in reverse order
/// of registration when the scope closes.
#[derive(Clone)]
pub struct TestScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    name: String,
    failed: AtomicBool,
    cleanups: Mutex<Vec<Cleanup>>,
}

impl TestScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name: name.into(),
                failed: AtomicBool::new(false),
                cleanups: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register `cleanup` to run when the scope closes
    pub fn defer<F, Fut>(&self, label: impl Into<String>, cleanup: F)
    where
        F: FnOnce(ScopeOutcome) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.defer_with_policy(label, CleanupPolicy::Always, cleanup);
    }

    /// Register `cleanup` to run when the scope closes, subject to `policy`
    pub fn defer_with_policy<F, Fut>(
        &self,
        label: impl Into<String>,
        policy: CleanupPolicy,
        cleanup: F,
    ) where
        F: FnOnce(ScopeOutcome) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        debug!("Scope {}: registered cleanup {} ({:?})", self.inner.name, label, policy);
        self.inner.cleanups().push(Cleanup {
            label,
            policy,
            run: Box::new(move |outcome| cleanup(outcome).boxed()),
        });
    }

    pub fn mark_failed(&self) {
        self.inner.failed.store(true, Ordering::SeqCst);
    }

    pub fn outcome(&self) -> ScopeOutcome {
        if self.inner.failed.load(Ordering::SeqCst) {
            ScopeOutcome::Failed
        } else {
            ScopeOutcome::Passed
        }
    }

    /// Number of cleanups that have not run yet
    pub fn pending(&self) -> usize {
        self.inner.cleanups().len()
    }

    /// Labels of the cleanups that have not run yet, oldest first
    pub fn pending_labels(&self) -> Vec<String> {
        self.inner.cleanups().iter().map(|c| c.label.clone()).collect()
    }

    /// Run every pending cleanup, newest first. All cleanups run even when
    /// one fails; the first error is returned.
    pub async fn close(&self) -> Result<()> {
        let outcome = self.outcome();
        let cleanups = std::mem::take(&mut *self.inner.cleanups());

        let mut first_error = None;
        for cleanup in cleanups.into_iter().rev() {
            if outcome.is_failed() && cleanup.policy == CleanupPolicy::KeepOnFailure {
                warn!(
                    "Scope {} failed, skipping cleanup {} for debugging",
                    self.inner.name, cleanup.label
                );
                continue;
            }

            info!("Scope {}: running cleanup {}", self.inner.name, cleanup.label);
            if let Err(e) = (cleanup.run)(outcome).await {
                error!("Scope {}: cleanup {} failed: {}", self.inner.name, cleanup.label, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run `body` in this scope. The scope is marked failed if the body
    /// returns an error or panics, and is always closed afterwards. Panics
    /// are resumed once cleanup has run. Ctrl-C interrupts the body and
    /// closes the scope as failed.
    pub async fn run<F, Fut, T>(&self, body: F) -> anyhow::Result<T>
    where
        F: FnOnce(TestScope) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run_until(body, ctrl_c()).await
    }

    /// Like [`TestScope::run`], but the body is abandoned as soon as
    /// `shutdown` completes.
    pub async fn run_until<F, Fut, T, S>(&self, body: F, shutdown: S) -> anyhow::Result<T>
    where
        F: FnOnce(TestScope) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        S: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            result = AssertUnwindSafe(body(self.clone())).catch_unwind() => {
                self.finish(result).await
            }
            _ = shutdown => {
                warn!("Scope {} interrupted, running cleanups", self.inner.name);
                self.mark_failed();
                if let Err(e) = self.close().await {
                    error!("Scope {}: cleanup after interrupt failed: {}", self.inner.name, e);
                }
                Err(anyhow::anyhow!("scope {} interrupted", self.inner.name))
            }
        }
    }

    async fn finish<T>(
        &self,
        result: std::thread::Result<anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        if !matches!(result, Ok(Ok(_))) {
            self.mark_failed();
        }

        let cleanup = self.close().await;

        match result {
            Err(panic) => {
                if let Err(e) = cleanup {
                    error!("Scope {}: cleanup after panic failed: {}", self.inner.name, e);
                }
                std::panic::resume_unwind(panic)
            }
            Ok(Err(e)) => {
                if let Err(cleanup_err) = cleanup {
                    error!("Scope {}: cleanup failed: {}", self.inner.name, cleanup_err);
                }
                Err(e)
            }
            Ok(Ok(value)) => {
                cleanup?;
                Ok(value)
            }
        }
    }
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

impl ScopeInner {
    fn cleanups(&self) -> MutexGuard<'_, Vec<Cleanup>> {
        self.cleanups.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        let pending = self.cleanups().len();
        if pending > 0 {
            warn!("Scope {} dropped with {} cleanups that never ran", self.name, pending);
        }
    }
}
