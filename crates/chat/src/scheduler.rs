//! Where message processing runs relative to the host's primary context.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, ThreadId},
};

use {
    tokio::runtime::Handle,
    tracing::{trace, warn},
};

use crate::{Result, error::Context};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Decides whether work must leave the current context and runs it elsewhere
/// when it must.
pub trait TaskScheduler: Send + Sync {
    /// Whether the caller is on the primary context, which must not block on
    /// message processing.
    fn is_primary(&self) -> bool;

    /// Run `task` off the primary context.
    fn run_async(&self, task: Task) -> Result<()>;
}

/// Never hands off; every task runs on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl TaskScheduler for InlineScheduler {
    fn is_primary(&self) -> bool {
        false
    }

    fn run_async(&self, task: Task) -> Result<()> {
        task();
        Ok(())
    }
}

/// Treats one thread as primary and hands work from it to tokio's blocking
/// pool. A handed-off task that panics is logged and counted.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    primary: ThreadId,
    failed: Arc<AtomicU64>,
}

impl TokioScheduler {
    /// Use the current runtime, with the calling thread as primary.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().context("no tokio runtime for message handoff")?;
        Ok(Self::new(handle, thread::current().id()))
    }

    pub fn new(handle: Handle, primary: ThreadId) -> Self {
        Self {
            handle,
            primary,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handed-off tasks that panicked or were cancelled.
    pub fn failed_tasks(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl TaskScheduler for TokioScheduler {
    fn is_primary(&self) -> bool {
        thread::current().id() == self.primary
    }

    fn run_async(&self, task: Task) -> Result<()> {
        trace!("handing message processing to blocking pool");
        let join = self.handle.spawn_blocking(task);
        let failed = Arc::clone(&self.failed);
        drop(self.handle.spawn(async move {
            if let Err(e) = join.await {
                failed.fetch_add(1, Ordering::Relaxed);
                warn!(panicked = e.is_panic(), error = %e, "handed-off message task failed");
            }
        }));
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicBool, time::Duration};

    use super::*;

    #[test]
    fn inline_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        assert!(!InlineScheduler.is_primary());
        InlineScheduler
            .run_async(Box::new(move || flag.store(true, Ordering::SeqCst)))
            .unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn tokio_scheduler_requires_runtime() {
        assert!(TokioScheduler::current().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tokio_scheduler_runs_off_primary() {
        let scheduler = TokioScheduler::current().unwrap();
        assert!(scheduler.is_primary());

        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler
            .run_async(Box::new(move || {
                let _ = tx.send(thread::current().id());
            }))
            .unwrap();
        let worker = rx.await.unwrap();
        assert_ne!(worker, thread::current().id());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_task_is_counted_and_scheduler_keeps_working() {
        let scheduler = TokioScheduler::current().unwrap();
        scheduler
            .run_async(Box::new(|| panic!("listener blew up")))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while scheduler.failed_tasks() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(scheduler.failed_tasks(), 1);

        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler
            .run_async(Box::new(move || {
                let _ = tx.send(());
            }))
            .unwrap();
        rx.await.unwrap();
        assert_eq!(scheduler.failed_tasks(), 1);
    }
}
