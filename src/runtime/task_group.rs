// src/runtime/task_group.rs

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};

/// An asynchronous WaitGroup over spawned tasks, similar to Go's
/// `sync.WaitGroup`, that can also abort whatever is still running.
///
/// Every task a socket spawns goes through its group so `close` can wait
/// for all of them and force-stop stragglers.
#[derive(Debug, Clone)]
pub(crate) struct TaskGroup {
  count: Arc<AtomicUsize>,
  notify_on_zero: Arc<Notify>,
  aborts: Arc<Mutex<Vec<AbortHandle>>>,
}

/// Decrements the group when a task finishes, panics or is aborted.
struct DoneGuard(TaskGroup);

impl Drop for DoneGuard {
  fn drop(&mut self) {
    self.0.done();
  }
}

impl TaskGroup {
  pub fn new() -> Self {
    Self {
      count: Arc::new(AtomicUsize::new(0)),
      notify_on_zero: Arc::new(Notify::new()),
      aborts: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Spawns `future` on the runtime as a member of this group.
  pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
  where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
  {
    self.count.fetch_add(1, Ordering::Relaxed);
    let guard = DoneGuard(self.clone());
    let handle = tokio::spawn(async move {
      let _guard = guard;
      future.await
    });
    let mut aborts = self.aborts.lock();
    aborts.retain(|h| !h.is_finished());
    aborts.push(handle.abort_handle());
    handle
  }

  fn done(&self) {
    let old_count = self.count.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(old_count > 0, "TaskGroup count underflow");
    if old_count == 1 {
      self.notify_on_zero.notify_waiters();
      tracing::trace!("TaskGroup count reached zero, notifying waiters");
    }
  }

  /// Waits until every spawned task has finished.
  pub async fn wait(&self) {
    loop {
      let notified = self.notify_on_zero.notified();
      tokio::pin!(notified);
      // Register before checking so a concurrent `done` cannot be missed.
      notified.as_mut().enable();
      if self.count.load(Ordering::Acquire) == 0 {
        return;
      }
      notified.await;
    }
  }

  /// Aborts all tasks still running. Their guards still run.
  pub fn abort_all(&self) {
    for handle in self.aborts.lock().drain(..) {
      handle.abort();
    }
  }

  pub fn len(&self) -> usize {
    self.count.load(Ordering::Acquire)
  }
}
