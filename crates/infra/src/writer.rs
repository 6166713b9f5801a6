//! Single-writer queue.
//!
//! Every mutating command runs on one dedicated thread, in submission order,
//! so check-then-write sequences never interleave. Reads bypass the queue and
//! may lag by the one write currently running.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, mpsc};
use std::task::{Context, Poll};
use std::thread;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{RecordStore, StoreError};

type Job<S> = Box<dyn FnOnce(&S) + Send>;

/// Submission side of the writer thread.
///
/// Cheap to clone. The thread stops once every clone has been dropped and the
/// queue has drained.
pub struct WriteQueue<S> {
    tx: mpsc::Sender<Job<S>>,
    name: Arc<str>,
}

impl<S> Clone for WriteQueue<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            name: self.name.clone(),
        }
    }
}

impl<S> std::fmt::Debug for WriteQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue").field("name", &self.name).finish()
    }
}

impl<S: RecordStore + 'static> WriteQueue<S> {
    /// Spawn the writer thread over `store`.
    pub fn spawn(store: Arc<S>, name: impl Into<String>) -> Result<Self, StoreError> {
        let name: String = name.into();
        let (tx, rx) = mpsc::channel::<Job<S>>();

        let thread_name = name.clone();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || writer_loop(&thread_name, store, rx))
            .map_err(|e| StoreError::Unavailable(format!("failed to spawn writer thread: {e}")))?;

        Ok(Self {
            tx,
            name: name.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `work` behind every earlier submission.
    ///
    /// The returned handle may be awaited, waited on, or dropped; dropping it
    /// does not cancel the work.
    pub fn submit<T, F>(&self, operation: &'static str, work: F) -> CommandHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> ServiceResult<T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();

        let job: Job<S> = Box::new(move |store: &S| {
            let started = Instant::now();
            let result = work(store).map_err(|e| e.during(operation));
            match &result {
                Ok(_) => debug!(
                    operation,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "write committed"
                ),
                Err(e) => debug!(operation, kind = %e.kind(), error = %e, "write rejected"),
            }
            // The caller may have detached.
            let _ = done_tx.send(result);
        });

        if self.tx.send(job).is_err() {
            warn!(writer = %self.name, operation, "submit on stopped writer");
        }

        CommandHandle {
            operation,
            rx: done_rx,
        }
    }
}

fn writer_loop<S: RecordStore>(name: &str, store: Arc<S>, rx: mpsc::Receiver<Job<S>>) {
    info!(writer = %name, "writer started");

    let mut processed: u64 = 0;
    while let Ok(job) = rx.recv() {
        if catch_unwind(AssertUnwindSafe(|| job(&store))).is_err() {
            error!(writer = %name, "write job panicked");
        }
        processed += 1;
    }

    info!(writer = %name, processed, "writer stopped");
}

/// Completion handle for a queued write.
///
/// Implements `Future` for async callers; synchronous callers use
/// [`CommandHandle::wait`].
#[derive(Debug)]
#[must_use = "a dropped handle still runs the write; call `detach()` to make that explicit"]
pub struct CommandHandle<T> {
    operation: &'static str,
    rx: oneshot::Receiver<ServiceResult<T>>,
}

impl<T> CommandHandle<T> {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Block the current thread until the write finishes.
    ///
    /// Must not be called from inside an async runtime; await the handle there.
    pub fn wait(self) -> ServiceResult<T> {
        let operation = self.operation;
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(writer_stopped(operation)))
    }

    /// Let the write run without observing its result.
    pub fn detach(self) {}
}

impl<T> Future for CommandHandle<T> {
    type Output = ServiceResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let operation = self.operation;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or_else(|_| Err(writer_stopped(operation))))
    }
}

fn writer_stopped(operation: &'static str) -> ServiceError {
    ServiceError::store(operation, StoreError::WriterStopped)
}
