// SPDX-License-Identifier: GPL-3.0-only

//! Single-thread executor for capture work
//!
//! Capture jobs and their completion callbacks run off the async runtime on
//! one dedicated thread, in submission order.

use crate::errors::CameraError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct ExecutorInner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

/// Dedicated capture thread
///
/// Clones submit to the same thread.
#[derive(Clone)]
pub struct CameraExecutor {
    inner: Arc<ExecutorInner>,
}

impl CameraExecutor {
    pub fn new() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = std::thread::Builder::new()
            .name("camera-executor".to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                debug!("Camera executor drained");
            })?;

        Ok(Self {
            inner: Arc::new(ExecutorInner {
                sender: Mutex::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
                shutdown: AtomicBool::new(false),
            }),
        })
    }

    /// Queue a job
    pub fn execute<F>(&self, job: F) -> Result<(), CameraError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender
                .send(Box::new(job))
                .map_err(|_| CameraError::ExecutorShutdown),
            None => Err(CameraError::ExecutorShutdown),
        }
    }

    /// Stop accepting jobs; queued jobs still run
    pub fn shutdown(&self) {
        if !self.inner.shutdown.swap(true, Ordering::SeqCst) {
            debug!("Shutting down camera executor");
        }
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Shut down and wait for queued jobs to finish
    pub fn await_termination(&self) {
        self.shutdown();
        let worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.thread().id() == std::thread::current().id() {
                warn!("await_termination called from the executor thread");
                return;
            }
            if worker.join().is_err() {
                warn!("Camera executor thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for CameraExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraExecutor")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_run_in_order() {
        let executor = CameraExecutor::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = seen.clone();
            executor
                .execute(move || seen.lock().unwrap().push(i))
                .unwrap();
        }
        executor.await_termination();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shutdown_rejects_new_jobs() {
        let executor = CameraExecutor::new().unwrap();
        executor.shutdown();
        assert!(executor.is_shutdown());
        assert!(matches!(
            executor.execute(|| {}),
            Err(CameraError::ExecutorShutdown)
        ));
    }

    #[test]
    fn test_jobs_run_on_dedicated_thread() {
        let executor = CameraExecutor::new().unwrap();
        let (tx, rx) = mpsc::channel();
        executor
            .execute(move || {
                let _ = tx.send(std::thread::current().name().map(str::to_string));
            })
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("camera-executor"));
    }
}
