use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;

use crate::models::error::CaptureError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serial worker thread for session start/stop and graph reconfiguration.
///
/// Jobs run one at a time in submission order. Starting the hardware can
/// block for a while, so callers either fire and forget or wait explicitly
/// with [`SessionQueue::run_sync`].
pub struct SessionQueue {
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl SessionQueue {
    pub fn new(name: &str) -> Result<Self, CaptureError> {
        let (sender, receiver) = unbounded::<Job>();

        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn {} thread: {}", name, e)))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queue a job. Returns false once the queue has shut down.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Run a job on the queue and wait for its result.
    ///
    /// Called from the queue's own thread, the job runs inline.
    pub fn run_sync<T: Send + 'static>(&self, job: impl FnOnce() -> T + Send + 'static) -> Result<T, CaptureError> {
        if self.is_current() {
            return Ok(job());
        }

        let (tx, rx) = bounded(1);
        if !self.dispatch(move || {
            let _ = tx.send(job());
        }) {
            return Err(CaptureError::Unknown("session queue is shut down".into()));
        }
        rx.recv()
            .map_err(|_| CaptureError::Unknown("session queue dropped the job".into()))
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Stop accepting jobs, drain the ones already queued and join the thread.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if self.is_current() {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                log::error!("Session queue thread panicked");
            }
        }
    }
}

impl Drop for SessionQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
