//! Fixed-size worker pool fed through a crossbeam channel.
//!
//! Workers block on a shared job receiver. Dropping the pool closes the
//! channel, lets every worker finish the job it holds, and joins the
//! threads.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::types::VisionError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A bounded set of long-lived worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::Spawn`] if the OS refuses a thread. Workers
    /// already started are shut down before returning.
    pub fn new(size: usize) -> Result<Self, VisionError> {
        let size = size.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
        };
        for index in 0..size {
            let receiver: Receiver<Job> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("detector-worker-{index}"))
                .spawn(move || {
                    for job in &receiver {
                        job();
                    }
                })?;
            pool.workers.push(handle);
        }
        log::debug!("worker pool started with {size} threads");
        Ok(pool)
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job for the next idle worker.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::PoolClosed`] if the workers are gone.
    pub fn submit<F>(&self, job: F) -> Result<(), VisionError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(VisionError::PoolClosed)?;
        sender.send(Box::new(job)).map_err(|_| VisionError::PoolClosed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's receive loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("detector worker exited by panic");
            }
        }
        log::debug!("worker pool shut down");
    }
}
