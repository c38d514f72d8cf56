//! Background IO worker
//!
//! One thread per source serves asynchronous requests in submission order.
//! Dropping the worker closes the queue; the thread finishes what is queued
//! and exits before the drop returns.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use void_resource::AssetReply;

use crate::error::{ServerError, ServerResult};
use crate::package::PackageSet;

/// FIFO worker thread reading and decoding assets
pub struct IoWorker {
    queue: Option<Sender<AssetReply>>,
    thread: Option<JoinHandle<()>>,
}

impl IoWorker {
    /// Start the worker thread
    pub fn spawn(packages: Arc<PackageSet>) -> ServerResult<Self> {
        let (queue, jobs) = crossbeam_channel::unbounded::<AssetReply>();
        let thread = std::thread::Builder::new()
            .name("void-asset-io".to_string())
            .spawn(move || {
                for reply in jobs.iter() {
                    let result = packages.read(reply.request());
                    if let Err(e) = &result {
                        log::debug!("Asset IO: {}", e);
                    }
                    reply.send(result);
                }
                log::debug!("Asset IO worker stopped");
            })
            .map_err(|e| ServerError::Worker(e.to_string()))?;

        Ok(Self {
            queue: Some(queue),
            thread: Some(thread),
        })
    }

    /// Queue a request. Returns `false` if the worker has stopped.
    pub fn submit(&self, reply: AssetReply) -> bool {
        match &self.queue {
            Some(queue) => queue.send(reply).is_ok(),
            None => false,
        }
    }

    /// Requests waiting to be served
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map(|q| q.len()).unwrap_or(0)
    }
}

impl Drop for IoWorker {
    fn drop(&mut self) {
        self.queue.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Asset IO worker panicked");
            }
        }
    }
}
