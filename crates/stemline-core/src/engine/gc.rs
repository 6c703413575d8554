//! Deferred deallocation for the audio thread
//!
//! Dropping a `basedrop::Shared` or `Owned` on the audio thread only enqueues
//! a pointer. The [`Reclaimer`] owns the `Collector` on a background thread
//! that frees queued values periodically. Asset buffers and replaced
//! timelines are released this way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::{Collector, Handle};

/// How often the collector thread frees queued values
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the collector thread; dropping it stops the thread after a final
/// collection pass
pub struct Reclaimer {
    handle: Handle,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Reclaimer {
    pub fn start() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("stemline-gc".to_string())
            .spawn(move || {
                // Collector is !Sync; it lives and dies on this thread
                let mut collector = Collector::new();
                if tx.send(collector.handle()).is_err() {
                    return;
                }
                log::debug!("collector thread started");

                while thread_running.load(Ordering::Relaxed) {
                    collector.collect();
                    thread::sleep(COLLECT_INTERVAL);
                }
                collector.collect();
                log::debug!("collector thread stopped");
            })?;

        let handle = rx.recv().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::Other, "collector thread exited early")
        })?;

        Ok(Self {
            handle,
            running,
            thread: Some(thread),
        })
    }

    /// Handle for creating `Shared`/`Owned` values
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
