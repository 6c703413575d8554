//! Background asset loading
//!
//! The [`AssetLoader`] turns [`AssetRequest`]s into decoded, engine-rate
//! buffers and pushes them into the audio thread's delivery ring:
//! - A dispatcher thread tracks every pending asset and its deadline
//! - Fetch, decode and resample run on the rayon pool
//! - Each region target receives its own `basedrop::Shared` copy
//!
//! An asset that fails or misses its deadline is delivered as a failure so
//! the timeline can still become ready. Results arriving after the deadline,
//! or for a generation that has since been replaced, are discarded here.

mod decode;
mod resample;
mod source;

pub use decode::{decode, extension_hint, DecodeError, DecodedAudio};
pub use resample::{resample, ResampleError};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{AssetSource, FileSource, MemorySource, RoutedSource};

#[cfg(test)]
pub(crate) use decode::tests::wav_bytes;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use basedrop::{Handle, Shared};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::asset::{AssetBuffer, AssetDelivery, AssetFailureKind, AssetIndex, AssetRequest, DeliveryPayload};
use crate::error::AssetLoadError;
use crate::types::Generation;

/// How often a full delivery ring is retried
const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Fetch, decode and resample one asset to `sample_rate`
pub fn load_asset(source: &dyn AssetSource, url: &str, sample_rate: u32) -> Result<AssetBuffer, AssetLoadError> {
    let bytes = source.fetch(url)?;
    let decoded = decode(bytes, extension_hint(url)).map_err(|e| AssetLoadError::new(url, e.kind(), e.to_string()))?;
    let samples = resample(decoded.samples, decoded.sample_rate, sample_rate)
        .map_err(|e| AssetLoadError::new(url, AssetFailureKind::Decode, e.to_string()))?;
    Ok(AssetBuffer::new(samples, sample_rate))
}

enum LoaderMessage {
    Request {
        generation: Generation,
        assets: Vec<AssetRequest>,
    },
    Finished {
        generation: Generation,
        asset: AssetIndex,
        result: Result<AssetBuffer, AssetLoadError>,
    },
    Shutdown,
}

struct PendingAsset {
    request: AssetRequest,
    deadline: Instant,
}

/// Handle to the loader's dispatcher thread
///
/// Dropping it stops the dispatcher; decodes already running finish on the
/// rayon pool and their results are discarded.
pub struct AssetLoader {
    tx: Sender<LoaderMessage>,
    thread: Option<JoinHandle<()>>,
}

impl AssetLoader {
    /// Spawn the dispatcher
    ///
    /// `deliveries` is the control end of the timeline's delivery ring.
    pub fn new(
        source: Arc<dyn AssetSource>,
        deliveries: rtrb::Producer<AssetDelivery>,
        handle: Handle,
        sample_rate: u32,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let dispatcher = Dispatcher {
            source,
            deliveries,
            handle,
            sample_rate,
            timeout,
            tx: tx.clone(),
            pending: HashMap::new(),
            outbox: VecDeque::new(),
            latest: Generation::default(),
        };

        let thread = thread::Builder::new()
            .name("stemline-loader".to_string())
            .spawn(move || dispatcher.run(rx))?;

        log::info!("asset loader started ({} Hz, timeout {:?})", sample_rate, timeout);
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// Queue every asset of `generation` for loading
    pub fn request(&self, generation: Generation, assets: Vec<AssetRequest>) {
        if let Err(e) = self.tx.send(LoaderMessage::Request { generation, assets }) {
            log::error!("failed to queue asset requests: {}", e);
        }
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        let _ = self.tx.send(LoaderMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct Dispatcher {
    source: Arc<dyn AssetSource>,
    deliveries: rtrb::Producer<AssetDelivery>,
    handle: Handle,
    sample_rate: u32,
    timeout: Duration,
    tx: Sender<LoaderMessage>,
    pending: HashMap<(Generation, AssetIndex), PendingAsset>,
    /// Deliveries waiting for room in the ring
    outbox: VecDeque<AssetDelivery>,
    latest: Generation,
}

impl Dispatcher {
    fn run(mut self, rx: Receiver<LoaderMessage>) {
        log::debug!("loader dispatcher started");

        loop {
            let message = match self.next_wakeup() {
                Some(wait) => match rx.recv_timeout(wait) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };

            match message {
                Some(LoaderMessage::Request { generation, assets }) => self.start(generation, assets),
                Some(LoaderMessage::Finished { generation, asset, result }) => {
                    self.finish(generation, asset, result)
                }
                Some(LoaderMessage::Shutdown) => break,
                None => {}
            }

            self.expire(Instant::now());
            self.flush();
        }

        log::debug!("loader dispatcher exiting with {} pending", self.pending.len());
    }

    /// Time until the earliest deadline or the next ring retry
    fn next_wakeup(&self) -> Option<Duration> {
        let now = Instant::now();
        let deadline = self
            .pending
            .values()
            .map(|p| p.deadline.saturating_duration_since(now))
            .min();
        let retry = (!self.outbox.is_empty()).then_some(RETRY_INTERVAL);
        match (deadline, retry) {
            (Some(d), Some(r)) => Some(d.min(r)),
            (d, r) => d.or(r),
        }
    }

    fn start(&mut self, generation: Generation, assets: Vec<AssetRequest>) {
        if generation > self.latest {
            self.supersede(generation);
        }

        log::info!("loading {} assets for generation {}", assets.len(), generation.0);
        let deadline = Instant::now() + self.timeout;
        for request in assets {
            let asset = request.asset;
            let url = request.url.clone();
            self.pending.insert((generation, asset), PendingAsset { request, deadline });

            let source = Arc::clone(&self.source);
            let tx = self.tx.clone();
            let sample_rate = self.sample_rate;
            rayon::spawn(move || {
                let started = Instant::now();
                let result = load_asset(source.as_ref(), &url, sample_rate);
                if let Ok(buffer) = &result {
                    log::debug!("decoded {} ({} frames) in {:?}", url, buffer.frames(), started.elapsed());
                }
                // Dispatcher gone means the loader was dropped
                let _ = tx.send(LoaderMessage::Finished { generation, asset, result });
            });
        }
    }

    /// Forget everything belonging to generations older than `generation`
    fn supersede(&mut self, generation: Generation) {
        let before = self.pending.len();
        self.pending.retain(|(g, _), _| *g >= generation);
        self.outbox.retain(|d| d.generation >= generation);
        if before != self.pending.len() {
            log::debug!("dropped {} superseded assets", before - self.pending.len());
        }
        self.latest = generation;
    }

    fn finish(&mut self, generation: Generation, asset: AssetIndex, result: Result<AssetBuffer, AssetLoadError>) {
        let Some(pending) = self.pending.remove(&(generation, asset)) else {
            log::debug!("discarding late result for asset {} of generation {}", asset.0, generation.0);
            return;
        };

        match result {
            Ok(buffer) => {
                for target in &pending.request.targets {
                    self.outbox.push_back(AssetDelivery {
                        generation,
                        asset,
                        payload: DeliveryPayload::Buffer {
                            target: *target,
                            buffer: Shared::new(&self.handle, buffer.clone()),
                        },
                    });
                }
            }
            Err(e) => {
                log::warn!("{}", e);
                self.fail(generation, asset, e.kind);
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        let expired: Vec<(Generation, AssetIndex)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(key, _)| *key)
            .collect();

        for (generation, asset) in expired {
            if let Some(pending) = self.pending.remove(&(generation, asset)) {
                log::warn!("asset {} timed out after {:?}", pending.request.url, self.timeout);
                self.fail(generation, asset, AssetFailureKind::Timeout);
            }
        }
    }

    fn fail(&mut self, generation: Generation, asset: AssetIndex, kind: AssetFailureKind) {
        self.outbox.push_back(AssetDelivery {
            generation,
            asset,
            payload: DeliveryPayload::Failed(kind),
        });
    }

    fn flush(&mut self) {
        while let Some(delivery) = self.outbox.pop_front() {
            if let Err(rtrb::PushError::Full(delivery)) = self.deliveries.push(delivery) {
                self.outbox.push_front(delivery);
                break;
            }
        }
    }
}
