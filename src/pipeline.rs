//! Frame pipeline: sequential decode fanned out to a transform worker pool
//!
//! **Why**: Animated sources only decode forward, one frame at a time, but
//! rotate/resize/convert per frame is embarrassingly parallel. One producer
//! walks the source in order and feeds a channel; a fixed pool of workers
//! drains it and appends display-ready frames to the record.
//!
//! **Used by**: Viewer (animated path and loading indicator)
//!
//! # Ordering
//!
//! Workers append in arrival order, not source order. They are symmetric,
//! pull one item at a time from a FIFO channel, and per-frame cost is
//! uniform, so order holds in practice — but it is best-effort and callers
//! must not assume frame `i` lands before frame `i+1` under worker skew.
//!
//! # Cancellation
//!
//! The producer checks the stop token between frames; workers check it
//! between items. Cancelling closes the queue, every thread is joined before
//! `decode` returns, and the record is left partial and resumable: the next
//! pass skips frames that already made it into the record and reuses the
//! parked source handle instead of re-opening storage.

use crossbeam_channel::unbounded;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::thread;

use crate::animation::Animation;
use crate::cache::{BoundedCache, CacheError};
use crate::fit::fit_within;
use crate::frame::DisplayFrame;
use crate::source::{RawFrame, SourceError, SourceProvider};
use crate::task::StopToken;

/// Records cached per source identifier
pub type AnimationCache = BoundedCache<String, Arc<Animation>>;

/// Worker pool size for a full animated decode
pub const ANIMATION_WORKERS: usize = 25;

/// Worker pool size for the lightweight loading-indicator animation
pub const INDICATOR_WORKERS: usize = 5;

/// Pipeline errors
#[derive(Debug)]
pub enum PipelineError {
    Cache(CacheError),
    Source(SourceError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Cache(e) => write!(f, "cache error: {}", e),
            PipelineError::Source(e) => write!(f, "source error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<CacheError> for PipelineError {
    fn from(e: CacheError) -> Self {
        PipelineError::Cache(e)
    }
}

impl From<SourceError> for PipelineError {
    fn from(e: SourceError) -> Self {
        PipelineError::Source(e)
    }
}

/// Rotate by clockwise quarter turns, resize to the fitted box with a
/// bilinear filter, hand back a display-ready frame.
fn transform(raw: RgbaImage, rotation: u8, width: u32, height: u32) -> DisplayFrame {
    let rotated = match rotation % 4 {
        1 => imageops::rotate90(&raw),
        2 => imageops::rotate180(&raw),
        3 => imageops::rotate270(&raw),
        _ => raw,
    };
    let resized = imageops::resize(&rotated, width, height, FilterType::Triangle);
    DisplayFrame::from_rgba(resized)
}

/// Decode engine with a fixed worker pool size.
pub struct Pipeline {
    workers: usize,
}

impl Pipeline {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Fetch or create the record for `id` and run the decode on it.
    ///
    /// A record that already finished loading is returned as-is. A cached
    /// record whose geometry no longer matches `target` is replaced with a
    /// fresh one (records never resize in place). `SourceError::NotFound` is
    /// terminal: no empty record is left behind.
    pub fn decode(
        &self,
        cache: &AnimationCache,
        id: &str,
        provider: &dyn SourceProvider,
        target: (u32, u32),
        rotation: u8,
        stop: &StopToken,
    ) -> Result<Arc<Animation>, PipelineError> {
        let mut record = cache.get_or_create(id.to_string())?;
        if record.finished_loading() {
            debug!("Record for {} already complete, {} frames", id, record.len());
            return Ok(record);
        }
        if record.dimensions() != target {
            debug!(
                "Record for {} is {:?}, target is {:?}: replacing",
                id,
                record.dimensions(),
                target
            );
            cache.remove(&id.to_string());
            record = cache.get_or_create(id.to_string())?;
        }

        match self.decode_record(&record, provider, id, rotation, stop) {
            Ok(()) => Ok(record),
            Err(e) => {
                // Terminal open failure: keep no empty record around
                if record.is_empty() {
                    cache.remove(&id.to_string());
                }
                Err(e.into())
            }
        }
    }

    /// Run one decode pass on an existing record (used directly for the
    /// loading indicator, which lives outside the cache).
    pub fn decode_record(
        &self,
        record: &Arc<Animation>,
        provider: &dyn SourceProvider,
        id: &str,
        rotation: u8,
        stop: &StopToken,
    ) -> Result<(), SourceError> {
        if record.finished_loading() {
            return Ok(());
        }

        // Reuse the parked handle; storage is only touched on the first pass
        let mut source = match record.take_source() {
            Some(source) => source,
            None => provider.open(id)?,
        };

        let (native_w, native_h) = source.dimensions();
        let (box_w, box_h) = record.dimensions();
        let (fit_w, fit_h) = fit_within(native_w, native_h, box_w, box_h);
        debug!(
            "Decoding {}: native {}x{}, fitted {}x{}, rotation {}, {} workers",
            id, native_w, native_h, fit_w, fit_h, rotation, self.workers
        );

        let (tx, rx) = unbounded::<(RawFrame, usize)>();

        let mut pool = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let rx = rx.clone();
            let record = Arc::clone(record);
            let stop = stop.clone();
            let handle = thread::Builder::new()
                .name(format!("flipview-worker-{}", worker_id))
                .spawn(move || {
                    while let Ok((raw, index)) = rx.recv() {
                        if stop.is_stopped() {
                            break;
                        }
                        let delay = raw.delay;
                        let frame = transform(raw.image, rotation, fit_w, fit_h);
                        record.push_frame(frame, delay);
                        trace!("Worker {} finished frame {}", worker_id, index);
                    }
                })
                .expect("Failed to spawn worker thread");
            pool.push(handle);
        }
        drop(rx);

        // Sequential producer: the single place the source is advanced.
        // Forward-only, strictly ordered; never parallelized.
        let mut end_seen = false;
        let mut open_error: Option<SourceError> = None;
        let mut index = 0usize;
        loop {
            if stop.is_stopped() {
                debug!("Decode of {} cancelled at frame {}", id, index);
                break;
            }
            if index < record.len() {
                // Already decoded in a previous pass
                index += 1;
                continue;
            }
            match source.frame(index) {
                Ok(Some(raw)) => {
                    if tx.send((raw, index)).is_err() {
                        break;
                    }
                    record.note_frame_count(index + 1);
                    index += 1;
                    thread::yield_now();
                }
                Ok(None) => {
                    end_seen = true;
                    break;
                }
                Err(SourceError::Corrupt(e)) => {
                    warn!(
                        "Corrupt frame {} in {} ({}): keeping {} decoded frames, treating as end",
                        index,
                        id,
                        e,
                        record.len()
                    );
                    end_seen = true;
                    break;
                }
                Err(e) => {
                    open_error = Some(e);
                    break;
                }
            }
        }

        // Close the queue and wait for it to drain (or be abandoned on stop);
        // cleanup is not complete until every worker has acknowledged.
        drop(tx);
        for handle in pool {
            let _ = handle.join();
        }

        record.store_source(source);

        if let Some(e) = open_error {
            return Err(e);
        }
        if end_seen && !stop.is_stopped() {
            record.set_finished(true);
            info!(
                "Decoded {}: {} frames at {}x{}",
                id,
                record.len(),
                fit_w,
                fit_h
            );
        }
        Ok(())
    }
}
