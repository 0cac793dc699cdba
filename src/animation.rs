//! Animation record: the cached unit of decoded playback state
//!
//! **Why**: Decode and playback overlap — the pipeline appends frames while
//! the scheduler is already presenting the prefix. The record is the shared
//! structure both sides agree on: frames and their delays move together under
//! one lock, progress counters are atomic, and the undecoded source handle is
//! kept around so a resume or rotation change never re-opens storage.
//!
//! **Used by**: Pipeline (append-only writer), PlaybackScheduler (indexed
//! reader), BoundedCache (owner; `mem()` feeds the size estimator)
//!
//! # Geometry
//!
//! Target dimensions are plain values captured at creation. A record never
//! resizes in place: when canvas geometry changes, the whole cache is
//! cleared and fresh records are created at the new dimensions.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::frame::DisplayFrame;
use crate::source::ImageSource;

struct AnimationData {
    frames: Vec<Arc<DisplayFrame>>,
    delays: Vec<Duration>,
    /// Undecoded source, parked here between decode passes
    source: Option<Box<dyn ImageSource>>,
}

/// Ordered display-ready frames plus per-frame timing and loading state.
pub struct Animation {
    data: Mutex<AnimationData>,
    /// Raw frames pushed to the transform queue so far (readable mid-load)
    frame_count: AtomicUsize,
    finished_loading: AtomicBool,
    width: u32,
    height: u32,
}

impl Animation {
    /// Fresh empty record for the given target box.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Mutex::new(AnimationData {
                frames: Vec::new(),
                delays: Vec::new(),
                source: None,
            }),
            frame_count: AtomicUsize::new(0),
            finished_loading: AtomicBool::new(false),
            width,
            height,
        }
    }

    /// Target box dimensions fixed at creation.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of display-ready frames appended so far.
    pub fn len(&self) -> usize {
        self.data.lock().expect("lock").frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one transformed frame together with its delay.
    pub fn push_frame(&self, frame: DisplayFrame, delay: Duration) {
        let mut data = self.data.lock().expect("lock");
        data.frames.push(Arc::new(frame));
        data.delays.push(delay);
    }

    /// Frame and recorded delay at `index`, if appended yet.
    pub fn frame_at(&self, index: usize) -> Option<(Arc<DisplayFrame>, Duration)> {
        let data = self.data.lock().expect("lock");
        let frame = data.frames.get(index)?;
        Some((Arc::clone(frame), data.delays[index]))
    }

    /// Raw frames submitted to the transform queue so far.
    pub fn frame_count(&self) -> usize {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Record that raw frames up to `count` have been submitted. Passes may
    /// overlap after a resume, so the counter only moves forward.
    pub fn note_frame_count(&self, count: usize) {
        self.frame_count.fetch_max(count, Ordering::Relaxed);
    }

    pub fn finished_loading(&self) -> bool {
        self.finished_loading.load(Ordering::Relaxed)
    }

    pub fn set_finished(&self, finished: bool) {
        self.finished_loading.store(finished, Ordering::Relaxed);
    }

    /// Take the parked source handle for a decode pass.
    pub fn take_source(&self) -> Option<Box<dyn ImageSource>> {
        self.data.lock().expect("lock").source.take()
    }

    /// Park the source handle for the next pass.
    pub fn store_source(&self, source: Box<dyn ImageSource>) {
        self.data.lock().expect("lock").source = Some(source);
    }

    pub fn has_source(&self) -> bool {
        self.data.lock().expect("lock").source.is_some()
    }

    /// Drop all decoded frames and progress but keep the parked source, so a
    /// re-derivation (rotation change) skips the storage round-trip.
    pub fn reset_frames(&self) {
        let mut data = self.data.lock().expect("lock");
        data.frames.clear();
        data.delays.clear();
        self.frame_count.store(0, Ordering::Relaxed);
        self.finished_loading.store(false, Ordering::Relaxed);
    }

    /// Approximate memory footprint: decoded pixel buffers dominate.
    pub fn mem(&self) -> usize {
        let data = self.data.lock().expect("lock");
        data.frames.iter().map(|f| f.mem()).sum()
    }
}

impl std::fmt::Debug for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animation")
            .field("dimensions", &(self.width, self.height))
            .field("len", &self.len())
            .field("frame_count", &self.frame_count())
            .field("finished_loading", &self.finished_loading())
            .finish()
    }
}
