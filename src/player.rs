//! Playback scheduler: timed looping replay of a record onto a display sink
//!
//! **Why**: Presenting frames is trivial; stopping on time is not. The
//! per-frame sleep is the only interruption point, so a cancel lands within
//! one frame delay and never mid-present — and the controller can rely on a
//! joined scheduler meaning "no more sink calls, ever".
//!
//! **Used by**: Viewer (animated playback and the loading indicator)
//!
//! # Timing
//!
//! Present, then sleep the frame's recorded delay, then advance. While the
//! record is still filling — and for frames with a zero recorded delay —
//! a fixed ~33 ms grid is used instead, matching the perceived fill rate.
//! After the last available frame the index wraps to 0, indefinitely.

use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::animation::Animation;
use crate::source::DisplaySink;
use crate::task::StopToken;

/// Per-frame delay while the record is still filling, and the fallback for
/// frames whose container recorded no duration
pub const FILL_FRAME_DELAY: Duration = Duration::from_millis(33);

/// Replay `record` onto `sink` until the stop token fires.
///
/// Runs on the caller's thread; the Viewer wraps it in a [`crate::task::Task`].
/// Exactly one scheduler may be live per sink — callers cancel and join the
/// previous one before starting another.
pub fn play(record: &Arc<Animation>, sink: &dyn DisplaySink, stop: &StopToken) {
    debug!(
        "Playback started: {} frames available, finished_loading={}",
        record.len(),
        record.finished_loading()
    );

    loop {
        let mut index = 0usize;
        let mut presented = 0usize;

        // One cycle through the currently available frames
        while let Some((frame, delay)) = record.frame_at(index) {
            sink.present(&frame);
            presented += 1;

            let wait = if record.finished_loading() && !delay.is_zero() {
                delay
            } else {
                FILL_FRAME_DELAY
            };
            if stop.wait(wait) {
                debug!("Playback stopped at frame {}", index);
                return;
            }
            index += 1;
        }

        if presented == 0 {
            // Nothing appended yet; wake up when more frames may exist
            if stop.wait(FILL_FRAME_DELAY) {
                debug!("Playback stopped while waiting for frames");
                return;
            }
        }
    }
}
