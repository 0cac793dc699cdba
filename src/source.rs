//! Capability interfaces between the engine and its host
//!
//! **Why**: The engine never talks to a toolkit, a dialog, or the filesystem
//! directly. Everything it needs from the outside world — an ordered item
//! list, one-frame-at-a-time decoding, a place to put pixels, a yes/no
//! prompt, a way to delete — comes in through these traits, so viewer
//! variants are configurations rather than subclasses.
//!
//! **Used by**: Pipeline and Viewer (consumers); media (default filesystem
//! implementations); test mocks throughout the crate

use image::RgbaImage;
use std::time::Duration;

use crate::frame::DisplayFrame;

/// One decoded, untransformed frame pulled from a source, with the display
/// duration its container recorded for it.
pub struct RawFrame {
    pub image: RgbaImage,
    pub delay: Duration,
}

/// Source access errors
#[derive(Debug)]
pub enum SourceError {
    /// Source missing or unreadable. Terminal for one decode attempt.
    NotFound(String),
    /// Frame data damaged mid-stream. The pipeline treats this as
    /// end-of-sequence and keeps the frames decoded so far.
    Corrupt(String),
    /// Extension not handled by any decoder.
    Unsupported(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotFound(id) => write!(f, "source not found: {}", id),
            SourceError::Corrupt(e) => write!(f, "corrupt frame data: {}", e),
            SourceError::Unsupported(ext) => write!(f, "unsupported format: {}", ext),
        }
    }
}

impl std::error::Error for SourceError {}

/// An opened multi-frame (or single-frame) image.
///
/// Frame access is sequential: within one pass, `frame` is called with
/// nondecreasing indices only. A smaller index starts a new pass and the
/// implementation may rewind internally. `Ok(None)` marks end of sequence.
pub trait ImageSource: Send {
    /// Native (undecoded, unrotated) dimensions.
    fn dimensions(&self) -> (u32, u32);

    /// Decode the frame at `index`.
    fn frame(&mut self, index: usize) -> Result<Option<RawFrame>, SourceError>;
}

/// Enumerates and opens sources.
pub trait SourceProvider: Send + Sync {
    /// Ordered identifiers of the supported items in `folder`.
    fn list(&self, folder: &str) -> anyhow::Result<Vec<String>>;

    /// Open one item for sequential frame access.
    fn open(&self, id: &str) -> Result<Box<dyn ImageSource>, SourceError>;
}

/// Where ready frames go. `present` replaces whatever is currently shown and
/// must be safe to call repeatedly without accumulating state.
pub trait DisplaySink: Send + Sync {
    fn present(&self, frame: &DisplayFrame);
}

/// Blocking yes/no confirmation, used only before destructive deletes.
pub trait ConfirmPrompt: Send {
    fn ask_yes_no(&self, message: &str) -> bool;
}

/// Deletes an item from backing storage. Errors are surfaced to the caller
/// and abort the delete; they never crash the controller.
pub trait Trash: Send {
    fn delete(&self, id: &str) -> anyhow::Result<()>;
}
