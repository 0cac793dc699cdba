//! FLIPVIEW - animated image viewing engine
//!
//! Decodes multi-frame image sources into display-ready frames, caches them
//! under a bounded memory budget, and drives timed looping playback while
//! staying responsive to navigation, resize, and shutdown.

// Core engine (cache, record, pipeline, playback, controller)
pub mod animation;
pub mod cache;
pub mod fit;
pub mod frame;
pub mod pipeline;
pub mod player;
pub mod task;
pub mod viewer;

// Host-facing surface
pub mod cli;
pub mod media;
pub mod source;

// Re-export commonly used types
pub use animation::Animation;
pub use cache::{BoundedCache, CacheError};
pub use frame::DisplayFrame;
pub use pipeline::{AnimationCache, Pipeline, PipelineError};
pub use source::{
    ConfirmPrompt, DisplaySink, ImageSource, RawFrame, SourceError, SourceProvider, Trash,
};
pub use task::{StopToken, Task};
pub use viewer::{ViewState, Viewer, ViewerConfig, ViewerError};
