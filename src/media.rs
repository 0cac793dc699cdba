//! Filesystem media backend: default source provider over a folder on disk
//!
//! **Why**: The engine's capability traits need one real implementation —
//! animated GIFs decoded frame-by-frame, still images decoded once, folder
//! listing filtered to what the decoders can actually open.
//!
//! **Used by**: the shell binary (production wiring), end-to-end tests
//!
//! # Sequential access
//!
//! GIF frames only come out of the decoder forward. `GifSource` keeps the
//! whole undecoded file buffered in memory and walks a frames iterator; a
//! request for an earlier index starts a fresh iterator over the same bytes,
//! so a new decode pass never goes back to storage.

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder, RgbaImage};
use log::debug;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::source::{ImageSource, RawFrame, SourceError, SourceProvider, Trash};

/// Extensions the viewer lists and opens
pub const SUPPORTED_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "ico"];

/// Extensions routed to the animated decode path
pub const ANIMATED_EXTS: &[&str] = &["gif"];

fn ext_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

/// Check if the file is a listable image format
pub fn is_supported(path: &Path) -> bool {
    ext_of(path)
        .map(|e| SUPPORTED_EXTS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Check if the file takes the animated decode path
pub fn is_animated(path: &Path) -> bool {
    ext_of(path)
        .map(|e| ANIMATED_EXTS.contains(&e.as_str()))
        .unwrap_or(false)
}

fn not_found(path: &Path, e: &std::io::Error) -> SourceError {
    SourceError::NotFound(format!("{}: {}", path.display(), e))
}

fn decode_error(path: &Path, e: image::ImageError) -> SourceError {
    match e {
        image::ImageError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            not_found(path, &io)
        }
        other => SourceError::Corrupt(format!("{}: {}", path.display(), other)),
    }
}

/// Shared undecoded file contents; cheap to hand to a fresh decoder.
#[derive(Clone)]
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Animated GIF with forward-only frame iteration and in-memory rewind.
pub struct GifSource {
    bytes: SharedBytes,
    dimensions: (u32, u32),
    frames: image::Frames<'static>,
    /// Index the iterator will yield next
    pos: usize,
}

impl GifSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let bytes = fs::read(path).map_err(|e| not_found(path, &e))?;
        Self::from_bytes(bytes).map_err(|e| match e {
            SourceError::Corrupt(msg) => SourceError::Corrupt(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Build from raw GIF bytes (tests and non-filesystem hosts).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SourceError> {
        let bytes = SharedBytes(bytes.into());
        let (frames, dimensions) = Self::fresh_pass(&bytes)?;
        Ok(Self {
            bytes,
            dimensions,
            frames,
            pos: 0,
        })
    }

    fn fresh_pass(
        bytes: &SharedBytes,
    ) -> Result<(image::Frames<'static>, (u32, u32)), SourceError> {
        let decoder = GifDecoder::new(Cursor::new(bytes.clone()))
            .map_err(|e| SourceError::Corrupt(e.to_string()))?;
        let dimensions = decoder.dimensions();
        Ok((decoder.into_frames(), dimensions))
    }
}

// SAFETY: `GifSource` is transferred between threads because it lives inside
// an `Arc<Animation>` that is cloned into the transform worker pool, so the
// engine's `ImageSource: Send` bound must hold for it. The only non-`Send`
// field is `frames: image::Frames<'static>`, whose boxed `dyn Iterator` lacks
// the `Send` marker purely from type erasure: the concrete iterator is a GIF
// decoder reading from `Cursor<SharedBytes>`, and `SharedBytes` wraps
// `Arc<[u8]>` (Send + Sync) with no thread-affine state. The handle is parked
// behind `Animation`'s mutex and advanced only by the single sequential
// producer, so moving it across threads is sound.
unsafe impl Send for GifSource {}

impl ImageSource for GifSource {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frame(&mut self, index: usize) -> Result<Option<RawFrame>, SourceError> {
        if index < self.pos {
            // New pass: restart the iterator over the buffered bytes
            debug!("GifSource rewind: {} -> {}", self.pos, index);
            let (frames, _) = Self::fresh_pass(&self.bytes)?;
            self.frames = frames;
            self.pos = 0;
        }

        loop {
            match self.frames.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(SourceError::Corrupt(e.to_string())),
                Some(Ok(frame)) => {
                    let at = self.pos;
                    self.pos += 1;
                    if at == index {
                        let (num, den) = frame.delay().numer_denom_ms();
                        let delay = Duration::from_secs_f64(num as f64 / den as f64 / 1000.0);
                        return Ok(Some(RawFrame {
                            image: frame.into_buffer(),
                            delay,
                        }));
                    }
                    // Skipping forward past an already-consumed index
                }
            }
        }
    }
}

/// Single decoded still image presented as a one-frame sequence.
pub struct StillSource {
    image: RgbaImage,
}

impl StillSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let image = image::open(path)
            .map_err(|e| decode_error(path, e))?
            .to_rgba8();
        Ok(Self { image })
    }
}

impl ImageSource for StillSource {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn frame(&mut self, index: usize) -> Result<Option<RawFrame>, SourceError> {
        if index == 0 {
            Ok(Some(RawFrame {
                image: self.image.clone(),
                delay: Duration::ZERO,
            }))
        } else {
            Ok(None)
        }
    }
}

/// Folder-on-disk source provider.
pub struct FsProvider;

impl SourceProvider for FsProvider {
    fn list(&self, folder: &str) -> anyhow::Result<Vec<String>> {
        let mut items: Vec<String> = fs::read_dir(folder)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_supported(path))
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        // read_dir order is filesystem-dependent; navigation needs stability
        items.sort();
        debug!("Listed {} items in {}", items.len(), folder);
        Ok(items)
    }

    fn open(&self, id: &str) -> Result<Box<dyn ImageSource>, SourceError> {
        let path = Path::new(id);
        match ext_of(path).as_deref() {
            Some("gif") => Ok(Box::new(GifSource::open(path)?)),
            Some("jpg") | Some("jpeg") | Some("png") | Some("ico") => {
                Ok(Box::new(StillSource::open(path)?))
            }
            other => Err(SourceError::Unsupported(format!(
                "{}: .{}",
                id,
                other.unwrap_or("")
            ))),
        }
    }
}

/// Deletes files straight off the disk.
pub struct FsTrash;

impl Trash for FsTrash {
    fn delete(&self, id: &str) -> anyhow::Result<()> {
        fs::remove_file(id)?;
        Ok(())
    }
}

/// Animated GIF with `n` single-color frames, 100ms each (test fixture).
#[cfg(test)]
pub fn gif_bytes(n: u8, width: u32, height: u32) -> Vec<u8> {
    use image::codecs::gif::{GifEncoder, Repeat};
    use image::{Delay, Frame, Rgba};

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        for i in 0..n {
            let buf = RgbaImage::from_pixel(width, height, Rgba([i * 10, 0, 0, 255]));
            let frame = Frame::from_parts(buf, 0, 0, Delay::from_numer_denom_ms(100, 1));
            encoder.encode_frame(frame).unwrap();
        }
    }
    out
}
