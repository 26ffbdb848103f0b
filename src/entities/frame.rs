//! Frame records: per-frame payload storage and load state
//!
//! **Why**: Background workers decode frames while the tick thread decides what to show.
//! Each record is written by exactly one agent at a time; the load state tells everyone
//! who that agent is.
//!
//! **Used by**: FrameTable (storage), LoaderPool (workers write payloads),
//! BufferManager (eviction), SequenceController (presentation)
//!
//! # Load State Machine
//!
//! ```text
//! NotLoaded -> Loading -> ReadyForPresentation -> Active
//!     ^                          |                   |
//!     +--------- evict ----------+-------------------+
//! ```
//!
//! `try_claim()` performs the NotLoaded -> Loading check-and-set under the record lock,
//! so two dispatches can never target the same record. A `Loading` record is never
//! evicted: the worker owns it until `complete()`.
//!
//! # Pixel Formats
//!
//! - `PixelBuffer::U8`: LDR images (JPG/PNG/TGA/BMP/TIFF), native channel count
//! - `PixelBuffer::F16`: EXR, RGBA half floats
//! - `PixelBuffer::F32`: Radiance HDR, RGB floats

use half::f16 as F16;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Pixel buffer format - stores different precision levels
#[derive(Debug, Clone)]
pub enum PixelBuffer {
    U8(Vec<u8>),   // LDR formats - 8-bit per channel
    F16(Vec<F16>), // HDR half-precision (EXR) - 16-bit float per channel
    F32(Vec<f32>), // HDR full-precision (Radiance) - 32-bit float per channel
}

impl PixelBuffer {
    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        match self {
            PixelBuffer::U8(vec) => vec.len(),
            PixelBuffer::F16(vec) => vec.len() * 2,
            PixelBuffer::F32(vec) => vec.len() * 4,
        }
    }
}

/// Decoded still image
#[derive(Debug, Clone)]
pub struct PixelImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub buffer: PixelBuffer,
}

/// Block-compressed texture kept in its on-disk encoding (uploaded as-is by the presenter)
#[derive(Debug, Clone)]
pub struct CompressedTexture {
    pub width: usize,
    pub height: usize,
    /// Four-character code of the block format, e.g. `DXT1`, `DXT5`, `DX10`
    pub fourcc: [u8; 4],
    pub data: Vec<u8>,
}

impl CompressedTexture {
    pub fn format_name(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).trim_end().to_string()
    }
}

/// Payload of a decoded frame.
///
/// `Empty` is the placeholder written when a decode fails: the record still becomes
/// ready so a single bad asset never stalls playback.
#[derive(Debug, Clone)]
pub enum FramePayload {
    Pixels(PixelImage),
    Compressed(CompressedTexture),
    Empty,
}

impl FramePayload {
    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        match self {
            FramePayload::Pixels(img) => img.buffer.mem(),
            FramePayload::Compressed(tex) => tex.data.len(),
            FramePayload::Empty => 0,
        }
    }

    /// (width, height), None for the failure placeholder
    pub fn resolution(&self) -> Option<(usize, usize)> {
        match self {
            FramePayload::Pixels(img) => Some((img.width, img.height)),
            FramePayload::Compressed(tex) => Some((tex.width, tex.height)),
            FramePayload::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FramePayload::Empty)
    }
}

/// Frame loading status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoadState {
    NotLoaded,            // No payload
    Loading,              // A worker owns the payload slot
    ReadyForPresentation, // Decode finished, not yet consumed
    Active,               // Consumed (presented) this generation
}

impl LoadState {
    /// Decode complete, payload valid
    pub fn is_ready(self) -> bool {
        matches!(self, LoadState::ReadyForPresentation | LoadState::Active)
    }

    /// Single-character code for compact debug strips
    pub fn glyph(self) -> char {
        match self {
            LoadState::NotLoaded => '.',
            LoadState::Loading => 'o',
            LoadState::ReadyForPresentation => 'R',
            LoadState::Active => 'A',
        }
    }
}

/// Opaque handle to a display-ready resource owned by the presenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TextureHandle(pub u64);

/// Mutable part of a record, all behind one mutex
#[derive(Debug)]
struct FrameCell {
    state: LoadState,
    payload: Option<Arc<FramePayload>>,
    gpu: Option<TextureHandle>, // Only set when textures are cached persistently
    load_time_ms: f32,
}

/// Single frame of a loaded sequence
#[derive(Debug)]
pub struct FrameRecord {
    path: PathBuf, // Immutable after creation
    cell: Mutex<FrameCell>,
}

impl FrameRecord {
    /// Create an unloaded record bound to its source file
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cell: Mutex::new(FrameCell {
                state: LoadState::NotLoaded,
                payload: None,
                gpu: None,
                load_time_ms: 0.0,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, FrameCell> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> LoadState {
        self.lock().state
    }

    /// Atomically claim the record for loading (NotLoaded -> Loading)
    ///
    /// # Returns
    ///
    /// - `true`: claimed, caller MUST eventually call `complete()`
    /// - `false`: already loading or loaded, caller MUST skip
    pub fn try_claim(&self) -> bool {
        let mut cell = self.lock();
        if cell.state == LoadState::NotLoaded {
            cell.state = LoadState::Loading;
            true
        } else {
            false
        }
    }

    /// Store the decode result (Loading -> ReadyForPresentation).
    ///
    /// Ignored unless the record is `Loading`; only the claiming agent calls this.
    pub fn complete(&self, payload: FramePayload, load_time_ms: f32) -> bool {
        let mut cell = self.lock();
        if cell.state != LoadState::Loading {
            return false;
        }
        cell.payload = Some(Arc::new(payload));
        cell.load_time_ms = load_time_ms;
        cell.state = LoadState::ReadyForPresentation;
        true
    }

    /// Mark as consumed by presentation (ReadyForPresentation -> Active)
    pub fn mark_active(&self) -> bool {
        let mut cell = self.lock();
        if cell.state == LoadState::ReadyForPresentation {
            cell.state = LoadState::Active;
            true
        } else {
            false
        }
    }

    /// Release the payload and reset to NotLoaded.
    ///
    /// Only acts on `ReadyForPresentation` / `Active`; returns true if the record was reset.
    /// GPU residency survives, that is the point of a persistent texture cache.
    pub fn evict(&self) -> bool {
        let mut cell = self.lock();
        if cell.state.is_ready() {
            cell.payload = None;
            cell.state = LoadState::NotLoaded;
            true
        } else {
            false
        }
    }

    /// Evict and also drop GPU residency. Returns the handle so the presenter can free it.
    pub fn flush(&self) -> Option<TextureHandle> {
        let mut cell = self.lock();
        if cell.state.is_ready() {
            cell.payload = None;
            cell.state = LoadState::NotLoaded;
        }
        cell.gpu.take()
    }

    /// Drop the CPU payload but keep the state (the GPU copy now stands in for it)
    pub fn release_payload(&self) {
        self.lock().payload = None;
    }

    /// Shared payload, cheap to clone out of the record
    pub fn payload(&self) -> Option<Arc<FramePayload>> {
        self.lock().payload.clone()
    }

    pub fn has_payload(&self) -> bool {
        self.lock().payload.is_some()
    }

    pub fn gpu(&self) -> Option<TextureHandle> {
        self.lock().gpu
    }

    pub fn set_gpu(&self, handle: TextureHandle) {
        self.lock().gpu = Some(handle);
    }

    pub fn is_gpu_loaded(&self) -> bool {
        self.lock().gpu.is_some()
    }

    /// Ready to be shown: decoded, or resident on the GPU
    pub fn is_presentable(&self) -> bool {
        let cell = self.lock();
        cell.state.is_ready() || cell.gpu.is_some()
    }

    /// Last measured decode latency (ms)
    pub fn load_time_ms(&self) -> f32 {
        self.lock().load_time_ms
    }

    /// Resident payload size in bytes
    pub fn mem(&self) -> usize {
        self.lock().payload.as_ref().map(|p| p.mem()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(w: usize, h: usize) -> FramePayload {
        FramePayload::Pixels(PixelImage {
            width: w,
            height: h,
            channels: 4,
            buffer: PixelBuffer::U8(vec![0u8; w * h * 4]),
        })
    }

    #[test]
    fn test_record_starts_unloaded() {
        let rec = FrameRecord::new(PathBuf::from("seq/frame_0001.png"));
        assert_eq!(rec.state(), LoadState::NotLoaded);
        assert!(!rec.has_payload());
        assert_eq!(rec.path(), Path::new("seq/frame_0001.png"));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let rec = FrameRecord::new(PathBuf::from("a.png"));
        assert!(rec.try_claim());
        assert!(!rec.try_claim());
        assert_eq!(rec.state(), LoadState::Loading);
    }

    #[test]
    fn test_full_lifecycle() {
        let rec = FrameRecord::new(PathBuf::from("a.png"));
        assert!(rec.try_claim());
        assert!(rec.complete(pixels(4, 2), 3.5));
        assert_eq!(rec.state(), LoadState::ReadyForPresentation);
        assert_eq!(rec.mem(), 4 * 2 * 4);
        assert_eq!(rec.load_time_ms(), 3.5);

        assert!(rec.mark_active());
        assert_eq!(rec.state(), LoadState::Active);

        assert!(rec.evict());
        assert_eq!(rec.state(), LoadState::NotLoaded);
        assert!(rec.payload().is_none());
    }

    #[test]
    fn test_complete_requires_claim() {
        let rec = FrameRecord::new(PathBuf::from("a.png"));
        assert!(!rec.complete(pixels(1, 1), 1.0));
        assert_eq!(rec.state(), LoadState::NotLoaded);
    }

    #[test]
    fn test_loading_record_is_never_evicted() {
        let rec = FrameRecord::new(PathBuf::from("a.png"));
        rec.try_claim();
        assert!(!rec.evict());
        assert_eq!(rec.flush(), None);
        assert_eq!(rec.state(), LoadState::Loading);
    }

    #[test]
    fn test_gpu_residency_survives_evict() {
        let rec = FrameRecord::new(PathBuf::from("a.png"));
        rec.try_claim();
        rec.complete(pixels(2, 2), 1.0);
        rec.mark_active();
        rec.set_gpu(TextureHandle(7));
        rec.release_payload();

        assert!(rec.evict());
        assert_eq!(rec.state(), LoadState::NotLoaded);
        assert!(rec.is_presentable());

        assert_eq!(rec.flush(), Some(TextureHandle(7)));
        assert!(!rec.is_presentable());
    }

    #[test]
    fn test_empty_placeholder() {
        let payload = FramePayload::Empty;
        assert!(payload.is_empty());
        assert_eq!(payload.mem(), 0);
        assert_eq!(payload.resolution(), None);
    }

    #[test]
    fn test_pixel_buffer_sizes() {
        assert_eq!(PixelBuffer::U8(vec![0u8; 16]).mem(), 16);
        assert_eq!(PixelBuffer::F16(vec![F16::ZERO; 16]).mem(), 32);
        assert_eq!(PixelBuffer::F32(vec![0.0f32; 16]).mem(), 64);
    }
}
