//! Entities - frame records, frame tables, decoders and the presenter seam

pub mod frame;
pub mod frame_table;
pub mod loader;
pub mod traits;

pub use frame::{
    CompressedTexture, FramePayload, FrameRecord, LoadState, PixelBuffer, PixelImage,
    TextureHandle,
};
pub use frame_table::{FrameTable, TaskLedger};
pub use loader::{
    CompressedDecoder, CustomDecoder, Decode, Decoder, FrameError, PixelDecoder, IMAGE_EXTS,
    TEXTURE_EXTS,
};
pub use traits::Presenter;
