//! Frame decoders with a strategy selected once at configuration time
//!
//! - `PixelDecoder`: `image` crate, still images to raw pixels
//! - `CompressedDecoder`: DDS containers, block data kept compressed for direct upload
//! - `CustomDecoder`: host-supplied decoder behind `Arc<dyn Decode>`
//!
//! Decoders run on worker threads and must not touch the presenter.

use enum_dispatch::enum_dispatch;
use half::f16 as F16;
use log::debug;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::frame::{CompressedTexture, FramePayload, PixelBuffer, PixelImage};
use crate::config::DecodeMode;

/// Still image extensions accepted by `PixelDecoder`
pub const IMAGE_EXTS: &[&str] = &[
    "tga", "jpeg", "jpg", "bmp", "tiff", "tif", "png", "exr", "hdr",
];

/// Compressed texture extensions accepted by `CompressedDecoder`
pub const TEXTURE_EXTS: &[&str] = &["dds"];

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const DDS_HEADER_LEN: usize = 128; // magic + 124-byte header
const DDS_DX10_HEADER_LEN: usize = 20;

/// Frame decode errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Image error: {0}")]
    Image(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid texture container: {0}")]
    InvalidTexture(String),
}

/// Decode collaborator: file path in, payload out.
#[enum_dispatch]
pub trait Decode: Send + Sync {
    /// Decode one frame. Runs on a worker thread (or inline in immediate mode).
    fn decode(&self, path: &Path) -> Result<FramePayload, FrameError>;

    /// Lowercase file extensions this decoder accepts, used to filter directory listings
    fn extensions(&self) -> &[&'static str];
}

/// Decode strategy, fixed for the life of a controller
#[enum_dispatch(Decode)]
#[derive(Clone)]
pub enum Decoder {
    PixelDecoder,
    CompressedDecoder,
    CustomDecoder,
}

impl Decoder {
    pub fn from_mode(mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Pixels => Decoder::PixelDecoder(PixelDecoder),
            DecodeMode::Compressed => Decoder::CompressedDecoder(CompressedDecoder),
        }
    }

    /// Wrap a host-supplied decoder
    pub fn custom(inner: Arc<dyn Decode>) -> Self {
        Decoder::CustomDecoder(CustomDecoder { inner })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decoder::PixelDecoder(_) => "pixels",
            Decoder::CompressedDecoder(_) => "compressed",
            Decoder::CustomDecoder(_) => "custom",
        }
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Decoder").field(&self.label()).finish()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Still image decoder (TGA, JPEG, BMP, TIFF, PNG, EXR, HDR)
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelDecoder;

impl Decode for PixelDecoder {
    fn decode(&self, path: &Path) -> Result<FramePayload, FrameError> {
        let ext = extension_of(path);
        let image = match ext.as_str() {
            "exr" => Self::load_exr(path)?,
            "hdr" => Self::load_hdr(path)?,
            e if IMAGE_EXTS.contains(&e) => Self::load_generic(path)?,
            _ => return Err(FrameError::UnsupportedFormat(format!(".{}", ext))),
        };
        Ok(FramePayload::Pixels(image))
    }

    fn extensions(&self) -> &[&'static str] {
        IMAGE_EXTS
    }
}

impl PixelDecoder {
    fn open(path: &Path) -> Result<image::DynamicImage, FrameError> {
        image::open(path).map_err(|e| match e {
            image::ImageError::IoError(source) => FrameError::Io {
                path: path.display().to_string(),
                source,
            },
            other => FrameError::Image(format!("{}: {}", path.display(), other)),
        })
    }

    /// EXR to RGBA half floats
    fn load_exr(path: &Path) -> Result<PixelImage, FrameError> {
        debug!("Loading EXR: {}", path.display());

        let img = Self::open(path)?;
        let (width, height) = (img.width() as usize, img.height() as usize);
        let buffer: Vec<F16> = img
            .to_rgba32f()
            .as_raw()
            .iter()
            .map(|&v| F16::from_f32(v))
            .collect();

        Ok(PixelImage {
            width,
            height,
            channels: 4,
            buffer: PixelBuffer::F16(buffer),
        })
    }

    /// Radiance HDR to RGB f32
    fn load_hdr(path: &Path) -> Result<PixelImage, FrameError> {
        debug!("Loading HDR: {}", path.display());

        let img = Self::open(path)?;
        let (width, height) = (img.width() as usize, img.height() as usize);

        Ok(PixelImage {
            width,
            height,
            channels: 3,
            buffer: PixelBuffer::F32(img.to_rgb32f().into_raw()),
        })
    }

    /// 8-bit formats keep their native channel count
    fn load_generic(path: &Path) -> Result<PixelImage, FrameError> {
        let img = Self::open(path)?;
        let (width, height) = (img.width() as usize, img.height() as usize);

        let (channels, raw) = match img.color() {
            image::ColorType::L8 => (1, img.to_luma8().into_raw()),
            image::ColorType::La8 => (2, img.to_luma_alpha8().into_raw()),
            image::ColorType::Rgb8 => (3, img.to_rgb8().into_raw()),
            _ => (4, img.to_rgba8().into_raw()),
        };

        Ok(PixelImage {
            width,
            height,
            channels,
            buffer: PixelBuffer::U8(raw),
        })
    }
}

/// DDS container reader: parses the header, keeps blocks compressed
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressedDecoder;

impl Decode for CompressedDecoder {
    fn decode(&self, path: &Path) -> Result<FramePayload, FrameError> {
        let bytes = std::fs::read(path).map_err(|source| FrameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_dds(&bytes).map(FramePayload::Compressed)
    }

    fn extensions(&self) -> &[&'static str] {
        TEXTURE_EXTS
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Parse a DDS file held in memory
pub fn parse_dds(bytes: &[u8]) -> Result<CompressedTexture, FrameError> {
    if bytes.len() < DDS_HEADER_LEN {
        return Err(FrameError::InvalidTexture(format!(
            "{} bytes is shorter than a DDS header",
            bytes.len()
        )));
    }
    if &bytes[0..4] != DDS_MAGIC {
        return Err(FrameError::InvalidTexture("missing DDS magic".into()));
    }
    let header_size = read_u32(bytes, 4);
    if header_size != 124 {
        return Err(FrameError::InvalidTexture(format!(
            "unexpected header size {}",
            header_size
        )));
    }

    let height = read_u32(bytes, 12) as usize;
    let width = read_u32(bytes, 16) as usize;
    let mut fourcc = [0u8; 4];
    fourcc.copy_from_slice(&bytes[84..88]);

    let mut data_start = DDS_HEADER_LEN;
    if &fourcc == b"DX10" {
        data_start += DDS_DX10_HEADER_LEN;
    }
    if bytes.len() <= data_start {
        return Err(FrameError::InvalidTexture("no texture data".into()));
    }

    Ok(CompressedTexture {
        width,
        height,
        fourcc,
        data: bytes[data_start..].to_vec(),
    })
}

/// Host-supplied decoder
#[derive(Clone)]
pub struct CustomDecoder {
    inner: Arc<dyn Decode>,
}

impl Decode for CustomDecoder {
    fn decode(&self, path: &Path) -> Result<FramePayload, FrameError> {
        self.inner.decode(path)
    }

    fn extensions(&self) -> &[&'static str] {
        self.inner.extensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dds_bytes(width: u32, height: u32, fourcc: &[u8; 4], payload: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; DDS_HEADER_LEN];
        bytes[0..4].copy_from_slice(DDS_MAGIC);
        bytes[4..8].copy_from_slice(&124u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&height.to_le_bytes());
        bytes[16..20].copy_from_slice(&width.to_le_bytes());
        bytes[84..88].copy_from_slice(fourcc);
        if fourcc == b"DX10" {
            bytes.extend(std::iter::repeat_n(0u8, DDS_DX10_HEADER_LEN));
        }
        bytes.extend(std::iter::repeat_n(0xABu8, payload));
        bytes
    }

    #[test]
    fn test_parse_dds_header() {
        let tex = parse_dds(&dds_bytes(64, 32, b"DXT5", 2048)).unwrap();
        assert_eq!((tex.width, tex.height), (64, 32));
        assert_eq!(tex.format_name(), "DXT5");
        assert_eq!(tex.data.len(), 2048);
    }

    #[test]
    fn test_parse_dds_skips_dx10_header() {
        let tex = parse_dds(&dds_bytes(16, 16, b"DX10", 256)).unwrap();
        assert_eq!(tex.data.len(), 256);
    }

    #[test]
    fn test_parse_dds_rejects_garbage() {
        assert!(matches!(parse_dds(b"nope"), Err(FrameError::InvalidTexture(_))));
        let mut bytes = dds_bytes(4, 4, b"DXT1", 8);
        bytes[0] = b'X';
        assert!(parse_dds(&bytes).is_err());
    }

    #[test]
    fn test_pixel_decoder_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f0001.png");
        image::RgbImage::from_pixel(5, 3, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let payload = PixelDecoder.decode(&path).unwrap();
        match payload {
            FramePayload::Pixels(img) => {
                assert_eq!((img.width, img.height, img.channels), (5, 3, 3));
                assert_eq!(img.buffer.mem(), 5 * 3 * 3);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_pixel_decoder_missing_file() {
        let err = PixelDecoder.decode(Path::new("/nonexistent/f0001.png")).unwrap_err();
        assert!(matches!(err, FrameError::Io { .. }));
    }

    #[test]
    fn test_pixel_decoder_unknown_extension() {
        let err = PixelDecoder.decode(Path::new("clip.mov")).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_strategy_from_mode() {
        assert_eq!(Decoder::from_mode(DecodeMode::Pixels).label(), "pixels");
        let compressed = Decoder::from_mode(DecodeMode::Compressed);
        assert_eq!(compressed.extensions(), TEXTURE_EXTS);
    }
}
