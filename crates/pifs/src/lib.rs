//! # pifs
//!
//! A 100% Rust decoder for PIFS fractal-compressed images (the fjord
//! bitstream): a partitioned iterated function system over image blocks,
//! reconstructed by repeated affine refinement and converted to RGB888.
//!
//! ## Features
//!
//! - **Bounded parsing**: every container read is length-checked, malformed
//!   inputs are rejected with typed errors instead of being trusted
//! - **Fixed memory**: all working images live in one arena sized at
//!   construction; loading never allocates per block
//! - **Progressive decoding**: call `decode(1, ..)` once per frame to watch
//!   the attractor sharpen iteration by iteration
//!
//! ## Quick Start
//!
//! ```ignore
//! use pifs::{Decoder, PixelFormat, Size};
//!
//! let data = std::fs::read("picture.pif")?;
//! let mut decoder = Decoder::new();
//! let info = decoder.load(&data, Size::new(1280, 720))?;
//!
//! let size = decoder.output_size();
//! let pitch = size.w as usize * 3;
//! let mut frame = vec![0u8; pitch * size.h as usize];
//! decoder.decode(info.iteration_count, PixelFormat::Rgb888,
//!                &mut frame, size.w, size.h, pitch)?;
//! ```

use thiserror::Error;

mod arena;
pub mod decoder;
mod format;
pub mod geometry;
mod image;
pub mod pixel;
mod quadtree;
mod rng;
mod window;

pub use decoder::{Decoder, LoadInfo, PixelFormat};
pub use format::{inspect, ContainerInfo};
pub use geometry::{Point, Rect, Size};
pub use pixel::Pixel;

// Format limits shared by the parser and the decoder buffers
pub(crate) const MAX_CHANNELS_COUNT: usize = 3;
pub(crate) const MAX_REGIONS_COUNT: usize = 3;
pub(crate) const MAX_IFS_BLOCKS_COUNT: usize = 8192;

/// Widest/tallest image a default-sized [`Decoder`] accepts.
pub const MAX_IMAGE_SIZE: usize = 3092;

/// Errors that can occur while loading or decoding a container.
#[derive(Debug, Error)]
pub enum PifsError {
    /// The container ended before a required record.
    #[error("container truncated at offset {offset}: {needed} more bytes required")]
    TruncatedContainer { offset: usize, needed: usize },

    /// A magic fourcc did not match.
    #[error("bad signature: expected {expected:?}, found {found:?}")]
    SignatureMismatch { expected: [u8; 4], found: [u8; 4] },

    /// The container was produced for another format revision.
    #[error("unsupported container version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The inner payload is not IYUV.
    #[error("unsupported codec {found:?} (IYUV only)")]
    UnsupportedCodec { found: [u8; 4] },

    /// A header field is out of its documented range.
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: &'static str },

    /// More range blocks than the decoder's block table can hold.
    #[error("too many range blocks: {count} (limit {max})")]
    TooManyBlocks { count: u32, max: u32 },

    /// The encoded image exceeds the decoder's buffers.
    #[error("image too large: {width}x{height} exceeds decoder buffers")]
    ImageTooLarge { width: u32, height: u32 },

    /// The quad-tree bitstring and the block table disagree.
    #[error("invalid partition: {reason}")]
    InvalidPartition { reason: &'static str },

    /// The pixel arena ran out of space; only pathological containers can
    /// trigger this.
    #[error("pixel arena exhausted while allocating {requested} pixels")]
    ArenaExhausted { requested: usize },

    /// The destination row stride cannot hold one row of pixels.
    #[error("destination pitch {pitch} too small for {width} RGB888 pixels per row")]
    PitchTooSmall { pitch: usize, width: i32 },

    /// The destination slice cannot hold the requested frame.
    #[error("destination buffer too small: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

/// Result type for decoder operations.
pub type Result<T> = core::result::Result<T, PifsError>;
