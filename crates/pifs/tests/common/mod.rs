//! Shared helpers for building synthetic containers in tests.

#![allow(dead_code)]

// Byte offsets of header fields inside a built container, for tests that
// patch individual values.
pub const OFFSET_SIGNATURE: usize = 0;
pub const OFFSET_VERSION: usize = 4;
pub const OFFSET_CODEC: usize = 8;
pub const OFFSET_WIDTH: usize = 12;
pub const OFFSET_CHANNEL_COUNT: usize = 16;
pub const OFFSET_IMAGE_COUNT: usize = 17;
pub const OFFSET_GAMMA: usize = 18;
pub const OFFSET_IFS_SIGNATURE: usize = 32;
pub const OFFSET_IFS_COLS: usize = 44;
pub const OFFSET_IFS_STEP: usize = 48;
pub const OFFSET_IFS_DEPTH: usize = 49;
pub const OFFSET_IFS_REGION_COUNT: usize = 52;
pub const OFFSET_IFS_BLOCK_COUNT: usize = 56;
pub const OFFSET_IFS_NODE_COUNT: usize = 60;

/// Packs one 32-bit block record, LSB-first fields.
pub fn block_word(contrast_q: i32, symmetry: u8, brightness_q: i32, offset_x: u8, offset_y: u8) -> u32 {
    (contrast_q as u32 & 0x1f)
        | (symmetry as u32 & 0x7) << 5
        | (brightness_q as u32 & 0xff) << 8
        | (offset_x as u32) << 16
        | (offset_y as u32) << 24
}

pub struct ContainerBuilder {
    pub width: u16,
    pub height: u16,
    /// Per-channel (brightness_shift, contrast_shift) fractions over 0xFFFF.
    pub channels: [(u16, u16); 3],
    pub cols: u16,
    pub rows: u16,
    pub step: u8,
    pub depth: u8,
    pub iteration_count: u8,
    pub regions: Vec<[u16; 4]>,
    pub blocks: Vec<u32>,
    pub node_bits: Vec<bool>,
    pub node_count_override: Option<u32>,
    pub block_count_override: Option<u32>,
}

impl ContainerBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        ContainerBuilder {
            width,
            height,
            channels: [(0, 0xFFFF); 3],
            cols: 1,
            rows: 1,
            step: 0,
            depth: 0,
            iteration_count: 1,
            regions: Vec::new(),
            blocks: Vec::new(),
            node_bits: Vec::new(),
            node_count_override: None,
            block_count_override: None,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = Vec::new();

        data.extend_from_slice(b"PIFS");
        push_u32(&mut data, 2);
        data.extend_from_slice(b"IYUV");
        push_u16(&mut data, self.width);
        push_u16(&mut data, self.height);
        data.push(3); // channel count
        data.push(1); // image count
        push_u16(&mut data, 0xFFFF); // gamma

        for &(brightness, contrast) in &self.channels {
            push_u16(&mut data, brightness);
            push_u16(&mut data, contrast);
        }

        data.extend_from_slice(b"FJRD");
        push_u32(&mut data, 1); // ifs version
        push_u32(&mut data, 0); // profile/level
        push_u16(&mut data, self.cols);
        push_u16(&mut data, self.rows);
        data.push(self.step);
        data.push(self.depth);
        data.push(self.iteration_count);
        data.push(0); // pad
        push_u16(&mut data, self.regions.len() as u16);
        push_u16(&mut data, 0); // pad
        push_u32(
            &mut data,
            self.block_count_override.unwrap_or(self.blocks.len() as u32),
        );
        push_u32(
            &mut data,
            self.node_count_override.unwrap_or(self.node_bits.len() as u32),
        );

        for region in &self.regions {
            for &value in region {
                push_u16(&mut data, value);
            }
        }

        for &word in &self.blocks {
            push_u32(&mut data, word);
        }

        let mut packed = vec![0u8; self.node_bits.len().div_ceil(8)];
        for (index, &bit) in self.node_bits.iter().enumerate() {
            if bit {
                packed[index / 8] |= 1 << (index % 8);
            }
        }
        data.extend_from_slice(&packed);

        data
    }
}

/// A 4x4 image whose blocks paint a constant value close to midgrey; the
/// channel adjust (contrast 0, brightness 1/2) then pins every plane at
/// exactly 0.5, so the RGB result is (127, 127, 127) regardless of dither.
///
/// Canvas is 6x4 (Y 4x4, U and V 2x2), split as a flat 3x2 grid of 2x2
/// blocks with 4x4 domains along the top row.
pub fn midgrey_container() -> ContainerBuilder {
    let mut builder = ContainerBuilder::new(4, 4);
    builder.channels = [(0x8000, 0); 3];
    builder.cols = 3;
    builder.rows = 2;
    builder.step = 1;
    builder.iteration_count = 3;
    builder.blocks = (0..6)
        .map(|i| block_word(0, 0, 63, (i % 2) as u8, 0))
        .collect();
    builder
}

/// An 8x8 image with a non-trivial partition: two grid cells subdivide, and
/// the blocks mix contrasts, brightnesses and all eight symmetries.
pub fn textured_container() -> ContainerBuilder {
    let mut builder = ContainerBuilder::new(8, 8);
    builder.cols = 3;
    builder.rows = 2;
    builder.step = 2;
    builder.depth = 1;
    builder.iteration_count = 4;
    builder.node_bits = vec![true, false, false, true, false, false];

    // Y, U and V territories in block-granular units, so window smoothing
    // cannot bleed between the packed planes.
    builder.regions = vec![[0, 0, 2, 2], [2, 0, 1, 1], [2, 1, 1, 1]];

    // Four 2x2 leaves, two 4x4 leaves, four 2x2 leaves, two 4x4 leaves.
    let quads = |ox: u8| (0..4).map(move |i| block_word(10 - i, i as u8 * 2 + 1, 40 - 15 * i, ox, (i % 3) as u8));
    builder.blocks.extend(quads(0));
    builder.blocks.push(block_word(-9, 0, -30, 1, 0));
    builder.blocks.push(block_word(15, 4, 127, 2, 0));
    builder.blocks.extend(quads(2));
    builder.blocks.push(block_word(-15, 6, -128, 0, 0));
    builder.blocks.push(block_word(7, 7, 64, 1, 0));
    builder
}

pub fn push_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_le_bytes());
}

pub fn push_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_le_bytes());
}
