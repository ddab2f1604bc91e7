//! Top-level decoder: container loading, the iterated-function-system loop,
//! and conversion of the reconstructed canvas to RGB888.

use log::{debug, trace};

use crate::arena::Arena;
use crate::format::{ChannelHeader, Container};
use crate::geometry::{Rect, Size};
use crate::image::{self, ImageView, Symmetry};
use crate::pixel::Pixel;
use crate::quadtree;
use crate::rng::TableRandom;
use crate::window;
use crate::{PifsError, Result, MAX_CHANNELS_COUNT, MAX_IFS_BLOCKS_COUNT, MAX_IMAGE_SIZE};

/// PRNG seed installed by [`Decoder::reset`].
const DEFAULT_SEED: u32 = 1337;

/// log2 of the dither amplitude; noise spans `[-2^(k-1), 2^(k-1)) / 256`.
const NOISE_INTENSITY_LOG2: u32 = 4;

// Working buffers, all laid out in the arena on every load: the two
// ping-pong canvases, the deblocking mask, and one output plane per channel.
const BUFFER_IFS_FIRST: usize = 0;
const BUFFER_IFS_SECOND: usize = 1;
const BUFFER_IFS_MASK: usize = 2;
const BUFFER_IFS_COUNT: usize = 3;
const BUFFER_CHANNEL_BASE: usize = BUFFER_IFS_COUNT;
const BUFFER_COUNT: usize = BUFFER_CHANNEL_BASE + MAX_CHANNELS_COUNT;

const RGB888_BYTES_PER_PIXEL: usize = 3;

/// Output pixel formats accepted by [`Decoder::decode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb888,
}

/// Result of a successful [`Decoder::load`].
#[derive(Clone, Copy, Debug)]
pub struct LoadInfo {
    /// Number of refinement iterations the encoder recommends.
    pub iteration_count: u32,
    /// Unscaled size of the encoded image.
    pub source_size: Size,
}

#[derive(Clone, Copy, Default)]
struct Transform {
    geometry: Rect,
    brightness: Pixel,
    contrast: Pixel,
    symmetry: Symmetry,
}

/// One range block: its tile in the canvas, the bordered/windowed working
/// views used for deblocking, and the affine map that refines it.
#[derive(Clone, Copy, Default)]
struct RangeBlock {
    original: ImageView,
    bordered: ImageView,
    window: ImageView,
    transform: Transform,
}

/// Fractal image decoder.
///
/// A decoder owns a fixed pixel arena sized for the worst decodable image;
/// `load` lays every working buffer out in it and `decode` runs refinement
/// iterations plus the final color conversion. Loading a new container
/// invalidates all state of the previous one.
pub struct Decoder {
    arena: Arena,
    page_size: usize,
    channels: [ChannelHeader; MAX_CHANNELS_COUNT],
    blocks: Vec<RangeBlock>,
    buffers: [ImageView; BUFFER_COUNT],
    front: usize,
    output_size: Size,
    iteration_count: u32,
    random: TableRandom,
    noise_enabled: bool,
}

impl Decoder {
    /// A decoder sized for the largest image the format allows. This
    /// reserves a few hundred MiB; hosts with known-small inputs should
    /// prefer [`Decoder::with_max_image_size`].
    pub fn new() -> Self {
        Self::with_max_image_size(MAX_IMAGE_SIZE)
    }

    /// A decoder whose buffers hold images up to `max_image_size` squared
    /// pixels. Larger containers are rejected by `load`.
    pub fn with_max_image_size(max_image_size: usize) -> Self {
        let page_size = max_image_size * max_image_size;
        let overlap = (window::OVERLAP_DENOMINATOR * window::OVERLAP_DENOMINATOR) as usize;
        let page_count = BUFFER_COUNT + 1 + (overlap + 4) / overlap;

        let mut decoder = Decoder {
            arena: Arena::with_capacity(page_size * page_count),
            page_size,
            channels: Default::default(),
            blocks: Vec::with_capacity(MAX_IFS_BLOCKS_COUNT),
            buffers: Default::default(),
            front: BUFFER_IFS_FIRST,
            output_size: Size::default(),
            iteration_count: 0,
            random: TableRandom::new(DEFAULT_SEED),
            noise_enabled: true,
        };
        decoder.reset();
        decoder
    }

    /// Reseeds the dither generator and rewinds the ping-pong parity. Does
    /// not touch the arena; a loaded image stays loaded.
    pub fn reset(&mut self) {
        self.reset_with_seed(DEFAULT_SEED);
    }

    /// [`Decoder::reset`] with a caller-chosen dither seed.
    pub fn reset_with_seed(&mut self, seed: u32) {
        self.random.seed(seed);
        self.front = BUFFER_IFS_FIRST;
    }

    /// Enables or disables dithering. Disabling it makes decode output
    /// comparable across generator implementations.
    pub fn set_noise(&mut self, enabled: bool) {
        self.noise_enabled = enabled;
    }

    /// Size of the image `decode` will produce for the current container:
    /// the source size scaled down to fit the load target.
    pub fn output_size(&self) -> Size {
        self.output_size
    }

    /// Parses a container, lays out all working buffers and builds the
    /// deblocking mask. The output is scaled down to fit `target_size`
    /// (never up). On error the decoder holds no image and `decode`
    /// produces black frames.
    pub fn load(&mut self, data: &[u8], target_size: Size) -> Result<LoadInfo> {
        self.iteration_count = 0;
        self.blocks.clear();
        self.arena.reset();

        let container = Container::parse(data)?;
        let image = &container.image;
        let ifs = &container.ifs;
        let canvas_size = container.canvas_size;

        debug!(
            "image: {}x{}, {} channels",
            image.width, image.height, image.channel_count
        );
        debug!(
            "ifs: {}x{} grid of {}px blocks, depth {}, {} blocks, {} nodes, {} iterations",
            ifs.cols,
            ifs.rows,
            1 << ifs.step,
            ifs.depth,
            ifs.block_count,
            ifs.node_count,
            ifs.iteration_count
        );
        for (index, region) in container.regions().iter().enumerate() {
            trace!(
                "region #{index}: {},{} {}x{}",
                region.left(),
                region.top(),
                region.size.w,
                region.size.h
            );
        }

        let source_area = image.width as usize * image.height as usize;
        if source_area > self.page_size {
            return Err(PifsError::ImageTooLarge {
                width: image.width as u32,
                height: image.height as u32,
            });
        }

        let source_size = Size::new(image.width as i32, image.height as i32);
        let target = Size::new(target_size.w.max(0), target_size.h.max(0));
        self.channels = container.channels;
        self.output_size = scale_to_fit(source_size, target);
        debug!(
            "target: {}x{}, output: {}x{}",
            target_size.w, target_size.h, self.output_size.w, self.output_size.h
        );

        for record in container.blocks() {
            self.blocks.push(RangeBlock {
                transform: Transform {
                    geometry: Rect {
                        origin: record.domain_origin,
                        size: Size::default(),
                    },
                    brightness: record.brightness,
                    contrast: record.contrast,
                    symmetry: record.symmetry,
                },
                ..Default::default()
            });
        }

        self.walk_partition(&container)?;

        // The domain of each block is twice its own size.
        let canvas_rect = Rect::new(0, 0, canvas_size.w, canvas_size.h);
        for block in &mut self.blocks {
            block.transform.geometry.size = Size::new(block.original.width() << 1, block.original.height() << 1);

            let geometry = &block.transform.geometry;
            if geometry.left() < 0
                || geometry.top() < 0
                || geometry.right() > canvas_rect.size.w
                || geometry.bottom() > canvas_rect.size.h
            {
                return Err(PifsError::InvalidPartition {
                    reason: "domain block outside the canvas",
                });
            }
        }

        for index in 0..BUFFER_IFS_COUNT {
            self.buffers[index] = self.alloc_image(canvas_rect)?;
        }

        let output_rect = Rect::new(0, 0, self.output_size.w, self.output_size.h);
        for index in 0..image.channel_count as usize {
            self.buffers[BUFFER_CHANNEL_BASE + index] = self.alloc_image(output_rect)?;
        }

        self.build_mask(container.regions())?;

        self.iteration_count = ifs.iteration_count as u32;
        Ok(LoadInfo {
            iteration_count: self.iteration_count,
            source_size,
        })
    }

    /// Runs `iterations` refinement passes, then converts the canvas to
    /// RGB888 at the top-left of `dst`, zeroing the rest of the buffer.
    /// Without a loaded image the frame is all black.
    pub fn decode(
        &mut self,
        iterations: u32,
        fmt: PixelFormat,
        dst: &mut [u8],
        width: i32,
        height: i32,
        pitch: usize,
    ) -> Result<()> {
        let PixelFormat::Rgb888 = fmt;

        if width > 0 && height > 0 {
            let row_bytes = width as usize * RGB888_BYTES_PER_PIXEL;
            if pitch < row_bytes {
                return Err(PifsError::PitchTooSmall { pitch, width });
            }
            let expected = (height as usize - 1) * pitch + row_bytes;
            if dst.len() < expected {
                return Err(PifsError::BufferSizeMismatch {
                    expected,
                    actual: dst.len(),
                });
            }
        }

        image::clear_rgb888(dst, width, height, pitch);

        if self.iteration_count == 0 {
            return Ok(());
        }

        let decoded = self.iterate(iterations);

        // The canvas is a YUV420 packing: full-resolution Y on the left,
        // half-resolution U over V in the right third.
        //
        // +----------------+--------+
        // | Y              | U      |
        // |                +--------+
        // |                | V      |
        // +----------------+--------+
        let half_width = decoded.width() / 3;
        let half_height = decoded.height() / 2;
        let channel_rects = [
            Rect::new(0, 0, half_width << 1, half_height << 1),
            Rect::new(half_width << 1, 0, half_width, half_height),
            Rect::new(half_width << 1, half_height, half_width, half_height),
        ];

        for index in 0..MAX_CHANNELS_COUNT {
            let channel = self.channels[index];
            let contrast = Pixel::from_fraction(channel.contrast_shift as i32, u16::MAX as i32);
            let brightness = Pixel::from_fraction(channel.brightness_shift as i32, u16::MAX as i32);
            let output = self.buffers[BUFFER_CHANNEL_BASE + index];

            debug!(
                "channel #{index}: crop {}x{} at {},{} -> {}x{}",
                channel_rects[index].size.w,
                channel_rects[index].size.h,
                channel_rects[index].left(),
                channel_rects[index].top(),
                output.width(),
                output.height()
            );

            image::crop_resize_adjust(
                self.arena.pixels_mut(),
                decoded,
                channel_rects[index],
                contrast,
                brightness,
                output,
            );
        }

        image::yuv444_to_rgb888(
            self.arena.pixels(),
            self.buffers[BUFFER_CHANNEL_BASE],
            self.buffers[BUFFER_CHANNEL_BASE + 1],
            self.buffers[BUFFER_CHANNEL_BASE + 2],
            dst,
            width,
            height,
            pitch,
        );

        Ok(())
    }

    /// Assigns a canvas tile to every range block in partition walk order.
    fn walk_partition(&mut self, container: &Container<'_>) -> Result<()> {
        let ifs = &container.ifs;
        let mut nodes = container.nodes();
        let mut leaf = 0usize;

        let blocks = &mut self.blocks;
        let arena = &mut self.arena;
        quadtree::decode_partition(
            &mut nodes,
            ifs.cols as i32,
            ifs.rows as i32,
            1 << ifs.step,
            ifs.depth as i32,
            |rect| {
                if leaf >= blocks.len() {
                    return Err(PifsError::InvalidPartition {
                        reason: "more partition leaves than blocks",
                    });
                }

                let base = arena.alloc(rect.area() as usize).ok_or(PifsError::ArenaExhausted {
                    requested: rect.area() as usize,
                })?;
                blocks[leaf].original = ImageView::new(rect, base);
                leaf += 1;
                Ok(())
            },
        )?;

        if leaf != self.blocks.len() {
            return Err(PifsError::InvalidPartition {
                reason: "fewer partition leaves than blocks",
            });
        }
        if nodes.consumed() != ifs.node_count as usize {
            return Err(PifsError::InvalidPartition {
                reason: "partition left node bits unconsumed",
            });
        }

        Ok(())
    }

    /// Builds each block's smoothing window and the canvas-wide deblocking
    /// mask: the pointwise reciprocal of the summed windows.
    fn build_mask(&mut self, regions: &[Rect]) -> Result<()> {
        let mask = self.buffers[BUFFER_IFS_MASK];

        for index in 0..self.blocks.len() {
            let bordered_rect = window::window_rect(self.blocks[index].original.rect);
            let clipped_by_canvas = bordered_rect.intersect(&mask.rect);

            // Keep the window inside the region holding most of the block,
            // so smoothing cannot bleed between the packed channel planes.
            let mut clipped = Rect::default();
            for region in regions {
                let candidate = clipped_by_canvas.intersect(region);
                if candidate.area() > clipped.area() {
                    clipped = candidate;
                }
            }
            if clipped.area() == 0 {
                clipped = clipped_by_canvas;
            }

            let window_view = self.alloc_image(clipped)?;
            image::fill_window(
                self.arena.pixels_mut(),
                window_view,
                bordered_rect,
                window::window_sample,
            );

            let bordered_view = self.alloc_image(clipped)?;
            self.blocks[index].window = window_view;
            self.blocks[index].bordered = bordered_view;

            image::add(self.arena.pixels_mut(), mask, window_view);
        }

        // Invert the accumulated windows; the clamp keeps the divisor away
        // from zero outside any window support.
        let pixels = self.arena.pixels_mut();
        for offset in mask.base..mask.base + mask.rect.area() as usize {
            pixels[offset] = Pixel::ONE / pixels[offset].clamp(Pixel::MIN, Pixel::MAX);
        }

        Ok(())
    }

    /// Ping-pong refinement: every pass maps each block's domain onto its
    /// tile, feathers the seams and renormalizes, then dithers. Returns the
    /// buffer holding the latest output.
    fn iterate(&mut self, iterations: u32) -> ImageView {
        let mask = self.buffers[BUFFER_IFS_MASK];

        for _ in 0..iterations {
            let input = self.buffers[self.front];
            let output = self.buffers[BUFFER_IFS_SECOND - self.front];
            let pixels = self.arena.pixels_mut();

            image::clear(pixels, output);

            for block in &self.blocks {
                image::affine_transform(
                    pixels,
                    input,
                    block.transform.geometry,
                    block.transform.contrast,
                    block.transform.brightness,
                    block.transform.symmetry,
                    block.original,
                );
                image::expand_borders(pixels, block.original, block.bordered);
                image::mul(pixels, block.bordered, block.window);
                image::add(pixels, output, block.bordered);
            }

            image::mul(pixels, output, mask);

            if self.noise_enabled {
                let amplitude = 1u32 << NOISE_INTENSITY_LOG2;
                for offset in output.base..output.base + output.rect.area() as usize {
                    let noise = Pixel::from_fraction(
                        (self.random.rand() & (amplitude - 1)) as i32 - amplitude as i32 / 2,
                        256,
                    );
                    pixels[offset] += noise;
                }
            }

            self.front = BUFFER_IFS_SECOND - self.front;
        }

        self.buffers[self.front]
    }

    fn alloc_image(&mut self, rect: Rect) -> Result<ImageView> {
        let len = rect.area() as usize;
        let base = self
            .arena
            .alloc(len)
            .ok_or(PifsError::ArenaExhausted { requested: len })?;
        Ok(ImageView::new(rect, base))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Downscale factor fitting `source` into `target`, applied in Q16; the
/// source size passes through unchanged when it already fits.
fn scale_to_fit(source: Size, target: Size) -> Size {
    const SCALE_BITS: u32 = 16;

    let scale_w = ((target.w as i64) << SCALE_BITS) / source.w as i64;
    let scale_h = ((target.h as i64) << SCALE_BITS) / source.h as i64;
    let scale = scale_w.min(scale_h);

    if scale < 1 << SCALE_BITS {
        Size::new(
            ((scale * source.w as i64) >> SCALE_BITS) as i32,
            ((scale * source.h as i64) >> SCALE_BITS) as i32,
        )
    } else {
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscale_keeps_aspect() {
        let output = scale_to_fit(Size::new(200, 100), Size::new(50, 50));
        assert_eq!(output, Size::new(50, 25));
    }

    #[test]
    fn upscale_is_refused() {
        let output = scale_to_fit(Size::new(200, 100), Size::new(400, 400));
        assert_eq!(output, Size::new(200, 100));
    }

    #[test]
    fn exact_fit_passes_through() {
        let output = scale_to_fit(Size::new(128, 64), Size::new(128, 64));
        assert_eq!(output, Size::new(128, 64));
    }

    #[test]
    fn one_axis_limits_the_scale() {
        let output = scale_to_fit(Size::new(100, 100), Size::new(200, 50));
        assert_eq!(output, Size::new(50, 50));
    }
}
