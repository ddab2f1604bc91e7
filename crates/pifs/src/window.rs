//! Deblocking window: a trapezoidal 2-D weight with quadratic slopes.
//!
//! Each range block is expanded by a quarter of its size on every side, and
//! neighbouring windows overlap inside that margin. After the mask
//! normalization step the overlapped sums cancel out and block seams vanish.

use crate::geometry::{Rect, Size};
use crate::pixel::Pixel;

/// Denominator of the block-overlap ratio: windows extend each range block
/// by `size / OVERLAP_DENOMINATOR` on every side (25% overlap).
pub(crate) const OVERLAP_DENOMINATOR: i32 = 4;

/// Geometry of the window covering `roi` plus its overlap border.
pub(crate) fn window_rect(roi: Rect) -> Rect {
    roi.expand(Size::new(
        roi.size.w / OVERLAP_DENOMINATOR,
        roi.size.h / OVERLAP_DENOMINATOR,
    ))
}

/// One-dimensional kernel over `t` in [0, 1):
///
/// ```text
///       +++++++++
///      /|       |\
///     / |       | \
/// ---0--k--0.5-(1-k)--1--> t
/// ```
///
/// The flat top widens with `factor`; the slopes are squared so adjacent
/// windows sum close to unity inside the overlap margin.
fn trapezoidal_kernel(t: Pixel, factor: Pixel) -> Pixel {
    let k = ((Pixel::ONE - (t - Pixel::HALF).abs() * 2) * factor).clamp01();
    k * k
}

/// Window sample at local coordinates `(x, y)` of a `w` by `h` window.
pub(crate) fn window_sample(x: i32, y: i32, w: i32, h: i32) -> Pixel {
    const FACTOR: Pixel = Pixel::from_int(1 + OVERLAP_DENOMINATOR / 2);

    trapezoidal_kernel(Pixel::from_fraction(x, w), FACTOR)
        * trapezoidal_kernel(Pixel::from_fraction(y, h), FACTOR)
}
