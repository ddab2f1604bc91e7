//! Quad-tree partition walker.
//!
//! The partition is stored as a flat bitstring: while descending the uniform
//! block grid (rows outer, columns inner), a set bit splits the current cell
//! into a 2x2 subgrid of half-sized cells, a clear bit emits the cell as one
//! range block. Cells at the maximum depth are implicit leaves and consume
//! no bit.

use crate::format::NodeBits;
use crate::geometry::Rect;
use crate::{PifsError, Result};

/// Walks the partition bitstring over a `cols` x `rows` grid of
/// `block_size`-sized cells, calling `emit` for every leaf in walk order.
pub(crate) fn decode_partition(
    nodes: &mut NodeBits<'_>,
    cols: i32,
    rows: i32,
    block_size: i32,
    max_depth: i32,
    mut emit: impl FnMut(Rect) -> Result<()>,
) -> Result<()> {
    walk(nodes, 0, 0, cols, rows, block_size, max_depth, &mut emit)
}

#[allow(clippy::too_many_arguments)]
fn walk<F: FnMut(Rect) -> Result<()>>(
    nodes: &mut NodeBits<'_>,
    x0: i32,
    y0: i32,
    cols: i32,
    rows: i32,
    block_size: i32,
    level: i32,
    emit: &mut F,
) -> Result<()> {
    let mut y = y0;
    while y < y0 + rows * block_size {
        let mut x = x0;
        while x < x0 + cols * block_size {
            let split = if level > 0 {
                nodes.next_bit().ok_or(PifsError::InvalidPartition {
                    reason: "node bitstring exhausted",
                })?
            } else {
                false
            };

            if split {
                walk(nodes, x, y, 2, 2, block_size >> 1, level - 1, emit)?;
            } else {
                emit(Rect::new(x, y, block_size, block_size))?;
            }

            x += block_size;
        }
        y += block_size;
    }

    Ok(())
}
