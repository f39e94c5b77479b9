//! Splitting oversized image operations into texture-sized tiles.

/// One tile of a larger image, in pixels relative to the image origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub fn needs_tiling(width: u32, height: u32, max_size: u32) -> bool {
    width > max_size || height > max_size
}

/// Tiles covering `width` x `height`, column by column, none larger than
/// `max_size` on either axis.
pub fn tiles(width: u32, height: u32, max_size: u32) -> impl Iterator<Item = Tile> {
    assert!(max_size > 0, "tile size must be positive");
    let step = max_size as usize;
    (0..width).step_by(step).flat_map(move |x| {
        (0..height).step_by(step).map(move |y| {
            let tile = Tile {
                x,
                y,
                width: max_size.min(width - x),
                height: max_size.min(height - y),
            };
            debug_assert!(!needs_tiling(tile.width, tile.height, max_size));
            tile
        })
    })
}
