//! Client pixel-store addressing.

use crate::error::MetaError;
use crate::format::{bytes_per_pixel, PixelFormat, PixelType};

/// Pack or unpack parameters (`glPixelStore`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelStore {
    pub alignment: u32,
    pub row_length: u32,
    pub image_height: u32,
    pub skip_pixels: u32,
    pub skip_rows: u32,
    pub skip_images: u32,
    pub swap_bytes: bool,
    pub lsb_first: bool,
    pub invert: bool,
}

impl Default for PixelStore {
    fn default() -> Self {
        Self {
            alignment: 4,
            row_length: 0,
            image_height: 0,
            skip_pixels: 0,
            skip_rows: 0,
            skip_images: 0,
            swap_bytes: false,
            lsb_first: false,
            invert: false,
        }
    }
}

pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

impl PixelStore {
    /// Byte-aligned, no skips: the layout meta scratch images use.
    pub fn tight() -> Self {
        Self {
            alignment: 1,
            ..Self::default()
        }
    }

    fn alignment(&self) -> usize {
        (self.alignment.max(1) as usize).next_power_of_two()
    }

    fn row_pixels(&self, width: u32) -> usize {
        if self.row_length > 0 {
            self.row_length as usize
        } else {
            width as usize
        }
    }

    /// Bytes between the starts of consecutive rows.
    pub fn row_stride(&self, width: u32, format: PixelFormat, ty: PixelType) -> usize {
        let pixels = self.row_pixels(width);
        let bytes = match bytes_per_pixel(format, ty) {
            Some(bpp) => pixels * bpp,
            None => pixels.div_ceil(8),
        };
        align_up(bytes, self.alignment())
    }

    /// Bytes between the starts of consecutive images of a 3D layout.
    pub fn image_stride(&self, width: u32, height: u32, format: PixelFormat, ty: PixelType) -> usize {
        let rows = if self.image_height > 0 {
            self.image_height
        } else {
            height
        };
        self.row_stride(width, format, ty) * rows as usize
    }

    /// Byte offset of pixel (`column`, `row`) of image `image`, skips included.
    ///
    /// For [`PixelType::Bitmap`] the offset names the byte holding the pixel;
    /// the bit within it follows from `skip_pixels + column`.
    pub fn image_offset(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        image: u32,
        row: u32,
        column: u32,
    ) -> usize {
        let image_index = (self.skip_images + image) as usize;
        let row_index = (self.skip_rows + row) as usize;
        let column_index = (self.skip_pixels + column) as usize;
        let column_bytes = match bytes_per_pixel(format, ty) {
            Some(bpp) => column_index * bpp,
            None => column_index / 8,
        };
        image_index * self.image_stride(width, height, format, ty)
            + row_index * self.row_stride(width, format, ty)
            + column_bytes
    }

    /// Minimum number of bytes a source must hold for a
    /// `width` x `height` x `depth` transfer.
    pub fn required_size(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        format: PixelFormat,
        ty: PixelType,
    ) -> usize {
        if width == 0 || height == 0 || depth == 0 {
            return 0;
        }
        let last_row =
            self.image_offset(width, height, format, ty, depth - 1, height - 1, 0);
        let row_bytes = match bytes_per_pixel(format, ty) {
            Some(bpp) => width as usize * bpp,
            None => ((self.skip_pixels % 8) as usize + width as usize).div_ceil(8),
        };
        last_row + row_bytes
    }

    /// Copy of these parameters with an extra pixel/row offset, used when an
    /// image is split into tiles.
    pub fn with_skip(&self, skip_pixels: u32, skip_rows: u32) -> Self {
        Self {
            skip_pixels: self.skip_pixels + skip_pixels,
            skip_rows: self.skip_rows + skip_rows,
            ..*self
        }
    }
}

/// Allocate a `len`-byte scratch buffer filled with `fill`, reporting host
/// allocation failure instead of aborting.
pub(crate) fn staging_buffer(len: usize, fill: u8, what: &'static str) -> Result<Vec<u8>, MetaError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| MetaError::OutOfMemory(what))?;
    buf.resize(len, fill);
    Ok(buf)
}

/// Expand a 1bpp bitmap into one byte per pixel, writing `on` into `dst`
/// wherever a bit is set and leaving other bytes alone. Returns `false`
/// when `src` is too small for the unpack parameters.
pub fn expand_bitmap_into(
    unpack: &PixelStore,
    width: u32,
    height: u32,
    src: &[u8],
    on: u8,
    dst: &mut [u8],
) -> bool {
    let format = PixelFormat::ColorIndex;
    let ty = PixelType::Bitmap;
    let (w, h) = (width as usize, height as usize);
    if src.len() < unpack.required_size(width, height, 1, format, ty) || dst.len() < w * h {
        return false;
    }

    let stride = unpack.row_stride(width, format, ty);
    let first = unpack.image_offset(width, height, format, ty, 0, 0, 0);
    let bit0 = unpack.skip_pixels & 7;

    for (row, dst_row) in dst.chunks_exact_mut(w.max(1)).take(h).enumerate() {
        let mut src_index = first + row * stride;
        let mut mask: u8 = if unpack.lsb_first {
            1 << bit0
        } else {
            0x80 >> bit0
        };
        for dst in dst_row.iter_mut() {
            if src[src_index] & mask != 0 {
                *dst = on;
            }
            if unpack.lsb_first {
                if mask == 0x80 {
                    src_index += 1;
                    mask = 1;
                } else {
                    mask <<= 1;
                }
            } else if mask == 1 {
                src_index += 1;
                mask = 0x80;
            } else {
                mask >>= 1;
            }
        }
    }
    true
}

/// Allocating form of [`expand_bitmap_into`]: `off` everywhere a bit is
/// clear.
pub fn expand_bitmap(
    unpack: &PixelStore,
    width: u32,
    height: u32,
    src: &[u8],
    on: u8,
    off: u8,
) -> Option<Vec<u8>> {
    let mut out = vec![off; width as usize * height as usize];
    expand_bitmap_into(unpack, width, height, src, on, &mut out).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(5, 8), 8);
    }

    #[test]
    fn row_stride_respects_alignment_and_row_length() {
        let store = PixelStore::default();
        // 3 RGB8 pixels = 9 bytes, padded to 12.
        assert_eq!(store.row_stride(3, PixelFormat::Rgb, PixelType::UnsignedByte), 12);

        let store = PixelStore {
            alignment: 1,
            row_length: 10,
            ..PixelStore::default()
        };
        assert_eq!(store.row_stride(3, PixelFormat::Rgb, PixelType::UnsignedByte), 30);
        // Bitmaps are one bit per pixel.
        assert_eq!(store.row_stride(3, PixelFormat::ColorIndex, PixelType::Bitmap), 2);
    }

    #[test]
    fn image_offset_applies_skips_and_image_height() {
        let store = PixelStore {
            alignment: 1,
            image_height: 8,
            skip_pixels: 2,
            skip_rows: 1,
            skip_images: 1,
            ..PixelStore::default()
        };
        let row = 4 * 4;
        let image = row * 8;
        assert_eq!(
            store.image_offset(4, 4, PixelFormat::Rgba, PixelType::UnsignedByte, 1, 2, 3),
            2 * image + 3 * row + 5 * 4
        );
    }

    #[test]
    fn required_size_covers_last_row_only() {
        let store = PixelStore::default();
        // Two rows of 3 RGB8 pixels: first row padded to 12, last row unpadded.
        assert_eq!(
            store.required_size(3, 2, 1, PixelFormat::Rgb, PixelType::UnsignedByte),
            12 + 9
        );
    }

    #[test]
    fn expand_bitmap_msb_first() {
        let store = PixelStore {
            alignment: 1,
            ..PixelStore::default()
        };
        let out = expand_bitmap(&store, 10, 1, &[0b1010_0000, 0b0100_0000], 255, 0).unwrap();
        assert_eq!(out, vec![255, 0, 255, 0, 0, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn expand_bitmap_lsb_first_with_skip() {
        let store = PixelStore {
            alignment: 1,
            lsb_first: true,
            skip_pixels: 1,
            ..PixelStore::default()
        };
        let out = expand_bitmap(&store, 3, 1, &[0b0000_0110], 9, 1).unwrap();
        assert_eq!(out, vec![9, 9, 1]);
    }

    #[test]
    fn staging_buffer_is_filled() {
        let buf = staging_buffer(6, 0xab, "test").unwrap();
        assert_eq!(buf, vec![0xab; 6]);
    }

    #[test]
    fn expand_bitmap_rejects_short_source() {
        let store = PixelStore::default();
        assert!(expand_bitmap(&store, 16, 2, &[0xff, 0xff], 255, 0).is_none());
    }
}
