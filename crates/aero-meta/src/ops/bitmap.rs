use std::borrow::Cow;

use crate::backend::{BufferId, MetaDriver, PixelData};
use crate::context::{AlphaTestState, CompareFunc, RenderContext, TexEnableMask};
use crate::error::MetaError;
use crate::format::{InternalFormat, PixelFormat, PixelType};
use crate::meta::MetaState;
use crate::pixels::{expand_bitmap_into, staging_buffer, PixelStore};
use crate::save::SaveMask;
use crate::temp_texture::TempPurpose;
use crate::tiling::needs_tiling;

use super::{bind_source_texture, quad_corners, textured_quad};

/// Foreground and background alpha for an expanded bitmap. They must differ
/// so the alpha test can separate them.
fn bitmap_alphas(raster_alpha: f32) -> (u8, u8) {
    let fg = (raster_alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    let bg = if fg > 127 { 0 } else { 255 };
    (fg, bg)
}

impl MetaState {
    /// `glBitmap`: expand the 1bpp image to an alpha texture and draw it in
    /// the raster color, discarding background texels with the alpha test.
    #[allow(clippy::too_many_arguments)]
    pub fn bitmap<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        bitmap: PixelData<'_>,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let max_size = match self.temp_layout(TempPurpose::Bitmap, ctx, driver) {
            Ok((_, size)) => size,
            Err(err) => return self.finish(ctx, "bitmap", Err(err)),
        };

        let textures_enabled = ctx
            .texture
            .units
            .iter()
            .any(|unit| unit.enabled != TexEnableMask::empty());
        let reason = if ctx.image_transfer_active() {
            Some("pixel transfer")
        } else if ctx.shader.arb_fragment_program || ctx.shader.ati_fragment_shader {
            Some("fragment program")
        } else if ctx.fog.enabled {
            Some("fog")
        } else if textures_enabled {
            Some("texturing enabled")
        } else if needs_tiling(width, height, max_size) {
            Some("exceeds scratch texture size")
        } else {
            None
        };
        if let Some(reason) = reason {
            self.fallback("bitmap", reason);
            driver.swrast_bitmap(ctx, x, y, width, height, bitmap);
            return;
        }

        let alpha = ctx.alpha_test;
        if alpha.enabled && !alpha.func.test(ctx.raster.color[3], alpha.reference) {
            // The raster color itself fails the alpha test: nothing is drawn.
            return;
        }

        let unpack = ctx.pixel_store.unpack;
        let unpack_buffer = ctx.pixel_store.unpack_buffer;
        self.begin(
            ctx,
            SaveMask::ALPHA_TEST
                | SaveMask::PIXEL_STORE
                | SaveMask::RASTERIZATION
                | SaveMask::SHADER
                | SaveMask::TEXTURE
                | SaveMask::TRANSFORM
                | SaveMask::CLIP
                | SaveMask::VERTEX
                | SaveMask::VIEWPORT,
        );
        let result = self.bitmap_quad(
            ctx,
            driver,
            (x, y, width, height),
            &unpack,
            unpack_buffer,
            bitmap,
        );
        self.end(ctx);
        self.finish(ctx, "bitmap", result);
    }

    fn bitmap_quad<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        (x, y, width, height): (i32, i32, u32, u32),
        unpack: &PixelStore,
        unpack_buffer: Option<BufferId>,
        bitmap: PixelData<'_>,
    ) -> Result<(), MetaError> {
        let source: Cow<'_, [u8]> = match bitmap {
            PixelData::Client(bytes) => Cow::Borrowed(bytes),
            PixelData::UnpackBuffer(offset) => {
                let buffer =
                    unpack_buffer.ok_or(MetaError::InvalidOperation("no unpack buffer bound"))?;
                let len = unpack.required_size(
                    width,
                    height,
                    1,
                    PixelFormat::ColorIndex,
                    PixelType::Bitmap,
                );
                Cow::Owned(driver.read_buffer(buffer, offset, len)?)
            }
        };

        let raster_color = ctx.raster.color;
        let (fg, bg) = bitmap_alphas(raster_color[3]);
        let mut expanded =
            staging_buffer(width as usize * height as usize, bg, "bitmap expansion")?;
        if !expand_bitmap_into(unpack, width, height, &source, fg, &mut expanded) {
            return Err(MetaError::InvalidOperation("bitmap source too small"));
        }

        let (temp, realloc) = self.prepare_temp(
            TempPurpose::Bitmap,
            ctx,
            driver,
            width,
            height,
            InternalFormat::Alpha8,
        )?;
        temp.upload(
            ctx,
            driver,
            realloc,
            width,
            height,
            PixelFormat::Alpha,
            PixelType::UnsignedByte,
            PixelData::Client(&expanded),
        )?;

        ctx.set_alpha_test(AlphaTestState {
            enabled: true,
            func: CompareFunc::NotEqual,
            reference: bg as f32 / 255.0,
        });
        bind_source_texture(ctx, temp.target, temp.texture, None);

        let rect = (
            x as f32,
            y as f32,
            x as f32 + width as f32,
            y as f32 + height as f32,
        );
        let positions = quad_corners(ctx, rect, ctx.raster.position[2], false);
        let vertices = textured_quad(positions, temp.texcoords(width, height), raster_color);
        self.draw_quad(ctx, driver, &vertices, 1)
    }
}
