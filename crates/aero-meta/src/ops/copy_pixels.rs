use crate::backend::{CopyPixelsType, Filter, MetaDriver};
use crate::context::{Rect, RenderContext};
use crate::error::MetaError;
use crate::format::InternalFormat;
use crate::meta::MetaState;
use crate::save::SaveMask;
use crate::temp_texture::TempPurpose;
use crate::tiling::needs_tiling;

use super::{bind_source_texture, quad_corners, textured_quad, WHITE};

impl MetaState {
    /// `glCopyPixels`: copy a region of the read framebuffer through the
    /// scratch texture and draw it at `(dst_x, dst_y)` with the current
    /// pixel zoom. Only color copies take the meta path.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_pixels<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        src_x: i32,
        src_y: i32,
        width: u32,
        height: u32,
        dst_x: i32,
        dst_y: i32,
        ty: CopyPixelsType,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let max_size = match self.temp_layout(TempPurpose::General, ctx, driver) {
            Ok((_, size)) => size,
            Err(err) => return self.finish(ctx, "copy_pixels", Err(err)),
        };

        let reason = if ty != CopyPixelsType::Color {
            Some("non-color copy")
        } else if ctx.image_transfer_active() {
            Some("pixel transfer")
        } else if ctx.fog.enabled {
            Some("fog")
        } else if needs_tiling(width, height, max_size) {
            Some("exceeds scratch texture size")
        } else {
            None
        };
        if let Some(reason) = reason {
            self.fallback("copy_pixels", reason);
            driver.swrast_copy_pixels(ctx, src_x, src_y, width, height, dst_x, dst_y, ty);
            return;
        }

        self.begin(
            ctx,
            SaveMask::RASTERIZATION
                | SaveMask::SHADER
                | SaveMask::TEXTURE
                | SaveMask::TRANSFORM
                | SaveMask::CLIP
                | SaveMask::VERTEX
                | SaveMask::VIEWPORT,
        );
        let result = self.copy_pixels_quad(
            ctx,
            driver,
            Rect::new(src_x, src_y, width, height),
            dst_x,
            dst_y,
        );
        self.end(ctx);
        self.finish(ctx, "copy_pixels", result);
    }

    fn copy_pixels_quad<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        src: Rect,
        dst_x: i32,
        dst_y: i32,
    ) -> Result<(), MetaError> {
        let (temp, realloc) = self.prepare_temp(
            TempPurpose::General,
            ctx,
            driver,
            src.width,
            src.height,
            InternalFormat::Rgba8,
        )?;
        temp.copy_from_framebuffer(ctx, driver, realloc, src)?;
        driver.set_texture_filter(temp.texture, Filter::Nearest, Filter::Nearest);
        bind_source_texture(ctx, temp.target, temp.texture, None);

        let x0 = dst_x as f32;
        let y0 = dst_y as f32;
        let x1 = x0 + src.width as f32 * ctx.raster.zoom_x;
        let y1 = y0 + src.height as f32 * ctx.raster.zoom_y;
        let positions = quad_corners(ctx, (x0, y0, x1, y1), ctx.raster.position[2], false);
        let vertices = textured_quad(positions, temp.texcoords(src.width, src.height), WHITE);
        self.draw_quad(ctx, driver, &vertices, 1)
    }
}
