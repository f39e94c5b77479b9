use tracing::debug;

use crate::backend::{
    AttachmentPoint, AttachmentSource, BufferMask, Filter, GpuResources, ImageSelector,
    LevelRange, MetaDriver, ProgramId, SamplerDesc, TextureId, TextureTarget, Wrap,
};
use crate::context::{ColorWriteMask, CompareFunc, DepthState, Rect, RenderContext, MAX_DRAW_BUFFERS};
use crate::error::MetaError;
use crate::format::InternalFormat;
use crate::meta::MetaState;
use crate::save::SaveMask;
use crate::shaders::SamplerKind;
use crate::temp_texture::TempPurpose;
use crate::texcoords::{texture_coords, TexRegion2D};
use crate::tiling::needs_tiling;

use super::{bind_source_texture, quad_corners, textured_quad, WHITE};

/// Blit rectangle given by two corners, as in `glBlitFramebuffer`. Either
/// axis may be reversed to mirror the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlitRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BlitRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x0.abs_diff(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y0.abs_diff(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.x0 == self.x1 || self.y0 == self.y1
    }

    fn as_f32(&self) -> (f32, f32, f32, f32) {
        (self.x0 as f32, self.y0 as f32, self.x1 as f32, self.y1 as f32)
    }
}

/// Make `src` ascending on both axes, carrying each flip over to `dst`.
fn normalize(mut src: BlitRect, mut dst: BlitRect) -> (BlitRect, BlitRect) {
    if src.x0 > src.x1 {
        std::mem::swap(&mut src.x0, &mut src.x1);
        std::mem::swap(&mut dst.x0, &mut dst.x1);
    }
    if src.y0 > src.y1 {
        std::mem::swap(&mut src.y0, &mut src.y1);
        std::mem::swap(&mut dst.y0, &mut dst.y1);
    }
    (src, dst)
}

/// A texture bound as color attachment 0 of the read framebuffer that can
/// be sampled directly.
#[derive(Clone, Copy, Debug)]
struct AttachedSource {
    texture: TextureId,
    target: TextureTarget,
    level: u32,
    width: u32,
    height: u32,
    program: ProgramId,
}

impl MetaState {
    /// `glBlitFramebuffer` from the read to the draw framebuffer.
    ///
    /// Color goes through a textured quad, sampling the read attachment
    /// directly when it is a texture and copying through the scratch texture
    /// otherwise. Depth is copied into the depth scratch texture and written
    /// back by a depth-writing program. Stencil is never handled.
    ///
    /// Returns the buffers that were not blitted; the caller finishes those
    /// some other way.
    pub fn blit_framebuffer<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        src: BlitRect,
        dst: BlitRect,
        mask: BufferMask,
        filter: Filter,
    ) -> BufferMask {
        if src.is_empty() || dst.is_empty() {
            return BufferMask::empty();
        }
        let (src, dst) = normalize(src, dst);

        let max_size = match self.temp_layout(TempPurpose::General, ctx, driver) {
            Ok((_, size)) => size,
            Err(err) => {
                self.finish(ctx, "blit_framebuffer", Err(err));
                return mask;
            }
        };
        if needs_tiling(src.width(), src.height(), max_size) {
            self.fallback("blit_framebuffer", "exceeds scratch texture size");
            return mask;
        }

        let srgb = ctx.framebuffer_srgb;
        let mut remaining = mask;
        self.begin(ctx, SaveMask::ALL - SaveMask::SCISSOR);
        ctx.set_framebuffer_srgb(srgb);
        let result = self.blit_buffers(ctx, driver, src, dst, filter, srgb, &mut remaining);
        self.end(ctx);
        self.finish(ctx, "blit_framebuffer", result);

        if remaining.intersects(BufferMask::COLOR | BufferMask::DEPTH) {
            debug!(?remaining, "blit left buffers unhandled");
        }
        remaining
    }

    #[allow(clippy::too_many_arguments)]
    fn blit_buffers<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        src: BlitRect,
        dst: BlitRect,
        filter: Filter,
        srgb: bool,
        remaining: &mut BufferMask,
    ) -> Result<(), MetaError> {
        if remaining.intersects(BufferMask::COLOR) {
            let sampler = self.sampler(
                driver,
                SamplerDesc {
                    min_filter: filter,
                    mag_filter: filter,
                    wrap: Wrap::ClampToEdge,
                    srgb_decode: srgb,
                },
            )?;
            ctx.bind_sampler(0, Some(sampler));
            match self.attached_source(ctx, driver) {
                Some(source) => self.blit_attachment(ctx, driver, source, src, dst)?,
                None => self.blit_color_copy(ctx, driver, src, dst)?,
            }
            remaining.remove(BufferMask::COLOR);
        }

        if remaining.contains(BufferMask::DEPTH)
            && ctx.caps.has_glsl()
            && ctx.caps.depth_textures
            && self.blit_depth(ctx, driver, src, dst)?
        {
            remaining.remove(BufferMask::DEPTH);
        }
        Ok(())
    }

    fn attached_source<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &RenderContext,
        driver: &mut D,
    ) -> Option<AttachedSource> {
        let point = AttachmentPoint::Color(0);
        let Some(AttachmentSource::Texture {
            texture,
            target,
            level,
            ..
        }) = driver.framebuffer_attachment(ctx.read_framebuffer.id, point)
        else {
            return None;
        };
        if !matches!(target, TextureTarget::Tex2D | TextureTarget::Rect) {
            return None;
        }
        // Sampling the texture being rendered to is undefined.
        if let Some(AttachmentSource::Texture { texture: drawn, .. }) =
            driver.framebuffer_attachment(ctx.draw_framebuffer.id, point)
        {
            if drawn == texture {
                return None;
            }
        }
        let info = driver.tex_image_info(ImageSelector {
            texture,
            level,
            face: 0,
        })?;
        let program =
            self.shaders
                .ensure_blit(SamplerKind::for_target(target), &ctx.caps, &self.stats, driver)?;
        Some(AttachedSource {
            texture,
            target,
            level,
            width: info.width,
            height: info.height,
            program,
        })
    }

    fn blit_attachment<D: GpuResources + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        source: AttachedSource,
        src: BlitRect,
        dst: BlitRect,
    ) -> Result<(), MetaError> {
        let region = TexRegion2D {
            x: src.x0 as f32,
            y: src.y0 as f32,
            width: src.width() as f32,
            height: src.height() as f32,
            total_width: source.width as f32,
            total_height: source.height as f32,
            total_depth: 1.0,
        };
        let texcoords = texture_coords(source.target, 0, &region);
        bind_source_texture(ctx, source.target, source.texture, Some(source.program));

        let saved_range = driver.texture_level_range(source.texture);
        driver.set_texture_level_range(
            source.texture,
            LevelRange {
                base: source.level,
                max: source.level,
            },
        );
        let vertices = textured_quad(quad_corners(ctx, dst.as_f32(), 0.5, true), texcoords, WHITE);
        let drawn = self.draw_quad(ctx, driver, &vertices, 1);
        driver.set_texture_level_range(source.texture, saved_range);
        drawn
    }

    fn blit_color_copy<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        src: BlitRect,
        dst: BlitRect,
    ) -> Result<(), MetaError> {
        let (width, height) = (src.width(), src.height());
        let (temp, realloc) = self.prepare_temp(
            TempPurpose::General,
            ctx,
            driver,
            width,
            height,
            InternalFormat::Rgba8,
        )?;
        temp.copy_from_framebuffer(ctx, driver, realloc, Rect::new(src.x0, src.y0, width, height))?;

        let program = self.shaders.ensure_blit(
            SamplerKind::for_target(temp.target),
            &ctx.caps,
            &self.stats,
            driver,
        );
        bind_source_texture(ctx, temp.target, temp.texture, program);
        let corners = quad_corners(ctx, dst.as_f32(), 0.5, program.is_some());
        let vertices = textured_quad(corners, temp.texcoords(width, height), WHITE);
        self.draw_quad(ctx, driver, &vertices, 1)
    }

    /// Returns `false` when no depth-writing program is available.
    fn blit_depth<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        src: BlitRect,
        dst: BlitRect,
    ) -> Result<bool, MetaError> {
        let (width, height) = (src.width(), src.height());
        let (target, _) = self.temp_layout(TempPurpose::Depth, ctx, driver)?;
        let Some(program) =
            self.shaders
                .ensure_blit(SamplerKind::for_target(target), &ctx.caps, &self.stats, driver)
        else {
            return Ok(false);
        };

        let (temp, realloc) = self.prepare_temp(
            TempPurpose::Depth,
            ctx,
            driver,
            width,
            height,
            InternalFormat::DepthComponent24,
        )?;
        temp.copy_from_framebuffer(ctx, driver, realloc, Rect::new(src.x0, src.y0, width, height))?;
        driver.set_texture_filter(temp.texture, Filter::Nearest, Filter::Nearest);

        ctx.bind_sampler(0, None);
        bind_source_texture(ctx, temp.target, temp.texture, Some(program));
        ctx.set_color_mask([ColorWriteMask::empty(); MAX_DRAW_BUFFERS]);
        ctx.set_depth(DepthState {
            test: true,
            func: CompareFunc::Always,
            write: true,
        });
        let corners = quad_corners(ctx, dst.as_f32(), 0.5, true);
        let vertices = textured_quad(corners, temp.texcoords(width, height), WHITE);
        self.draw_quad(ctx, driver, &vertices, 1)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_moves_source_flips_to_destination() {
        let (src, dst) = normalize(
            BlitRect::new(10, 0, 0, 5),
            BlitRect::new(0, 0, 20, 10),
        );
        assert_eq!(src, BlitRect::new(0, 0, 10, 5));
        assert_eq!(dst, BlitRect::new(20, 0, 0, 10));

        let (src, dst) = normalize(BlitRect::new(0, 8, 4, 0), BlitRect::new(0, 8, 4, 0));
        assert_eq!(src, BlitRect::new(0, 0, 4, 8));
        assert_eq!(dst, BlitRect::new(0, 0, 4, 8));
    }

    #[test]
    fn extent_ignores_direction() {
        let r = BlitRect::new(7, 9, 2, 1);
        assert_eq!((r.width(), r.height()), (5, 8));
        assert!(!r.is_empty());
        assert!(BlitRect::new(3, 0, 3, 10).is_empty());
    }
}
