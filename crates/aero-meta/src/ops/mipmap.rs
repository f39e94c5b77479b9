use tracing::{debug, warn};

use crate::backend::{
    AttachmentPoint, AttachmentSource, Filter, FramebufferStatus, ImageSelector, LevelRange,
    MetaDriver, ProgramId, SamplerDesc, TexImageDesc, TexImageInfo, TextureId, TextureTarget,
    Wrap,
};
use crate::context::RenderContext;
use crate::error::MetaError;
use crate::format::PixelFormat;
use crate::meta::MetaState;
use crate::save::SaveMask;
use crate::shaders::SamplerKind;
use crate::texcoords::{texture_coords, TexRegion2D};

use super::{
    bind_source_texture, quad_corners, target_framebuffer, textured_quad, SavedFramebuffers, WHITE,
};

/// Last level a chain starting at `base` with a `width` x `height` base
/// image can have, capped at `max`.
fn last_level(base: u32, width: u32, height: u32, max: u32) -> u32 {
    let largest = width.max(height).max(1);
    max.min(base + largest.ilog2())
}

fn minify(size: u32) -> u32 {
    (size / 2).max(1)
}

impl MetaState {
    /// `glGenerateMipmap`: render each level from the one above it with a
    /// linear-filtered quad per face or layer.
    pub fn generate_mipmap<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        target: TextureTarget,
        texture: TextureId,
    ) {
        let range = driver.texture_level_range(texture);
        let Some(base) = driver.tex_image_info(ImageSelector {
            texture,
            level: range.base,
            face: 0,
        }) else {
            debug!(%texture, "no base image to build mipmaps from");
            return;
        };

        let format = base.format;
        let reason = match target {
            TextureTarget::Tex3D => Some("3D texture"),
            TextureTarget::Tex1DArray => Some("1D array texture"),
            TextureTarget::Rect => Some("rectangle texture"),
            TextureTarget::CubeArray => Some("cube map array texture"),
            _ if format.is_compressed() => Some("compressed format"),
            _ if format.is_integer() => Some("integer format"),
            _ if format.base_format().is_depth_or_stencil() => Some("depth/stencil format"),
            _ => None,
        };
        let program = match reason {
            Some(_) => None,
            None => self.shaders.ensure_blit(
                SamplerKind::for_target(target),
                &ctx.caps,
                &self.stats,
                driver,
            ),
        };
        let reason = reason.or_else(|| {
            (target == TextureTarget::Tex2DArray && program.is_none())
                .then_some("no array blit program")
        });
        if let Some(reason) = reason {
            self.fallback("generate_mipmap", reason);
            driver.swrast_generate_mipmap(ctx, target, texture);
            return;
        }

        let max_level = last_level(range.base, base.width, base.height, range.max);
        if max_level <= range.base {
            return;
        }

        self.begin(ctx, SaveMask::ALL);
        let saved = SavedFramebuffers::capture(ctx);
        let result = self.mipmap_levels(
            ctx, driver, target, texture, &base, program, range.base, max_level,
        );
        driver.set_texture_level_range(texture, range);
        saved.restore(ctx);
        self.end(ctx);

        match result {
            Ok(true) => {}
            Ok(false) => {
                self.fallback("generate_mipmap", "level not renderable");
                driver.swrast_generate_mipmap(ctx, target, texture);
            }
            Err(err) => self.finish(ctx, "generate_mipmap", Err(err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn mipmap_levels<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        target: TextureTarget,
        texture: TextureId,
        base: &TexImageInfo,
        program: Option<ProgramId>,
        base_level: u32,
        max_level: u32,
    ) -> Result<bool, MetaError> {
        let fb = match self.mipmap_framebuffer {
            Some(fb) => fb,
            None => *self.mipmap_framebuffer.insert(driver.create_framebuffer()?),
        };
        let sampler = self.sampler(
            driver,
            SamplerDesc {
                min_filter: Filter::LinearMipmapLinear,
                mag_filter: Filter::Linear,
                wrap: Wrap::ClampToEdge,
                srgb_decode: false,
            },
        )?;
        ctx.bind_sampler(0, Some(sampler));
        bind_source_texture(ctx, target, texture, program);

        let faces = if target == TextureTarget::Cube { 6 } else { 1 };
        let layers = if target == TextureTarget::Tex2DArray {
            base.depth.max(1)
        } else {
            1
        };
        let (mut src_width, mut src_height) = (base.width, base.height);
        let mut complete = true;

        'levels: for level in base_level + 1..=max_level {
            let (width, height) = (minify(src_width), minify(src_height));
            for face in 0..faces {
                let image = ImageSelector {
                    texture,
                    level,
                    face,
                };
                let wanted = TexImageInfo {
                    target,
                    format: base.format,
                    width,
                    height,
                    depth: layers,
                };
                if driver.tex_image_info(image) != Some(wanted) {
                    driver.tex_image(
                        ctx,
                        image,
                        TexImageDesc {
                            format: base.format,
                            width,
                            height,
                            depth: layers,
                        },
                        PixelFormat::for_base_format(base.format.base_format(), false),
                        base.format.temp_image_type(),
                        None,
                    )?;
                }
            }

            driver.set_texture_level_range(
                texture,
                LevelRange {
                    base: level - 1,
                    max: level - 1,
                },
            );
            let source = TexRegion2D::whole(src_width, src_height);
            for slice in 0..faces.max(layers) {
                driver.framebuffer_attach(
                    fb,
                    AttachmentPoint::Color(0),
                    Some(AttachmentSource::Texture {
                        texture,
                        target,
                        level,
                        layer: slice,
                    }),
                );
                let FramebufferStatus::Complete(bound) = driver.check_framebuffer(fb) else {
                    warn!(%texture, level, slice, "mipmap level is not renderable");
                    complete = false;
                    break 'levels;
                };
                target_framebuffer(ctx, bound, width, height, true);

                let rect = (0.0, 0.0, width as f32, height as f32);
                let corners = quad_corners(ctx, rect, 0.5, program.is_some());
                let texcoords = texture_coords(target, slice, &source);
                self.draw_quad(ctx, driver, &textured_quad(corners, texcoords, WHITE), 1)?;
            }
            (src_width, src_height) = (width, height);
        }

        driver.framebuffer_attach(fb, AttachmentPoint::Color(0), None);
        Ok(complete)
    }
}
