//! Read-back of compressed texture images by rendering them into a color
//! renderbuffer and reading the pixels back.

use tracing::{debug, warn};

use crate::backend::{
    AttachmentPoint, AttachmentSource, Filter, FramebufferId, FramebufferStatus, GpuResources,
    ImageSelector, LevelRange, MetaDriver, ProgramId, RenderbufferId, SamplerDesc, TexImageInfo,
    TexRegion, TextureTarget, Wrap,
};
use crate::context::{PixelTransferState, Rect, RenderContext};
use crate::error::MetaError;
use crate::format::{DataType, InternalFormat, PixelFormat, PixelType};
use crate::meta::MetaState;
use crate::pixels::PixelStore;
use crate::save::SaveMask;
use crate::shaders::SamplerKind;
use crate::texcoords::{texture_coords, TexRegion2D};

use super::{
    bind_source_texture, quad_corners, target_framebuffer, textured_quad, SavedFramebuffers, WHITE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DecompressTarget {
    framebuffer: FramebufferId,
    renderbuffer: RenderbufferId,
    width: u32,
    height: u32,
}

/// Cached render targets for decompression, one per renderbuffer format.
/// Storage only ever grows.
#[derive(Debug, Default)]
pub(crate) struct DecompressTargets {
    unorm: Option<DecompressTarget>,
    float: Option<DecompressTarget>,
}

impl DecompressTargets {
    fn create<D: GpuResources + ?Sized>(
        driver: &mut D,
        format: InternalFormat,
    ) -> Result<DecompressTarget, MetaError> {
        let framebuffer = driver.create_framebuffer()?;
        let renderbuffer = match driver.create_renderbuffer() {
            Ok(renderbuffer) => renderbuffer,
            Err(err) => {
                driver.delete_framebuffer(framebuffer);
                return Err(err.into());
            }
        };
        driver.framebuffer_attach(
            framebuffer,
            AttachmentPoint::Color(0),
            Some(AttachmentSource::Renderbuffer(renderbuffer)),
        );
        debug!(%framebuffer, %renderbuffer, ?format, "created decompression target");
        Ok(DecompressTarget {
            framebuffer,
            renderbuffer,
            width: 0,
            height: 0,
        })
    }

    /// The framebuffer rendering to a `format` renderbuffer of at least
    /// `width` x `height`, with its completeness.
    fn ensure<D: GpuResources + ?Sized>(
        &mut self,
        driver: &mut D,
        format: InternalFormat,
        width: u32,
        height: u32,
    ) -> Result<(FramebufferId, FramebufferStatus), MetaError> {
        let slot = if format == InternalFormat::Rgba32F {
            &mut self.float
        } else {
            &mut self.unorm
        };
        if slot.is_none() {
            *slot = Some(Self::create(driver, format)?);
        }
        let target = slot
            .as_mut()
            .ok_or(MetaError::OutOfMemory("decompression target"))?;

        if width > target.width || height > target.height {
            target.width = target.width.max(width);
            target.height = target.height.max(height);
            driver.renderbuffer_storage(target.renderbuffer, format, target.width, target.height)?;
        }
        Ok((target.framebuffer, driver.check_framebuffer(target.framebuffer)))
    }

    pub(crate) fn cleanup<D: GpuResources + ?Sized>(&mut self, driver: &mut D) {
        for slot in [&mut self.unorm, &mut self.float] {
            if let Some(target) = slot.take() {
                driver.delete_framebuffer(target.framebuffer);
                driver.delete_renderbuffer(target.renderbuffer);
            }
        }
    }
}

/// Renderbuffer format that holds decoded texels of `format` without loss,
/// or `None` when decompression cannot go through a color buffer.
fn renderbuffer_format(format: InternalFormat, float_buffers: bool) -> Option<InternalFormat> {
    match format.data_type() {
        DataType::UnsignedNormalized => Some(InternalFormat::Rgba8),
        DataType::Float | DataType::SignedNormalized if float_buffers => {
            Some(InternalFormat::Rgba32F)
        }
        _ => None,
    }
}

/// Slice of the texture sampled for output image `index` of `region`.
/// Targets whose read-back images are laid out through `PACK_IMAGE_HEIGHT`
/// and `PACK_SKIP_IMAGES`, one image per slice or layer.
fn has_image_layout(target: TextureTarget) -> bool {
    matches!(
        target,
        TextureTarget::Tex3D
            | TextureTarget::Tex1DArray
            | TextureTarget::Tex2DArray
            | TextureTarget::CubeArray
    )
}

fn source_slice(info: &TexImageInfo, image: ImageSelector, region: &TexRegion, index: u32) -> u32 {
    match info.target {
        TextureTarget::Cube => image.face,
        TextureTarget::Tex3D
        | TextureTarget::Tex1DArray
        | TextureTarget::Tex2DArray
        | TextureTarget::CubeArray => region.z + index,
        _ => 0,
    }
}

/// Everything one decompression pass needs, fixed before the save region
/// opens.
#[derive(Clone, Copy, Debug)]
struct DecompressJob {
    image: ImageSelector,
    info: TexImageInfo,
    region: TexRegion,
    format: PixelFormat,
    ty: PixelType,
    renderbuffer_format: InternalFormat,
    program: Option<ProgramId>,
}

impl MetaState {
    /// `glGetTexSubImage` for compressed images: decode `region` of `image`
    /// on the GPU and read it into `dst` as `format`/`ty`, honoring the
    /// context's pack parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn get_tex_sub_image<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        region: TexRegion,
        format: PixelFormat,
        ty: PixelType,
        dst: &mut [u8],
    ) {
        let job = match self.decompress_job(ctx, driver, image, region, format, ty) {
            Ok(job) => job,
            Err(reason) => {
                self.fallback("get_tex_sub_image", reason);
                driver.swrast_get_tex_sub_image(ctx, image, region, format, ty, dst);
                return;
            }
        };
        if region.width == 0 || region.height == 0 || region.depth == 0 {
            return;
        }

        self.begin(ctx, SaveMask::ALL - SaveMask::PIXEL_STORE);
        let saved = SavedFramebuffers::capture(ctx);
        let level_range = driver.texture_level_range(image.texture);
        let result = self.decompress_slices(ctx, driver, &job, dst);
        driver.set_texture_level_range(image.texture, level_range);
        saved.restore(ctx);
        self.end(ctx);

        match result {
            Ok(true) => {}
            Ok(false) => {
                self.fallback("get_tex_sub_image", "decompression target incomplete");
                driver.swrast_get_tex_sub_image(ctx, image, region, format, ty, dst);
            }
            Err(err) => self.finish(ctx, "get_tex_sub_image", Err(err)),
        }
    }

    fn decompress_job<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &RenderContext,
        driver: &mut D,
        image: ImageSelector,
        region: TexRegion,
        format: PixelFormat,
        ty: PixelType,
    ) -> Result<DecompressJob, &'static str> {
        let info = driver.tex_image_info(image).ok_or("no image")?;
        if !info.format.is_compressed() {
            return Err("uncompressed image");
        }
        if ctx.pixel_store.pack_buffer.is_some() {
            return Err("pack buffer bound");
        }
        if !format.is_color() || format.is_integer() {
            return Err("unsupported read-back format");
        }
        let renderbuffer_format =
            renderbuffer_format(info.format, ctx.caps.float_textures && ctx.caps.color_buffer_float)
                .ok_or("no renderbuffer format for texel type")?;

        let program = self.shaders.ensure_blit(
            SamplerKind::for_target(info.target),
            &ctx.caps,
            &self.stats,
            driver,
        );
        let fixed_function_target = matches!(
            info.target,
            TextureTarget::Tex1D
                | TextureTarget::Tex2D
                | TextureTarget::Tex3D
                | TextureTarget::Cube
                | TextureTarget::Rect
        );
        if program.is_none() && !fixed_function_target {
            return Err("no blit program for array target");
        }

        Ok(DecompressJob {
            image,
            info,
            region,
            format,
            ty,
            renderbuffer_format,
            program,
        })
    }

    fn decompress_slices<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        job: &DecompressJob,
        dst: &mut [u8],
    ) -> Result<bool, MetaError> {
        let DecompressJob {
            image,
            info,
            region,
            format,
            ty,
            ..
        } = *job;
        let (width, height) = (region.width, region.height);

        let (fb, status) = self
            .decompress
            .ensure(driver, job.renderbuffer_format, width, height)?;
        let FramebufferStatus::Complete(bound) = status else {
            warn!(%fb, "decompression framebuffer incomplete");
            return Ok(false);
        };
        target_framebuffer(ctx, bound, width, height, true);
        ctx.set_read_framebuffer(bound);

        let sampler = self.sampler(
            driver,
            SamplerDesc {
                min_filter: Filter::Nearest,
                mag_filter: Filter::Nearest,
                wrap: Wrap::ClampToEdge,
                srgb_decode: false,
            },
        )?;
        ctx.bind_sampler(0, Some(sampler));
        bind_source_texture(ctx, info.target, image.texture, job.program);
        if info.target != TextureTarget::Rect {
            driver.set_texture_level_range(
                image.texture,
                LevelRange {
                    base: image.level,
                    max: image.level,
                },
            );
        }

        if matches!(format, PixelFormat::Luminance | PixelFormat::LuminanceAlpha)
            || info.format.base_format().is_luminance_family()
        {
            // Read-back computes L = R + G + B; keep only R.
            ctx.set_pixel_transfer(PixelTransferState {
                scale: [1.0, 0.0, 0.0, 1.0],
                ..PixelTransferState::default()
            });
        }

        let source = TexRegion2D {
            x: region.x as f32,
            y: region.y as f32,
            width: width as f32,
            height: height as f32,
            total_width: info.width as f32,
            total_height: info.height as f32,
            total_depth: info.depth.max(1) as f32,
        };
        let rect = (0.0, 0.0, width as f32, height as f32);
        let corners = quad_corners(ctx, rect, 0.5, job.program.is_some());
        // Images of a 3D-style read-back are addressed through the pack
        // parameters; rows within an image come from the read itself.
        let pack = PixelStore {
            skip_pixels: 0,
            skip_rows: 0,
            ..ctx.pixel_store.pack
        };

        let image_addressed = has_image_layout(info.target);
        for index in 0..region.depth {
            let offset = if image_addressed {
                pack.image_offset(width, height, format, ty, index, 0, 0)
            } else {
                0
            };
            let out = dst
                .get_mut(offset..)
                .ok_or(MetaError::InvalidOperation("destination too small"))?;

            let slice = source_slice(&info, image, &region, index);
            let texcoords = texture_coords(info.target, slice, &source);
            self.draw_quad(ctx, driver, &textured_quad(corners, texcoords, WHITE), 1)?;
            driver.read_pixels(ctx, Rect::new(0, 0, width, height), format, ty, out)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureId;

    #[test]
    fn renderbuffer_format_follows_texel_type() {
        assert_eq!(
            renderbuffer_format(InternalFormat::RgbaDxt5, true),
            Some(InternalFormat::Rgba8)
        );
        assert_eq!(
            renderbuffer_format(InternalFormat::RgbBptcSignedFloat, true),
            Some(InternalFormat::Rgba32F)
        );
        assert_eq!(renderbuffer_format(InternalFormat::RgbBptcUnsignedFloat, false), None);
        assert_eq!(
            renderbuffer_format(InternalFormat::SignedRedRgtc1, true),
            Some(InternalFormat::Rgba32F)
        );
    }

    #[test]
    fn slices_follow_target_layout() {
        let region = TexRegion {
            x: 0,
            y: 0,
            z: 2,
            width: 4,
            height: 4,
            depth: 3,
        };
        let image = ImageSelector {
            texture: TextureId(1),
            level: 0,
            face: 5,
        };
        let info = TexImageInfo {
            target: TextureTarget::Tex2DArray,
            format: InternalFormat::RgbaDxt5,
            width: 4,
            height: 4,
            depth: 8,
        };
        assert_eq!(source_slice(&info, image, &region, 1), 3);
        let cube = TexImageInfo {
            target: TextureTarget::Cube,
            ..info
        };
        assert_eq!(source_slice(&cube, image, &region, 0), 5);
        let flat = TexImageInfo {
            target: TextureTarget::Tex2D,
            ..info
        };
        assert_eq!(source_slice(&flat, image, &region, 2), 0);
    }

    #[test]
    fn only_sliced_targets_use_image_addressing() {
        assert!(has_image_layout(TextureTarget::Tex3D));
        assert!(has_image_layout(TextureTarget::Tex2DArray));
        assert!(has_image_layout(TextureTarget::CubeArray));
        assert!(!has_image_layout(TextureTarget::Tex2D));
        assert!(!has_image_layout(TextureTarget::Cube));
        assert!(!has_image_layout(TextureTarget::Rect));
    }
}
