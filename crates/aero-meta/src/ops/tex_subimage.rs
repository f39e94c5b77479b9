//! Sub-image copies and clears that render into the destination texture
//! through a meta-owned framebuffer.

use tracing::{debug, warn};

use crate::backend::{
    AttachmentPoint, AttachmentSource, BufferMask, Filter, FramebufferStatus, GpuResources,
    ImageSelector, MetaDriver, PixelData, TexImageInfo, TexRegion, TextureTarget,
};
use crate::context::{ClearValues, Rect, RenderContext, ScissorState};
use crate::error::MetaError;
use crate::format::{decode_texel, BaseFormat, PixelFormat, TexelValue};
use crate::meta::MetaState;
use crate::pixels::{staging_buffer, PixelStore};
use crate::save::SaveMask;

use super::{target_framebuffer, BlitRect, SavedFramebuffers};

/// Where an image of `base` format attaches, and which buffers of the
/// resulting framebuffer hold it.
fn attachment_for(base: BaseFormat) -> (AttachmentPoint, BufferMask) {
    match base {
        BaseFormat::DepthComponent => (AttachmentPoint::Depth, BufferMask::DEPTH),
        BaseFormat::StencilIndex => (AttachmentPoint::Stencil, BufferMask::STENCIL),
        BaseFormat::DepthStencil => (
            AttachmentPoint::DepthStencil,
            BufferMask::DEPTH | BufferMask::STENCIL,
        ),
        _ => (AttachmentPoint::Color(0), BufferMask::COLOR0),
    }
}

/// Framebuffer layer selecting slice `z` of `image`.
fn image_layer(info: &TexImageInfo, image: ImageSelector, z: u32) -> u32 {
    if info.target == TextureTarget::Cube {
        image.face
    } else {
        z
    }
}

/// Clear values that make a meta clear write `value`.
fn clear_values_for(value: TexelValue, base: ClearValues) -> ClearValues {
    match value {
        TexelValue::Color(color) => ClearValues { color, ..base },
        TexelValue::IntColor(color_int) => ClearValues { color_int, ..base },
        TexelValue::UintColor(color) => ClearValues {
            color_int: color.map(|c| c as i32),
            ..base
        },
        TexelValue::DepthStencil { depth, stencil } => ClearValues {
            depth,
            stencil: stencil as u32,
            ..base
        },
    }
}

/// Whether a blit can produce the whole copy. Compressed images cannot be
/// rendered to, 1D array layers are rows of the read, and stencil is never
/// blitted.
fn blit_can_copy(info: &TexImageInfo) -> bool {
    let (_, buffers) = attachment_for(info.format.base_format());
    !info.format.is_compressed()
        && info.target != TextureTarget::Tex1DArray
        && !buffers.contains(BufferMask::STENCIL)
}

fn zero_texel(info: &TexImageInfo) -> TexelValue {
    if info.format.base_format().is_depth_or_stencil() {
        TexelValue::DepthStencil {
            depth: 0.0,
            stencil: 0,
        }
    } else if info.format.is_integer() {
        TexelValue::IntColor([0; 4])
    } else {
        TexelValue::Color([0.0; 4])
    }
}

impl MetaState {
    /// `glCopyTexSubImage*`: copy `src` of the read framebuffer to
    /// `(dst_x, dst_y, dst_z)` of `image`.
    ///
    /// Renders into the image with a framebuffer blit when the image can be
    /// attached; otherwise reads the pixels back and sub-uploads them.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_tex_sub_image<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        dst_x: u32,
        dst_y: u32,
        dst_z: u32,
        src: Rect,
    ) {
        if src.is_empty() {
            return;
        }
        let Some(info) = driver.tex_image_info(image) else {
            return self.finish(
                ctx,
                "copy_tex_sub_image",
                Err(MetaError::InvalidOperation("no destination image")),
            );
        };

        if blit_can_copy(&info) {
            match self.copy_tex_sub_image_blit(ctx, driver, image, &info, (dst_x, dst_y, dst_z), src)
            {
                Ok(true) => return,
                Ok(false) => debug!(?image, "copy_tex_sub_image blit declined, reading back"),
                Err(err) => return self.finish(ctx, "copy_tex_sub_image", Err(err)),
            }
        }

        let result =
            self.copy_tex_sub_image_readback(ctx, driver, image, &info, (dst_x, dst_y, dst_z), src);
        self.finish(ctx, "copy_tex_sub_image", result);
    }

    fn copy_tex_sub_image_blit<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        info: &TexImageInfo,
        (dst_x, dst_y, dst_z): (u32, u32, u32),
        src: Rect,
    ) -> Result<bool, MetaError> {
        self.begin(ctx, SaveMask::ALL);
        let saved = SavedFramebuffers::capture(ctx);

        let result = self.blit_into_image(ctx, driver, image, info, (dst_x, dst_y, dst_z), src);

        saved.restore(ctx);
        self.end(ctx);
        result
    }

    fn blit_into_image<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        info: &TexImageInfo,
        (dst_x, dst_y, dst_z): (u32, u32, u32),
        src: Rect,
    ) -> Result<bool, MetaError> {
        let fb = driver.create_framebuffer()?;
        let (point, buffers) = attachment_for(info.format.base_format());
        driver.framebuffer_attach(
            fb,
            point,
            Some(AttachmentSource::Texture {
                texture: image.texture,
                target: info.target,
                level: image.level,
                layer: image_layer(info, image, dst_z),
            }),
        );

        let done = match driver.check_framebuffer(fb) {
            FramebufferStatus::Complete(bound) => {
                let color = matches!(point, AttachmentPoint::Color(_));
                target_framebuffer(ctx, bound, info.width, info.height, color);
                let (x, y) = (dst_x as i32, dst_y as i32);
                let remaining = self.blit_framebuffer(
                    ctx,
                    driver,
                    BlitRect::new(src.x, src.y, src.right(), src.top()),
                    BlitRect::new(x, y, x + src.width as i32, y + src.height as i32),
                    buffers,
                    Filter::Nearest,
                );
                remaining.is_empty()
            }
            FramebufferStatus::Incomplete => {
                warn!(?image, "destination image is not renderable");
                false
            }
        };
        driver.delete_framebuffer(fb);
        Ok(done)
    }

    fn copy_tex_sub_image_readback<D: GpuResources + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        info: &TexImageInfo,
        (dst_x, dst_y, dst_z): (u32, u32, u32),
        src: Rect,
    ) -> Result<(), MetaError> {
        let format = PixelFormat::for_base_format(info.format.base_format(), info.format.is_integer());
        let ty = info.format.temp_image_type();
        let len = PixelStore::tight().required_size(src.width, src.height, 1, format, ty);
        let mut pixels = staging_buffer(len, 0, "copy_tex_sub_image staging")?;

        self.begin(ctx, SaveMask::PIXEL_STORE | SaveMask::PIXEL_TRANSFER);
        let read = driver.read_pixels(ctx, src, format, ty, &mut pixels);
        self.end(ctx);
        read?;

        let region = if info.target == TextureTarget::Tex1DArray {
            // The y offset of a 1D array names the layer.
            TexRegion {
                x: dst_x,
                y: dst_z,
                z: 0,
                width: src.width,
                height: 1,
                depth: 1,
            }
        } else {
            TexRegion {
                x: dst_x,
                y: dst_y,
                z: dst_z,
                width: src.width,
                height: src.height,
                depth: 1,
            }
        };
        self.begin(ctx, SaveMask::PIXEL_STORE);
        let uploaded =
            driver.tex_sub_image(ctx, image, region, format, ty, PixelData::Client(&pixels));
        self.end(ctx);
        uploaded?;
        Ok(())
    }

    /// `glClearTexSubImage`: fill `region` of `image` with one texel value,
    /// zero when `clear_value` is `None`.
    ///
    /// Each slice is attached to a meta framebuffer and cleared with a
    /// scissored meta clear.
    pub fn clear_tex_sub_image<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        region: TexRegion,
        clear_value: Option<&[u8]>,
    ) {
        let value = match driver.tex_image_info(image) {
            None => Err("no image"),
            Some(info) if info.format.is_compressed() => Err("compressed format"),
            Some(info) => match clear_value {
                None => Ok((info, zero_texel(&info))),
                Some(bytes) => decode_texel(info.format.linear(), bytes)
                    .map(|value| (info, value))
                    .ok_or("undecodable clear value"),
            },
        };
        let (info, value) = match value {
            Ok(decoded) => decoded,
            Err(reason) => {
                self.fallback("clear_tex_sub_image", reason);
                driver.swrast_clear_tex_sub_image(ctx, image, region, clear_value);
                return;
            }
        };
        if region.width == 0 || region.height == 0 || region.depth == 0 {
            return;
        }

        self.begin(
            ctx,
            SaveMask::SCISSOR
                | SaveMask::COLOR_MASK
                | SaveMask::DEPTH_TEST
                | SaveMask::STENCIL_TEST
                | SaveMask::DRAW_BUFFERS
                | SaveMask::FRAMEBUFFER_SRGB
                | SaveMask::TRANSFORM
                | SaveMask::VIEWPORT,
        );
        let saved_clear = ctx.clear;
        let saved = SavedFramebuffers::capture(ctx);

        ctx.clear = clear_values_for(value, saved_clear);
        let result = self.clear_image_layers(ctx, driver, image, &info, region);

        ctx.clear = saved_clear;
        saved.restore(ctx);
        self.end(ctx);

        match result {
            Ok(true) => {}
            Ok(false) => {
                self.fallback("clear_tex_sub_image", "image not renderable");
                driver.swrast_clear_tex_sub_image(ctx, image, region, clear_value);
            }
            Err(err) => self.finish(ctx, "clear_tex_sub_image", Err(err)),
        }
    }

    fn clear_image_layers<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        image: ImageSelector,
        info: &TexImageInfo,
        region: TexRegion,
    ) -> Result<bool, MetaError> {
        let fb = driver.create_framebuffer()?;
        let (point, buffers) = attachment_for(info.format.base_format());
        let color = matches!(point, AttachmentPoint::Color(_));

        let mut complete = true;
        for z in region.z..region.z + region.depth {
            driver.framebuffer_attach(
                fb,
                point,
                Some(AttachmentSource::Texture {
                    texture: image.texture,
                    target: info.target,
                    level: image.level,
                    layer: image_layer(info, image, z),
                }),
            );
            let FramebufferStatus::Complete(bound) = driver.check_framebuffer(fb) else {
                warn!(?image, z, "clear target is not renderable");
                complete = false;
                break;
            };

            target_framebuffer(ctx, bound, info.width, info.height, color);
            ctx.set_scissor(ScissorState {
                enabled: true,
                rect: Rect::new(region.x as i32, region.y as i32, region.width, region.height),
            });
            let mut depth = ctx.depth;
            depth.write = true;
            ctx.set_depth(depth);
            let mut stencil = ctx.stencil;
            stencil.front.write_mask = 0xff;
            stencil.back.write_mask = 0xff;
            ctx.set_stencil(stencil);

            self.clear(ctx, driver, buffers);
        }

        driver.delete_framebuffer(fb);
        Ok(complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureId;
    use crate::format::InternalFormat;

    #[test]
    fn uint_clear_values_bitcast_into_int_slot() {
        let values = clear_values_for(
            TexelValue::UintColor([u32::MAX, 1, 0, 7]),
            ClearValues::default(),
        );
        assert_eq!(values.color_int, [-1, 1, 0, 7]);
        assert_eq!(values.color, [0.0; 4]);
    }

    #[test]
    fn depth_stencil_clear_values() {
        let values = clear_values_for(
            TexelValue::DepthStencil {
                depth: 0.25,
                stencil: 3,
            },
            ClearValues::default(),
        );
        assert_eq!((values.depth, values.stencil), (0.25, 3));
    }

    #[test]
    fn stencil_images_skip_the_blit() {
        let info = TexImageInfo {
            target: TextureTarget::Tex2D,
            format: InternalFormat::Depth24Stencil8,
            width: 8,
            height: 8,
            depth: 1,
        };
        assert!(!blit_can_copy(&info));
        assert!(blit_can_copy(&TexImageInfo {
            format: InternalFormat::DepthComponent24,
            ..info
        }));
        assert!(!blit_can_copy(&TexImageInfo {
            format: InternalFormat::RgbaDxt1,
            ..info
        }));
    }

    #[test]
    fn attachments_follow_base_format() {
        assert_eq!(
            attachment_for(BaseFormat::DepthStencil),
            (
                AttachmentPoint::DepthStencil,
                BufferMask::DEPTH | BufferMask::STENCIL
            )
        );
        assert_eq!(
            attachment_for(BaseFormat::Luminance),
            (AttachmentPoint::Color(0), BufferMask::COLOR0)
        );
    }

    #[test]
    fn cube_images_attach_their_face() {
        let info = TexImageInfo {
            target: TextureTarget::Cube,
            format: InternalFormat::Rgba8,
            width: 4,
            height: 4,
            depth: 1,
        };
        let image = ImageSelector {
            texture: TextureId(3),
            level: 0,
            face: 4,
        };
        assert_eq!(image_layer(&info, image, 0), 4);
        let info = TexImageInfo {
            target: TextureTarget::Tex2DArray,
            ..info
        };
        assert_eq!(image_layer(&info, image, 2), 2);
    }
}
