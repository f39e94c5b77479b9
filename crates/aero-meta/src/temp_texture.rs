//! Reusable scratch textures.
//!
//! One texture per purpose, created on first use and grown on demand. An
//! allocation never shrinks, so steady-state operations only sub-upload.

use tracing::debug;

use crate::backend::{
    GpuResources, ImageSelector, PixelData, TexImageDesc, TexRegion, TextureId, TextureTarget,
};
use crate::config::MetaConfig;
use crate::context::{Capabilities, Rect, RenderContext};
use crate::error::MetaError;
use crate::format::{InternalFormat, PixelFormat, PixelType};
use crate::texcoords::{texture_coords, TexRegion2D};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TempPurpose {
    General,
    Bitmap,
    Depth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempTexture {
    pub texture: TextureId,
    pub target: TextureTarget,
    pub max_size: u32,
    pub min_size: u32,
    pub npot: bool,
    /// Allocated size; zero until the first allocation.
    pub width: u32,
    pub height: u32,
    pub format: Option<InternalFormat>,
    /// Texcoord of the right edge of the last requested region.
    pub s_scale: f32,
    /// Texcoord of the top edge of the last requested region.
    pub t_scale: f32,
}

impl TempTexture {
    fn new(texture: TextureId, caps: &Capabilities, config: &MetaConfig) -> Self {
        let (target, max_size, npot) = if caps.rectangle_textures && config.prefer_rectangle_textures
        {
            (TextureTarget::Rect, caps.max_rectangle_texture_size, true)
        } else {
            (TextureTarget::Tex2D, caps.max_texture_size, caps.npot_textures)
        };
        Self::with_layout(texture, target, max_size, config.min_temp_texture_size, npot)
    }

    pub fn with_layout(
        texture: TextureId,
        target: TextureTarget,
        max_size: u32,
        min_size: u32,
        npot: bool,
    ) -> Self {
        Self {
            texture,
            target,
            max_size,
            min_size: min_size.min(max_size),
            npot,
            width: 0,
            height: 0,
            format: None,
            s_scale: 0.0,
            t_scale: 0.0,
        }
    }

    fn grow_to(&self, requested: u32, current: u32) -> u32 {
        let size = if self.npot {
            requested.max(self.min_size)
        } else {
            requested.max(self.min_size).next_power_of_two()
        };
        size.max(current).min(self.max_size)
    }

    /// Make room for a `width` x `height` image of `format`. Returns `true`
    /// when the texture needs a full image specification, `false` when a
    /// sub-upload into the existing allocation suffices.
    ///
    /// # Panics
    ///
    /// Panics if the request exceeds [`Self::max_size`]; callers tile first.
    pub fn alloc(&mut self, width: u32, height: u32, format: InternalFormat) -> bool {
        assert!(
            width <= self.max_size && height <= self.max_size,
            "temp texture request {width}x{height} exceeds limit {}",
            self.max_size
        );

        let realloc =
            width > self.width || height > self.height || self.format != Some(format);
        if realloc {
            self.width = self.grow_to(width, self.width);
            self.height = self.grow_to(height, self.height);
            self.format = Some(format);
            debug!(
                width = self.width,
                height = self.height,
                ?format,
                "reallocating meta temp texture"
            );
        }

        if self.target == TextureTarget::Rect {
            self.s_scale = width as f32;
            self.t_scale = height as f32;
        } else {
            self.s_scale = width as f32 / self.width as f32;
            self.t_scale = height as f32 / self.height as f32;
        }
        realloc
    }

    /// Quad texcoords covering the lower-left `width` x `height` region.
    pub fn texcoords(&self, width: u32, height: u32) -> [[f32; 4]; 4] {
        let region = TexRegion2D {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            total_width: self.width as f32,
            total_height: self.height as f32,
            total_depth: 1.0,
        };
        texture_coords(self.target, 0, &region)
    }

    fn image(&self) -> ImageSelector {
        ImageSelector {
            texture: self.texture,
            level: 0,
            face: 0,
        }
    }

    fn specify_storage<D: GpuResources + ?Sized>(
        &self,
        ctx: &RenderContext,
        driver: &mut D,
    ) -> Result<(), MetaError> {
        let format = self
            .format
            .ok_or(MetaError::OutOfMemory("unallocated temp texture"))?;
        driver.tex_image(
            ctx,
            self.image(),
            TexImageDesc {
                format,
                width: self.width,
                height: self.height,
                depth: 1,
            },
            PixelFormat::for_base_format(format.base_format(), format.is_integer()),
            format.temp_image_type(),
            None,
        )?;
        Ok(())
    }

    /// Upload a client image into the lower-left corner, honoring the
    /// context's unpack state.
    #[allow(clippy::too_many_arguments)]
    pub fn upload<D: GpuResources + ?Sized>(
        &self,
        ctx: &RenderContext,
        driver: &mut D,
        realloc: bool,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        pixels: PixelData<'_>,
    ) -> Result<(), MetaError> {
        if realloc {
            self.specify_storage(ctx, driver)?;
        }
        driver.tex_sub_image(
            ctx,
            self.image(),
            TexRegion {
                x: 0,
                y: 0,
                z: 0,
                width,
                height,
                depth: 1,
            },
            format,
            ty,
            pixels,
        )?;
        Ok(())
    }

    /// Copy `src` of the read framebuffer into the lower-left corner.
    pub fn copy_from_framebuffer<D: GpuResources + ?Sized>(
        &self,
        ctx: &RenderContext,
        driver: &mut D,
        realloc: bool,
        src: Rect,
    ) -> Result<(), MetaError> {
        let format = self
            .format
            .ok_or(MetaError::OutOfMemory("unallocated temp texture"))?;
        if realloc {
            self.specify_storage(ctx, driver)?;
        }
        driver.copy_tex_image(ctx, self.image(), format, 0, 0, src, false)?;
        Ok(())
    }
}

/// The per-purpose scratch textures of one context.
#[derive(Debug, Default)]
pub struct TempTextures {
    general: Option<TempTexture>,
    bitmap: Option<TempTexture>,
    depth: Option<TempTexture>,
}

impl TempTextures {
    fn slot(&mut self, purpose: TempPurpose) -> &mut Option<TempTexture> {
        match purpose {
            TempPurpose::General => &mut self.general,
            TempPurpose::Bitmap => &mut self.bitmap,
            TempPurpose::Depth => &mut self.depth,
        }
    }

    pub fn get(&self, purpose: TempPurpose) -> Option<&TempTexture> {
        match purpose {
            TempPurpose::General => self.general.as_ref(),
            TempPurpose::Bitmap => self.bitmap.as_ref(),
            TempPurpose::Depth => self.depth.as_ref(),
        }
    }

    pub fn get_or_create<D: GpuResources + ?Sized>(
        &mut self,
        purpose: TempPurpose,
        caps: &Capabilities,
        config: &MetaConfig,
        driver: &mut D,
    ) -> Result<&mut TempTexture, MetaError> {
        let slot = self.slot(purpose);
        if slot.is_none() {
            let probe = TempTexture::new(TextureId(0), caps, config);
            let texture = driver.create_texture(probe.target)?;
            debug!(?purpose, target = ?probe.target, %texture, "created meta temp texture");
            *slot = Some(TempTexture { texture, ..probe });
        }
        slot.as_mut()
            .ok_or(MetaError::OutOfMemory("temp texture"))
    }

    pub fn cleanup<D: GpuResources + ?Sized>(&mut self, driver: &mut D) {
        for slot in [&mut self.general, &mut self.bitmap, &mut self.depth] {
            if let Some(temp) = slot.take() {
                driver.delete_texture(temp.texture);
            }
        }
    }
}
