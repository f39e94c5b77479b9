use tracing::debug;

use crate::backend::{Filter, MetaDriver, PixelData, ProgramId, Uniform};
use crate::context::{
    ClampMode, ColorWriteMask, CompareFunc, PixelStoreState, RenderContext, StencilOp,
    MAX_DRAW_BUFFERS,
};
use crate::error::MetaError;
use crate::format::{InternalFormat, PixelFormat, PixelType};
use crate::meta::MetaState;
use crate::pixels::PixelStore;
use crate::save::SaveMask;
use crate::shaders::{SamplerKind, UtilityProgram};
use crate::temp_texture::{TempPurpose, TempTexture};
use crate::tiling::{needs_tiling, tiles};

use super::{bind_source_texture, quad_corners, textured_quad, WHITE};

/// How one `DrawPixels` image reaches the framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DrawPixelsPath {
    /// Textured quad with fixed-function replace.
    Color(InternalFormat),
    /// Stencil indices stored as alpha, written one bit-plane per draw.
    Stencil(ProgramId),
    /// Depth texture written through `gl_FragDepth`, colored with the
    /// raster color.
    Depth(ProgramId),
}

impl DrawPixelsPath {
    fn temp_format(self, ty: PixelType) -> InternalFormat {
        match self {
            Self::Color(format) => format,
            Self::Stencil(_) => InternalFormat::Alpha8,
            Self::Depth(_) if ty == PixelType::Float => InternalFormat::DepthComponent32F,
            Self::Depth(_) => InternalFormat::DepthComponent24,
        }
    }

    fn extra_save(self) -> SaveMask {
        match self {
            Self::Color(_) => SaveMask::empty(),
            Self::Stencil(_) => {
                SaveMask::COLOR_MASK
                    | SaveMask::DEPTH_TEST
                    | SaveMask::PIXEL_TRANSFER
                    | SaveMask::SHADER
                    | SaveMask::STENCIL_TEST
            }
            Self::Depth(_) => SaveMask::SHADER,
        }
    }
}

/// One image (or tile of one) to draw.
#[derive(Clone, Copy, Debug)]
struct PixelImage<'a> {
    x: f32,
    y: f32,
    width: u32,
    height: u32,
    format: PixelFormat,
    ty: PixelType,
    unpack: PixelStore,
    pixels: PixelData<'a>,
}

impl MetaState {
    /// `glDrawPixels` at window position `(x, y)`: upload the image into the
    /// scratch texture and draw it as a quad scaled by the pixel zoom.
    ///
    /// Images larger than the scratch texture are drawn tile by tile, each
    /// tile in its own save region with the unpack skips pointing at the
    /// tile's origin.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_pixels<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        pixels: PixelData<'_>,
    ) {
        if width == 0 || height == 0 {
            return;
        }
        let (target, max_size) = match self.temp_layout(TempPurpose::General, ctx, driver) {
            Ok(layout) => layout,
            Err(err) => return self.finish(ctx, "draw_pixels", Err(err)),
        };

        let kind = SamplerKind::for_target(target);
        let path = match self.draw_pixels_path(ctx, driver, format, ty, kind) {
            Ok(path) => path,
            Err(reason) => {
                self.fallback("draw_pixels", reason);
                driver.swrast_draw_pixels(ctx, x, y, width, height, format, ty, pixels);
                return;
            }
        };

        let image = PixelImage {
            x: x as f32,
            y: y as f32,
            width,
            height,
            format,
            ty,
            unpack: ctx.pixel_store.unpack,
            pixels,
        };

        if !needs_tiling(width, height, max_size) {
            let result = self.draw_pixels_tile(ctx, driver, path, max_size, &image);
            self.finish(ctx, "draw_pixels", result);
            return;
        }

        debug!(width, height, max_size, "tiling draw_pixels");
        let (zoom_x, zoom_y) = (ctx.raster.zoom_x, ctx.raster.zoom_y);
        for tile in tiles(width, height, max_size) {
            self.stats.inc_tiles();
            let tile_image = PixelImage {
                x: image.x + tile.x as f32 * zoom_x,
                y: image.y + tile.y as f32 * zoom_y,
                width: tile.width,
                height: tile.height,
                unpack: image.unpack.with_skip(tile.x, tile.y),
                ..image
            };
            let result = self.draw_pixels_tile(ctx, driver, path, max_size, &tile_image);
            if result.is_err() {
                self.finish(ctx, "draw_pixels", result);
                return;
            }
        }
    }

    fn draw_pixels_path<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &RenderContext,
        driver: &mut D,
        format: PixelFormat,
        ty: PixelType,
        kind: SamplerKind,
    ) -> Result<DrawPixelsPath, &'static str> {
        if ctx.fog.enabled {
            return Err("fog");
        }

        if format.is_stencil() {
            if ty != PixelType::UnsignedByte || !ctx.pixel_transfer.stencil_is_identity() {
                return Err("stencil image needs index transfer");
            }
            return self
                .shaders
                .ensure_utility(UtilityProgram::StencilBit(kind), &ctx.caps, &self.stats, driver)
                .map(DrawPixelsPath::Stencil)
                .ok_or("no stencil bit-plane program");
        }

        if format.is_depth() {
            if !ctx.caps.depth_textures {
                return Err("no depth textures");
            }
            return self
                .shaders
                .ensure_utility(
                    UtilityProgram::DepthFromTexture(kind),
                    &ctx.caps,
                    &self.stats,
                    driver,
                )
                .map(DrawPixelsPath::Depth)
                .ok_or("no depth write program");
        }

        if !format.is_color() || format.is_integer() {
            return Err("unsupported pixel format");
        }

        let compact = match format {
            PixelFormat::LuminanceAlpha => Some(InternalFormat::LuminanceAlpha8),
            PixelFormat::Luminance if self.config.compact_luminance_upload => {
                Some(InternalFormat::Luminance8)
            }
            _ => None,
        };
        let internal = if ctx.clamp_fragment_color != ClampMode::True && ctx.caps.float_textures
        {
            // Unclamped color must survive the trip through the texture.
            InternalFormat::Rgba32F
        } else {
            compact.unwrap_or(InternalFormat::Rgba8)
        };
        Ok(DrawPixelsPath::Color(internal))
    }

    /// Draw one image that fits the scratch texture.
    fn draw_pixels_tile<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        path: DrawPixelsPath,
        max_size: u32,
        image: &PixelImage<'_>,
    ) -> Result<(), MetaError> {
        assert!(
            !needs_tiling(image.width, image.height, max_size),
            "draw_pixels tile {}x{} exceeds scratch limit {max_size}",
            image.width,
            image.height
        );

        self.begin(
            ctx,
            SaveMask::RASTERIZATION
                | SaveMask::SHADER
                | SaveMask::TEXTURE
                | SaveMask::TRANSFORM
                | SaveMask::CLIP
                | SaveMask::VERTEX
                | SaveMask::VIEWPORT
                | path.extra_save(),
        );
        let result = self.draw_pixels_quad(ctx, driver, path, image);
        self.end(ctx);
        result
    }

    fn upload_pixels<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        path: DrawPixelsPath,
        image: &PixelImage<'_>,
    ) -> Result<TempTexture, MetaError> {
        let (temp, realloc) = self.prepare_temp(
            TempPurpose::General,
            ctx,
            driver,
            image.width,
            image.height,
            path.temp_format(image.ty),
        )?;
        let upload_format = match path {
            DrawPixelsPath::Stencil(_) => PixelFormat::Alpha,
            _ => image.format,
        };

        let saved = ctx.pixel_store;
        ctx.set_pixel_store(PixelStoreState {
            unpack: image.unpack,
            ..saved
        });
        let uploaded = temp.upload(
            ctx,
            driver,
            realloc,
            image.width,
            image.height,
            upload_format,
            image.ty,
            image.pixels,
        );
        ctx.set_pixel_store(saved);
        uploaded?;

        driver.set_texture_filter(temp.texture, Filter::Nearest, Filter::Nearest);
        Ok(temp)
    }

    fn draw_pixels_quad<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        path: DrawPixelsPath,
        image: &PixelImage<'_>,
    ) -> Result<(), MetaError> {
        let temp = self.upload_pixels(ctx, driver, path, image)?;
        let texcoords = temp.texcoords(image.width, image.height);
        let rect = (
            image.x,
            image.y,
            image.x + image.width as f32 * ctx.raster.zoom_x,
            image.y + image.height as f32 * ctx.raster.zoom_y,
        );
        let z = ctx.raster.position[2];

        match path {
            DrawPixelsPath::Color(_) => {
                bind_source_texture(ctx, temp.target, temp.texture, None);
                let vertices = textured_quad(quad_corners(ctx, rect, z, false), texcoords, WHITE);
                self.draw_quad(ctx, driver, &vertices, 1)
            }
            DrawPixelsPath::Depth(program) => {
                bind_source_texture(ctx, temp.target, temp.texture, Some(program));
                driver.set_uniform(program, "color", Uniform::Vec4(ctx.raster.color));
                let vertices = textured_quad(quad_corners(ctx, rect, z, true), texcoords, WHITE);
                self.draw_quad(ctx, driver, &vertices, 1)
            }
            DrawPixelsPath::Stencil(program) => {
                self.draw_stencil_planes(ctx, driver, program, &temp, rect, z, texcoords)
            }
        }
    }

    /// Zero the stencil bits the caller may write, then set each bit-plane
    /// where the stored index has that bit.
    #[allow(clippy::too_many_arguments)]
    fn draw_stencil_planes<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        program: ProgramId,
        temp: &TempTexture,
        rect: (f32, f32, f32, f32),
        z: f32,
        texcoords: [[f32; 4]; 4],
    ) -> Result<(), MetaError> {
        let face_masks = [ctx.stencil.front.write_mask, ctx.stencil.back.write_mask];
        ctx.set_color_mask([ColorWriteMask::empty(); MAX_DRAW_BUFFERS]);

        let mut stencil = ctx.stencil;
        stencil.enabled = true;
        for face in [&mut stencil.front, &mut stencil.back] {
            face.func = CompareFunc::Always;
            face.reference = 0;
            face.value_mask = 0xff;
            face.fail = StencilOp::Replace;
            face.depth_fail = StencilOp::Replace;
            face.depth_pass = StencilOp::Replace;
        }
        ctx.set_stencil(stencil);
        let vertices = textured_quad(quad_corners(ctx, rect, z, false), texcoords, WHITE);
        self.draw_quad(ctx, driver, &vertices, 1)?;

        bind_source_texture(ctx, temp.target, temp.texture, Some(program));
        let vertices = textured_quad(quad_corners(ctx, rect, z, true), texcoords, WHITE);
        let planes = ctx.draw_framebuffer.stencil_bits.min(8);
        for bit in 0..planes {
            let plane = 1u32 << bit;
            if (face_masks[0] | face_masks[1]) & plane == 0 {
                continue;
            }
            let mut stencil = ctx.stencil;
            let faces = [&mut stencil.front, &mut stencil.back];
            for (face, mask) in faces.into_iter().zip(face_masks) {
                face.func = CompareFunc::Always;
                face.reference = plane;
                face.value_mask = plane;
                face.write_mask = plane & mask;
                face.fail = StencilOp::Keep;
                face.depth_fail = StencilOp::Keep;
                face.depth_pass = StencilOp::Replace;
            }
            ctx.set_stencil(stencil);
            driver.set_uniform(program, "bit", Uniform::Float(plane as f32));
            self.draw_quad(ctx, driver, &vertices, 1)?;
        }
        Ok(())
    }
}
