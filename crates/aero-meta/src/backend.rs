//! The narrow interface the meta layer needs from a rendering backend.
//!
//! Handles are opaque, backend-allocated integers. The meta layer never
//! inspects them beyond equality.

use std::fmt;

use bitflags::bitflags;

use crate::context::{BoundFramebuffer, Rect, RenderContext};
use crate::error::BackendError;
use crate::format::{InternalFormat, PixelFormat, PixelType};
use crate::geometry::{Primitive, VertexLayout};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(TextureId);
handle!(FramebufferId);
handle!(RenderbufferId);
handle!(BufferId);
handle!(VertexArrayId);
handle!(SamplerId);
handle!(ShaderId);
handle!(ProgramId);
handle!(
    /// Separable program pipeline object.
    PipelineId
);
handle!(QueryId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Tex1D,
    Tex2D,
    Tex3D,
    Cube,
    Rect,
    Tex1DArray,
    Tex2DArray,
    CubeArray,
}

impl TextureTarget {
    pub const COUNT: usize = 8;

    pub const ALL: [TextureTarget; Self::COUNT] = [
        Self::Tex1D,
        Self::Tex2D,
        Self::Tex3D,
        Self::Cube,
        Self::Rect,
        Self::Tex1DArray,
        Self::Tex2DArray,
        Self::CubeArray,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Tex1D => 0,
            Self::Tex2D => 1,
            Self::Tex3D => 2,
            Self::Cube => 3,
            Self::Rect => 4,
            Self::Tex1DArray => 5,
            Self::Tex2DArray => 6,
            Self::CubeArray => 7,
        }
    }

    /// Whether the image's third dimension counts layers (or faces) rather
    /// than depth slices.
    pub fn is_layered(self) -> bool {
        matches!(
            self,
            Self::Cube | Self::Tex1DArray | Self::Tex2DArray | Self::CubeArray
        )
    }
}

/// Level range of a texture object (`BASE_LEVEL` / `MAX_LEVEL`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelRange {
    pub base: u32,
    pub max: u32,
}

impl Default for LevelRange {
    fn default() -> Self {
        Self { base: 0, max: 1000 }
    }
}

/// Description of one texture image (one level of one face).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexImageInfo {
    pub target: TextureTarget,
    pub format: InternalFormat,
    pub width: u32,
    pub height: u32,
    /// Depth slices, array layers or (for cube arrays) layer-faces.
    pub depth: u32,
}

/// Selects one image of a texture: `face` picks the cube face for cube maps
/// and is zero otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageSelector {
    pub texture: TextureId,
    pub level: u32,
    pub face: u32,
}

/// Full-image specification request (`glTexImage*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexImageDesc {
    pub format: InternalFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Destination region of a sub-image transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexRegion {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Pixel source for uploads: client memory or an offset into the bound
/// unpack buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelData<'a> {
    Client(&'a [u8]),
    UnpackBuffer(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    Repeat,
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap: Wrap,
    /// `false` samples sRGB textures without decoding.
    pub srgb_decode: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color(u8),
    Depth,
    Stencil,
    DepthStencil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentSource {
    Texture {
        texture: TextureId,
        target: TextureTarget,
        level: u32,
        layer: u32,
    },
    Renderbuffer(RenderbufferId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete(BoundFramebuffer),
    Incomplete,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform {
    Int(i32),
    Float(f32),
    Vec4([f32; 4]),
    IVec4([i32; 4]),
    UVec4([u32; 4]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

bitflags! {
    /// Buffers named by a clear request. Color bits refer to draw-buffer slots.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferMask: u32 {
        const COLOR0 = 1 << 0;
        const COLOR1 = 1 << 1;
        const COLOR2 = 1 << 2;
        const COLOR3 = 1 << 3;
        const COLOR4 = 1 << 4;
        const COLOR5 = 1 << 5;
        const COLOR6 = 1 << 6;
        const COLOR7 = 1 << 7;
        const DEPTH = 1 << 8;
        const STENCIL = 1 << 9;
        const ACCUM = 1 << 10;

        const COLOR = Self::COLOR0.bits()
            | Self::COLOR1.bits()
            | Self::COLOR2.bits()
            | Self::COLOR3.bits()
            | Self::COLOR4.bits()
            | Self::COLOR5.bits()
            | Self::COLOR6.bits()
            | Self::COLOR7.bits();
    }
}

impl BufferMask {
    pub fn color_slot(slot: usize) -> Self {
        Self::from_bits_truncate(1 << slot) & Self::COLOR
    }
}

/// What `glCopyPixels` copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyPixelsType {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

/// Resource creation, transfers and draws.
pub trait GpuResources {
    fn create_texture(&mut self, target: TextureTarget) -> Result<TextureId, BackendError>;
    fn delete_texture(&mut self, texture: TextureId);
    /// Specify a whole image. `pixels == None` allocates storage only.
    fn tex_image(
        &mut self,
        ctx: &RenderContext,
        image: ImageSelector,
        desc: TexImageDesc,
        format: PixelFormat,
        ty: PixelType,
        pixels: Option<PixelData<'_>>,
    ) -> Result<(), BackendError>;
    /// Upload into an existing image using the context's unpack state.
    fn tex_sub_image(
        &mut self,
        ctx: &RenderContext,
        image: ImageSelector,
        region: TexRegion,
        format: PixelFormat,
        ty: PixelType,
        pixels: PixelData<'_>,
    ) -> Result<(), BackendError>;
    /// Copy from the context's read framebuffer into an image. With
    /// `realloc` set the image is (re)specified as `format` sized to `src`.
    fn copy_tex_image(
        &mut self,
        ctx: &RenderContext,
        image: ImageSelector,
        format: InternalFormat,
        dst_x: u32,
        dst_y: u32,
        src: Rect,
        realloc: bool,
    ) -> Result<(), BackendError>;
    fn tex_image_info(&self, image: ImageSelector) -> Option<TexImageInfo>;
    fn texture_level_range(&self, texture: TextureId) -> LevelRange;
    fn set_texture_level_range(&mut self, texture: TextureId, range: LevelRange);
    fn set_texture_filter(&mut self, texture: TextureId, min: Filter, mag: Filter);
    /// `OES_draw_texture` crop rectangle `[x, y, width, height]`.
    fn texture_crop_rect(&self, texture: TextureId) -> [i32; 4];

    fn create_framebuffer(&mut self) -> Result<FramebufferId, BackendError>;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        source: Option<AttachmentSource>,
    );
    /// `None` for the window-system framebuffer or an empty attachment point.
    fn framebuffer_attachment(
        &self,
        framebuffer: Option<FramebufferId>,
        point: AttachmentPoint,
    ) -> Option<AttachmentSource>;
    fn check_framebuffer(&self, framebuffer: FramebufferId) -> FramebufferStatus;

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, BackendError>;
    fn renderbuffer_storage(
        &mut self,
        renderbuffer: RenderbufferId,
        format: InternalFormat,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    fn create_buffer(&mut self, size: usize) -> Result<BufferId, BackendError>;
    fn buffer_sub_data(
        &mut self,
        buffer: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError>;
    fn read_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>, BackendError>;
    fn delete_buffer(&mut self, buffer: BufferId);

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<VertexArrayId, BackendError>;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, BackendError>;
    fn delete_sampler(&mut self, sampler: SamplerId);

    /// Read from the context's read framebuffer into `dst`, honoring the
    /// context's pack parameters and pixel-transfer state.
    fn read_pixels(
        &mut self,
        ctx: &RenderContext,
        src: Rect,
        format: PixelFormat,
        ty: PixelType,
        dst: &mut [u8],
    ) -> Result<(), BackendError>;

    /// Draw with whatever state `ctx` currently holds.
    fn draw_arrays(
        &mut self,
        ctx: &RenderContext,
        primitive: Primitive,
        first: u32,
        count: u32,
        instances: u32,
    );

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: Uniform);
}

/// Shader compile/link primitives. Errors carry the info log.
pub trait ShaderCompiler {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;
    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
        attributes: &[(u32, &str)],
    ) -> Result<ProgramId, String>;
    fn delete_shader(&mut self, shader: ShaderId);
    fn delete_program(&mut self, program: ProgramId);
}

/// Software paths used whenever a meta path does not apply.
pub trait SwrastFallback {
    fn swrast_clear(&mut self, ctx: &mut RenderContext, buffers: BufferMask);
    #[allow(clippy::too_many_arguments)]
    fn swrast_copy_pixels(
        &mut self,
        ctx: &mut RenderContext,
        src_x: i32,
        src_y: i32,
        width: u32,
        height: u32,
        dst_x: i32,
        dst_y: i32,
        ty: CopyPixelsType,
    );
    #[allow(clippy::too_many_arguments)]
    fn swrast_draw_pixels(
        &mut self,
        ctx: &mut RenderContext,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        pixels: PixelData<'_>,
    );
    fn swrast_bitmap(
        &mut self,
        ctx: &mut RenderContext,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        bitmap: PixelData<'_>,
    );
    fn swrast_get_tex_sub_image(
        &mut self,
        ctx: &mut RenderContext,
        image: ImageSelector,
        region: TexRegion,
        format: PixelFormat,
        ty: PixelType,
        dst: &mut [u8],
    );
    fn swrast_generate_mipmap(&mut self, ctx: &mut RenderContext, target: TextureTarget, texture: TextureId);
    fn swrast_clear_tex_sub_image(
        &mut self,
        ctx: &mut RenderContext,
        image: ImageSelector,
        region: TexRegion,
        clear_value: Option<&[u8]>,
    );
}

/// Everything a meta operation may call.
pub trait MetaDriver: GpuResources + ShaderCompiler + SwrastFallback {}

impl<T: GpuResources + ShaderCompiler + SwrastFallback + ?Sized> MetaDriver for T {}
