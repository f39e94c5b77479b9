//! Shared helpers for `aero-meta` integration tests.
//!
//! [`MockDriver`] keeps just enough object state (texture images, level
//! ranges, attachments, buffer contents) for the meta paths to route, and
//! records every transfer, draw and software fallback in call order.

#![allow(dead_code)]

use aero_meta::backend::{
    AttachmentPoint, AttachmentSource, BufferId, BufferMask, CopyPixelsType, Filter,
    FramebufferId, FramebufferStatus, GpuResources, ImageSelector, LevelRange, PixelData,
    ProgramId, RenderbufferId, SamplerDesc, SamplerId, ShaderCompiler, ShaderId, ShaderStage,
    SwrastFallback, TexImageDesc, TexImageInfo, TexRegion, TextureId, TextureTarget, Uniform,
    VertexArrayId,
};
use aero_meta::context::{BoundFramebuffer, Rect, RenderContext};
use aero_meta::error::BackendError;
use aero_meta::format::{InternalFormat, PixelFormat, PixelType};
use aero_meta::geometry::{Primitive, Vertex, VertexLayout};
use aero_meta::pixels::PixelStore;
use bytemuck::Pod;
use hashbrown::HashMap;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// One draw, with the context state it ran against.
#[derive(Clone, Debug)]
pub struct Draw {
    pub primitive: Primitive,
    pub count: u32,
    pub instances: u32,
    pub ctx: Box<RenderContext>,
    pub vertex_bytes: Vec<u8>,
}

impl Draw {
    pub fn vertices<V: Pod>(&self) -> Vec<V> {
        self.vertex_bytes
            .chunks_exact(std::mem::size_of::<V>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    pub fn quad(&self) -> Vec<Vertex> {
        self.vertices()
    }
}

#[derive(Clone, Debug)]
pub enum Call {
    TexImage {
        image: ImageSelector,
        desc: TexImageDesc,
    },
    TexSubImage {
        image: ImageSelector,
        region: TexRegion,
        format: PixelFormat,
        ty: PixelType,
        unpack: PixelStore,
        len: Option<usize>,
    },
    CopyTexImage {
        image: ImageSelector,
        dst: (u32, u32),
        src: Rect,
    },
    ReadPixels {
        src: Rect,
        format: PixelFormat,
        ty: PixelType,
    },
    Attach {
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        source: Option<AttachmentSource>,
    },
    SetLevelRange(TextureId, LevelRange),
    Uniform {
        program: ProgramId,
        name: String,
        value: Uniform,
    },
    Draw(Draw),
    SwrastClear(BufferMask),
    Swrast(&'static str),
}

#[derive(Debug, Default)]
pub struct MockDriver {
    pub calls: Vec<Call>,
    next_id: u32,

    pub textures: HashMap<TextureId, TextureTarget>,
    pub images: HashMap<ImageSelector, TexImageInfo>,
    pub level_ranges: HashMap<TextureId, LevelRange>,
    pub crop_rects: HashMap<TextureId, [i32; 4]>,
    pub attachments: HashMap<(Option<FramebufferId>, AttachmentPoint), AttachmentSource>,
    pub framebuffers: Vec<FramebufferId>,
    renderbuffers: HashMap<RenderbufferId, (InternalFormat, u32, u32)>,
    buffers: HashMap<BufferId, Vec<u8>>,
    pub samplers: Vec<SamplerDesc>,
    pub programs: Vec<ProgramId>,

    /// Every framebuffer reports incomplete.
    pub incomplete_framebuffers: bool,
    /// Shader compiles fail with an info log.
    pub fail_compile: bool,
    /// Image specification reports out of memory.
    pub fail_tex_image: bool,
    /// Byte written into read-back destinations.
    pub read_fill: u8,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            read_fill: 0x5a,
            ..Self::default()
        }
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Register a texture whose base level (every face, for cube maps) is
    /// `width` x `height` x `depth` of `format`.
    pub fn add_texture(
        &mut self,
        target: TextureTarget,
        format: InternalFormat,
        width: u32,
        height: u32,
        depth: u32,
    ) -> TextureId {
        let texture = TextureId(self.next());
        self.textures.insert(texture, target);
        let faces = if target == TextureTarget::Cube { 6 } else { 1 };
        for face in 0..faces {
            self.images.insert(
                ImageSelector {
                    texture,
                    level: 0,
                    face,
                },
                TexImageInfo {
                    target,
                    format,
                    width,
                    height,
                    depth,
                },
            );
        }
        texture
    }

    /// Attach `texture` level 0 as color 0 of a new framebuffer and return
    /// its binding.
    pub fn texture_framebuffer(&mut self, texture: TextureId) -> BoundFramebuffer {
        let fb = FramebufferId(self.next());
        self.framebuffers.push(fb);
        let target = self.textures[&texture];
        self.attachments.insert(
            (Some(fb), AttachmentPoint::Color(0)),
            AttachmentSource::Texture {
                texture,
                target,
                level: 0,
                layer: 0,
            },
        );
        match self.check_framebuffer(fb) {
            FramebufferStatus::Complete(bound) => bound,
            FramebufferStatus::Incomplete => panic!("test framebuffer {fb} is incomplete"),
        }
    }

    pub fn draws(&self) -> Vec<&Draw> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn swrast(&self) -> Vec<&'static str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Swrast(op) => Some(*op),
                Call::SwrastClear(_) => Some("clear"),
                _ => None,
            })
            .collect()
    }

    pub fn tex_sub_images(&self) -> Vec<(TexRegion, PixelStore)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::TexSubImage { region, unpack, .. } => Some((*region, *unpack)),
                _ => None,
            })
            .collect()
    }

    pub fn read_backs(&self) -> Vec<Rect> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::ReadPixels { src, .. } => Some(*src),
                _ => None,
            })
            .collect()
    }

    pub fn level_range_writes(&self, texture: TextureId) -> Vec<LevelRange> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::SetLevelRange(t, range) if *t == texture => Some(*range),
                _ => None,
            })
            .collect()
    }

    fn attachment_extent(&self, source: AttachmentSource) -> Option<(u32, u32, InternalFormat)> {
        match source {
            AttachmentSource::Texture {
                texture,
                target,
                level,
                layer,
            } => {
                let face = if target == TextureTarget::Cube { layer } else { 0 };
                let info = self.images.get(&ImageSelector {
                    texture,
                    level,
                    face,
                })?;
                Some((info.width, info.height, info.format))
            }
            AttachmentSource::Renderbuffer(renderbuffer) => {
                let &(format, width, height) = self.renderbuffers.get(&renderbuffer)?;
                Some((width, height, format))
            }
        }
    }
}

impl GpuResources for MockDriver {
    fn create_texture(&mut self, target: TextureTarget) -> Result<TextureId, BackendError> {
        let texture = TextureId(self.next());
        self.textures.insert(texture, target);
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.images.retain(|image, _| image.texture != texture);
    }

    fn tex_image(
        &mut self,
        _ctx: &RenderContext,
        image: ImageSelector,
        desc: TexImageDesc,
        _format: PixelFormat,
        _ty: PixelType,
        _pixels: Option<PixelData<'_>>,
    ) -> Result<(), BackendError> {
        if self.fail_tex_image {
            return Err(BackendError::OutOfMemory {
                what: "texture image",
            });
        }
        let target = self
            .textures
            .get(&image.texture)
            .copied()
            .ok_or(BackendError::InvalidHandle("texture"))?;
        self.images.insert(
            image,
            TexImageInfo {
                target,
                format: desc.format,
                width: desc.width,
                height: desc.height,
                depth: desc.depth,
            },
        );
        self.calls.push(Call::TexImage { image, desc });
        Ok(())
    }

    fn tex_sub_image(
        &mut self,
        ctx: &RenderContext,
        image: ImageSelector,
        region: TexRegion,
        format: PixelFormat,
        ty: PixelType,
        pixels: PixelData<'_>,
    ) -> Result<(), BackendError> {
        let len = match pixels {
            PixelData::Client(bytes) => Some(bytes.len()),
            PixelData::UnpackBuffer(_) => None,
        };
        self.calls.push(Call::TexSubImage {
            image,
            region,
            format,
            ty,
            unpack: ctx.pixel_store.unpack,
            len,
        });
        Ok(())
    }

    fn copy_tex_image(
        &mut self,
        _ctx: &RenderContext,
        image: ImageSelector,
        format: InternalFormat,
        dst_x: u32,
        dst_y: u32,
        src: Rect,
        realloc: bool,
    ) -> Result<(), BackendError> {
        if realloc {
            let target = self.textures[&image.texture];
            self.images.insert(
                image,
                TexImageInfo {
                    target,
                    format,
                    width: src.width,
                    height: src.height,
                    depth: 1,
                },
            );
        }
        self.calls.push(Call::CopyTexImage {
            image,
            dst: (dst_x, dst_y),
            src,
        });
        Ok(())
    }

    fn tex_image_info(&self, image: ImageSelector) -> Option<TexImageInfo> {
        self.images.get(&image).copied()
    }

    fn texture_level_range(&self, texture: TextureId) -> LevelRange {
        self.level_ranges.get(&texture).copied().unwrap_or_default()
    }

    fn set_texture_level_range(&mut self, texture: TextureId, range: LevelRange) {
        self.level_ranges.insert(texture, range);
        self.calls.push(Call::SetLevelRange(texture, range));
    }

    fn set_texture_filter(&mut self, _texture: TextureId, _min: Filter, _mag: Filter) {}

    fn texture_crop_rect(&self, texture: TextureId) -> [i32; 4] {
        self.crop_rects.get(&texture).copied().unwrap_or([0; 4])
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, BackendError> {
        let fb = FramebufferId(self.next());
        self.framebuffers.push(fb);
        Ok(fb)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.retain(|&fb| fb != framebuffer);
        self.attachments.retain(|(fb, _), _| *fb != Some(framebuffer));
    }

    fn framebuffer_attach(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        source: Option<AttachmentSource>,
    ) {
        match source {
            Some(source) => {
                self.attachments.insert((Some(framebuffer), point), source);
            }
            None => {
                self.attachments.remove(&(Some(framebuffer), point));
            }
        }
        self.calls.push(Call::Attach {
            framebuffer,
            point,
            source,
        });
    }

    fn framebuffer_attachment(
        &self,
        framebuffer: Option<FramebufferId>,
        point: AttachmentPoint,
    ) -> Option<AttachmentSource> {
        self.attachments.get(&(framebuffer, point)).copied()
    }

    fn check_framebuffer(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        if self.incomplete_framebuffers {
            return FramebufferStatus::Incomplete;
        }
        let attached = |point| self.attachments.get(&(Some(framebuffer), point)).copied();
        let color = attached(AttachmentPoint::Color(0));
        let depth = attached(AttachmentPoint::Depth).or(attached(AttachmentPoint::DepthStencil));
        let stencil =
            attached(AttachmentPoint::Stencil).or(attached(AttachmentPoint::DepthStencil));

        let Some((width, height, format)) = color
            .or(depth)
            .or(stencil)
            .and_then(|source| self.attachment_extent(source))
        else {
            return FramebufferStatus::Incomplete;
        };
        FramebufferStatus::Complete(BoundFramebuffer {
            id: Some(framebuffer),
            width,
            height,
            layers: 0,
            depth_bits: if depth.is_some() { 24 } else { 0 },
            stencil_bits: if stencil.is_some() { 8 } else { 0 },
            integer_color: color.is_some() && format.is_integer(),
        })
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, BackendError> {
        Ok(RenderbufferId(self.next()))
    }

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: RenderbufferId,
        format: InternalFormat,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        self.renderbuffers
            .insert(renderbuffer, (format, width, height));
        Ok(())
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.renderbuffers.remove(&renderbuffer);
    }

    fn create_buffer(&mut self, size: usize) -> Result<BufferId, BackendError> {
        let buffer = BufferId(self.next());
        self.buffers.insert(buffer, vec![0; size]);
        Ok(buffer)
    }

    fn buffer_sub_data(
        &mut self,
        buffer: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let contents = self
            .buffers
            .get_mut(&buffer)
            .ok_or(BackendError::InvalidHandle("buffer"))?;
        let end = offset + data.len();
        if end > contents.len() {
            contents.resize(end, 0);
        }
        contents[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        len: usize,
    ) -> Result<Vec<u8>, BackendError> {
        let contents = self
            .buffers
            .get(&buffer)
            .ok_or(BackendError::InvalidHandle("buffer"))?;
        contents
            .get(offset..offset + len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                BackendError::Unsupported(format!(
                    "read of {len} bytes at {offset} past end of {buffer}"
                ))
            })
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_vertex_array(
        &mut self,
        _buffer: BufferId,
        _layout: &VertexLayout,
    ) -> Result<VertexArrayId, BackendError> {
        Ok(VertexArrayId(self.next()))
    }

    fn delete_vertex_array(&mut self, _vertex_array: VertexArrayId) {}

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, BackendError> {
        self.samplers.push(*desc);
        Ok(SamplerId(self.next()))
    }

    fn delete_sampler(&mut self, _sampler: SamplerId) {}

    fn read_pixels(
        &mut self,
        ctx: &RenderContext,
        src: Rect,
        format: PixelFormat,
        ty: PixelType,
        dst: &mut [u8],
    ) -> Result<(), BackendError> {
        // A 2D read ignores the image parameters.
        let pack = PixelStore {
            skip_images: 0,
            image_height: 0,
            ..ctx.pixel_store.pack
        };
        let len = pack
            .required_size(src.width, src.height, 1, format, ty)
            .min(dst.len());
        dst[..len].fill(self.read_fill);
        self.calls.push(Call::ReadPixels { src, format, ty });
        Ok(())
    }

    fn draw_arrays(
        &mut self,
        ctx: &RenderContext,
        primitive: Primitive,
        _first: u32,
        count: u32,
        instances: u32,
    ) {
        let vertex_bytes = ctx
            .vertex
            .array_buffer
            .and_then(|buffer| self.buffers.get(&buffer))
            .cloned()
            .unwrap_or_default();
        self.calls.push(Call::Draw(Draw {
            primitive,
            count,
            instances,
            ctx: Box::new(ctx.clone()),
            vertex_bytes,
        }));
    }

    fn set_uniform(&mut self, program: ProgramId, name: &str, value: Uniform) {
        self.calls.push(Call::Uniform {
            program,
            name: name.to_owned(),
            value,
        });
    }
}

impl ShaderCompiler for MockDriver {
    fn compile_shader(&mut self, stage: ShaderStage, _source: &str) -> Result<ShaderId, String> {
        if self.fail_compile {
            return Err(format!("0:1({stage:?}): error: syntax error"));
        }
        Ok(ShaderId(self.next()))
    }

    fn link_program(
        &mut self,
        _vertex: ShaderId,
        _fragment: ShaderId,
        _attributes: &[(u32, &str)],
    ) -> Result<ProgramId, String> {
        let program = ProgramId(self.next());
        self.programs.push(program);
        Ok(program)
    }

    fn delete_shader(&mut self, _shader: ShaderId) {}

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.retain(|&p| p != program);
    }
}

impl SwrastFallback for MockDriver {
    fn swrast_clear(&mut self, _ctx: &mut RenderContext, buffers: BufferMask) {
        self.calls.push(Call::SwrastClear(buffers));
    }

    fn swrast_copy_pixels(
        &mut self,
        _ctx: &mut RenderContext,
        _src_x: i32,
        _src_y: i32,
        _width: u32,
        _height: u32,
        _dst_x: i32,
        _dst_y: i32,
        _ty: CopyPixelsType,
    ) {
        self.calls.push(Call::Swrast("copy_pixels"));
    }

    fn swrast_draw_pixels(
        &mut self,
        _ctx: &mut RenderContext,
        _x: i32,
        _y: i32,
        _width: u32,
        _height: u32,
        _format: PixelFormat,
        _ty: PixelType,
        _pixels: PixelData<'_>,
    ) {
        self.calls.push(Call::Swrast("draw_pixels"));
    }

    fn swrast_bitmap(
        &mut self,
        _ctx: &mut RenderContext,
        _x: i32,
        _y: i32,
        _width: u32,
        _height: u32,
        _bitmap: PixelData<'_>,
    ) {
        self.calls.push(Call::Swrast("bitmap"));
    }

    fn swrast_get_tex_sub_image(
        &mut self,
        _ctx: &mut RenderContext,
        _image: ImageSelector,
        _region: TexRegion,
        _format: PixelFormat,
        _ty: PixelType,
        _dst: &mut [u8],
    ) {
        self.calls.push(Call::Swrast("get_tex_sub_image"));
    }

    fn swrast_generate_mipmap(
        &mut self,
        _ctx: &mut RenderContext,
        _target: TextureTarget,
        _texture: TextureId,
    ) {
        self.calls.push(Call::Swrast("generate_mipmap"));
    }

    fn swrast_clear_tex_sub_image(
        &mut self,
        _ctx: &mut RenderContext,
        _image: ImageSelector,
        _region: TexRegion,
        _clear_value: Option<&[u8]>,
    ) {
        self.calls.push(Call::Swrast("clear_tex_sub_image"));
    }
}
