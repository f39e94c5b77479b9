//! The caller-owned rendering context.
//!
//! The meta layer reads and writes a subset of this state. Every write it
//! makes goes through [`StateTracker::update`] so redundant writes are
//! skipped and the rest are visible as dirty groups.

mod state;

pub use state::*;

use bitflags::bitflags;
use thiserror::Error;
use tracing::debug;

use crate::backend::{QueryId, SamplerId, TextureId, TextureTarget};

/// Device limits and optional features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub max_texture_size: u32,
    pub max_rectangle_texture_size: u32,
    pub max_3d_texture_size: u32,
    pub max_texture_units: u32,
    pub npot_textures: bool,
    pub rectangle_textures: bool,
    pub float_textures: bool,
    pub depth_textures: bool,
    /// Highest supported GLSL version times 100 (`130` for 1.30), `0` without
    /// GLSL.
    pub glsl_version: u32,
    pub texture_arrays: bool,
    pub cube_map_arrays: bool,
    /// Vertex shaders may write `gl_Layer`.
    pub vertex_shader_layer: bool,
    pub color_buffer_float: bool,
    pub srgb_decode: bool,
    pub instanced_arrays: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            max_rectangle_texture_size: 8192,
            max_3d_texture_size: 2048,
            max_texture_units: MAX_TEXTURE_UNITS as u32,
            npot_textures: true,
            rectangle_textures: true,
            float_textures: true,
            depth_textures: true,
            glsl_version: 130,
            texture_arrays: true,
            cube_map_arrays: false,
            vertex_shader_layer: true,
            color_buffer_float: true,
            srgb_decode: true,
            instanced_arrays: true,
        }
    }
}

impl Capabilities {
    pub fn has_glsl(&self) -> bool {
        self.glsl_version > 0
    }
}

/// Error flag recorded on the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid operation")]
    InvalidOperation,
}

bitflags! {
    /// State groups written since the last [`StateTracker::take_dirty`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DirtyState: u32 {
        const ALPHA_TEST = 1 << 0;
        const BLEND = 1 << 1;
        const COLOR_MASK = 1 << 2;
        const DEPTH = 1 << 3;
        const STENCIL = 1 << 4;
        const FOG = 1 << 5;
        const PIXEL_STORE = 1 << 6;
        const PIXEL_TRANSFER = 1 << 7;
        const RASTERIZATION = 1 << 8;
        const SCISSOR = 1 << 9;
        const PROGRAM = 1 << 10;
        const TEXTURE = 1 << 11;
        const TRANSFORM = 1 << 12;
        const CLIP = 1 << 13;
        const VERTEX = 1 << 14;
        const VIEWPORT = 1 << 15;
        const CLAMP = 1 << 16;
        const CONDITIONAL_RENDER = 1 << 17;
        const RENDER_MODE = 1 << 18;
        const MULTISAMPLE = 1 << 19;
        const FRAMEBUFFER_SRGB = 1 << 20;
        const DRAW_BUFFERS = 1 << 21;
        const MISC = 1 << 22;
        const FRAMEBUFFER = 1 << 23;
        const TRANSFORM_FEEDBACK = 1 << 24;
        const QUERY = 1 << 25;
    }
}

/// Records which state groups changed and how many writes were issued.
#[derive(Clone, Debug, Default)]
pub struct StateTracker {
    dirty: DirtyState,
    changes: u64,
}

impl StateTracker {
    /// Store `value` into `slot` if it differs. Returns whether a write
    /// happened.
    pub fn update<T: PartialEq>(&mut self, group: DirtyState, slot: &mut T, value: T) -> bool {
        if *slot == value {
            return false;
        }
        *slot = value;
        self.dirty |= group;
        self.changes += 1;
        true
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> DirtyState {
        std::mem::take(&mut self.dirty)
    }

    /// Number of state writes that actually changed a value.
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

macro_rules! setters {
    ($($name:ident: $field:ident: $ty:ty => $group:ident;)*) => {
        $(
            pub fn $name(&mut self, value: $ty) -> bool {
                self.tracker.update(DirtyState::$group, &mut self.$field, value)
            }
        )*
    };
}

/// The full mutable state machine a meta operation runs against.
#[derive(Clone, Debug)]
pub struct RenderContext {
    pub caps: Capabilities,

    pub alpha_test: AlphaTestState,
    pub blend: BlendState,
    pub color_mask: [ColorWriteMask; MAX_DRAW_BUFFERS],
    pub depth: DepthState,
    pub stencil: StencilState,
    pub fog: FogState,
    pub pixel_store: PixelStoreState,
    pub pixel_transfer: PixelTransferState,
    pub rasterization: RasterizationState,
    pub scissor: ScissorState,
    pub shader: ShaderBindings,
    pub texture: TextureState,
    pub transform: TransformState,
    pub clip: ClipState,
    pub vertex: VertexState,
    pub viewport: ViewportState,
    pub clamp_fragment_color: ClampMode,
    pub clamp_vertex_color: ClampMode,
    pub conditional_render: Option<QueryId>,
    pub render_mode: RenderMode,
    pub multisample: MultisampleState,
    pub framebuffer_srgb: bool,
    pub draw_buffers: [DrawBuffer; MAX_DRAW_BUFFERS],
    pub misc: MiscState,

    pub clear: ClearValues,
    pub raster: RasterPosState,
    pub draw_framebuffer: BoundFramebuffer,
    pub read_framebuffer: BoundFramebuffer,
    pub transform_feedback: TransformFeedbackState,
    pub query: QueryState,

    pub tracker: StateTracker,
    error: Option<ContextError>,
}

impl RenderContext {
    /// A context in its initial state, drawing to a `width` x `height`
    /// window-system framebuffer.
    pub fn new(caps: Capabilities, width: u32, height: u32) -> Self {
        let window = BoundFramebuffer::window(width, height);
        let mut draw_buffers = [DrawBuffer::None; MAX_DRAW_BUFFERS];
        draw_buffers[0] = DrawBuffer::Back;
        Self {
            caps,
            alpha_test: AlphaTestState::default(),
            blend: BlendState::default(),
            color_mask: [ColorWriteMask::all(); MAX_DRAW_BUFFERS],
            depth: DepthState::default(),
            stencil: StencilState::default(),
            fog: FogState::default(),
            pixel_store: PixelStoreState::default(),
            pixel_transfer: PixelTransferState::default(),
            rasterization: RasterizationState::default(),
            scissor: ScissorState {
                enabled: false,
                rect: window.bounds(),
            },
            shader: ShaderBindings::default(),
            texture: TextureState::default(),
            transform: TransformState::default(),
            clip: ClipState::default(),
            vertex: VertexState::default(),
            viewport: ViewportState {
                width,
                height,
                ..ViewportState::default()
            },
            clamp_fragment_color: ClampMode::FixedOnly,
            clamp_vertex_color: ClampMode::True,
            conditional_render: None,
            render_mode: RenderMode::Render,
            multisample: MultisampleState {
                enabled: true,
                ..MultisampleState::default()
            },
            framebuffer_srgb: false,
            draw_buffers,
            misc: MiscState::default(),
            clear: ClearValues::default(),
            raster: RasterPosState::default(),
            draw_framebuffer: window,
            read_framebuffer: window,
            transform_feedback: TransformFeedbackState::default(),
            query: QueryState::default(),
            tracker: StateTracker::default(),
            error: None,
        }
    }

    setters! {
        set_alpha_test: alpha_test: AlphaTestState => ALPHA_TEST;
        set_blend: blend: BlendState => BLEND;
        set_color_mask: color_mask: [ColorWriteMask; MAX_DRAW_BUFFERS] => COLOR_MASK;
        set_depth: depth: DepthState => DEPTH;
        set_stencil: stencil: StencilState => STENCIL;
        set_fog: fog: FogState => FOG;
        set_pixel_store: pixel_store: PixelStoreState => PIXEL_STORE;
        set_pixel_transfer: pixel_transfer: PixelTransferState => PIXEL_TRANSFER;
        set_rasterization: rasterization: RasterizationState => RASTERIZATION;
        set_scissor: scissor: ScissorState => SCISSOR;
        set_shader: shader: ShaderBindings => PROGRAM;
        set_texture: texture: TextureState => TEXTURE;
        set_transform: transform: TransformState => TRANSFORM;
        set_clip: clip: ClipState => CLIP;
        set_vertex: vertex: VertexState => VERTEX;
        set_viewport: viewport: ViewportState => VIEWPORT;
        set_clamp_fragment_color: clamp_fragment_color: ClampMode => CLAMP;
        set_clamp_vertex_color: clamp_vertex_color: ClampMode => CLAMP;
        set_conditional_render: conditional_render: Option<QueryId> => CONDITIONAL_RENDER;
        set_render_mode: render_mode: RenderMode => RENDER_MODE;
        set_multisample: multisample: MultisampleState => MULTISAMPLE;
        set_framebuffer_srgb: framebuffer_srgb: bool => FRAMEBUFFER_SRGB;
        set_draw_buffers: draw_buffers: [DrawBuffer; MAX_DRAW_BUFFERS] => DRAW_BUFFERS;
        set_misc: misc: MiscState => MISC;
        set_draw_framebuffer: draw_framebuffer: BoundFramebuffer => FRAMEBUFFER;
        set_read_framebuffer: read_framebuffer: BoundFramebuffer => FRAMEBUFFER;
        set_transform_feedback: transform_feedback: TransformFeedbackState => TRANSFORM_FEEDBACK;
        set_query: query: QueryState => QUERY;
    }

    /// Bind `texture` to `target` on `unit`.
    pub fn bind_texture(
        &mut self,
        unit: usize,
        target: TextureTarget,
        texture: Option<TextureId>,
    ) -> bool {
        let mut state = self.texture;
        state.units[unit].bindings[target.index()] = texture;
        self.set_texture(state)
    }

    pub fn bind_sampler(&mut self, unit: usize, sampler: Option<SamplerId>) -> bool {
        let mut state = self.texture;
        state.units[unit].sampler = sampler;
        self.set_texture(state)
    }

    /// Enable exactly `enabled` on `unit`, with the given environment mode.
    pub fn enable_texture_unit(
        &mut self,
        unit: usize,
        enabled: TexEnableMask,
        env_mode: TexEnvMode,
    ) -> bool {
        let mut state = self.texture;
        state.units[unit].enabled = enabled;
        state.units[unit].env_mode = env_mode;
        self.set_texture(state)
    }

    /// Record an error. The first error sticks until [`Self::take_error`].
    pub fn record_error(&mut self, error: ContextError) {
        if self.error.is_none() {
            debug!(?error, "recording context error");
            self.error = Some(error);
        }
    }

    pub fn error(&self) -> Option<ContextError> {
        self.error
    }

    pub fn take_error(&mut self) -> Option<ContextError> {
        self.error.take()
    }

    /// Whether any pixel-transfer operation would alter transferred pixels.
    pub fn image_transfer_active(&self) -> bool {
        !self.pixel_transfer.is_identity()
    }

    /// Drawable region of the draw framebuffer, after scissoring.
    pub fn draw_bounds(&self) -> Rect {
        let bounds = self.draw_framebuffer.bounds();
        if self.scissor.enabled {
            bounds.intersect(&self.scissor.rect)
        } else {
            bounds
        }
    }

    /// Whether fragments would be clamped to [0, 1] for the current draw
    /// framebuffer.
    pub fn fragment_clamping(&self) -> bool {
        match self.clamp_fragment_color {
            ClampMode::True => true,
            ClampMode::False => false,
            ClampMode::FixedOnly => !self.caps.color_buffer_float,
        }
    }

    /// Compare every state group with `other`, ignoring capabilities, the
    /// tracker and the error flag.
    pub fn state_eq(&self, other: &RenderContext) -> bool {
        self.alpha_test == other.alpha_test
            && self.blend == other.blend
            && self.color_mask == other.color_mask
            && self.depth == other.depth
            && self.stencil == other.stencil
            && self.fog == other.fog
            && self.pixel_store == other.pixel_store
            && self.pixel_transfer == other.pixel_transfer
            && self.rasterization == other.rasterization
            && self.scissor == other.scissor
            && self.shader == other.shader
            && self.texture == other.texture
            && self.transform == other.transform
            && self.clip == other.clip
            && self.vertex == other.vertex
            && self.viewport == other.viewport
            && self.clamp_fragment_color == other.clamp_fragment_color
            && self.clamp_vertex_color == other.clamp_vertex_color
            && self.conditional_render == other.conditional_render
            && self.render_mode == other.render_mode
            && self.multisample == other.multisample
            && self.framebuffer_srgb == other.framebuffer_srgb
            && self.draw_buffers == other.draw_buffers
            && self.misc == other.misc
            && self.clear == other.clear
            && self.raster == other.raster
            && self.draw_framebuffer == other.draw_framebuffer
            && self.read_framebuffer == other.read_framebuffer
            && self.transform_feedback == other.transform_feedback
            && self.query == other.query
    }
}
