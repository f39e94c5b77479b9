//! Plain state groups held by [`RenderContext`](super::RenderContext).
//!
//! Each group is a value type so the save stack can capture it by clone and
//! restore it with a single comparison.

use bitflags::bitflags;

use crate::backend::{
    BufferId, FramebufferId, PipelineId, ProgramId, QueryId, SamplerId, TextureId, TextureTarget,
    VertexArrayId,
};
use crate::pixels::PixelStore;

pub const MAX_DRAW_BUFFERS: usize = 8;
pub const MAX_TEXTURE_UNITS: usize = 8;
pub const MAX_CLIP_PLANES: usize = 8;

/// Column-major 4x4 matrix.
pub type Mat4 = [f32; 16];

pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// `glOrtho` matrix.
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let mut m = IDENTITY;
    m[0] = 2.0 / (right - left);
    m[5] = 2.0 / (top - bottom);
    m[10] = -2.0 / (far - near);
    m[12] = -(right + left) / (right - left);
    m[13] = -(top + bottom) / (top - bottom);
    m[14] = -(far + near) / (far - near);
    m
}

/// Window-space rectangle; `x`/`y` name the lower-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn top(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());
        if x1 <= x0 || y1 <= y0 {
            return Rect::new(x0, y0, 0, 0);
        }
        Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunc {
    pub fn test(self, value: f32, reference: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Less => value < reference,
            Self::Equal => value == reference,
            Self::LessEqual => value <= reference,
            Self::Greater => value > reference,
            Self::NotEqual => value != reference,
            Self::GreaterEqual => value >= reference,
            Self::Always => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlphaTestState {
    pub enabled: bool,
    pub func: CompareFunc,
    pub reference: f32,
}

impl Default for AlphaTestState {
    fn default() -> Self {
        Self {
            enabled: false,
            func: CompareFunc::Always,
            reference: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicOp {
    Clear,
    And,
    Copy,
    Xor,
    Or,
    Invert,
    Set,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendState {
    /// One bit per draw buffer.
    pub enabled: u8,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub equation_rgb: BlendEquation,
    pub equation_alpha: BlendEquation,
    pub constant: [f32; 4],
    pub color_logic_op: bool,
    pub index_logic_op: bool,
    pub logic_op: LogicOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: 0,
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
            constant: [0.0; 4],
            color_logic_op: false,
            index_logic_op: false,
            logic_op: LogicOp::Copy,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClampMode {
    False,
    True,
    /// Clamp only for fixed-point color buffers.
    #[default]
    FixedOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthState {
    pub test: bool,
    pub func: CompareFunc,
    pub write: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test: false,
            func: CompareFunc::Less,
            write: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Incr,
    Decr,
    Invert,
    IncrWrap,
    DecrWrap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilFace {
    pub func: CompareFunc,
    pub reference: u32,
    pub value_mask: u32,
    pub write_mask: u32,
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub depth_pass: StencilOp,
}

impl Default for StencilFace {
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            reference: 0,
            value_mask: 0xff,
            write_mask: 0xff,
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            depth_pass: StencilOp::Keep,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StencilState {
    pub enabled: bool,
    pub front: StencilFace,
    pub back: StencilFace,
}

impl StencilState {
    /// Same function and ops on both faces.
    pub fn set_both(&mut self, face: StencilFace) {
        self.front = face;
        self.back = face;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FogState {
    pub enabled: bool,
    pub color: [f32; 4],
    pub density: f32,
    pub start: f32,
    pub end: f32,
}

impl Default for FogState {
    fn default() -> Self {
        Self {
            enabled: false,
            color: [0.0; 4],
            density: 1.0,
            start: 0.0,
            end: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelStoreState {
    pub pack: PixelStore,
    pub unpack: PixelStore,
    pub pack_buffer: Option<BufferId>,
    pub unpack_buffer: Option<BufferId>,
}

impl PixelStoreState {
    /// Tightly packed pack and unpack layouts with no buffers bound.
    pub fn tight() -> Self {
        Self {
            pack: PixelStore::tight(),
            unpack: PixelStore::tight(),
            pack_buffer: None,
            unpack_buffer: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelTransferState {
    pub scale: [f32; 4],
    pub bias: [f32; 4],
    pub depth_scale: f32,
    pub depth_bias: f32,
    pub map_color: bool,
    pub map_stencil: bool,
    pub index_shift: i32,
    pub index_offset: i32,
}

impl Default for PixelTransferState {
    fn default() -> Self {
        Self {
            scale: [1.0; 4],
            bias: [0.0; 4],
            depth_scale: 1.0,
            depth_bias: 0.0,
            map_color: false,
            map_stencil: false,
            index_shift: 0,
            index_offset: 0,
        }
    }
}

impl PixelTransferState {
    pub fn color_is_identity(&self) -> bool {
        self.scale == [1.0; 4] && self.bias == [0.0; 4] && !self.map_color
    }

    pub fn depth_is_identity(&self) -> bool {
        self.depth_scale == 1.0 && self.depth_bias == 0.0
    }

    pub fn stencil_is_identity(&self) -> bool {
        !self.map_stencil && self.index_shift == 0 && self.index_offset == 0
    }

    pub fn is_identity(&self) -> bool {
        self.color_is_identity() && self.depth_is_identity() && self.stencil_is_identity()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Point,
    Line,
    #[default]
    Fill,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterizationState {
    pub front_mode: PolygonMode,
    pub back_mode: PolygonMode,
    pub point_smooth: bool,
    pub line_smooth: bool,
    pub polygon_smooth: bool,
    pub polygon_stipple: bool,
    pub cull_face: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScissorState {
    pub enabled: bool,
    pub rect: Rect,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShaderBindings {
    pub arb_vertex_program: bool,
    pub arb_fragment_program: bool,
    pub ati_fragment_shader: bool,
    /// Per-stage programs installed with the stage-program entry points.
    pub vertex_stage: Option<ProgramId>,
    pub fragment_stage: Option<ProgramId>,
    pub active_program: Option<ProgramId>,
    pub pipeline: Option<PipelineId>,
    /// `glUseProgram` binding.
    pub current: Option<ProgramId>,
}

impl ShaderBindings {
    /// Bindings with only `program` in use.
    pub fn using(program: ProgramId) -> Self {
        Self {
            current: Some(program),
            ..Self::default()
        }
    }
}

bitflags! {
    /// Fixed-function texture targets enabled on a unit.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TexEnableMask: u8 {
        const TEX_1D = 1 << 0;
        const TEX_2D = 1 << 1;
        const TEX_3D = 1 << 2;
        const CUBE = 1 << 3;
        const RECT = 1 << 4;
    }
}

impl TexEnableMask {
    pub fn for_target(target: TextureTarget) -> Self {
        match target {
            TextureTarget::Tex1D | TextureTarget::Tex1DArray => Self::TEX_1D,
            TextureTarget::Tex2D | TextureTarget::Tex2DArray => Self::TEX_2D,
            TextureTarget::Tex3D => Self::TEX_3D,
            TextureTarget::Cube | TextureTarget::CubeArray => Self::CUBE,
            TextureTarget::Rect => Self::RECT,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TexGenMask: u8 {
        const S = 1 << 0;
        const T = 1 << 1;
        const R = 1 << 2;
        const Q = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TexEnvMode {
    #[default]
    Modulate,
    Replace,
    Decal,
    Blend,
    Add,
    Combine,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureUnit {
    pub enabled: TexEnableMask,
    pub env_mode: TexEnvMode,
    pub texgen: TexGenMask,
    pub bindings: [Option<TextureId>; TextureTarget::COUNT],
    pub sampler: Option<SamplerId>,
}

impl TextureUnit {
    pub fn binding(&self, target: TextureTarget) -> Option<TextureId> {
        self.bindings[target.index()]
    }

    /// The texture fixed-function sampling uses on this unit: the highest
    /// priority enabled target that has a binding.
    pub fn current(&self) -> Option<(TextureTarget, TextureId)> {
        [
            (TexEnableMask::CUBE, TextureTarget::Cube),
            (TexEnableMask::TEX_3D, TextureTarget::Tex3D),
            (TexEnableMask::RECT, TextureTarget::Rect),
            (TexEnableMask::TEX_2D, TextureTarget::Tex2D),
            (TexEnableMask::TEX_1D, TextureTarget::Tex1D),
        ]
        .into_iter()
        .filter(|(bit, _)| self.enabled.contains(*bit))
        .find_map(|(_, target)| self.binding(target).map(|texture| (target, texture)))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureState {
    pub active_unit: usize,
    pub client_active_unit: usize,
    pub units: [TextureUnit; MAX_TEXTURE_UNITS],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    #[default]
    ModelView,
    Projection,
    Texture,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformState {
    pub matrix_mode: MatrixMode,
    pub modelview: Mat4,
    pub projection: Mat4,
    pub texture: [Mat4; MAX_TEXTURE_UNITS],
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            matrix_mode: MatrixMode::ModelView,
            modelview: IDENTITY,
            projection: IDENTITY,
            texture: [IDENTITY; MAX_TEXTURE_UNITS],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipState {
    /// One bit per user clip plane.
    pub enabled_planes: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexState {
    pub vertex_array: Option<VertexArrayId>,
    pub array_buffer: Option<BufferId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub near: f32,
    pub far: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            near: 0.0,
            far: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderMode {
    #[default]
    Render,
    Select,
    Feedback,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MultisampleState {
    pub enabled: bool,
    pub alpha_to_coverage: bool,
    pub alpha_to_one: bool,
    pub sample_coverage: bool,
    pub sample_shading: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawBuffer {
    #[default]
    None,
    Front,
    Back,
    FrontLeft,
    BackLeft,
    ColorAttachment(u8),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MiscState {
    pub lighting: bool,
    pub raster_discard: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub color_int: [i32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0; 4],
            color_int: [0; 4],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Current raster position in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterPosState {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub valid: bool,
    pub zoom_x: f32,
    pub zoom_y: f32,
}

impl Default for RasterPosState {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0, 1.0],
            color: [1.0; 4],
            valid: true,
            zoom_x: 1.0,
            zoom_y: 1.0,
        }
    }
}

/// A framebuffer binding together with the properties the meta paths
/// route on. `id == None` is the window-system framebuffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundFramebuffer {
    pub id: Option<FramebufferId>,
    pub width: u32,
    pub height: u32,
    /// Non-zero for layered attachments.
    pub layers: u32,
    pub depth_bits: u32,
    pub stencil_bits: u32,
    pub integer_color: bool,
}

impl BoundFramebuffer {
    pub fn window(width: u32, height: u32) -> Self {
        Self {
            id: None,
            width,
            height,
            layers: 0,
            depth_bits: 24,
            stencil_bits: 8,
            integer_color: false,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformFeedbackState {
    pub active: bool,
    pub paused: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OcclusionQuery {
    pub id: QueryId,
    pub samples_passed: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryState {
    pub occlusion: Option<OcclusionQuery>,
}
