//! Per-axis capture / neutralize / restore descriptors.
//!
//! [`AXES`] is walked in order by both `begin` and `end`. Draw buffers come
//! last since their restore depends on the restored color mask.

use crate::backend::QueryId;
use crate::context::{
    ortho, AlphaTestState, BlendState, ClampMode, ClipState, ColorWriteMask, DepthState,
    DrawBuffer, FogState, MatrixMode, MiscState, MultisampleState, PixelStoreState,
    PixelTransferState, RasterizationState, RenderContext, RenderMode, ScissorState,
    ShaderBindings, StencilState, TexEnableMask, TexEnvMode, TexGenMask, TextureState,
    TransformState, VertexState, ViewportState, IDENTITY, MAX_DRAW_BUFFERS, MAX_TEXTURE_UNITS,
};

use super::SaveMask;

/// A captured previous value for one axis.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Saved {
    AlphaTest(AlphaTestState),
    Blend(BlendState),
    ColorMask([ColorWriteMask; MAX_DRAW_BUFFERS]),
    Depth(DepthState),
    Fog(FogState),
    PixelStore(PixelStoreState),
    PixelTransfer(PixelTransferState),
    Rasterization(RasterizationState),
    Scissor(ScissorState),
    Shader(ShaderBindings),
    Stencil(StencilState),
    Transform(TransformState),
    Texture(TextureState),
    Vertex(VertexState),
    Viewport(ViewportState),
    ClampFragment(ClampMode),
    ClampVertex(ClampMode),
    ConditionalRender(Option<QueryId>),
    Clip(ClipState),
    RenderMode(RenderMode),
    Multisample(MultisampleState),
    FramebufferSrgb(bool),
    Misc(MiscState),
    DrawBuffers([DrawBuffer; MAX_DRAW_BUFFERS]),
}

pub(crate) struct Axis {
    pub bit: SaveMask,
    pub capture: fn(&RenderContext) -> Saved,
    pub apply_default: fn(&mut RenderContext),
    pub restore: fn(&mut RenderContext, Saved),
}

fn mismatch(bit: SaveMask, saved: &Saved) -> ! {
    panic!("save frame holds {saved:?} for axis {bit:?}");
}

macro_rules! axis {
    ($bit:ident, $variant:ident, $field:ident, $setter:ident, |$ctx:ident| $default:expr) => {
        Axis {
            bit: SaveMask::$bit,
            capture: |ctx| Saved::$variant(ctx.$field),
            apply_default: |$ctx| {
                let value = $default;
                $ctx.$setter(value);
            },
            restore: |ctx, saved| match saved {
                Saved::$variant(value) => {
                    ctx.$setter(value);
                }
                other => mismatch(SaveMask::$bit, &other),
            },
        }
    };
}

fn transform_default(ctx: &RenderContext) -> TransformState {
    let fb = &ctx.draw_framebuffer;
    TransformState {
        matrix_mode: MatrixMode::ModelView,
        modelview: IDENTITY,
        projection: ortho(0.0, fb.width as f32, 0.0, fb.height as f32, -1.0, 1.0),
        texture: [IDENTITY; MAX_TEXTURE_UNITS],
    }
}

fn texture_default(ctx: &RenderContext) -> TextureState {
    let mut state = ctx.texture;
    state.active_unit = 0;
    state.client_active_unit = 0;
    for unit in state.units.iter_mut() {
        unit.enabled = TexEnableMask::empty();
        unit.texgen = TexGenMask::empty();
    }
    state.units[0].env_mode = TexEnvMode::Replace;
    state.units[0].sampler = None;
    state
}

fn viewport_default(ctx: &RenderContext) -> ViewportState {
    ViewportState {
        x: 0,
        y: 0,
        width: ctx.draw_framebuffer.width,
        height: ctx.draw_framebuffer.height,
        near: 0.0,
        far: 1.0,
    }
}

/// Shader bindings are restored stage programs first, then the pipeline
/// that wraps them, then the current program.
fn restore_shader(ctx: &mut RenderContext, saved: Saved) {
    let Saved::Shader(prev) = saved else {
        mismatch(SaveMask::SHADER, &saved);
    };

    let mut stages = ctx.shader;
    stages.arb_vertex_program = prev.arb_vertex_program;
    stages.arb_fragment_program = prev.arb_fragment_program;
    stages.ati_fragment_shader = prev.ati_fragment_shader;
    stages.vertex_stage = prev.vertex_stage;
    stages.fragment_stage = prev.fragment_stage;
    ctx.set_shader(stages);

    let mut pipeline = ctx.shader;
    pipeline.active_program = prev.active_program;
    pipeline.pipeline = prev.pipeline;
    ctx.set_shader(pipeline);

    ctx.set_shader(prev);
}

pub(crate) static AXES: [Axis; 24] = [
    axis!(ALPHA_TEST, AlphaTest, alpha_test, set_alpha_test, |ctx| AlphaTestState {
        enabled: false,
        ..ctx.alpha_test
    }),
    axis!(BLEND, Blend, blend, set_blend, |ctx| BlendState {
        enabled: 0,
        color_logic_op: false,
        index_logic_op: false,
        ..ctx.blend
    }),
    axis!(COLOR_MASK, ColorMask, color_mask, set_color_mask, |_ctx| [
        ColorWriteMask::all();
        MAX_DRAW_BUFFERS
    ]),
    axis!(DEPTH_TEST, Depth, depth, set_depth, |ctx| DepthState {
        test: false,
        ..ctx.depth
    }),
    axis!(FOG, Fog, fog, set_fog, |ctx| FogState {
        enabled: false,
        ..ctx.fog
    }),
    axis!(PIXEL_STORE, PixelStore, pixel_store, set_pixel_store, |_ctx| {
        PixelStoreState::tight()
    }),
    axis!(PIXEL_TRANSFER, PixelTransfer, pixel_transfer, set_pixel_transfer, |_ctx| {
        PixelTransferState::default()
    }),
    axis!(RASTERIZATION, Rasterization, rasterization, set_rasterization, |_ctx| {
        RasterizationState::default()
    }),
    axis!(SCISSOR, Scissor, scissor, set_scissor, |ctx| ScissorState {
        enabled: false,
        ..ctx.scissor
    }),
    Axis {
        bit: SaveMask::SHADER,
        capture: |ctx| Saved::Shader(ctx.shader),
        apply_default: |ctx| {
            ctx.set_shader(ShaderBindings::default());
        },
        restore: restore_shader,
    },
    axis!(STENCIL_TEST, Stencil, stencil, set_stencil, |ctx| StencilState {
        enabled: false,
        ..ctx.stencil
    }),
    axis!(TRANSFORM, Transform, transform, set_transform, |ctx| transform_default(ctx)),
    axis!(TEXTURE, Texture, texture, set_texture, |ctx| texture_default(ctx)),
    axis!(VERTEX, Vertex, vertex, set_vertex, |_ctx| VertexState::default()),
    axis!(VIEWPORT, Viewport, viewport, set_viewport, |ctx| viewport_default(ctx)),
    axis!(
        CLAMP_FRAGMENT_COLOR,
        ClampFragment,
        clamp_fragment_color,
        set_clamp_fragment_color,
        |_ctx| ClampMode::False
    ),
    axis!(
        CLAMP_VERTEX_COLOR,
        ClampVertex,
        clamp_vertex_color,
        set_clamp_vertex_color,
        |_ctx| ClampMode::False
    ),
    axis!(
        CONDITIONAL_RENDER,
        ConditionalRender,
        conditional_render,
        set_conditional_render,
        |_ctx| None
    ),
    axis!(CLIP, Clip, clip, set_clip, |_ctx| ClipState::default()),
    axis!(SELECT_FEEDBACK, RenderMode, render_mode, set_render_mode, |_ctx| {
        RenderMode::Render
    }),
    axis!(MULTISAMPLE, Multisample, multisample, set_multisample, |_ctx| {
        MultisampleState::default()
    }),
    axis!(
        FRAMEBUFFER_SRGB,
        FramebufferSrgb,
        framebuffer_srgb,
        set_framebuffer_srgb,
        |_ctx| false
    ),
    axis!(MISC, Misc, misc, set_misc, |_ctx| MiscState::default()),
    // Captured for restore only; meta draws use the caller's mapping.
    axis!(DRAW_BUFFERS, DrawBuffers, draw_buffers, set_draw_buffers, |ctx| {
        ctx.draw_buffers
    }),
];
