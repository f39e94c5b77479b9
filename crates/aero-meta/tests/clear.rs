mod common;

use aero_meta::backend::{BufferMask, Uniform};
use aero_meta::context::{
    Capabilities, ColorWriteMask, CompareFunc, Rect, RenderContext, ScissorState, StencilOp,
    MAX_DRAW_BUFFERS,
};
use aero_meta::geometry::Vertex;
use aero_meta::{MetaConfig, MetaState};
use common::{Call, MockDriver};
use pretty_assertions::assert_eq;

fn red_context(width: u32, height: u32) -> RenderContext {
    let mut ctx = RenderContext::new(Capabilities::default(), width, height);
    ctx.clear.color = [1.0, 0.0, 0.0, 1.0];
    ctx.clear.depth = 1.0;
    ctx.clear.stencil = 0;
    ctx
}

#[test]
fn clear_all_buffers_is_one_draw_and_restores_state() {
    common::init_tracing();
    let mut ctx = red_context(4, 4);
    let before = ctx.clone();
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(
        &mut ctx,
        &mut driver,
        BufferMask::COLOR0 | BufferMask::DEPTH | BufferMask::STENCIL,
    );

    assert!(ctx.state_eq(&before));
    assert_eq!(ctx.error(), None);
    assert_eq!(meta.save_stack().depth(), 0);

    let stats = meta.stats();
    assert_eq!((stats.save_begins, stats.save_ends), (1, 1));
    assert_eq!(stats.meta_draws, 1);
    assert_eq!(stats.fallbacks, 0);

    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    let draw = draws[0];
    assert_eq!(draw.instances, 1);
    assert!(draw.ctx.depth.test && draw.ctx.depth.write);
    assert_eq!(draw.ctx.depth.func, CompareFunc::Always);
    assert!(draw.ctx.stencil.enabled);
    assert_eq!(draw.ctx.stencil.front.reference, 0);
    assert_eq!(draw.ctx.stencil.front.depth_pass, StencilOp::Replace);
    assert!(draw.ctx.shader.current.is_some());

    // Full-window quad in clip space, at the clear depth.
    let quad = draw.quad();
    assert_eq!(quad[0].position, [-1.0, -1.0, 1.0]);
    assert_eq!(quad[2].position, [1.0, 1.0, 1.0]);

    assert!(driver.calls.iter().any(|call| matches!(
        call,
        Call::Uniform { name, value: Uniform::Vec4(color), .. }
            if name == "color" && *color == [1.0, 0.0, 0.0, 1.0]
    )));
}

#[test]
fn clear_covers_only_the_scissor_box() {
    let mut ctx = red_context(4, 4);
    ctx.scissor = ScissorState {
        enabled: true,
        rect: Rect::new(1, 1, 2, 2),
    };
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);

    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    assert!(draws[0].ctx.scissor.enabled);
    let quad = draws[0].quad();
    assert_eq!([quad[0].position[0], quad[0].position[1]], [-0.5, -0.5]);
    assert_eq!([quad[2].position[0], quad[2].position[1]], [0.5, 0.5]);
}

#[test]
fn empty_scissor_draws_nothing() {
    let mut ctx = red_context(4, 4);
    ctx.scissor = ScissorState {
        enabled: true,
        rect: Rect::new(8, 8, 2, 2),
    };
    let before = ctx.clone();
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0 | BufferMask::DEPTH);

    assert!(driver.draws().is_empty());
    assert!(ctx.state_eq(&before));
}

#[test]
fn accumulation_goes_to_software_and_the_rest_is_drawn() {
    let mut ctx = red_context(4, 4);
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0 | BufferMask::ACCUM);

    assert!(matches!(
        driver.calls.first(),
        Some(Call::SwrastClear(mask)) if *mask == BufferMask::ACCUM
    ));
    assert_eq!(driver.draws().len(), 1);
    assert_eq!(meta.stats().fallbacks, 1);

    let mut driver = MockDriver::new();
    meta.clear(&mut ctx, &mut driver, BufferMask::ACCUM);
    assert_eq!(driver.swrast(), vec!["clear"]);
    assert!(driver.draws().is_empty());
}

#[test]
fn fixed_function_clear_uses_vertex_colors() {
    let mut ctx = red_context(4, 4);
    let before = ctx.clone();
    let mut driver = MockDriver::new();
    let mut meta = MetaState::new(MetaConfig {
        glsl_clear: false,
        ..MetaConfig::default()
    });

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);

    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].ctx.shader.current, None);
    let quad: Vec<Vertex> = draws[0].quad();
    assert_eq!(quad[0].color, [1.0, 0.0, 0.0, 1.0]);
    // Window coordinates under the meta ortho projection.
    assert_eq!(quad[0].position, [0.0, 0.0, -1.0]);
    assert_eq!(quad[2].position, [4.0, 4.0, -1.0]);
    assert!(driver.programs.is_empty());
    assert!(ctx.state_eq(&before));
}

#[test]
fn shader_compile_failure_falls_back_to_vertex_colors() {
    let mut ctx = red_context(4, 4);
    let mut driver = MockDriver::new();
    driver.fail_compile = true;
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);

    assert_eq!(meta.stats().program_compile_failures, 1);
    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].ctx.shader.current, None);
    assert_eq!(ctx.error(), None);
}

#[test]
fn caller_color_mask_applies_to_color_clears() {
    let mut ctx = red_context(4, 4);
    ctx.color_mask[0] = ColorWriteMask::R | ColorWriteMask::A;
    let before = ctx.clone();
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);
    meta.clear(&mut ctx, &mut driver, BufferMask::DEPTH);

    let draws = driver.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].ctx.color_mask[0], ColorWriteMask::R | ColorWriteMask::A);
    assert_eq!(
        draws[1].ctx.color_mask,
        [ColorWriteMask::empty(); MAX_DRAW_BUFFERS]
    );
    assert!(ctx.state_eq(&before));
}

#[test]
fn layered_framebuffer_clears_every_layer_in_one_draw() {
    let mut ctx = red_context(4, 4);
    ctx.draw_framebuffer.layers = 3;
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);

    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instances, 3);
}

#[test]
fn layered_clear_without_layer_output_uses_software() {
    let caps = Capabilities {
        vertex_shader_layer: false,
        ..Capabilities::default()
    };
    let mut ctx = RenderContext::new(caps, 4, 4);
    ctx.draw_framebuffer.layers = 2;
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);

    assert!(driver.draws().is_empty());
    assert_eq!(driver.swrast(), vec!["clear"]);
}

#[test]
fn integer_framebuffer_clears_with_integer_color() {
    let mut ctx = red_context(4, 4);
    ctx.draw_framebuffer.integer_color = true;
    ctx.clear.color_int = [7, -1, 0, 255];
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);

    assert_eq!(driver.draws().len(), 1);
    assert!(driver.calls.iter().any(|call| matches!(
        call,
        Call::Uniform { value: Uniform::IVec4(color), .. } if *color == [7, -1, 0, 255]
    )));
}

#[test]
fn program_is_compiled_once_across_clears() {
    let mut ctx = red_context(4, 4);
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    for _ in 0..3 {
        meta.clear(&mut ctx, &mut driver, BufferMask::COLOR0);
    }

    let stats = meta.stats();
    assert_eq!(stats.program_compiles, 1);
    assert_eq!(stats.program_cache_hits, 2);
    assert_eq!(stats.meta_draws, 3);

    meta.cleanup(&mut driver);
    assert!(driver.programs.is_empty());
}
