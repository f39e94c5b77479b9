mod common;

use aero_meta::backend::{
    BufferMask, Filter, LevelRange, SamplerDesc, TextureTarget, Wrap,
};
use aero_meta::context::{
    Capabilities, ColorWriteMask, CompareFunc, Rect, RenderContext, MAX_DRAW_BUFFERS,
};
use aero_meta::format::InternalFormat;
use aero_meta::{BlitRect, MetaState};
use common::{Call, MockDriver};
use pretty_assertions::assert_eq;

fn copies(driver: &MockDriver) -> Vec<Rect> {
    driver
        .calls
        .iter()
        .filter_map(|call| match call {
            Call::CopyTexImage { src, .. } => Some(*src),
            _ => None,
        })
        .collect()
}

#[test]
fn color_and_depth_are_blitted_and_stencil_is_left() {
    common::init_tracing();
    let mut ctx = RenderContext::new(Capabilities::default(), 64, 64);
    let before = ctx.clone();
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    let remaining = meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(0, 0, 16, 16),
        BlitRect::new(0, 0, 32, 32),
        BufferMask::COLOR0 | BufferMask::DEPTH | BufferMask::STENCIL,
        Filter::Nearest,
    );

    assert_eq!(remaining, BufferMask::STENCIL);
    assert_eq!(copies(&driver), vec![Rect::new(0, 0, 16, 16); 2]);

    let draws = driver.draws();
    assert_eq!(draws.len(), 2);
    let color = draws[0].quad();
    assert_eq!([color[0].position[0], color[0].position[1]], [-1.0, -1.0]);
    assert_eq!([color[2].position[0], color[2].position[1]], [0.0, 0.0]);

    let depth = &draws[1].ctx;
    assert!(depth.depth.test && depth.depth.write);
    assert_eq!(depth.depth.func, CompareFunc::Always);
    assert_eq!(depth.color_mask, [ColorWriteMask::empty(); MAX_DRAW_BUFFERS]);
    assert!(depth.shader.current.is_some());

    assert!(ctx.state_eq(&before));
    assert_eq!(meta.save_stack().depth(), 0);
}

#[test]
fn texture_read_attachment_is_sampled_in_place() {
    let mut ctx = RenderContext::new(Capabilities::default(), 64, 64);
    let mut driver = MockDriver::new();
    let texture = driver.add_texture(TextureTarget::Tex2D, InternalFormat::Rgba8, 64, 32, 1);
    ctx.read_framebuffer = driver.texture_framebuffer(texture);
    let before = ctx.clone();
    let mut meta = MetaState::default();

    let remaining = meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(0, 0, 32, 16),
        BlitRect::new(0, 0, 64, 64),
        BufferMask::COLOR0,
        Filter::Linear,
    );

    assert_eq!(remaining, BufferMask::empty());
    assert!(copies(&driver).is_empty());

    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(
        draws[0].ctx.texture.units[0].binding(TextureTarget::Tex2D),
        Some(texture)
    );
    let quad = draws[0].quad();
    assert_eq!([quad[0].texcoord[0], quad[0].texcoord[1]], [0.0, 0.0]);
    assert_eq!([quad[2].texcoord[0], quad[2].texcoord[1]], [0.5, 0.5]);

    // Sampling is pinned to the attached level, then put back.
    assert_eq!(
        driver.level_range_writes(texture),
        vec![LevelRange { base: 0, max: 0 }, LevelRange::default()]
    );
    assert!(driver.samplers.contains(&SamplerDesc {
        min_filter: Filter::Linear,
        mag_filter: Filter::Linear,
        wrap: Wrap::ClampToEdge,
        srgb_decode: false,
    }));
    assert!(ctx.state_eq(&before));
}

#[test]
fn blitting_a_texture_onto_itself_copies_first() {
    let mut ctx = RenderContext::new(Capabilities::default(), 64, 64);
    let mut driver = MockDriver::new();
    let texture = driver.add_texture(TextureTarget::Tex2D, InternalFormat::Rgba8, 32, 32, 1);
    let fb = driver.texture_framebuffer(texture);
    ctx.read_framebuffer = fb;
    ctx.draw_framebuffer = fb;
    ctx.viewport.width = 32;
    ctx.viewport.height = 32;
    let mut meta = MetaState::default();

    meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(0, 0, 8, 8),
        BlitRect::new(16, 16, 24, 24),
        BufferMask::COLOR0,
        Filter::Nearest,
    );

    assert_eq!(copies(&driver), vec![Rect::new(0, 0, 8, 8)]);
    assert_eq!(driver.draws().len(), 1);
}

#[test]
fn mirrored_source_flips_the_destination() {
    let mut ctx = RenderContext::new(Capabilities::default(), 64, 64);
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(16, 0, 0, 16),
        BlitRect::new(0, 0, 32, 32),
        BufferMask::COLOR0,
        Filter::Nearest,
    );

    assert_eq!(copies(&driver), vec![Rect::new(0, 0, 16, 16)]);
    let quad = driver.draws()[0].quad();
    assert_eq!(quad[0].position[0], 0.0);
    assert_eq!(quad[1].position[0], -1.0);
}

#[test]
fn degenerate_rectangles_blit_nothing() {
    let mut ctx = RenderContext::new(Capabilities::default(), 64, 64);
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    let remaining = meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(4, 0, 4, 16),
        BlitRect::new(0, 0, 32, 32),
        BufferMask::COLOR0 | BufferMask::DEPTH,
        Filter::Nearest,
    );

    assert_eq!(remaining, BufferMask::empty());
    assert!(driver.calls.is_empty());
}

#[test]
fn source_larger_than_the_scratch_texture_is_returned() {
    let caps = Capabilities {
        max_rectangle_texture_size: 16,
        ..Capabilities::default()
    };
    let mut ctx = RenderContext::new(caps, 64, 64);
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    let remaining = meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(0, 0, 32, 32),
        BlitRect::new(0, 0, 32, 32),
        BufferMask::COLOR0,
        Filter::Nearest,
    );

    assert_eq!(remaining, BufferMask::COLOR0);
    assert!(driver.draws().is_empty());
    assert_eq!(meta.stats().fallbacks, 1);
}

#[test]
fn depth_needs_glsl() {
    let caps = Capabilities {
        glsl_version: 0,
        ..Capabilities::default()
    };
    let mut ctx = RenderContext::new(caps, 64, 64);
    let before = ctx.clone();
    let mut driver = MockDriver::new();
    let mut meta = MetaState::default();

    let remaining = meta.blit_framebuffer(
        &mut ctx,
        &mut driver,
        BlitRect::new(0, 0, 8, 8),
        BlitRect::new(0, 0, 8, 8),
        BufferMask::COLOR0 | BufferMask::DEPTH,
        Filter::Nearest,
    );

    assert_eq!(remaining, BufferMask::DEPTH);
    let draws = driver.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].ctx.shader.current, None);
    // Fixed-function quads are in window coordinates.
    assert_eq!(draws[0].quad()[2].position[0], 8.0);
    assert!(driver.programs.is_empty());
    assert!(ctx.state_eq(&before));
}
