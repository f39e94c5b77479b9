//! The meta operations. Each submodule adds its entry points to
//! [`MetaState`](crate::MetaState).
//!
//! Every entry point follows the same shape: decide between the meta path
//! and the software path, open a save region, draw, close the region, and
//! fold any failure into the context error flag.

mod bitmap;
mod blit;
mod clear;
mod copy_pixels;
pub(crate) mod decompress;
mod draw_pixels;
mod draw_tex;
mod mipmap;
mod tex_subimage;

pub use blit::BlitRect;

use crate::backend::{ProgramId, TextureId, TextureTarget};
use crate::context::{
    ortho, BoundFramebuffer, DrawBuffer, RenderContext, ShaderBindings, TexEnableMask,
    TexEnvMode, TransformState, ViewportState, MAX_DRAW_BUFFERS,
};
use crate::geometry::{invert_z, quad_positions, window_to_ndc, Vertex};

const WHITE: [f32; 4] = [1.0; 4];

/// Draw and read framebuffer bindings, restored by hand around operations
/// that render into meta-owned framebuffers.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SavedFramebuffers {
    draw: BoundFramebuffer,
    read: BoundFramebuffer,
}

impl SavedFramebuffers {
    pub(crate) fn capture(ctx: &RenderContext) -> Self {
        Self {
            draw: ctx.draw_framebuffer,
            read: ctx.read_framebuffer,
        }
    }

    pub(crate) fn restore(self, ctx: &mut RenderContext) {
        ctx.set_draw_framebuffer(self.draw);
        ctx.set_read_framebuffer(self.read);
    }
}

/// Bind `fb` for drawing with a viewport and window projection covering
/// `width` x `height`, writing only color attachment 0 when `color` is set.
pub(crate) fn target_framebuffer(
    ctx: &mut RenderContext,
    fb: BoundFramebuffer,
    width: u32,
    height: u32,
    color: bool,
) {
    ctx.set_draw_framebuffer(fb);
    ctx.set_viewport(ViewportState {
        x: 0,
        y: 0,
        width,
        height,
        near: 0.0,
        far: 1.0,
    });
    ctx.set_transform(TransformState {
        projection: ortho(0.0, width as f32, 0.0, height as f32, -1.0, 1.0),
        ..ctx.transform
    });
    let mut draw_buffers = [DrawBuffer::None; MAX_DRAW_BUFFERS];
    if color {
        draw_buffers[0] = DrawBuffer::ColorAttachment(0);
    }
    ctx.set_draw_buffers(draw_buffers);
}

/// Sample `texture` on unit 0, through `program` when one is given and
/// through fixed-function replace otherwise.
pub(crate) fn bind_source_texture(
    ctx: &mut RenderContext,
    target: TextureTarget,
    texture: TextureId,
    program: Option<ProgramId>,
) {
    ctx.bind_texture(0, target, Some(texture));
    match program {
        Some(program) => {
            ctx.set_shader(ShaderBindings::using(program));
        }
        None => {
            ctx.enable_texture_unit(0, TexEnableMask::for_target(target), TexEnvMode::Replace);
        }
    }
}

/// Corners of a window-space rectangle in the space the current draw path
/// expects: window coordinates at the meta ortho depth for fixed function,
/// normalized device coordinates for programs.
pub(crate) fn quad_corners(
    ctx: &RenderContext,
    (x0, y0, x1, y1): (f32, f32, f32, f32),
    depth: f32,
    program: bool,
) -> [[f32; 3]; 4] {
    if program {
        let vp = &ctx.viewport;
        let (nx0, ny0) = window_to_ndc(x0 - vp.x as f32, y0 - vp.y as f32, vp.width, vp.height);
        let (nx1, ny1) = window_to_ndc(x1 - vp.x as f32, y1 - vp.y as f32, vp.width, vp.height);
        quad_positions(nx0, ny0, nx1, ny1, -invert_z(depth))
    } else {
        quad_positions(x0, y0, x1, y1, invert_z(depth))
    }
}

pub(crate) fn textured_quad(
    positions: [[f32; 3]; 4],
    texcoords: [[f32; 4]; 4],
    color: [f32; 4],
) -> [Vertex; 4] {
    let mut vertices = [Vertex::default(); 4];
    for ((vertex, position), texcoord) in vertices.iter_mut().zip(positions).zip(texcoords) {
        *vertex = Vertex {
            position,
            texcoord,
            color,
        };
    }
    vertices
}
