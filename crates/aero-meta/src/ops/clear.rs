use tracing::trace;

use crate::backend::{BufferMask, MetaDriver, ProgramId, Uniform};
use crate::context::{
    BoundFramebuffer, ColorWriteMask, CompareFunc, DepthState, DrawBuffer, RenderContext,
    ShaderBindings, StencilOp, MAX_DRAW_BUFFERS,
};
use crate::error::MetaError;
use crate::geometry::Vertex;
use crate::meta::MetaState;
use crate::save::SaveMask;
use crate::shaders::UtilityProgram;

use super::quad_corners;

#[derive(Clone, Copy, Debug, PartialEq)]
enum ClearPath {
    Program(ProgramId, Uniform),
    FixedFunction,
}

impl MetaState {
    /// Clear `buffers` of the draw framebuffer by drawing one quad over the
    /// scissored drawable region.
    ///
    /// Accumulation buffers always go to the software path; the rest are
    /// cleared together in a single draw (one instance per layer for layered
    /// framebuffers).
    pub fn clear<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        buffers: BufferMask,
    ) {
        let mut buffers = buffers;
        if buffers.contains(BufferMask::ACCUM) {
            self.fallback("clear", "accumulation buffer");
            driver.swrast_clear(ctx, BufferMask::ACCUM);
            buffers.remove(BufferMask::ACCUM);
        }
        if buffers.is_empty() {
            return;
        }

        let path = match self.clear_path(ctx, driver, buffers) {
            Ok(path) => path,
            Err(reason) => {
                self.fallback("clear", reason);
                driver.swrast_clear(ctx, buffers);
                return;
            }
        };

        let mut mask = SaveMask::ALL
            - SaveMask::SCISSOR
            - SaveMask::PIXEL_STORE
            - SaveMask::CONDITIONAL_RENDER
            - SaveMask::FRAMEBUFFER_SRGB;
        if buffers.intersects(BufferMask::COLOR) {
            // The caller's color mask applies to the cleared buffers.
            mask -= SaveMask::COLOR_MASK;
        }

        self.begin(ctx, mask);
        let result = self.clear_quad(ctx, driver, buffers, path);
        self.end(ctx);
        self.finish(ctx, "clear", result);
    }

    fn clear_path<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &RenderContext,
        driver: &mut D,
        buffers: BufferMask,
    ) -> Result<ClearPath, &'static str> {
        let fb = &ctx.draw_framebuffer;
        let layered = fb.layers > 0;
        let integer = fb.integer_color && buffers.intersects(BufferMask::COLOR);

        let which = match (integer, layered) {
            (true, true) => return Err("layered integer framebuffer"),
            (true, false) => UtilityProgram::ClearInteger,
            (false, true) => UtilityProgram::ClearLayered,
            (false, false) if self.config.glsl_clear => UtilityProgram::Clear,
            (false, false) => return Ok(ClearPath::FixedFunction),
        };

        let uniform = if integer {
            Uniform::IVec4(ctx.clear.color_int)
        } else {
            Uniform::Vec4(ctx.clear.color)
        };
        match self
            .shaders
            .ensure_utility(which, &ctx.caps, &self.stats, driver)
        {
            Some(program) => Ok(ClearPath::Program(program, uniform)),
            None if integer => Err("no integer clear program"),
            None if layered => Err("no layered clear program"),
            None => Ok(ClearPath::FixedFunction),
        }
    }

    fn clear_quad<D: MetaDriver + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        buffers: BufferMask,
        path: ClearPath,
    ) -> Result<(), MetaError> {
        let bounds = ctx.draw_bounds();
        if bounds.is_empty() {
            trace!("clear region is empty");
            return Ok(());
        }

        if buffers.intersects(BufferMask::COLOR) {
            let mut draw_buffers = ctx.draw_buffers;
            for (slot, buffer) in draw_buffers.iter_mut().enumerate() {
                if !buffers.contains(BufferMask::color_slot(slot)) {
                    *buffer = DrawBuffer::None;
                }
            }
            ctx.set_draw_buffers(draw_buffers);
        } else {
            ctx.set_color_mask([ColorWriteMask::empty(); MAX_DRAW_BUFFERS]);
        }

        if buffers.contains(BufferMask::DEPTH) {
            ctx.set_depth(DepthState {
                test: true,
                func: CompareFunc::Always,
                write: true,
            });
        }

        if buffers.contains(BufferMask::STENCIL) {
            let mut stencil = ctx.stencil;
            stencil.enabled = true;
            for face in [&mut stencil.front, &mut stencil.back] {
                face.func = CompareFunc::Always;
                face.reference = ctx.clear.stencil;
                face.value_mask = 0x7fff_ffff;
                face.fail = StencilOp::Replace;
                face.depth_fail = StencilOp::Replace;
                face.depth_pass = StencilOp::Replace;
            }
            ctx.set_stencil(stencil);
        }

        let rect = (
            bounds.x as f32,
            bounds.y as f32,
            bounds.right() as f32,
            bounds.top() as f32,
        );
        let depth = ctx.clear.depth.clamp(0.0, 1.0);
        let fb: BoundFramebuffer = ctx.draw_framebuffer;

        let (vertices, instances) = match path {
            ClearPath::Program(program, uniform) => {
                ctx.set_shader(ShaderBindings::using(program));
                driver.set_uniform(program, "color", uniform);
                let corners = quad_corners(ctx, rect, depth, true);
                (
                    corners.map(|position| Vertex {
                        position,
                        ..Vertex::default()
                    }),
                    fb.layers.max(1),
                )
            }
            ClearPath::FixedFunction => {
                let color = ctx.clear.color;
                let corners = quad_corners(ctx, rect, depth, false);
                (
                    corners.map(|position| Vertex {
                        position,
                        color,
                        ..Vertex::default()
                    }),
                    1,
                )
            }
        };

        self.draw_quad(ctx, driver, &vertices, instances)
    }
}
