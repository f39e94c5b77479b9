use crate::backend::{GpuResources, ImageSelector, LevelRange};
use crate::context::{RenderContext, MAX_TEXTURE_UNITS};
use crate::error::MetaError;
use crate::geometry::{invert_z, quad_positions, DrawTexVertex};
use crate::meta::MetaState;
use crate::save::SaveMask;

/// `[s, t]` at the four quad corners for a crop rectangle over a
/// `width` x `height` image.
fn crop_texcoords(crop: [i32; 4], width: u32, height: u32) -> [[f32; 2]; 4] {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let s0 = crop[0] as f32 / w;
    let t0 = crop[1] as f32 / h;
    let s1 = (crop[0] + crop[2]) as f32 / w;
    let t1 = (crop[1] + crop[3]) as f32 / h;
    [[s0, t0], [s1, t0], [s1, t1], [s0, t1]]
}

impl MetaState {
    /// `glDrawTex` (`OES_draw_texture`): draw a screen-aligned quad at
    /// window position `(x, y)` and depth `z`, texturing each enabled unit
    /// through its texture's crop rectangle.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_tex<D: GpuResources + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        x: f32,
        y: f32,
        z: f32,
        width: f32,
        height: f32,
    ) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }

        self.begin(
            ctx,
            SaveMask::RASTERIZATION
                | SaveMask::SHADER
                | SaveMask::TRANSFORM
                | SaveMask::VERTEX
                | SaveMask::VIEWPORT,
        );
        let result = self.draw_tex_rect(ctx, driver, (x, y, z), width, height);
        self.end(ctx);
        self.finish(ctx, "draw_tex", result);
    }

    fn draw_tex_rect<D: GpuResources + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        (x, y, z): (f32, f32, f32),
        width: f32,
        height: f32,
    ) -> Result<(), MetaError> {
        let depth = invert_z(z.clamp(0.0, 1.0));
        let positions = quad_positions(x, y, x + width, y + height, depth);
        let mut vertices = positions.map(|position| DrawTexVertex {
            position,
            ..DrawTexVertex::default()
        });

        let units = (ctx.caps.max_texture_units as usize).min(MAX_TEXTURE_UNITS);
        for (unit, state) in ctx.texture.units.iter().enumerate().take(units) {
            let Some((_, texture)) = state.current() else {
                continue;
            };
            let LevelRange { base, .. } = driver.texture_level_range(texture);
            let Some(info) = driver.tex_image_info(ImageSelector {
                texture,
                level: base,
                face: 0,
            }) else {
                continue;
            };
            let crop = driver.texture_crop_rect(texture);
            let texcoords = crop_texcoords(crop, info.width, info.height);
            for (vertex, st) in vertices.iter_mut().zip(texcoords) {
                vertex.texcoords[unit] = st;
            }
        }

        self.draw_tex_vertices(ctx, driver, &vertices)
    }
}
