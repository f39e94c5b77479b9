//! Vertex formats and the reusable quad buffers meta draws stream through.

use bytemuck::{Pod, Zeroable};

use crate::backend::{BufferId, GpuResources, VertexArrayId};
use crate::context::{RenderContext, VertexState, MAX_TEXTURE_UNITS};
use crate::error::MetaError;

/// Attribute locations shared by every meta program.
pub const ATTRIB_POSITION: u32 = 0;
pub const ATTRIB_TEXCOORD: u32 = 1;
pub const ATTRIB_COLOR: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    TriangleFan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: &'static [VertexAttribute],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 4],
    pub color: [f32; 4],
}

impl Vertex {
    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<Vertex>() as u32,
        attributes: &[
            VertexAttribute {
                location: ATTRIB_POSITION,
                components: 3,
                offset: 0,
            },
            VertexAttribute {
                location: ATTRIB_TEXCOORD,
                components: 4,
                offset: 12,
            },
            VertexAttribute {
                location: ATTRIB_COLOR,
                components: 4,
                offset: 28,
            },
        ],
    };
}

/// Vertex for `DrawTex`: one texcoord pair per texture unit, at locations
/// `ATTRIB_TEXCOORD + unit`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawTexVertex {
    pub position: [f32; 3],
    pub texcoords: [[f32; 2]; MAX_TEXTURE_UNITS],
}

const fn draw_tex_attributes() -> [VertexAttribute; MAX_TEXTURE_UNITS + 1] {
    let mut attrs = [VertexAttribute {
        location: ATTRIB_POSITION,
        components: 3,
        offset: 0,
    }; MAX_TEXTURE_UNITS + 1];
    let mut unit = 0;
    while unit < MAX_TEXTURE_UNITS {
        attrs[unit + 1] = VertexAttribute {
            location: ATTRIB_TEXCOORD + unit as u32,
            components: 2,
            offset: 12 + 8 * unit as u32,
        };
        unit += 1;
    }
    attrs
}

const DRAW_TEX_ATTRIBUTES: [VertexAttribute; MAX_TEXTURE_UNITS + 1] = draw_tex_attributes();

impl DrawTexVertex {
    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: std::mem::size_of::<DrawTexVertex>() as u32,
        attributes: &DRAW_TEX_ATTRIBUTES,
    };
}

/// Map a [0, 1] depth value to the object Z that the meta ortho projection
/// places at that depth. Negate it for quads given directly in clip space.
pub fn invert_z(normalized: f32) -> f32 {
    1.0 - 2.0 * normalized
}

/// Axis-aligned quad in fan order (lower-left, lower-right, upper-right,
/// upper-left), all at depth `z`.
pub fn quad_positions(x0: f32, y0: f32, x1: f32, y1: f32, z: f32) -> [[f32; 3]; 4] {
    [[x0, y0, z], [x1, y0, z], [x1, y1, z], [x0, y1, z]]
}

/// Window coordinates to normalized device coordinates for a
/// `width` x `height` framebuffer.
pub fn window_to_ndc(x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
    (
        x / width as f32 * 2.0 - 1.0,
        y / height as f32 * 2.0 - 1.0,
    )
}

/// A four-vertex buffer with its vertex array, refilled before each draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadBuffer {
    pub buffer: BufferId,
    pub vertex_array: VertexArrayId,
}

impl QuadBuffer {
    pub fn create<D: GpuResources + ?Sized>(
        driver: &mut D,
        layout: &VertexLayout,
    ) -> Result<Self, MetaError> {
        let buffer = driver.create_buffer(4 * layout.stride as usize)?;
        let vertex_array = match driver.create_vertex_array(buffer, layout) {
            Ok(vao) => vao,
            Err(err) => {
                driver.delete_buffer(buffer);
                return Err(err.into());
            }
        };
        Ok(Self {
            buffer,
            vertex_array,
        })
    }

    /// Upload `vertices` and bind the vertex array on `ctx`.
    pub fn load<D: GpuResources + ?Sized, V: Pod>(
        &self,
        ctx: &mut RenderContext,
        driver: &mut D,
        vertices: &[V; 4],
    ) -> Result<(), MetaError> {
        driver.buffer_sub_data(self.buffer, 0, bytemuck::cast_slice(vertices))?;
        ctx.set_vertex(VertexState {
            vertex_array: Some(self.vertex_array),
            array_buffer: Some(self.buffer),
        });
        Ok(())
    }

    pub fn destroy<D: GpuResources + ?Sized>(self, driver: &mut D) {
        driver.delete_vertex_array(self.vertex_array);
        driver.delete_buffer(self.buffer);
    }
}
