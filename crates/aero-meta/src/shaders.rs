//! GLSL programs used by meta draws.
//!
//! Blit programs live in one slot per sampler kind. The remaining helper
//! programs (clears, stencil bit-planes, depth writes) are cached by key.
//! A failed compile leaves the slot empty; callers route to a fallback.

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::backend::{ProgramId, ShaderCompiler, ShaderStage, TextureTarget};
use crate::context::Capabilities;
use crate::geometry::{ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_TEXCOORD};
use crate::stats::MetaStats;

const MODERN_GLSL: u32 = 130;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Tex1D,
    Tex2D,
    Rect,
    Tex3D,
    Cube,
    Tex1DArray,
    Tex2DArray,
    CubeArray,
}

impl SamplerKind {
    pub fn for_target(target: TextureTarget) -> Self {
        match target {
            TextureTarget::Tex1D => Self::Tex1D,
            TextureTarget::Tex2D => Self::Tex2D,
            TextureTarget::Rect => Self::Rect,
            TextureTarget::Tex3D => Self::Tex3D,
            TextureTarget::Cube => Self::Cube,
            TextureTarget::Tex1DArray => Self::Tex1DArray,
            TextureTarget::Tex2DArray => Self::Tex2DArray,
            TextureTarget::CubeArray => Self::CubeArray,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// `(sampler type, legacy sampling function, texcoord swizzle)`.
    fn glsl(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Self::Tex1D => ("sampler1D", "texture1D", ".x"),
            Self::Tex2D => ("sampler2D", "texture2D", ".xy"),
            Self::Rect => ("sampler2DRect", "texture2DRect", ".xy"),
            Self::Tex3D => ("sampler3D", "texture3D", ".xyz"),
            Self::Cube => ("samplerCube", "textureCube", ".xyz"),
            Self::Tex1DArray => ("sampler1DArray", "texture1DArray", ".xy"),
            Self::Tex2DArray => ("sampler2DArray", "texture2DArray", ".xyz"),
            Self::CubeArray => ("samplerCubeArray", "textureCubeArray", ".xyzw"),
        }
    }

    fn extensions(self, modern: bool) -> &'static str {
        match self {
            Self::Rect if !modern => "#extension GL_ARB_texture_rectangle : enable\n",
            Self::Tex1DArray | Self::Tex2DArray if !modern => {
                "#extension GL_EXT_texture_array : enable\n"
            }
            Self::CubeArray => "#extension GL_ARB_texture_cube_map_array : enable\n",
            _ => "",
        }
    }

    fn supported(self, caps: &Capabilities) -> bool {
        match self {
            Self::Tex1DArray | Self::Tex2DArray => caps.texture_arrays,
            Self::CubeArray => caps.cube_map_arrays && caps.glsl_version >= MODERN_GLSL,
            Self::Rect => caps.rectangle_textures,
            _ => true,
        }
    }
}

/// Blit program slot for one sampler kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlitShaderSlot {
    pub sampler_type: &'static str,
    pub legacy_fn: &'static str,
    pub texcoords: &'static str,
    pub program: Option<ProgramId>,
}

impl BlitShaderSlot {
    fn new(kind: SamplerKind) -> Self {
        let (sampler_type, legacy_fn, texcoords) = kind.glsl();
        Self {
            sampler_type,
            legacy_fn,
            texcoords,
            program: None,
        }
    }
}

/// GLSL text pieces shared by every generated program.
struct Dialect {
    header: String,
    attribute: &'static str,
    varying_out: &'static str,
    varying_in: &'static str,
    frag_out_decl: &'static str,
    frag_color: &'static str,
    modern: bool,
}

impl Dialect {
    fn new(caps: &Capabilities, extensions: &str) -> Self {
        let modern = caps.glsl_version >= MODERN_GLSL;
        if modern {
            Self {
                header: format!("#version {MODERN_GLSL}\n{extensions}"),
                attribute: "in",
                varying_out: "out",
                varying_in: "in",
                frag_out_decl: "out vec4 out_color;\n",
                frag_color: "out_color",
                modern,
            }
        } else {
            Self {
                header: format!("#version 110\n{extensions}"),
                attribute: "attribute",
                varying_out: "varying",
                varying_in: "varying",
                frag_out_decl: "",
                frag_color: "gl_FragColor",
                modern,
            }
        }
    }

    fn sample(&self, slot: &BlitShaderSlot) -> String {
        let func = if self.modern { "texture" } else { slot.legacy_fn };
        format!("{func}(texSampler, texCoords{})", slot.texcoords)
    }

    fn textured_vs(&self) -> String {
        format!(
            "{header}{attr} vec3 position;\n\
             {attr} vec4 textureCoords;\n\
             {out} vec4 texCoords;\n\
             void main()\n\
             {{\n\
             \x20  texCoords = textureCoords;\n\
             \x20  gl_Position = vec4(position, 1.0);\n\
             }}\n",
            header = self.header,
            attr = self.attribute,
            out = self.varying_out,
        )
    }

    fn position_vs(&self) -> String {
        format!(
            "{header}{attr} vec3 position;\n\
             void main()\n\
             {{\n\
             \x20  gl_Position = vec4(position, 1.0);\n\
             }}\n",
            header = self.header,
            attr = self.attribute,
        )
    }
}

/// Helper programs other than the per-sampler blits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UtilityProgram {
    /// Solid color from the `color` uniform.
    Clear,
    /// Solid color written to layer `gl_InstanceID`.
    ClearLayered,
    /// Integer color from the `color` uniform.
    ClearInteger,
    /// Discards fragments whose sampled alpha lacks bit `log2(bit)`.
    StencilBit(SamplerKind),
    /// Writes the sampled texel as depth, colored by the `color` uniform.
    DepthFromTexture(SamplerKind),
}

impl UtilityProgram {
    fn sampler(self) -> Option<SamplerKind> {
        match self {
            Self::StencilBit(kind) | Self::DepthFromTexture(kind) => Some(kind),
            _ => None,
        }
    }

    fn supported(self, caps: &Capabilities) -> bool {
        if !caps.has_glsl() {
            return false;
        }
        match self {
            Self::ClearLayered => caps.glsl_version >= MODERN_GLSL && caps.vertex_shader_layer,
            Self::ClearInteger => caps.glsl_version >= MODERN_GLSL,
            Self::StencilBit(kind) | Self::DepthFromTexture(kind) => kind.supported(caps),
            Self::Clear => true,
        }
    }

    fn sources(self, caps: &Capabilities) -> (String, String) {
        let extensions = match self {
            Self::ClearLayered => "#extension GL_AMD_vertex_shader_layer : enable\n",
            _ => self
                .sampler()
                .map(|kind| kind.extensions(caps.glsl_version >= MODERN_GLSL))
                .unwrap_or(""),
        };
        let d = Dialect::new(caps, extensions);
        let out = d.frag_color;

        match self {
            Self::Clear => (
                d.position_vs(),
                format!(
                    "{}{}uniform vec4 color;\nvoid main()\n{{\n   {out} = color;\n}}\n",
                    d.header, d.frag_out_decl
                ),
            ),
            Self::ClearLayered => (
                format!(
                    "{}in vec3 position;\nvoid main()\n{{\n   gl_Layer = gl_InstanceID;\n   gl_Position = vec4(position, 1.0);\n}}\n",
                    d.header
                ),
                format!(
                    "{}{}uniform vec4 color;\nvoid main()\n{{\n   {out} = color;\n}}\n",
                    d.header, d.frag_out_decl
                ),
            ),
            Self::ClearInteger => (
                d.position_vs(),
                format!(
                    "{}uniform ivec4 color;\nout ivec4 out_color;\nvoid main()\n{{\n   out_color = color;\n}}\n",
                    d.header
                ),
            ),
            Self::StencilBit(kind) => {
                let slot = BlitShaderSlot::new(kind);
                (
                    d.textured_vs(),
                    format!(
                        "{header}{decl}uniform {sampler} texSampler;\n\
                         uniform float bit;\n\
                         {vin} vec4 texCoords;\n\
                         void main()\n\
                         {{\n\
                         \x20  float a = {sample}.a;\n\
                         \x20  if (mod(floor(a * 255.0 / bit), 2.0) < 0.5)\n\
                         \x20     discard;\n\
                         \x20  {out} = vec4(0.0);\n\
                         }}\n",
                        header = d.header,
                        decl = d.frag_out_decl,
                        sampler = slot.sampler_type,
                        vin = d.varying_in,
                        sample = d.sample(&slot),
                    ),
                )
            }
            Self::DepthFromTexture(kind) => {
                let slot = BlitShaderSlot::new(kind);
                (
                    d.textured_vs(),
                    format!(
                        "{header}{decl}uniform {sampler} texSampler;\n\
                         uniform vec4 color;\n\
                         {vin} vec4 texCoords;\n\
                         void main()\n\
                         {{\n\
                         \x20  gl_FragDepth = {sample}.x;\n\
                         \x20  {out} = color;\n\
                         }}\n",
                        header = d.header,
                        decl = d.frag_out_decl,
                        sampler = slot.sampler_type,
                        vin = d.varying_in,
                        sample = d.sample(&slot),
                    ),
                )
            }
        }
    }
}

/// CPU mirror of the [`UtilityProgram::StencilBit`] fragment test:
/// whether bit `bit` is set in the stencil byte stored as `alpha`.
pub fn stencil_bit_set(alpha: f32, bit: u32) -> bool {
    let value = (alpha * 255.0 / (1u32 << bit) as f32).floor();
    value % 2.0 >= 0.5
}

fn build_program<D: ShaderCompiler + ?Sized>(
    driver: &mut D,
    stats: &MetaStats,
    name: &str,
    vs: &str,
    fs: &str,
    attributes: &[(u32, &str)],
) -> Option<ProgramId> {
    let vertex = match driver.compile_shader(ShaderStage::Vertex, vs) {
        Ok(shader) => shader,
        Err(log) => {
            warn!(program = name, %log, "meta vertex shader failed to compile");
            stats.inc_program_compile_failures();
            return None;
        }
    };
    let fragment = match driver.compile_shader(ShaderStage::Fragment, fs) {
        Ok(shader) => shader,
        Err(log) => {
            warn!(program = name, %log, "meta fragment shader failed to compile");
            driver.delete_shader(vertex);
            stats.inc_program_compile_failures();
            return None;
        }
    };

    let linked = driver.link_program(vertex, fragment, attributes);
    driver.delete_shader(vertex);
    driver.delete_shader(fragment);
    match linked {
        Ok(program) => {
            debug!(program = name, id = %program, "compiled meta program");
            stats.inc_program_compiles();
            Some(program)
        }
        Err(log) => {
            warn!(program = name, %log, "meta program failed to link");
            stats.inc_program_compile_failures();
            None
        }
    }
}

const TEXTURED_ATTRIBUTES: &[(u32, &str)] = &[
    (ATTRIB_POSITION, "position"),
    (ATTRIB_TEXCOORD, "textureCoords"),
];
const POSITION_ATTRIBUTES: &[(u32, &str)] = &[(ATTRIB_POSITION, "position"), (ATTRIB_COLOR, "color")];

/// Compiled programs owned by one context.
#[derive(Debug)]
pub struct ShaderCache {
    blit: [BlitShaderSlot; 8],
    utility: HashMap<UtilityProgram, ProgramId>,
}

impl Default for ShaderCache {
    fn default() -> Self {
        Self {
            blit: [
                SamplerKind::Tex1D,
                SamplerKind::Tex2D,
                SamplerKind::Rect,
                SamplerKind::Tex3D,
                SamplerKind::Cube,
                SamplerKind::Tex1DArray,
                SamplerKind::Tex2DArray,
                SamplerKind::CubeArray,
            ]
            .map(BlitShaderSlot::new),
            utility: HashMap::new(),
        }
    }
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blit_slot(&self, kind: SamplerKind) -> &BlitShaderSlot {
        &self.blit[kind.index()]
    }

    /// Source of the blit program for `kind`: `(vertex, fragment)`.
    pub fn blit_sources(&self, kind: SamplerKind, caps: &Capabilities) -> (String, String) {
        let slot = self.blit_slot(kind);
        let d = Dialect::new(caps, kind.extensions(caps.glsl_version >= MODERN_GLSL));
        let fs = format!(
            "{header}{decl}uniform {sampler} texSampler;\n\
             {vin} vec4 texCoords;\n\
             void main()\n\
             {{\n\
             \x20  {out} = {sample};\n\
             \x20  gl_FragDepth = {out}.x;\n\
             }}\n",
            header = d.header,
            decl = d.frag_out_decl,
            sampler = slot.sampler_type,
            vin = d.varying_in,
            out = d.frag_color,
            sample = d.sample(slot),
        );
        (d.textured_vs(), fs)
    }

    /// The blit program sampling `kind`, compiling it on first use.
    pub fn ensure_blit<D: ShaderCompiler + ?Sized>(
        &mut self,
        kind: SamplerKind,
        caps: &Capabilities,
        stats: &MetaStats,
        driver: &mut D,
    ) -> Option<ProgramId> {
        if let Some(program) = self.blit[kind.index()].program {
            stats.inc_program_cache_hits();
            return Some(program);
        }
        if !caps.has_glsl() || !kind.supported(caps) {
            debug!(?kind, "no blit program for sampler kind");
            return None;
        }

        let (vs, fs) = self.blit_sources(kind, caps);
        let program = build_program(driver, stats, "blit", &vs, &fs, TEXTURED_ATTRIBUTES)?;
        self.blit[kind.index()].program = Some(program);
        Some(program)
    }

    pub fn ensure_utility<D: ShaderCompiler + ?Sized>(
        &mut self,
        which: UtilityProgram,
        caps: &Capabilities,
        stats: &MetaStats,
        driver: &mut D,
    ) -> Option<ProgramId> {
        if let Some(&program) = self.utility.get(&which) {
            stats.inc_program_cache_hits();
            return Some(program);
        }
        if !which.supported(caps) {
            debug!(?which, "meta program unavailable on this device");
            return None;
        }

        let (vs, fs) = which.sources(caps);
        let attributes = if which.sampler().is_some() {
            TEXTURED_ATTRIBUTES
        } else {
            POSITION_ATTRIBUTES
        };
        let program = build_program(driver, stats, "utility", &vs, &fs, attributes)?;
        self.utility.insert(which, program);
        Some(program)
    }

    /// Release every cached program.
    pub fn cleanup<D: ShaderCompiler + ?Sized>(&mut self, driver: &mut D) {
        for slot in self.blit.iter_mut() {
            if let Some(program) = slot.program.take() {
                driver.delete_program(program);
            }
        }
        for (_, program) in self.utility.drain() {
            driver.delete_program(program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_plane_law_holds_for_every_byte() {
        for a in 0u32..=255 {
            let alpha = a as f32 / 255.0;
            for bit in 0..8 {
                assert_eq!(
                    stencil_bit_set(alpha, bit),
                    (a >> bit) & 1 == 1,
                    "alpha {a} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn modern_blit_source_uses_texture_builtin() {
        let cache = ShaderCache::new();
        let caps = Capabilities::default();
        let (vs, fs) = cache.blit_sources(SamplerKind::Tex2DArray, &caps);
        assert!(vs.starts_with("#version 130\n"));
        assert!(vs.contains("in vec4 textureCoords;"));
        assert!(fs.contains("uniform sampler2DArray texSampler;"));
        assert!(fs.contains("out_color = texture(texSampler, texCoords.xyz);"));
    }

    #[test]
    fn legacy_blit_source_uses_named_sampling_function() {
        let cache = ShaderCache::new();
        let caps = Capabilities {
            glsl_version: 120,
            ..Capabilities::default()
        };
        let (vs, fs) = cache.blit_sources(SamplerKind::Rect, &caps);
        assert!(vs.starts_with("#version 110\n"));
        assert!(vs.contains("attribute vec3 position;"));
        assert!(fs.contains("#extension GL_ARB_texture_rectangle : enable"));
        assert!(fs.contains("gl_FragColor = texture2DRect(texSampler, texCoords.xy);"));
    }

    #[test]
    fn layered_clear_sets_layer_from_instance() {
        let (vs, _) = UtilityProgram::ClearLayered.sources(&Capabilities::default());
        assert!(vs.contains("gl_Layer = gl_InstanceID;"));
        assert!(vs.contains("GL_AMD_vertex_shader_layer"));
    }

    #[test]
    fn unsupported_programs_are_reported() {
        let caps = Capabilities {
            cube_map_arrays: false,
            ..Capabilities::default()
        };
        assert!(!SamplerKind::CubeArray.supported(&caps));
        let caps = Capabilities {
            glsl_version: 0,
            ..Capabilities::default()
        };
        assert!(!UtilityProgram::Clear.supported(&caps));
    }
}
