//! Per-context meta state: caches, counters and the save stack, plus the
//! draw plumbing every operation shares.

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::backend::{
    FramebufferId, GpuResources, SamplerDesc, SamplerId, ShaderCompiler, TextureTarget,
};
use crate::config::MetaConfig;
use crate::context::RenderContext;
use crate::error::MetaError;
use crate::format::InternalFormat;
use crate::geometry::{DrawTexVertex, Primitive, QuadBuffer, Vertex};
use crate::ops::decompress::DecompressTargets;
use crate::save::{SaveMask, SaveStack};
use crate::shaders::ShaderCache;
use crate::stats::{MetaStats, MetaStatsSnapshot};
use crate::temp_texture::{TempPurpose, TempTexture, TempTextures};

/// Everything the meta layer keeps for one rendering context.
///
/// Resources are created lazily by the first operation that needs them
/// and live until [`MetaState::cleanup`].
#[derive(Debug)]
pub struct MetaState {
    pub(crate) config: MetaConfig,
    pub(crate) save: SaveStack,
    pub(crate) stats: MetaStats,
    pub(crate) temp: TempTextures,
    pub(crate) shaders: ShaderCache,
    pub(crate) decompress: DecompressTargets,
    pub(crate) mipmap_framebuffer: Option<FramebufferId>,
    samplers: HashMap<SamplerDesc, SamplerId>,
    quad: Option<QuadBuffer>,
    draw_tex_quad: Option<QuadBuffer>,
}

impl Default for MetaState {
    fn default() -> Self {
        Self::new(MetaConfig::default())
    }
}

impl MetaState {
    pub fn new(config: MetaConfig) -> Self {
        Self {
            config,
            save: SaveStack::new(),
            stats: MetaStats::new(),
            temp: TempTextures::default(),
            shaders: ShaderCache::new(),
            decompress: DecompressTargets::default(),
            mipmap_framebuffer: None,
            samplers: HashMap::new(),
            quad: None,
            draw_tex_quad: None,
        }
    }

    pub fn config(&self) -> &MetaConfig {
        &self.config
    }

    pub fn save_stack(&self) -> &SaveStack {
        &self.save
    }

    pub fn temp_textures(&self) -> &TempTextures {
        &self.temp
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    pub fn stats(&self) -> MetaStatsSnapshot {
        self.stats.snapshot(&self.save)
    }

    /// Open a save region on `ctx`. See [`SaveStack::begin`].
    pub fn begin(&mut self, ctx: &mut RenderContext, mask: SaveMask) {
        self.save.begin(ctx, mask);
    }

    /// Close the innermost save region. See [`SaveStack::end`].
    pub fn end(&mut self, ctx: &mut RenderContext) {
        self.save.end(ctx);
    }

    /// Release every backend object the meta layer created.
    pub fn cleanup<D: GpuResources + ShaderCompiler + ?Sized>(&mut self, driver: &mut D) {
        self.temp.cleanup(driver);
        self.shaders.cleanup(driver);
        self.decompress.cleanup(driver);
        for (_, sampler) in self.samplers.drain() {
            driver.delete_sampler(sampler);
        }
        if let Some(fb) = self.mipmap_framebuffer.take() {
            driver.delete_framebuffer(fb);
        }
        if let Some(quad) = self.quad.take() {
            quad.destroy(driver);
        }
        if let Some(quad) = self.draw_tex_quad.take() {
            quad.destroy(driver);
        }
        debug!("meta resources released");
    }

    pub(crate) fn fallback(&self, op: &'static str, reason: &'static str) {
        self.stats.inc_fallbacks();
        debug!(op, reason, "meta op using software path");
    }

    /// Fold an operation's outcome into the context error flag.
    pub(crate) fn finish(
        &self,
        ctx: &mut RenderContext,
        op: &'static str,
        result: Result<(), MetaError>,
    ) {
        if let Err(err) = result {
            warn!(op, %err, "meta operation failed");
            ctx.record_error(err.context_error());
        }
    }

    pub(crate) fn sampler<D: GpuResources + ?Sized>(
        &mut self,
        driver: &mut D,
        desc: SamplerDesc,
    ) -> Result<SamplerId, MetaError> {
        if let Some(&sampler) = self.samplers.get(&desc) {
            return Ok(sampler);
        }
        let sampler = driver.create_sampler(&desc)?;
        debug!(?desc, %sampler, "created meta sampler");
        self.samplers.insert(desc, sampler);
        Ok(sampler)
    }

    /// Reserve the `purpose` scratch texture for a `width` x `height` image.
    /// Returns a copy of its layout and whether storage must be respecified.
    pub(crate) fn prepare_temp<D: GpuResources + ?Sized>(
        &mut self,
        purpose: TempPurpose,
        ctx: &RenderContext,
        driver: &mut D,
        width: u32,
        height: u32,
        format: InternalFormat,
    ) -> Result<(TempTexture, bool), MetaError> {
        let temp = self
            .temp
            .get_or_create(purpose, &ctx.caps, &self.config, driver)?;
        let realloc = temp.alloc(width, height, format);
        if realloc {
            self.stats.inc_temp_reallocations();
        }
        Ok((temp.clone(), realloc))
    }

    /// Target and size limit of the `purpose` scratch texture, creating it
    /// if needed.
    pub(crate) fn temp_layout<D: GpuResources + ?Sized>(
        &mut self,
        purpose: TempPurpose,
        ctx: &RenderContext,
        driver: &mut D,
    ) -> Result<(TextureTarget, u32), MetaError> {
        let temp = self
            .temp
            .get_or_create(purpose, &ctx.caps, &self.config, driver)?;
        Ok((temp.target, temp.max_size))
    }

    pub(crate) fn draw_quad<D: GpuResources + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        vertices: &[Vertex; 4],
        instances: u32,
    ) -> Result<(), MetaError> {
        let quad = match self.quad {
            Some(quad) => quad,
            None => *self.quad.insert(QuadBuffer::create(driver, &Vertex::LAYOUT)?),
        };
        quad.load(ctx, driver, vertices)?;
        driver.draw_arrays(ctx, Primitive::TriangleFan, 0, 4, instances.max(1));
        self.stats.inc_meta_draws();
        Ok(())
    }

    pub(crate) fn draw_tex_vertices<D: GpuResources + ?Sized>(
        &mut self,
        ctx: &mut RenderContext,
        driver: &mut D,
        vertices: &[DrawTexVertex; 4],
    ) -> Result<(), MetaError> {
        let quad = match self.draw_tex_quad {
            Some(quad) => quad,
            None => *self
                .draw_tex_quad
                .insert(QuadBuffer::create(driver, &DrawTexVertex::LAYOUT)?),
        };
        quad.load(ctx, driver, vertices)?;
        driver.draw_arrays(ctx, Primitive::TriangleFan, 0, 4, 1);
        self.stats.inc_meta_draws();
        Ok(())
    }
}
