//! `aero-meta` implements GL pixel and framebuffer operations (clear,
//! copy/draw pixels, bitmap, framebuffer blit, mipmap generation, texture
//! sub-image copy/clear/read-back and `glDrawTex`) by drawing textured quads
//! on the caller's own render pipeline.
//!
//! Every operation brackets its work in a [`SaveStack`] region so the
//! caller's [`RenderContext`] is left exactly as it was found, and routes to
//! the backend's [`SwrastFallback`] hooks whenever the hardware path cannot
//! produce an exact result.
//!
//! The crate does not talk to a GPU itself: resource creation, draws and
//! read-backs go through the [`GpuResources`] and [`ShaderCompiler`] traits
//! supplied by the driver.

mod meta;
mod ops;

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod geometry;
pub mod pixels;
pub mod save;
pub mod shaders;
pub mod stats;
pub mod temp_texture;
pub mod texcoords;
pub mod tiling;

pub use backend::{GpuResources, MetaDriver, ShaderCompiler, SwrastFallback};
pub use config::MetaConfig;
pub use context::{Capabilities, ContextError, RenderContext};
pub use error::{BackendError, MetaError};
pub use meta::MetaState;
pub use ops::BlitRect;
pub use save::{SaveMask, SaveStack};
pub use stats::MetaStatsSnapshot;
