// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Render Module
//!
//! Two-stage layer compositing on top of the [`Gpu`](crate::gpu::Gpu) context.
//!
//! ## Submodules
//! - `shader`: program compile / link and the typed binding table
//! - `shader_source`: built-in sprite and composite GLSL
//! - `transform`: 2D affine matrices, world transform
//! - `geometry`: quad vertex buffers
//! - `texture`: sprite sheet and render target textures
//! - `target`: offscreen render targets and the display
//! - `blend`: blend modes and the armed blend controller
//! - `sprite`: drawable sprite with async texture state
//! - `compositor`: per-frame layer pipeline

pub mod blend;
pub mod compositor;
pub mod geometry;
pub mod shader;
pub mod shader_source;
pub mod sprite;
pub mod target;
pub mod texture;
pub mod transform;

pub use blend::{BlendController, BlendMode};
pub use compositor::{Compositor, RenderError};
pub use geometry::{rect_array, GeometryBuffer};
pub use shader::{
    AttribLayout, BindError, BindingTable, ParamDesc, ParamKind, ShaderError, ShaderProgram,
    UniformValue, ValueType,
};
pub use sprite::{Sprite, SpriteError, SpriteState};
pub use target::{Display, RenderTarget, TargetError};
pub use texture::{ImageData, Texture};
pub use transform::{world_transform, Mat3};

/// Bind errors never abort a draw, they are reported and the draw goes on.
pub(crate) fn log_bind_error(r: Result<(), BindError>) {
    if let Err(e) = r {
        log::warn!("bind skipped: {}", e);
    }
}
