// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! pixel_compositor renders a layered 2D sprite scene on an OpenGL-class GPU.
//!
//! Every layer is drawn into a shared offscreen render target, merged into an
//! accumulation target with the layer's blend mode, and the accumulation target
//! is finally alpha-blitted onto the display. Shader inputs are discovered by
//! program introspection, so draw code binds parameters by name only.
//!
//! Modules:
//! - `gpu`: explicit GPU context trait with a glow backend and a trace backend
//! - `render`: shader binding tables, geometry, textures, render targets,
//!   blend control, sprites and the compositor
//! - `scene`: serde scene descriptor (sprites and layers)
//! - `asset`: background image decoding with one-shot completion events
//! - `config`: toml settings
//! - `log`: log4rs setup
//!
//! The compositor never owns a window. The `window` feature adds a winit +
//! glutin runner binary which creates the GL context and drives one frame per
//! redraw.

/// framerate of the window runner
pub const GAME_FRAME: u32 = 60;

/// vertical resolution the world transform maps sprites into
pub const VIRTUAL_HEIGHT: f32 = 240.0;

pub mod asset;
pub mod config;
pub mod gpu;
#[cfg(feature = "log4rs")]
pub mod log;
pub mod render;
pub mod scene;

pub use config::Config;
pub use gpu::Gpu;
#[cfg(any(test, feature = "trace"))]
pub use gpu::TraceGpu;
pub use render::{BlendMode, Compositor};
