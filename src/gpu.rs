// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # GPU Context
//!
//! Every rendering component receives the GPU context explicitly, there is no
//! ambient global context. [`Gpu`] is the narrow slice of the OpenGL / WebGL2
//! API the compositor needs, with enums expressed as `glow` constants:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Compositor ──▶ RenderTarget / Sprite ──▶ ShaderProgram   │
//! │                         │                                │
//! │                         ▼                                │
//! │                  &G where G: Gpu                         │
//! │          ┌──────────────┴───────────────┐                │
//! │   glow::Context (driver)       TraceGpu (headless)       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The glow backend issues real driver calls and requires the GL context to be
//! current on the calling thread. The trace backend records the call stream and
//! keeps a flat colour model, it backs the test suite and is built with the
//! `trace` feature.

/// glow::Context backend
pub mod glow_backend;

/// Recording backend with a flat colour model
#[cfg(any(test, feature = "trace"))]
pub mod trace;

#[cfg(any(test, feature = "trace"))]
pub use trace::{GlCall, TraceGpu};

/// An active attribute or uniform as reported by program introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInput {
    pub name: String,
    /// GL type enum, e.g. `glow::FLOAT_VEC2`
    pub gl_type: u32,
    /// array length, 1 for plain variables
    pub size: i32,
}

/// OpenGL-class GPU context.
///
/// Method names follow the GL entry points they wrap. Handles are opaque
/// backend types; `Option` parameters mean "bind nothing".
pub trait Gpu {
    type Shader: Copy;
    type Program: Copy + PartialEq;
    type Buffer: Copy;
    type Texture: Copy + PartialEq;
    type Framebuffer: Copy + PartialEq;
    type Renderbuffer: Copy;
    type VertexArray: Copy;
    type UniformLocation: Clone;

    // shader & program objects
    fn create_shader(&self, stage: u32) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    // introspection
    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveInput>;
    fn active_uniforms(&self, program: Self::Program) -> Vec<ActiveInput>;
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    // uniform uploads
    fn uniform_1_f32(&self, location: &Self::UniformLocation, x: f32);
    fn uniform_2_f32(&self, location: &Self::UniformLocation, x: f32, y: f32);
    fn uniform_3_f32(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32);
    fn uniform_4_f32(&self, location: &Self::UniformLocation, x: f32, y: f32, z: f32, w: f32);
    fn uniform_1_i32(&self, location: &Self::UniformLocation, x: i32);
    fn uniform_matrix_3_f32(&self, location: &Self::UniformLocation, m: &[f32; 9]);
    fn uniform_matrix_4_f32(&self, location: &Self::UniformLocation, m: &[f32; 16]);

    // vertex input
    fn enable_vertex_attrib_array(&self, index: u32);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vao: Self::VertexArray);

    // buffers
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_array_buffer(&self, buffer: Option<Self::Buffer>);
    /// Uploads `data` to the bound `ARRAY_BUFFER` with `STATIC_DRAW` usage.
    fn array_buffer_data(&self, data: &[f32]);
    fn delete_buffer(&self, buffer: Self::Buffer);

    // textures
    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<Self::Texture>);
    fn tex_parameter_i32(&self, parameter: u32, value: i32);
    /// RGBA8 upload to the bound `TEXTURE_2D`; `None` allocates storage only.
    fn tex_image_2d_rgba(&self, width: i32, height: i32, pixels: Option<&[u8]>);
    fn delete_texture(&self, texture: Self::Texture);

    // framebuffers
    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    fn framebuffer_color_texture(&self, texture: Option<Self::Texture>);
    fn framebuffer_depth_renderbuffer(&self, renderbuffer: Option<Self::Renderbuffer>);
    fn check_framebuffer_status(&self) -> u32;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn create_renderbuffer(&self) -> Result<Self::Renderbuffer, String>;
    fn bind_renderbuffer(&self, renderbuffer: Option<Self::Renderbuffer>);
    fn renderbuffer_storage(&self, internal_format: u32, width: i32, height: i32);
    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer);

    // global state & drawing
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);
    fn enable(&self, capability: u32);
    fn disable(&self, capability: u32);
    fn blend_func(&self, src: u32, dst: u32);
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
    fn flush(&self);
}
