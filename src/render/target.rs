// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Render Targets
//!
//! An offscreen surface that receives draws while active and can draw
//! itself, as a textured full-screen quad, onto whatever destination is
//! active:
//!
//! ```text
//! activate(A) ─▶ draw sprites into A
//! activate(B) ─▶ A.composite() ─▶ A's colour texture blended into B
//! Display::activate() ─▶ B.composite() ─▶ B blended onto the window
//! ```
//!
//! A target must never be composited while it is itself the active
//! destination, the compositor tracks this.

use super::{
    blend::BlendController,
    geometry::GeometryBuffer,
    log_bind_error,
    shader::{AttribLayout, ShaderProgram, UniformValue},
    shader_source::{FRAGMENT_SRC_COMPOSITE, VERTEX_SRC_COMPOSITE},
    texture::Texture,
};
use crate::gpu::Gpu;
use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("create render target: {0}")]
    Create(String),
    #[error("framebuffer incomplete, status 0x{0:x}")]
    Incomplete(u32),
}

/// Objects created so far by [`RenderTarget::create`], deleted when a later
/// step fails.
struct Partial<G: Gpu> {
    framebuffer: G::Framebuffer,
    depth: Option<G::Renderbuffer>,
    texture: Option<G::Texture>,
}

impl<G: Gpu> Partial<G> {
    fn abort(&self, gpu: &G, err: TargetError) -> TargetError {
        gpu.bind_renderbuffer(None);
        gpu.bind_framebuffer(None);
        if let Some(t) = self.texture {
            gpu.delete_texture(t);
        }
        if let Some(d) = self.depth {
            gpu.delete_renderbuffer(d);
        }
        gpu.delete_framebuffer(self.framebuffer);
        err
    }
}

/// Full-screen quad: uv (0,0)-(1,1) and clip space (-1,-1)-(1,1).
fn quad_buffers<G: Gpu>(gpu: &G) -> Result<(GeometryBuffer<G>, GeometryBuffer<G>), String> {
    let uv = GeometryBuffer::rect(gpu, 0.0, 0.0, 1.0, 1.0)?;
    match GeometryBuffer::rect(gpu, -1.0, -1.0, 2.0, 2.0) {
        Ok(position) => Ok((uv, position)),
        Err(e) => {
            uv.release(gpu);
            Err(e)
        }
    }
}

pub struct RenderTarget<G: Gpu> {
    width: u32,
    height: u32,
    framebuffer: G::Framebuffer,
    texture: Texture<G>,
    depth: G::Renderbuffer,
    position: GeometryBuffer<G>,
    uv: GeometryBuffer<G>,
    shader: ShaderProgram<G>,
}

impl<G: Gpu> RenderTarget<G> {
    /// Framebuffer with an RGBA8 colour texture and a 16 bit depth
    /// renderbuffer of the same size. Bindings are cleared on return and a
    /// failed step deletes whatever was already created. A composite program
    /// that fails to build leaves a target whose `composite` draws nothing.
    pub fn create(gpu: &G, width: u32, height: u32, ver: &str) -> Result<Self, TargetError> {
        let framebuffer = gpu.create_framebuffer().map_err(TargetError::Create)?;
        let mut partial = Partial {
            framebuffer,
            depth: None,
            texture: None,
        };
        gpu.bind_framebuffer(Some(framebuffer));
        let depth = gpu
            .create_renderbuffer()
            .map_err(|e| partial.abort(gpu, TargetError::Create(e)))?;
        partial.depth = Some(depth);
        gpu.bind_renderbuffer(Some(depth));
        let texture = Texture::empty(gpu, width, height)
            .map_err(|e| partial.abort(gpu, TargetError::Create(e)))?;
        partial.texture = Some(texture.handle());

        gpu.renderbuffer_storage(glow::DEPTH_COMPONENT16, width as i32, height as i32);
        gpu.framebuffer_color_texture(Some(texture.handle()));
        gpu.framebuffer_depth_renderbuffer(Some(depth));

        let status = gpu.check_framebuffer_status();
        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(partial.abort(gpu, TargetError::Incomplete(status)));
        }
        gpu.bind_renderbuffer(None);
        gpu.bind_framebuffer(None);

        let (uv, position) =
            quad_buffers(gpu).map_err(|e| partial.abort(gpu, TargetError::Create(e)))?;
        let shader =
            ShaderProgram::compile_or_invalid(gpu, ver, VERTEX_SRC_COMPOSITE, FRAGMENT_SRC_COMPOSITE);
        info!("render target {}x{} created", width, height);

        Ok(Self {
            width,
            height,
            framebuffer,
            texture,
            depth,
            position,
            uv,
            shader,
        })
    }

    /// Makes this target the draw destination.
    pub fn activate(&self, gpu: &G) {
        gpu.bind_framebuffer(Some(self.framebuffer));
        gpu.viewport(0, 0, self.width as i32, self.height as i32);
    }

    /// Draws the colour texture as a full quad into the active destination,
    /// using the blend mode armed on `blend`. No-op with an invalid program.
    pub fn composite(&self, gpu: &G, blend: &mut BlendController) {
        if !self.shader.is_valid() {
            debug!("composite skipped, invalid shader");
            return;
        }
        self.shader.bind(gpu);

        self.texture.bind(gpu, 0);
        log_bind_error(self.shader.set_uniform(gpu, "u_image", UniformValue::Sampler(0)));

        self.uv.bind(gpu);
        log_bind_error(self.shader.set_attribute(gpu, "a_texCoord", AttribLayout::default()));
        self.position.bind(gpu);
        log_bind_error(self.shader.set_attribute(gpu, "a_position", AttribLayout::default()));

        blend.consume();
        gpu.draw_arrays(glow::TRIANGLE_STRIP, 0, self.position.vertex_count());

        self.shader.unbind(gpu);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn framebuffer(&self) -> G::Framebuffer {
        self.framebuffer
    }

    pub fn texture(&self) -> G::Texture {
        self.texture.handle()
    }

    pub fn is_valid(&self) -> bool {
        self.shader.is_valid()
    }

    pub fn release(mut self, gpu: &G) {
        self.shader.release(gpu);
        self.position.release(gpu);
        self.uv.release(gpu);
        self.texture.release(gpu);
        gpu.delete_renderbuffer(self.depth);
        gpu.delete_framebuffer(self.framebuffer);
    }
}

/// The window's default framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Display {
    pub width: u32,
    pub height: u32,
}

impl Display {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn activate<G: Gpu>(&self, gpu: &G) {
        gpu.bind_framebuffer(None);
        gpu.viewport(0, 0, self.width as i32, self.height as i32);
    }
}
