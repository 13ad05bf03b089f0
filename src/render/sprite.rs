// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Sprite is a textured quad drawn with a shared shader program.
//!
//! Its texture arrives asynchronously:
//!
//! ```text
//! Unloaded ──begin_load──▶ Loading ──on_loaded──▶ Ready
//!                              └────on_load_failed──▶ Failed
//! ```
//!
//! Only a Ready sprite draws, every other state makes `draw` a no-op that
//! touches no GPU state. The sprite sheet is addressed by frame cell: the
//! declared size over the image size gives one cell in uv units.

use super::{
    blend::BlendController,
    geometry::GeometryBuffer,
    log_bind_error,
    shader::{AttribLayout, ShaderProgram, UniformValue},
    texture::{ImageData, Texture},
    transform::Mat3,
};
use crate::gpu::Gpu;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;

pub const DEFAULT_SPRITE_SIZE: f32 = 64.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SpriteState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum SpriteError {
    #[error("sprite texture already loaded")]
    AlreadyLoaded,
    #[error("sprite upload failed: {0}")]
    Upload(String),
}

struct SpriteResources<G: Gpu> {
    texture: Texture<G>,
    uv: GeometryBuffer<G>,
    position: GeometryBuffer<G>,
    uv_scale: (f32, f32),
}

pub struct Sprite<G: Gpu> {
    image_path: String,
    shader: Rc<ShaderProgram<G>>,
    width: f32,
    height: f32,
    state: SpriteState,
    res: Option<SpriteResources<G>>,
}

impl<G: Gpu> Sprite<G> {
    pub fn new(image_path: &str, shader: Rc<ShaderProgram<G>>, width: f32, height: f32) -> Self {
        Self {
            image_path: image_path.to_string(),
            shader,
            width,
            height,
            state: SpriteState::Unloaded,
            res: None,
        }
    }

    pub fn image_path(&self) -> &str {
        &self.image_path
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn state(&self) -> &SpriteState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SpriteState::Ready
    }

    /// Size of one sprite sheet cell in uv units, known once Ready.
    pub fn uv_scale(&self) -> Option<(f32, f32)> {
        self.res.as_ref().map(|r| r.uv_scale)
    }

    pub fn begin_load(&mut self) {
        if self.state == SpriteState::Unloaded {
            self.state = SpriteState::Loading;
        }
    }

    fn settled(&self) -> bool {
        matches!(self.state, SpriteState::Ready | SpriteState::Failed(_))
    }

    /// Texture load completion. Uploads the image and builds the quad
    /// buffers; accepted once.
    pub fn on_loaded(&mut self, gpu: &G, image: &ImageData) -> Result<(), SpriteError> {
        if self.settled() {
            return Err(SpriteError::AlreadyLoaded);
        }
        let uv_scale = (
            self.width / image.width as f32,
            self.height / image.height as f32,
        );
        let res = Texture::from_image(gpu, image).and_then(|texture| {
            let buffers = GeometryBuffer::rect(gpu, 0.0, 0.0, uv_scale.0, uv_scale.1)
                .and_then(|uv| {
                    match GeometryBuffer::rect(gpu, 0.0, 0.0, self.width, self.height) {
                        Ok(position) => Ok((uv, position)),
                        Err(e) => {
                            uv.release(gpu);
                            Err(e)
                        }
                    }
                });
            match buffers {
                Ok((uv, position)) => Ok(SpriteResources {
                    texture,
                    uv,
                    position,
                    uv_scale,
                }),
                Err(e) => {
                    texture.release(gpu);
                    Err(e)
                }
            }
        });
        match res {
            Ok(r) => {
                self.res = Some(r);
                self.state = SpriteState::Ready;
                info!(
                    "sprite {} ready, image {}x{}",
                    self.image_path, image.width, image.height
                );
                Ok(())
            }
            Err(e) => {
                self.state = SpriteState::Failed(e.clone());
                Err(SpriteError::Upload(e))
            }
        }
    }

    pub fn on_load_failed(&mut self, reason: &str) -> Result<(), SpriteError> {
        if self.settled() {
            return Err(SpriteError::AlreadyLoaded);
        }
        warn!("sprite {} failed to load: {}", self.image_path, reason);
        self.state = SpriteState::Failed(reason.to_string());
        Ok(())
    }

    /// Translation to `position`, then the `scalex` / `scaley` options.
    pub fn object_matrix(position: (f32, f32), options: &BTreeMap<String, Vec<f32>>) -> Mat3 {
        let mut m = Mat3::identity().translate(position.0, position.1);
        for (name, values) in options {
            let Some(v) = values.first() else {
                continue;
            };
            match name.to_ascii_lowercase().as_str() {
                "scalex" => m = m.scale(*v, 1.0),
                "scaley" => m = m.scale(1.0, *v),
                _ => {}
            }
        }
        m
    }

    /// Draws one frame cell into the active destination with the blend mode
    /// armed on `blend`. Options are applied as uniform overrides after the
    /// tint reset, in key order.
    pub fn draw(
        &self,
        gpu: &G,
        blend: &mut BlendController,
        world: &Mat3,
        position: (f32, f32),
        frame: (f32, f32),
        options: &BTreeMap<String, Vec<f32>>,
    ) {
        let Some(res) = self.res.as_ref().filter(|_| self.is_ready()) else {
            return;
        };
        if !self.shader.is_valid() {
            debug!("sprite {} skipped, invalid shader", self.image_path);
            return;
        }
        let sp = &self.shader;
        sp.bind(gpu);

        log_bind_error(sp.set_uniform(gpu, "u_color", UniformValue::Vec4([1.0; 4])));
        for (name, values) in options {
            log_bind_error(sp.set_option(gpu, name, values));
        }

        res.texture.bind(gpu, 0);
        log_bind_error(sp.set_uniform(gpu, "u_image", UniformValue::Sampler(0)));

        res.uv.bind(gpu);
        log_bind_error(sp.set_attribute(gpu, "a_texCoord", AttribLayout::default()));
        res.position.bind(gpu);
        log_bind_error(sp.set_attribute(gpu, "a_position", AttribLayout::default()));

        let frame_uv = [
            frame.0.floor() * res.uv_scale.0,
            frame.1.floor() * res.uv_scale.1,
        ];
        let object = Self::object_matrix(position, options);
        log_bind_error(sp.set_uniform(gpu, "u_frame", UniformValue::Vec2(frame_uv)));
        log_bind_error(sp.set_uniform(gpu, "u_world", UniformValue::Mat3(world.to_array())));
        log_bind_error(sp.set_uniform(gpu, "u_object", UniformValue::Mat3(object.to_array())));

        blend.consume();
        gpu.draw_arrays(glow::TRIANGLE_STRIP, 0, res.position.vertex_count());

        sp.unbind(gpu);
    }

    pub fn release(&mut self, gpu: &G) {
        if let Some(res) = self.res.take() {
            res.texture.release(gpu);
            res.uv.release(gpu);
            res.position.release(gpu);
        }
        self.state = SpriteState::Unloaded;
    }
}
