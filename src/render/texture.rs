// RustPixel
// copyright zipxing@hotmail.com 2022～2025

use crate::gpu::Gpu;

/// Decoded RGBA8 image, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: rgba.repeat((width * height) as usize),
        }
    }
}

/// 2D texture with nearest filtering.
pub struct Texture<G: Gpu> {
    handle: G::Texture,
    width: u32,
    height: u32,
}

impl<G: Gpu> Texture<G> {
    fn create(gpu: &G, width: u32, height: u32, wrap: u32, pixels: Option<&[u8]>) -> Result<Self, String> {
        let handle = gpu.create_texture()?;
        gpu.bind_texture(Some(handle));
        gpu.tex_parameter_i32(glow::TEXTURE_WRAP_S, wrap as i32);
        gpu.tex_parameter_i32(glow::TEXTURE_WRAP_T, wrap as i32);
        gpu.tex_parameter_i32(glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
        gpu.tex_parameter_i32(glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
        gpu.tex_image_2d_rgba(width as i32, height as i32, pixels);
        gpu.bind_texture(None);
        Ok(Self {
            handle,
            width,
            height,
        })
    }

    /// Sprite sheet texture, mirrored-repeat wrapping.
    pub fn from_image(gpu: &G, image: &ImageData) -> Result<Self, String> {
        Self::create(
            gpu,
            image.width,
            image.height,
            glow::MIRRORED_REPEAT,
            Some(&image.pixels),
        )
    }

    /// Uninitialized render target storage, clamp-to-edge wrapping.
    pub fn empty(gpu: &G, width: u32, height: u32) -> Result<Self, String> {
        Self::create(gpu, width, height, glow::CLAMP_TO_EDGE, None)
    }

    /// Binds to texture unit `unit` (0 based).
    pub fn bind(&self, gpu: &G, unit: u32) {
        gpu.active_texture(glow::TEXTURE0 + unit);
        gpu.bind_texture(Some(self.handle));
    }

    pub fn handle(&self) -> G::Texture {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn release(self, gpu: &G) {
        gpu.delete_texture(self.handle);
    }
}
