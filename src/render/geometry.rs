// RustPixel
// copyright zipxing@hotmail.com 2022～2025

use crate::gpu::Gpu;

/// Two triangles covering the rectangle, as flat (x, y) pairs:
/// `(x,y) (x+w,y) (x,y+h) (x,y+h) (x+w,y) (x+w,y+h)`
pub fn rect_array(x: f32, y: f32, w: f32, h: f32) -> [f32; 12] {
    [
        x,
        y,
        x + w,
        y,
        x,
        y + h,
        x,
        y + h,
        x + w,
        y,
        x + w,
        y + h,
    ]
}

/// Immutable `ARRAY_BUFFER` holding 2-float vertices.
pub struct GeometryBuffer<G: Gpu> {
    buffer: G::Buffer,
    vertex_count: i32,
}

impl<G: Gpu> GeometryBuffer<G> {
    pub fn new(gpu: &G, data: &[f32]) -> Result<Self, String> {
        let buffer = gpu.create_buffer()?;
        gpu.bind_array_buffer(Some(buffer));
        gpu.array_buffer_data(data);
        Ok(Self {
            buffer,
            vertex_count: (data.len() / 2) as i32,
        })
    }

    pub fn rect(gpu: &G, x: f32, y: f32, w: f32, h: f32) -> Result<Self, String> {
        Self::new(gpu, &rect_array(x, y, w, h))
    }

    pub fn bind(&self, gpu: &G) {
        gpu.bind_array_buffer(Some(self.buffer));
    }

    pub fn vertex_count(&self) -> i32 {
        self.vertex_count
    }

    pub fn release(self, gpu: &G) {
        gpu.delete_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GlCall, TraceGpu};

    #[test]
    fn rect_vertices() {
        assert_eq!(
            rect_array(-1.0, -1.0, 2.0, 2.0),
            [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn upload_goes_to_bound_buffer() {
        let gpu = TraceGpu::new();
        let g = GeometryBuffer::rect(&gpu, 0.0, 0.0, 64.0, 32.0).unwrap();
        assert_eq!(g.vertex_count(), 6);
        let calls = gpu.take_calls();
        assert!(matches!(calls[0], GlCall::CreateBuffer(_)));
        assert!(matches!(calls[1], GlCall::BindArrayBuffer(Some(_))));
        assert_eq!(
            calls[2],
            GlCall::ArrayBufferData(rect_array(0.0, 0.0, 64.0, 32.0).to_vec())
        );
    }
}
