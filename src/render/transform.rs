// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! 2D affine transform used for the world and per-object matrices.
//!
//! A point maps as
//! `x' = m00 * x + m10 * y + m20`, `y' = m01 * x + m11 * y + m21`.
//! `translate` and `scale` post-multiply, so they act on the coordinate
//! space produced by the calls made before them.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m00: f32,
    pub m10: f32,
    pub m20: f32,
    pub m01: f32,
    pub m11: f32,
    pub m21: f32,
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat3 {
    pub fn identity() -> Self {
        Self {
            m00: 1.0,
            m10: 0.0,
            m20: 0.0,
            m01: 0.0,
            m11: 1.0,
            m21: 0.0,
        }
    }

    pub fn translate(mut self, x: f32, y: f32) -> Self {
        self.m20 += self.m00 * x + self.m10 * y;
        self.m21 += self.m01 * x + self.m11 * y;
        self
    }

    pub fn scale(mut self, x: f32, y: f32) -> Self {
        self.m00 *= x;
        self.m10 *= y;
        self.m01 *= x;
        self.m11 *= y;
        self
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.m00 * x + self.m10 * y + self.m20,
            self.m01 * x + self.m11 * y + self.m21,
        )
    }

    /// Column-major 3x3 layout expected by `uniformMatrix3fv` without
    /// transposition.
    pub fn to_array(&self) -> [f32; 9] {
        [
            self.m00, self.m01, 0.0, //
            self.m10, self.m11, 0.0, //
            self.m20, self.m21, 1.0,
        ]
    }
}

/// Maps pixel coordinates (origin top-left, y down, `virtual_height` rows
/// visible) to normalized device coordinates for a `width` x `height`
/// display. The visible width follows the display aspect ratio.
///
/// Returns `None` for a zero-sized display.
pub fn world_transform(width: u32, height: u32, virtual_height: f32) -> Option<Mat3> {
    if width == 0 || height == 0 || virtual_height <= 0.0 {
        return None;
    }
    let w_ratio = width as f32 / (height as f32 / virtual_height);
    Some(
        Mat3::identity()
            .translate(-1.0, 1.0)
            .scale(2.0 / w_ratio, -2.0 / virtual_height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn world_for_800x600() {
        let m = world_transform(800, 600, 240.0).unwrap();
        assert!(close(m.m00, 0.00625));
        assert!(close(m.m11, -2.0 / 240.0));
        assert!(close(m.m20, -1.0));
        assert!(close(m.m21, 1.0));
        let (x, y) = m.transform_point(0.0, 0.0);
        assert!(close(x, -1.0) && close(y, 1.0));
        let (x, y) = m.transform_point(320.0, 240.0);
        assert!(close(x, 1.0) && close(y, -1.0));
    }

    #[test]
    fn zero_display_is_ignored() {
        assert!(world_transform(0, 600, 240.0).is_none());
        assert!(world_transform(800, 0, 240.0).is_none());
    }

    #[test]
    fn translate_then_scale_order() {
        let m = Mat3::identity().translate(10.0, 20.0).scale(2.0, 3.0);
        assert_eq!(m.transform_point(1.0, 1.0), (12.0, 23.0));
        assert_eq!(
            m.to_array(),
            [2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 10.0, 20.0, 1.0]
        );
    }
}
