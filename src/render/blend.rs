// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Blend modes and the blend state controller.
//!
//! The blend function is global GPU state that persists until the next
//! `blendFunc`. [`BlendController::apply`] sets it and *arms* the controller;
//! each draw or composite consumes the armed mode. A draw that finds nothing
//! armed means the caller forgot to pick a mode, which trips a debug assertion.

use crate::gpu::Gpu;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "BlendModeRepr")]
pub enum BlendMode {
    #[default]
    Alpha,
    Additive,
    Multiply,
}

/// Scene files name a blend mode by string or by index 0..=2.
#[derive(Deserialize)]
#[serde(untagged)]
enum BlendModeRepr {
    Index(i64),
    Name(String),
}

impl TryFrom<BlendModeRepr> for BlendMode {
    type Error = String;

    fn try_from(r: BlendModeRepr) -> Result<Self, Self::Error> {
        match r {
            BlendModeRepr::Index(i) => Self::from_index(i),
            BlendModeRepr::Name(s) => s.parse(),
        }
    }
}

impl std::str::FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alpha" => Ok(Self::Alpha),
            "additive" => Ok(Self::Additive),
            "multiply" => Ok(Self::Multiply),
            _ => Err(format!("unknown blend mode `{}`", s)),
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Alpha => "alpha",
            Self::Additive => "additive",
            Self::Multiply => "multiply",
        };
        f.write_str(s)
    }
}

impl BlendMode {
    pub fn from_index(i: i64) -> Result<Self, String> {
        match i {
            0 => Ok(Self::Alpha),
            1 => Ok(Self::Additive),
            2 => Ok(Self::Multiply),
            _ => Err(format!("blend mode index {} out of range 0..=2", i)),
        }
    }

    /// (src, dst) factors for `blendFunc`
    pub fn factors(self) -> (u32, u32) {
        match self {
            Self::Alpha => (glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
            Self::Additive => (glow::ONE, glow::ONE),
            Self::Multiply => (glow::DST_COLOR, glow::ZERO),
        }
    }
}

#[derive(Debug, Default)]
pub struct BlendController {
    current: Option<BlendMode>,
    armed: bool,
}

impl BlendController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues exactly one `blendFunc` call and arms the mode for the next draw.
    pub fn apply<G: Gpu>(&mut self, gpu: &G, mode: BlendMode) {
        let (src, dst) = mode.factors();
        gpu.blend_func(src, dst);
        self.current = Some(mode);
        self.armed = true;
    }

    /// Called by every draw / composite right before `drawArrays`.
    pub fn consume(&mut self) -> Option<BlendMode> {
        debug_assert!(self.armed, "draw issued without applying a blend mode");
        if !self.armed {
            warn!("draw without blend mode, current state {:?} is used", self.current);
        }
        self.armed = false;
        self.current
    }

    pub fn current(&self) -> Option<BlendMode> {
        self.current
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GlCall, TraceGpu};

    #[test]
    fn apply_sets_exactly_one_pair() {
        for (mode, pair) in [
            (BlendMode::Alpha, (glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA)),
            (BlendMode::Additive, (glow::ONE, glow::ONE)),
            (BlendMode::Multiply, (glow::DST_COLOR, glow::ZERO)),
        ] {
            let gpu = TraceGpu::new();
            let mut bc = BlendController::new();
            bc.apply(&gpu, mode);
            assert_eq!(gpu.calls(), vec![GlCall::BlendFunc(pair.0, pair.1)]);
            assert_eq!(bc.current(), Some(mode));
        }
    }

    #[test]
    fn consume_disarms() {
        let gpu = TraceGpu::new();
        let mut bc = BlendController::new();
        bc.apply(&gpu, BlendMode::Multiply);
        assert!(bc.is_armed());
        assert_eq!(bc.consume(), Some(BlendMode::Multiply));
        assert!(!bc.is_armed());
        assert_eq!(bc.current(), Some(BlendMode::Multiply));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without applying a blend mode")]
    fn unarmed_draw_asserts() {
        let mut bc = BlendController::new();
        bc.consume();
    }

    #[test]
    fn parse_by_name_or_index() {
        let m: Vec<BlendMode> = serde_json::from_str(r#"["alpha", 1, "Multiply", 0]"#).unwrap();
        assert_eq!(
            m,
            vec![
                BlendMode::Alpha,
                BlendMode::Additive,
                BlendMode::Multiply,
                BlendMode::Alpha
            ]
        );
        assert!(serde_json::from_str::<BlendMode>("3").is_err());
        assert!(serde_json::from_str::<BlendMode>(r#""screen""#).is_err());
        assert_eq!(serde_json::to_string(&BlendMode::Additive).unwrap(), r#""additive""#);
    }
}
