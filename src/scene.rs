// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Scene descriptor: which sprites exist and the ordered layers drawn each
//! frame. Loaded from json:
//!
//! ```json
//! {
//!   "sprites": {
//!     "shadow": { "image": "img/shadow.png", "width": 80, "height": 70 }
//!   },
//!   "layers": [
//!     { "blendmode": "alpha",
//!       "objs": [ { "sprite": "shadow", "position": { "x": 238, "y": 75 },
//!                   "blendmode": 0, "options": { "scalex": 2 } } ] }
//!   ]
//! }
//! ```
//!
//! Option values may be a number or a list of numbers, both are stored as a
//! list. Paths are relative to the scene file.

use crate::render::{sprite::DEFAULT_SPRITE_SIZE, BlendMode};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("read scene {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parse scene: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderDesc {
    pub vertex: String,
    pub fragment: String,
}

fn default_size() -> f32 {
    DEFAULT_SPRITE_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteDesc {
    pub image: String,
    #[serde(default = "default_size")]
    pub width: f32,
    #[serde(default = "default_size")]
    pub height: f32,
    /// custom shader pair, the built-in sprite shader when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shader: Option<ShaderDesc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionValue {
    One(f32),
    Many(Vec<f32>),
}

fn de_options<'de, D>(d: D) -> Result<BTreeMap<String, Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, OptionValue>::deserialize(d)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| match v {
            OptionValue::One(x) => (k, vec![x]),
            OptionValue::Many(xs) => (k, xs),
        })
        .collect())
}

/// One draw instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawObject {
    pub sprite: String,
    #[serde(default)]
    pub position: Point,
    /// sprite sheet cell (column, row), truncated when drawn
    #[serde(default)]
    pub frame: Point,
    /// kept with the scene data, drawing does not read it
    #[serde(default)]
    pub flip: bool,
    #[serde(default, rename = "blendmode")]
    pub blend_mode: BlendMode,
    #[serde(default, deserialize_with = "de_options")]
    pub options: BTreeMap<String, Vec<f32>>,
}

impl DrawObject {
    pub fn new(sprite: &str, x: f32, y: f32) -> Self {
        Self {
            sprite: sprite.to_string(),
            position: Point { x, y },
            frame: Point::default(),
            flip: false,
            blend_mode: BlendMode::Alpha,
            options: BTreeMap::new(),
        }
    }

    pub fn with_blend(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_option(mut self, name: &str, values: &[f32]) -> Self {
        self.options.insert(name.to_string(), values.to_vec());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// how the whole layer merges into the layers below
    #[serde(default, rename = "blendmode")]
    pub blend_mode: BlendMode,
    #[serde(default, rename = "objs")]
    pub objects: Vec<DrawObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub sprites: BTreeMap<String, SpriteDesc>,
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Scene {
    pub fn from_json_str(s: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut scene = Self::from_json_str(&text)?;
        scene.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "sprites": {
            "white": { "image": "img/white.png", "width": 1, "height": 1 },
            "hero": { "image": "img/hero.png",
                      "shader": { "vertex": "shader/wave.vert", "fragment": "shader/wave.frag" } }
        },
        "layers": [
            { "blendmode": 0, "objs": [
                { "sprite": "hero", "position": { "x": 32, "y": 32 }, "frame": { "x": 1, "y": 0 },
                  "flip": true, "blendmode": "additive", "options": {} } ] },
            { "blendmode": "multiply", "objs": [
                { "sprite": "white", "options": { "scalex": 512, "scaley": 240,
                                                  "u_color": [0.5, 0.125, 0.25, 1] } } ] }
        ]
    }"#;

    #[test]
    fn parses_layers_in_order() {
        let scene = Scene::from_json_str(SCENE).unwrap();
        assert_eq!(scene.layers.len(), 2);
        assert_eq!(scene.layers[0].blend_mode, BlendMode::Alpha);
        assert_eq!(scene.layers[1].blend_mode, BlendMode::Multiply);
        let hero = &scene.layers[0].objects[0];
        assert_eq!(hero.position, Point { x: 32.0, y: 32.0 });
        assert_eq!(hero.frame.x, 1.0);
        assert!(hero.flip);
        assert_eq!(hero.blend_mode, BlendMode::Additive);
    }

    #[test]
    fn option_scalars_become_lists() {
        let scene = Scene::from_json_str(SCENE).unwrap();
        let white = &scene.layers[1].objects[0];
        assert_eq!(white.options["scalex"], vec![512.0]);
        assert_eq!(white.options["u_color"], vec![0.5, 0.125, 0.25, 1.0]);
        assert_eq!(white.position, Point::default());
        assert_eq!(white.blend_mode, BlendMode::Alpha);
    }

    #[test]
    fn sprite_defaults_and_shader_pair() {
        let scene = Scene::from_json_str(SCENE).unwrap();
        let hero = &scene.sprites["hero"];
        assert_eq!((hero.width, hero.height), (64.0, 64.0));
        assert_eq!(hero.shader.as_ref().unwrap().fragment, "shader/wave.frag");
        assert!(scene.sprites["white"].shader.is_none());
    }

    #[test]
    fn bad_blend_mode_is_rejected() {
        let r = Scene::from_json_str(r#"{ "layers": [ { "blendmode": 7 } ] }"#);
        assert!(matches!(r, Err(SceneError::Json(_))));
    }
}
