// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Compositor
//!
//! Drives the two-stage layer pipeline once per frame:
//!
//! ```text
//! for layer in layers:
//!     offscreen  ◀── clear, then every object (object blend mode)
//!     accumulate ◀── offscreen                 (layer blend mode)
//! display ◀── clear, then accumulate           (alpha)
//! flush
//! ```
//!
//! One offscreen target is reused for every layer, so GPU memory stays at two
//! intermediate targets plus the display whatever the layer count. The
//! accumulation target is not cleared between frames.

use super::{
    blend::{BlendController, BlendMode},
    shader::ShaderProgram,
    shader_source::{FRAGMENT_SRC_SPRITE, VERTEX_SRC_SPRITE},
    sprite::Sprite,
    target::{Display, RenderTarget, TargetError},
    transform::{world_transform, Mat3},
};
use crate::{
    asset::{AssetLoader, LoadEvent},
    config::RenderSettings,
    gpu::Gpu,
    scene::{Layer, Scene, ShaderDesc, SpriteDesc},
};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("gpu: {0}")]
    Gpu(String),
}

/// Current draw destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Display,
    Offscreen,
    Accumulation,
}

pub struct Compositor<G: Gpu> {
    settings: RenderSettings,
    display: Display,
    world: Mat3,
    vao: G::VertexArray,
    offscreen: RenderTarget<G>,
    accumulation: RenderTarget<G>,
    blend: BlendController,
    default_shader: Rc<ShaderProgram<G>>,
    shaders: HashMap<ShaderDesc, Rc<ShaderProgram<G>>>,
    sprites: HashMap<String, Sprite<G>>,
    layers: Vec<Layer>,
    active: Destination,
    unknown_sprites: HashSet<String>,
    frame_count: u64,
}

impl<G: Gpu> Compositor<G> {
    /// Fails only when GPU objects cannot be created. Shader build failures
    /// leave invalid programs that draw nothing.
    pub fn new(
        gpu: &G,
        settings: &RenderSettings,
        display_width: u32,
        display_height: u32,
    ) -> Result<Self, RenderError> {
        gpu.enable(glow::BLEND);
        gpu.disable(glow::DEPTH_TEST);
        let [r, g, b, a] = settings.clear_color;
        gpu.clear_color(r, g, b, a);

        let vao = gpu.create_vertex_array().map_err(RenderError::Gpu)?;
        gpu.bind_vertex_array(Some(vao));
        let drop_vao = |gpu: &G| {
            gpu.bind_vertex_array(None);
            gpu.delete_vertex_array(vao);
        };

        let ver = settings.glsl_version.as_str();
        let (tw, th) = (settings.target_width, settings.target_height);
        let offscreen = RenderTarget::create(gpu, tw, th, ver).map_err(|e| {
            drop_vao(gpu);
            e
        })?;
        let accumulation = match RenderTarget::create(gpu, tw, th, ver) {
            Ok(t) => t,
            Err(e) => {
                offscreen.release(gpu);
                drop_vao(gpu);
                return Err(e.into());
            }
        };
        let default_shader = Rc::new(ShaderProgram::compile_or_invalid(
            gpu,
            ver,
            VERTEX_SRC_SPRITE,
            FRAGMENT_SRC_SPRITE,
        ));

        let world = world_transform(display_width, display_height, settings.virtual_height)
            .unwrap_or_default();
        info!(
            "compositor ready, targets {}x{}, display {}x{}",
            tw, th, display_width, display_height
        );

        Ok(Self {
            settings: settings.clone(),
            display: Display::new(display_width, display_height),
            world,
            vao,
            offscreen,
            accumulation,
            blend: BlendController::new(),
            default_shader,
            shaders: HashMap::new(),
            sprites: HashMap::new(),
            layers: vec![],
            active: Destination::Display,
            unknown_sprites: HashSet::new(),
            frame_count: 0,
        })
    }

    fn activate(&mut self, gpu: &G, dest: Destination) {
        match dest {
            Destination::Display => self.display.activate(gpu),
            Destination::Offscreen => self.offscreen.activate(gpu),
            Destination::Accumulation => self.accumulation.activate(gpu),
        }
        self.active = dest;
    }

    /// Renders one frame onto the display.
    pub fn render_frame(&mut self, gpu: &G) {
        let layers = std::mem::take(&mut self.layers);
        for layer in &layers {
            self.activate(gpu, Destination::Offscreen);
            gpu.clear(glow::COLOR_BUFFER_BIT);

            for obj in &layer.objects {
                let Some(sprite) = self.sprites.get(&obj.sprite) else {
                    if self.unknown_sprites.insert(obj.sprite.clone()) {
                        warn!("unknown sprite {}, skipped", obj.sprite);
                    }
                    continue;
                };
                self.blend.apply(gpu, obj.blend_mode);
                sprite.draw(
                    gpu,
                    &mut self.blend,
                    &self.world,
                    (obj.position.x, obj.position.y),
                    (obj.frame.x, obj.frame.y),
                    &obj.options,
                );
            }

            self.blend.apply(gpu, layer.blend_mode);
            self.activate(gpu, Destination::Accumulation);
            debug_assert_ne!(self.active, Destination::Offscreen);
            self.offscreen.composite(gpu, &mut self.blend);
        }
        self.layers = layers;

        self.activate(gpu, Destination::Display);
        gpu.clear(glow::COLOR_BUFFER_BIT);
        self.blend.apply(gpu, BlendMode::Alpha);
        debug_assert_ne!(self.active, Destination::Accumulation);
        self.accumulation.composite(gpu, &mut self.blend);

        gpu.flush();
        self.frame_count += 1;
        debug!("frame {} done, {} layer(s)", self.frame_count, self.layers.len());
    }

    /// Recomputes the world transform for a new display size. Zero sizes
    /// (minimized windows) are ignored. The offscreen targets keep their size.
    pub fn resize(&mut self, width: u32, height: u32) {
        match world_transform(width, height, self.settings.virtual_height) {
            Some(world) => {
                self.world = world;
                self.display = Display::new(width, height);
                info!("resize display {}x{}", width, height);
            }
            None => debug!("resize {}x{} ignored", width, height),
        }
    }

    /// Returns the program for a custom shader pair, compiled once per pair.
    /// Unreadable or broken sources give an invalid program.
    fn shader_for(&mut self, gpu: &G, base_dir: &Path, desc: &ShaderDesc) -> Rc<ShaderProgram<G>> {
        if let Some(sp) = self.shaders.get(desc) {
            return sp.clone();
        }
        let read = |rel: &str| std::fs::read_to_string(base_dir.join(rel));
        let program = match (read(&desc.vertex), read(&desc.fragment)) {
            (Ok(vs), Ok(fs)) => {
                ShaderProgram::compile_or_invalid(gpu, &self.settings.glsl_version, &vs, &fs)
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("read shader {} / {}: {}", desc.vertex, desc.fragment, e);
                ShaderProgram::invalid()
            }
        };
        let sp = Rc::new(program);
        self.shaders.insert(desc.clone(), sp.clone());
        sp
    }

    /// Registers a sprite described by a scene; its texture is still to be
    /// delivered.
    pub fn add_sprite(&mut self, gpu: &G, id: &str, desc: &SpriteDesc, base_dir: &Path) {
        let shader = match &desc.shader {
            Some(sd) => self.shader_for(gpu, base_dir, sd),
            None => self.default_shader.clone(),
        };
        let path = base_dir.join(&desc.image);
        let sprite = Sprite::new(&path.to_string_lossy(), shader, desc.width, desc.height);
        self.insert_sprite(gpu, id, sprite);
    }

    /// Registers a prebuilt sprite, replacing and releasing any sprite with
    /// the same id.
    pub fn insert_sprite(&mut self, gpu: &G, id: &str, sprite: Sprite<G>) {
        self.unknown_sprites.remove(id);
        if let Some(mut old) = self.sprites.insert(id.to_string(), sprite) {
            old.release(gpu);
        }
    }

    pub fn set_layers(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
    }

    /// Registers every sprite of `scene`, requests its image and installs the
    /// scene layers.
    pub fn load_scene(&mut self, gpu: &G, scene: &Scene, loader: &mut AssetLoader) {
        for (id, desc) in &scene.sprites {
            self.add_sprite(gpu, id, desc, &scene.base_dir);
            if let Some(sprite) = self.sprites.get_mut(id) {
                sprite.begin_load();
                loader.request(id, sprite.image_path());
            }
        }
        self.set_layers(scene.layers.clone());
        info!(
            "scene loaded, {} sprite(s), {} layer(s)",
            scene.sprites.len(),
            scene.layers.len()
        );
    }

    /// Texture load completion for one sprite.
    pub fn deliver(&mut self, gpu: &G, event: LoadEvent) {
        let Some(sprite) = self.sprites.get_mut(&event.id) else {
            warn!("load event for unknown sprite {}", event.id);
            return;
        };
        let r = match event.result {
            Ok(image) => sprite.on_loaded(gpu, &image),
            Err(e) => sprite.on_load_failed(&e.to_string()),
        };
        if let Err(e) = r {
            warn!("sprite {}: {}", event.id, e);
        }
    }

    /// Delivers every finished load, returns how many were handled.
    pub fn pump(&mut self, gpu: &G, loader: &mut AssetLoader) -> usize {
        let events = loader.poll();
        let n = events.len();
        for ev in events {
            self.deliver(gpu, ev);
        }
        n
    }

    pub fn default_shader(&self) -> Rc<ShaderProgram<G>> {
        self.default_shader.clone()
    }

    pub fn sprite(&self, id: &str) -> Option<&Sprite<G>> {
        self.sprites.get(id)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn world(&self) -> &Mat3 {
        &self.world
    }

    pub fn display(&self) -> Display {
        self.display
    }

    pub fn active(&self) -> Destination {
        self.active
    }

    pub fn offscreen(&self) -> &RenderTarget<G> {
        &self.offscreen
    }

    pub fn accumulation(&self) -> &RenderTarget<G> {
        &self.accumulation
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frees every GPU object the compositor owns.
    pub fn release(mut self, gpu: &G) {
        for (_, mut sprite) in self.sprites.drain() {
            sprite.release(gpu);
        }
        let shaders = self
            .shaders
            .drain()
            .map(|(_, sp)| sp)
            .chain(std::iter::once(self.default_shader));
        for sp in shaders {
            if let Ok(mut sp) = Rc::try_unwrap(sp) {
                sp.release(gpu);
            }
        }
        self.offscreen.release(gpu);
        self.accumulation.release(gpu);
        gpu.bind_vertex_array(None);
        gpu.delete_vertex_array(self.vao);
        info!("compositor released after {} frame(s)", self.frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GlCall, TraceGpu};
    use crate::render::shader::Slot;
    use crate::render::texture::ImageData;
    use crate::scene::DrawObject;

    fn compositor(gpu: &TraceGpu) -> Compositor<TraceGpu> {
        Compositor::new(gpu, &RenderSettings::default(), 800, 600).unwrap()
    }

    fn ready_sprite(c: &mut Compositor<TraceGpu>, gpu: &TraceGpu, id: &str, rgba: [u8; 4]) {
        let mut s = Sprite::new(id, c.default_shader(), 1.0, 1.0);
        s.on_loaded(gpu, &ImageData::solid(1, 1, rgba)).unwrap();
        c.insert_sprite(gpu, id, s);
    }

    #[test]
    fn new_sets_global_state() {
        let gpu = TraceGpu::new();
        let c = compositor(&gpu);
        let calls = gpu.calls();
        assert_eq!(calls[0], GlCall::Enable(glow::BLEND));
        assert_eq!(calls[1], GlCall::Disable(glow::DEPTH_TEST));
        assert_eq!(calls[2], GlCall::ClearColor([0.4, 0.6, 1.0, 1.0]));
        assert_eq!(c.offscreen().size(), (512, 240));
        assert_eq!(c.accumulation().size(), (512, 240));
        assert!((c.world().m00 - 0.00625).abs() < 1e-6);
    }

    #[test]
    fn resize_updates_world_and_display_only() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        gpu.take_calls();
        c.resize(480, 240);
        assert!((c.world().m00 - 2.0 / 480.0).abs() < 1e-6);
        assert_eq!(c.display(), Display::new(480, 240));
        c.resize(0, 0);
        assert_eq!(c.display(), Display::new(480, 240));
        assert_eq!(c.offscreen().size(), (512, 240));
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn next_frame_uses_resized_viewport_and_world() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        ready_sprite(&mut c, &gpu, "white", [255; 4]);
        c.set_layers(vec![Layer {
            blend_mode: BlendMode::Alpha,
            objects: vec![DrawObject::new("white", 0.0, 0.0)],
        }]);
        c.resize(480, 240);
        gpu.take_calls();
        c.render_frame(&gpu);

        let calls = gpu.calls();
        let display = calls
            .iter()
            .position(|call| *call == GlCall::BindFramebuffer(None))
            .unwrap();
        assert_eq!(calls[display + 1], GlCall::Viewport(0, 0, 480, 240));
        assert!(!calls.contains(&GlCall::Viewport(0, 0, 800, 600)));

        let Slot::Uniform(world_loc) = c.default_shader().table().get("u_world").unwrap().slot else {
            panic!("u_world is not a uniform");
        };
        let expected = world_transform(480, 240, 240.0).unwrap().to_array();
        assert_eq!(expected[0], 2.0 / 480.0);
        assert!(calls.contains(&GlCall::UniformMatrix3(world_loc, expected)));
    }

    #[test]
    fn broken_builtin_programs_are_not_fatal() {
        let gpu = TraceGpu::new();
        gpu.set_link_failure(true);
        let mut c = compositor(&gpu);
        assert!(!c.default_shader().is_valid());
        assert!(!c.offscreen().is_valid());
        ready_sprite(&mut c, &gpu, "white", [255; 4]);
        c.set_layers(vec![Layer {
            blend_mode: BlendMode::Multiply,
            objects: vec![DrawObject::new("white", 0.0, 0.0)],
        }]);
        gpu.take_calls();
        c.render_frame(&gpu);
        assert!(gpu.draw_calls().is_empty());
        assert_eq!(gpu.calls().last(), Some(&GlCall::Flush));
        assert_eq!(gpu.display_color(), [0.4, 0.6, 1.0, 1.0]);
    }

    #[test]
    fn failed_new_releases_what_it_created() {
        // 14 creations reach the second target's position buffer
        for budget in 0..14 {
            let gpu = TraceGpu::new();
            gpu.set_create_budget(Some(budget));
            assert!(
                Compositor::new(&gpu, &RenderSettings::default(), 800, 600).is_err(),
                "budget {}",
                budget
            );
            assert_eq!(gpu.live_objects(), 0, "budget {}", budget);
        }
    }

    #[test]
    fn release_frees_every_object() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        ready_sprite(&mut c, &gpu, "white", [255; 4]);
        c.release(&gpu);
        assert_eq!(gpu.live_objects(), 0);
    }

    #[test]
    fn empty_frame_blits_accumulation_with_alpha() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        gpu.take_calls();
        c.render_frame(&gpu);
        let calls = gpu.calls();
        assert_eq!(
            gpu.blend_calls(),
            vec![(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA)]
        );
        assert_eq!(calls.last(), Some(&GlCall::Flush));
        assert_eq!(c.active(), Destination::Display);
        assert_eq!(c.frame_count(), 1);
    }

    #[test]
    fn unknown_and_unready_sprites_are_skipped() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        let s = Sprite::new("pending", c.default_shader(), 8.0, 8.0);
        c.insert_sprite(&gpu, "pending", s);
        c.set_layers(vec![Layer {
            blend_mode: BlendMode::Alpha,
            objects: vec![DrawObject::new("ghost", 0.0, 0.0), DrawObject::new("pending", 0.0, 0.0)],
        }]);
        gpu.take_calls();
        c.render_frame(&gpu);
        c.render_frame(&gpu);
        // only the two composites per frame draw
        assert_eq!(gpu.draw_calls().len(), 4);
    }

    #[test]
    fn deliver_marks_ready_or_failed() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        for id in ["a", "b"] {
            let s = Sprite::new(id, c.default_shader(), 8.0, 8.0);
            c.insert_sprite(&gpu, id, s);
        }
        c.deliver(
            &gpu,
            LoadEvent {
                id: "a".to_string(),
                result: Ok(ImageData::solid(8, 8, [255; 4])),
            },
        );
        c.deliver(
            &gpu,
            LoadEvent {
                id: "b".to_string(),
                result: Err(crate::asset::AssetError::Io {
                    path: "b.png".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
                }),
            },
        );
        assert!(c.sprite("a").unwrap().is_ready());
        assert!(matches!(
            c.sprite("b").unwrap().state(),
            crate::render::SpriteState::Failed(_)
        ));
    }

    #[test]
    fn solid_colour_survives_the_chain() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        ready_sprite(&mut c, &gpu, "red", [255, 0, 0, 255]);
        c.set_layers(vec![Layer {
            blend_mode: BlendMode::Alpha,
            objects: vec![DrawObject::new("red", 0.0, 0.0)],
        }]);
        c.render_frame(&gpu);
        assert_eq!(gpu.texture_color(c.offscreen().texture()), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(gpu.texture_color(c.accumulation().texture()), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(gpu.display_color(), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn release_deletes_targets_and_vao() {
        let gpu = TraceGpu::new();
        let mut c = compositor(&gpu);
        ready_sprite(&mut c, &gpu, "w", [255; 4]);
        let (off, acc) = (c.offscreen().framebuffer(), c.accumulation().framebuffer());
        c.release(&gpu);
        let calls = gpu.calls();
        assert!(calls.contains(&GlCall::DeleteFramebuffer(off)));
        assert!(calls.contains(&GlCall::DeleteFramebuffer(acc)));
        assert!(calls.iter().any(|c| matches!(c, GlCall::DeleteVertexArray(_))));
        assert_eq!(
            calls.iter().filter(|c| matches!(c, GlCall::DeleteProgram(_))).count(),
            3
        );
    }
}
