// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Window runner: winit window + glutin OpenGL 3.3 context + glow.
//!
//! Loads the config and scene, creates the compositor once the window is
//! up, forwards resizes and renders one frame per redraw.

use clap::Parser;
use glutin::{
    config::{ConfigTemplateBuilder, GlConfig},
    context::{
        ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext,
        Version,
    },
    display::{GetGlDisplay, GlDisplay},
    prelude::GlSurface,
    surface::{Surface, SurfaceAttributesBuilder, WindowSurface},
};
use glutin_winit::DisplayBuilder;
use log::{error, info};
use pixel_compositor::{
    asset::AssetLoader,
    config::Config,
    log::{init_log, parse_level},
    render::Compositor,
    scene::Scene,
    GAME_FRAME,
};
use std::error::Error;
use std::ffi::CString;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    raw_window_handle::HasWindowHandle,
    window::{Window, WindowId},
};

#[derive(Parser, Debug)]
#[command(version, about = "layered sprite compositor")]
struct Args {
    /// toml settings, defaults are used when the file is missing
    #[arg(long, default_value = "assets/pixel_compositor.toml")]
    config: PathBuf,
    /// json scene descriptor
    #[arg(long, default_value = "assets/scene.json")]
    scene: PathBuf,
}

struct GlWindow {
    window: Arc<Window>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    gl: glow::Context,
}

fn create_gl_window(event_loop: &ActiveEventLoop, cfg: &Config) -> Result<GlWindow, Box<dyn Error>> {
    let attrs = Window::default_attributes()
        .with_title(&cfg.display.title)
        .with_inner_size(LogicalSize::new(cfg.display.width, cfg.display.height));
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(attrs))
        .build(event_loop, ConfigTemplateBuilder::new(), |configs| {
            configs
                .reduce(|accum, config| {
                    if config.num_samples() > accum.num_samples() {
                        config
                    } else {
                        accum
                    }
                })
                .expect("glutin offers at least one config")
        })?;
    let window = Arc::new(window.ok_or("window was not created")?);
    let size = window.inner_size();
    let raw = window.window_handle()?.as_raw();

    let gl_display = gl_config.display();
    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw));
    let not_current = unsafe { gl_display.create_context(&gl_config, &context_attributes)? };

    let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw,
        NonZeroU32::new(size.width.max(1)).ok_or("zero width")?,
        NonZeroU32::new(size.height.max(1)).ok_or("zero height")?,
    );
    let surface = unsafe { gl_display.create_window_surface(&gl_config, &surface_attributes)? };
    let context = not_current.make_current(&surface)?;

    let gl = unsafe {
        glow::Context::from_loader_function(|s| match CString::new(s) {
            Ok(name) => gl_display.get_proc_address(&name),
            Err(_) => std::ptr::null(),
        })
    };
    info!(
        "OpenGL window {}x{} (physical {}x{})",
        cfg.display.width, cfg.display.height, size.width, size.height
    );
    Ok(GlWindow {
        window,
        surface,
        context,
        gl,
    })
}

struct App {
    config: Config,
    scene: Scene,
    loader: AssetLoader,
    gfx: Option<GlWindow>,
    compositor: Option<Compositor<glow::Context>>,
    failure: Option<Box<dyn Error>>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn Error>> {
        let gfx = create_gl_window(event_loop, &self.config)?;
        let size = gfx.window.inner_size();
        let mut compositor =
            Compositor::new(&gfx.gl, &self.config.render, size.width, size.height)?;
        compositor.load_scene(&gfx.gl, &self.scene, &mut self.loader);
        gfx.window.request_redraw();
        self.compositor = Some(compositor);
        self.gfx = Some(gfx);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gfx.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            error!("start failed: {}", e);
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let (Some(gfx), Some(compositor)) = (&self.gfx, &mut self.compositor) else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) {
                    gfx.surface.resize(&gfx.context, w, h);
                }
                compositor.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                compositor.pump(&gfx.gl, &mut self.loader);
                compositor.render_frame(&gfx.gl);
                if let Err(e) = gfx.surface.swap_buffers(&gfx.context) {
                    error!("swap buffers: {}", e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(gfx) = &self.gfx {
            gfx.window.request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(
            Instant::now() + Duration::from_millis(1000 / GAME_FRAME as u64),
        ));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let (Some(gfx), Some(compositor)) = (&self.gfx, self.compositor.take()) {
            compositor.release(&gfx.gl);
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}, using default settings", e);
            Config::default()
        }
    };
    if let Some(dir) = PathBuf::from(&config.log.file).parent() {
        std::fs::create_dir_all(dir)?;
    }
    init_log(parse_level(&config.log.level), &config.log.file, config.log.console)?;
    info!("pixel compositor start, scene {:?}", args.scene);

    let scene = Scene::load(&args.scene)?;
    let event_loop = EventLoop::new()?;
    let mut app = App {
        config,
        scene,
        loader: AssetLoader::new(),
        gfx: None,
        compositor: None,
        failure: None,
    };
    event_loop.run_app(&mut app)?;
    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
