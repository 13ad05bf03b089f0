// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Trace Backend
//!
//! A headless [`Gpu`] that records every state-changing call as a [`GlCall`]
//! and keeps a flat colour model of the render state:
//!
//! - every texture, every framebuffer colour attachment and the display hold a
//!   single RGBA value (image uploads store the average pixel)
//! - `clear` writes the clear colour into the bound destination
//! - `draw_arrays` samples texture unit 0 when the program has an active
//!   sampler, multiplies by `u_color` when the program has one, then blends
//!   into the bound destination with the current blend function
//!
//! The model ignores coverage: a draw recolours the whole destination. That is
//! enough to check blend order and the offscreen → accumulation → display chain
//! without a driver.
//!
//! The shader "compiler" reads `attribute` / `in` (vertex stage) and `uniform`
//! declarations; an input is active when its identifier occurs again after the
//! declaration. A stage without `main` fails to compile.
//! Queries (status, logs, introspection, locations) are not recorded.
//!
//! Failure injection: `set_link_failure` rejects every link and
//! `set_create_budget` makes object creation fail after a number of
//! successes. `live_objects` counts created objects not yet deleted.

use super::{ActiveInput, Gpu};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// One recorded GPU call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateShader { stage: u32, shader: u32 },
    ShaderSource(u32),
    CompileShader(u32),
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader(u32, u32),
    DetachShader(u32, u32),
    LinkProgram(u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    Uniform1f(u32, f32),
    Uniform2f(u32, f32, f32),
    Uniform3f(u32, f32, f32, f32),
    Uniform4f(u32, f32, f32, f32, f32),
    Uniform1i(u32, i32),
    UniformMatrix3(u32, [f32; 9]),
    UniformMatrix4(u32, [f32; 16]),
    EnableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    },
    CreateVertexArray(u32),
    BindVertexArray(Option<u32>),
    DeleteVertexArray(u32),
    CreateBuffer(u32),
    BindArrayBuffer(Option<u32>),
    ArrayBufferData(Vec<f32>),
    DeleteBuffer(u32),
    CreateTexture(u32),
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    TexParameter(u32, i32),
    TexImage2d { width: i32, height: i32, with_data: bool },
    DeleteTexture(u32),
    CreateFramebuffer(u32),
    BindFramebuffer(Option<u32>),
    FramebufferColorTexture(Option<u32>),
    FramebufferDepthRenderbuffer(Option<u32>),
    DeleteFramebuffer(u32),
    CreateRenderbuffer(u32),
    BindRenderbuffer(Option<u32>),
    RenderbufferStorage { format: u32, width: i32, height: i32 },
    DeleteRenderbuffer(u32),
    Viewport(i32, i32, i32, i32),
    ClearColor([f32; 4]),
    Clear(u32),
    Enable(u32),
    Disable(u32),
    BlendFunc(u32, u32),
    DrawArrays { mode: u32, first: i32, count: i32 },
    Flush,
}

struct TraceShader {
    stage: u32,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Default)]
struct TraceProgram {
    shaders: Vec<u32>,
    linked: bool,
    log: String,
    attributes: Vec<ActiveInput>,
    uniforms: Vec<ActiveInput>,
}

type Rgba = [f32; 4];

#[derive(Default)]
struct TraceState {
    next_id: u32,
    calls: Vec<GlCall>,
    fail_link: bool,
    create_budget: Option<usize>,
    live: HashSet<u32>,
    shaders: HashMap<u32, TraceShader>,
    programs: HashMap<u32, TraceProgram>,
    locations: HashMap<(u32, String), u32>,
    uniform_values: HashMap<u32, Vec<f32>>,
    current_program: Option<u32>,
    active_unit: u32,
    units: HashMap<u32, u32>,
    textures: HashMap<u32, Rgba>,
    framebuffers: HashMap<u32, Option<u32>>,
    bound_framebuffer: Option<u32>,
    display: Rgba,
    clear_color: Rgba,
    blend_enabled: bool,
    blend: (u32, u32),
}

impl TraceState {
    fn alloc(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Allocates a GPU object handle, failing once the create budget is spent.
    fn create_object(&mut self) -> Result<u32, String> {
        if let Some(left) = self.create_budget.as_mut() {
            if *left == 0 {
                return Err("out of memory".to_string());
            }
            *left -= 1;
        }
        let id = self.alloc();
        self.live.insert(id);
        Ok(id)
    }

    fn destination(&mut self) -> &mut Rgba {
        let tex = self
            .bound_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb).copied().flatten());
        match tex {
            Some(t) => self.textures.entry(t).or_insert([0.0; 4]),
            None => &mut self.display,
        }
    }

    fn uniform_value(&self, program: u32, name: &str) -> Option<&Vec<f32>> {
        self.locations
            .get(&(program, name.to_string()))
            .and_then(|loc| self.uniform_values.get(loc))
    }

    fn shade(&self, program: u32) -> Rgba {
        let Some(info) = self.programs.get(&program) else {
            return [0.0; 4];
        };
        let mut color = [1.0; 4];
        if let Some(sampler) = info.uniforms.iter().find(|u| u.gl_type == glow::SAMPLER_2D) {
            let unit = self
                .uniform_value(program, &sampler.name)
                .and_then(|v| v.first().copied())
                .unwrap_or(0.0) as u32;
            color = self
                .units
                .get(&(glow::TEXTURE0 + unit))
                .and_then(|t| self.textures.get(t))
                .copied()
                .unwrap_or([0.0; 4]);
        }
        if info.uniforms.iter().any(|u| u.name == "u_color") {
            if let Some(tint) = self.uniform_value(program, "u_color") {
                for (c, t) in color.iter_mut().zip(tint.iter()) {
                    *c *= t;
                }
            }
        }
        color
    }
}

fn blend_factor(factor: u32, src: &Rgba, dst: &Rgba, channel: usize) -> f32 {
    match factor {
        glow::ZERO => 0.0,
        glow::ONE => 1.0,
        glow::SRC_ALPHA => src[3],
        glow::ONE_MINUS_SRC_ALPHA => 1.0 - src[3],
        glow::DST_COLOR => dst[channel],
        glow::SRC_COLOR => src[channel],
        glow::DST_ALPHA => dst[3],
        glow::ONE_MINUS_DST_ALPHA => 1.0 - dst[3],
        _ => 1.0,
    }
}

fn gl_type_of(glsl: &str) -> Option<u32> {
    Some(match glsl {
        "float" => glow::FLOAT,
        "vec2" => glow::FLOAT_VEC2,
        "vec3" => glow::FLOAT_VEC3,
        "vec4" => glow::FLOAT_VEC4,
        "mat3" => glow::FLOAT_MAT3,
        "mat4" => glow::FLOAT_MAT4,
        "sampler2D" => glow::SAMPLER_2D,
        "samplerCube" => glow::SAMPLER_CUBE,
        "int" => glow::INT,
        "bool" => glow::BOOL,
        _ => return None,
    })
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn occurrences(source: &str, name: &str) -> usize {
    source.split(|c| !is_ident(c)).filter(|t| *t == name).count()
}

/// Strips `#` directives and `//` comments.
fn strip(source: &str) -> String {
    source
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .map(|l| l.split("//").next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scans one stage for `(is_uniform, declaration)` pairs of active inputs.
fn scan_stage(stage: u32, source: &str) -> Vec<(bool, ActiveInput)> {
    let code = strip(source);
    let mut out = vec![];
    for stmt in code.split(|c| c == ';' || c == '{' || c == '}') {
        let tokens: Vec<&str> = stmt
            .split_whitespace()
            .filter(|t| {
                !t.starts_with("layout")
                    && !matches!(*t, "flat" | "smooth" | "lowp" | "mediump" | "highp")
            })
            .collect();
        if tokens.len() != 3 {
            continue;
        }
        let is_uniform = match tokens[0] {
            "uniform" => true,
            "attribute" => false,
            "in" if stage == glow::VERTEX_SHADER => false,
            _ => continue,
        };
        let Some(gl_type) = gl_type_of(tokens[1]) else {
            continue;
        };
        let (name, size) = match tokens[2].split_once('[') {
            Some((base, rest)) => (
                base.to_string(),
                rest.trim_end_matches(']').parse().unwrap_or(1),
            ),
            None => (tokens[2].to_string(), 1),
        };
        if occurrences(&code, &name) < 2 {
            continue;
        }
        // drivers report array uniforms with a [0] suffix
        let name = if size > 1 { format!("{}[0]", name) } else { name };
        out.push((is_uniform, ActiveInput { name, gl_type, size }));
    }
    out
}

/// Headless recording GPU, see the module docs.
#[derive(Default)]
pub struct TraceGpu {
    state: RefCell<TraceState>,
}

impl TraceGpu {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    /// Returns and forgets the recorded calls.
    pub fn take_calls(&self) -> Vec<GlCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    pub fn blend_calls(&self) -> Vec<(u32, u32)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                GlCall::BlendFunc(s, d) => Some((*s, *d)),
                _ => None,
            })
            .collect()
    }

    pub fn draw_calls(&self) -> Vec<GlCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, GlCall::DrawArrays { .. }))
            .cloned()
            .collect()
    }

    /// Makes every following link fail, as a driver rejecting a program would.
    pub fn set_link_failure(&self, fail: bool) {
        self.state.borrow_mut().fail_link = fail;
    }

    pub fn display_color(&self) -> [f32; 4] {
        self.state.borrow().display
    }

    pub fn texture_color(&self, texture: u32) -> Option<[f32; 4]> {
        self.state.borrow().textures.get(&texture).copied()
    }

    pub fn bound_framebuffer(&self) -> Option<u32> {
        self.state.borrow().bound_framebuffer
    }

    /// Lets `n` more object creations succeed, then every `create_*` fails.
    /// `None` removes the limit.
    pub fn set_create_budget(&self, n: Option<usize>) {
        self.state.borrow_mut().create_budget = n;
    }

    /// Objects created and not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }
}

impl Gpu for TraceGpu {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;
    type Framebuffer = u32;
    type Renderbuffer = u32;
    type VertexArray = u32;
    type UniformLocation = u32;

    fn create_shader(&self, stage: u32) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let shader = st.create_object()?;
        st.shaders.insert(
            shader,
            TraceShader {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        st.calls.push(GlCall::CreateShader { stage, shader });
        Ok(shader)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        let mut st = self.state.borrow_mut();
        if let Some(s) = st.shaders.get_mut(&shader) {
            s.source = source.to_string();
        }
        st.calls.push(GlCall::ShaderSource(shader));
    }

    fn compile_shader(&self, shader: u32) {
        let mut st = self.state.borrow_mut();
        if let Some(s) = st.shaders.get_mut(&shader) {
            s.compiled = occurrences(&strip(&s.source), "main") > 0;
            s.log = if s.compiled {
                String::new()
            } else {
                "ERROR: 0:1: 'main' : function not defined".to_string()
            };
        }
        st.calls.push(GlCall::CompileShader(shader));
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.compiled)
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&shader);
        st.shaders.remove(&shader);
        st.calls.push(GlCall::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let program = st.create_object()?;
        st.programs.insert(program, TraceProgram::default());
        st.calls.push(GlCall::CreateProgram(program));
        Ok(program)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        let mut st = self.state.borrow_mut();
        if let Some(p) = st.programs.get_mut(&program) {
            p.shaders.push(shader);
        }
        st.calls.push(GlCall::AttachShader(program, shader));
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        let mut st = self.state.borrow_mut();
        if let Some(p) = st.programs.get_mut(&program) {
            p.shaders.retain(|s| *s != shader);
        }
        st.calls.push(GlCall::DetachShader(program, shader));
    }

    fn link_program(&self, program: u32) {
        let mut st = self.state.borrow_mut();
        st.calls.push(GlCall::LinkProgram(program));
        let attached: Vec<(u32, String, bool)> = match st.programs.get(&program) {
            Some(p) => p
                .shaders
                .iter()
                .filter_map(|s| st.shaders.get(s))
                .map(|s| (s.stage, s.source.clone(), s.compiled))
                .collect(),
            None => return,
        };
        let fail_link = st.fail_link;
        let Some(p) = st.programs.get_mut(&program) else {
            return;
        };
        let stages_ok = attached.iter().all(|(_, _, ok)| *ok)
            && attached.iter().any(|(s, _, _)| *s == glow::VERTEX_SHADER)
            && attached.iter().any(|(s, _, _)| *s == glow::FRAGMENT_SHADER);
        if !stages_ok || fail_link {
            p.linked = false;
            p.log = "error: program could not be linked".to_string();
            return;
        }
        p.linked = true;
        p.attributes.clear();
        p.uniforms.clear();
        for (stage, source, _) in attached.iter() {
            for (is_uniform, input) in scan_stage(*stage, source) {
                if is_uniform {
                    if !p.uniforms.iter().any(|u| u.name == input.name) {
                        p.uniforms.push(input);
                    }
                } else {
                    p.attributes.push(input);
                }
            }
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.linked)
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&program);
        st.programs.remove(&program);
        st.calls.push(GlCall::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<u32>) {
        let mut st = self.state.borrow_mut();
        st.current_program = program;
        st.calls.push(GlCall::UseProgram(program));
    }

    fn active_attributes(&self, program: u32) -> Vec<ActiveInput> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn active_uniforms(&self, program: u32) -> Vec<ActiveInput> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        self.state
            .borrow()
            .programs
            .get(&program)?
            .attributes
            .iter()
            .position(|a| a.name == name)
            .map(|i| i as u32)
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        let mut st = self.state.borrow_mut();
        let base = name.trim_end_matches("[0]");
        let known = st.programs.get(&program)?.uniforms.iter().any(|u| {
            u.name == name || u.name.trim_end_matches("[0]") == base
        });
        if !known {
            return None;
        }
        let key = (program, base.to_string());
        if let Some(loc) = st.locations.get(&key) {
            return Some(*loc);
        }
        let loc = st.alloc();
        st.locations.insert(key, loc);
        Some(loc)
    }

    fn uniform_1_f32(&self, location: &u32, x: f32) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, vec![x]);
        st.calls.push(GlCall::Uniform1f(*location, x));
    }

    fn uniform_2_f32(&self, location: &u32, x: f32, y: f32) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, vec![x, y]);
        st.calls.push(GlCall::Uniform2f(*location, x, y));
    }

    fn uniform_3_f32(&self, location: &u32, x: f32, y: f32, z: f32) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, vec![x, y, z]);
        st.calls.push(GlCall::Uniform3f(*location, x, y, z));
    }

    fn uniform_4_f32(&self, location: &u32, x: f32, y: f32, z: f32, w: f32) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, vec![x, y, z, w]);
        st.calls.push(GlCall::Uniform4f(*location, x, y, z, w));
    }

    fn uniform_1_i32(&self, location: &u32, x: i32) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, vec![x as f32]);
        st.calls.push(GlCall::Uniform1i(*location, x));
    }

    fn uniform_matrix_3_f32(&self, location: &u32, m: &[f32; 9]) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, m.to_vec());
        st.calls.push(GlCall::UniformMatrix3(*location, *m));
    }

    fn uniform_matrix_4_f32(&self, location: &u32, m: &[f32; 16]) {
        let mut st = self.state.borrow_mut();
        st.uniform_values.insert(*location, m.to_vec());
        st.calls.push(GlCall::UniformMatrix4(*location, *m));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            data_type,
            normalized,
            stride,
            offset,
        });
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let vao = st.create_object()?;
        st.calls.push(GlCall::CreateVertexArray(vao));
        Ok(vao)
    }

    fn bind_vertex_array(&self, vao: Option<u32>) {
        self.record(GlCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&vao);
        st.calls.push(GlCall::DeleteVertexArray(vao));
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let buffer = st.create_object()?;
        st.calls.push(GlCall::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn bind_array_buffer(&self, buffer: Option<u32>) {
        self.record(GlCall::BindArrayBuffer(buffer));
    }

    fn array_buffer_data(&self, data: &[f32]) {
        self.record(GlCall::ArrayBufferData(data.to_vec()));
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&buffer);
        st.calls.push(GlCall::DeleteBuffer(buffer));
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let texture = st.create_object()?;
        st.textures.insert(texture, [0.0; 4]);
        st.calls.push(GlCall::CreateTexture(texture));
        Ok(texture)
    }

    fn active_texture(&self, unit: u32) {
        let mut st = self.state.borrow_mut();
        st.active_unit = unit;
        st.calls.push(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: Option<u32>) {
        let mut st = self.state.borrow_mut();
        let unit = if st.active_unit == 0 {
            glow::TEXTURE0
        } else {
            st.active_unit
        };
        match texture {
            Some(t) => st.units.insert(unit, t),
            None => st.units.remove(&unit),
        };
        st.calls.push(GlCall::BindTexture(texture));
    }

    fn tex_parameter_i32(&self, parameter: u32, value: i32) {
        self.record(GlCall::TexParameter(parameter, value));
    }

    fn tex_image_2d_rgba(&self, width: i32, height: i32, pixels: Option<&[u8]>) {
        let mut st = self.state.borrow_mut();
        let unit = if st.active_unit == 0 {
            glow::TEXTURE0
        } else {
            st.active_unit
        };
        let mut color = [0.0f32; 4];
        if let Some(px) = pixels {
            let count = (px.len() / 4).max(1) as f32;
            for chunk in px.chunks_exact(4) {
                for (c, v) in color.iter_mut().zip(chunk.iter()) {
                    *c += *v as f32 / 255.0 / count;
                }
            }
        }
        if let Some(t) = st.units.get(&unit).copied() {
            st.textures.insert(t, color);
        }
        st.calls.push(GlCall::TexImage2d {
            width,
            height,
            with_data: pixels.is_some(),
        });
    }

    fn delete_texture(&self, texture: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&texture);
        st.textures.remove(&texture);
        st.calls.push(GlCall::DeleteTexture(texture));
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let fb = st.create_object()?;
        st.framebuffers.insert(fb, None);
        st.calls.push(GlCall::CreateFramebuffer(fb));
        Ok(fb)
    }

    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        let mut st = self.state.borrow_mut();
        st.bound_framebuffer = framebuffer;
        st.calls.push(GlCall::BindFramebuffer(framebuffer));
    }

    fn framebuffer_color_texture(&self, texture: Option<u32>) {
        let mut st = self.state.borrow_mut();
        if let Some(fb) = st.bound_framebuffer {
            st.framebuffers.insert(fb, texture);
        }
        st.calls.push(GlCall::FramebufferColorTexture(texture));
    }

    fn framebuffer_depth_renderbuffer(&self, renderbuffer: Option<u32>) {
        self.record(GlCall::FramebufferDepthRenderbuffer(renderbuffer));
    }

    fn check_framebuffer_status(&self) -> u32 {
        let st = self.state.borrow();
        match st.bound_framebuffer {
            Some(fb) if matches!(st.framebuffers.get(&fb), Some(Some(_))) => {
                glow::FRAMEBUFFER_COMPLETE
            }
            Some(_) => glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT,
            None => glow::FRAMEBUFFER_COMPLETE,
        }
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&framebuffer);
        st.framebuffers.remove(&framebuffer);
        st.calls.push(GlCall::DeleteFramebuffer(framebuffer));
    }

    fn create_renderbuffer(&self) -> Result<u32, String> {
        let mut st = self.state.borrow_mut();
        let rb = st.create_object()?;
        st.calls.push(GlCall::CreateRenderbuffer(rb));
        Ok(rb)
    }

    fn bind_renderbuffer(&self, renderbuffer: Option<u32>) {
        self.record(GlCall::BindRenderbuffer(renderbuffer));
    }

    fn renderbuffer_storage(&self, internal_format: u32, width: i32, height: i32) {
        self.record(GlCall::RenderbufferStorage {
            format: internal_format,
            width,
            height,
        });
    }

    fn delete_renderbuffer(&self, renderbuffer: u32) {
        let mut st = self.state.borrow_mut();
        st.live.remove(&renderbuffer);
        st.calls.push(GlCall::DeleteRenderbuffer(renderbuffer));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport(x, y, width, height));
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        let mut st = self.state.borrow_mut();
        st.clear_color = [r, g, b, a];
        st.calls.push(GlCall::ClearColor([r, g, b, a]));
    }

    fn clear(&self, mask: u32) {
        let mut st = self.state.borrow_mut();
        if mask & glow::COLOR_BUFFER_BIT != 0 {
            let c = st.clear_color;
            *st.destination() = c;
        }
        st.calls.push(GlCall::Clear(mask));
    }

    fn enable(&self, capability: u32) {
        let mut st = self.state.borrow_mut();
        if capability == glow::BLEND {
            st.blend_enabled = true;
        }
        st.calls.push(GlCall::Enable(capability));
    }

    fn disable(&self, capability: u32) {
        let mut st = self.state.borrow_mut();
        if capability == glow::BLEND {
            st.blend_enabled = false;
        }
        st.calls.push(GlCall::Disable(capability));
    }

    fn blend_func(&self, src: u32, dst: u32) {
        let mut st = self.state.borrow_mut();
        st.blend = (src, dst);
        st.calls.push(GlCall::BlendFunc(src, dst));
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        let mut st = self.state.borrow_mut();
        st.calls.push(GlCall::DrawArrays { mode, first, count });
        let Some(program) = st.current_program else {
            return;
        };
        let src = st.shade(program);
        let (sf, df) = st.blend;
        let blend_enabled = st.blend_enabled;
        let dst = st.destination();
        let old = *dst;
        for i in 0..4 {
            dst[i] = if blend_enabled {
                (src[i] * blend_factor(sf, &src, &old, i) + old[i] * blend_factor(df, &src, &old, i))
                    .clamp(0.0, 1.0)
            } else {
                src[i]
            };
        }
    }

    fn flush(&self) {
        self.record(GlCall::Flush);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
        in vec2 a_position;
        in vec2 a_unused;
        uniform mat3 u_world;
        void main() { gl_Position = vec4(u_world * vec3(a_position, 1.0), 1.0); }
    "#;

    #[test]
    fn scans_only_used_declarations() {
        let found = scan_stage(glow::VERTEX_SHADER, VS);
        let names: Vec<&str> = found.iter().map(|(_, i)| i.name.as_str()).collect();
        assert_eq!(names, vec!["a_position", "u_world"]);
        assert!(!found[0].0);
        assert!(found[1].0);
        assert_eq!(found[1].1.gl_type, glow::FLOAT_MAT3);
    }

    #[test]
    fn clear_writes_bound_destination() {
        let gpu = TraceGpu::new();
        gpu.clear_color(0.25, 0.5, 0.75, 1.0);
        gpu.clear(glow::COLOR_BUFFER_BIT);
        assert_eq!(gpu.display_color(), [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn create_budget_and_live_objects() {
        let gpu = TraceGpu::new();
        gpu.set_create_budget(Some(2));
        let b = gpu.create_buffer().unwrap();
        let t = gpu.create_texture().unwrap();
        assert!(gpu.create_framebuffer().is_err());
        assert_eq!(gpu.live_objects(), 2);
        gpu.delete_buffer(b);
        gpu.delete_texture(t);
        assert_eq!(gpu.live_objects(), 0);
        gpu.set_create_budget(None);
        assert!(gpu.create_framebuffer().is_ok());
    }

    #[test]
    fn multiply_blend_factor_uses_destination() {
        let src = [0.5, 0.5, 0.5, 1.0];
        let dst = [0.2, 0.4, 0.6, 1.0];
        assert_eq!(blend_factor(glow::DST_COLOR, &src, &dst, 1), 0.4);
        assert_eq!(blend_factor(glow::ONE_MINUS_SRC_ALPHA, &src, &dst, 0), 0.0);
    }
}
