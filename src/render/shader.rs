// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! # Shader Programs and Binding Tables
//!
//! A [`ShaderProgram`] is compiled once from a vertex / fragment pair. After
//! linking, every active attribute and uniform is introspected into a
//! [`BindingTable`] keyed by name, so draw code binds parameters by semantic
//! name whatever shader variant is in use:
//!
//! ```text
//! "a_position" -> Attribute(slot 0), Vec2
//! "u_world"    -> Uniform(loc),      Mat3
//! "u_image"    -> Uniform(loc),      Sampler2D
//! ```
//!
//! Binding rules:
//! - a name missing from the table is silently ignored (`Ok(())`, no GPU call)
//! - a value whose variant or arity differs from the declared type is rejected
//!   before anything reaches the GPU
//! - a program that failed to build is *invalid*: its table is empty and every
//!   bind on it is a no-op

use crate::gpu::Gpu;
use log::{error, warn};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Attribute,
    Uniform,
}

/// The closed set of parameter types the binder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Sampler2D,
}

impl ValueType {
    pub fn from_gl(gl_type: u32) -> Option<Self> {
        Some(match gl_type {
            glow::FLOAT => Self::Scalar,
            glow::FLOAT_VEC2 => Self::Vec2,
            glow::FLOAT_VEC3 => Self::Vec3,
            glow::FLOAT_VEC4 => Self::Vec4,
            glow::FLOAT_MAT3 => Self::Mat3,
            glow::FLOAT_MAT4 => Self::Mat4,
            glow::SAMPLER_2D => Self::Sampler2D,
            _ => return None,
        })
    }

    /// Number of floats a value of this type is made of.
    pub fn arity(self) -> usize {
        match self {
            Self::Scalar | Self::Sampler2D => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    /// Component count for `vertexAttribPointer`, matrices and samplers
    /// are not bindable as vertex attributes here.
    pub fn attribute_components(self) -> Option<i32> {
        match self {
            Self::Scalar => Some(1),
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            _ => None,
        }
    }
}

/// A uniform value with the exact arity of its type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    /// texture unit index
    Sampler(i32),
}

impl UniformValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Scalar(_) => ValueType::Scalar,
            Self::Vec2(_) => ValueType::Vec2,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Vec4(_) => ValueType::Vec4,
            Self::Mat3(_) => ValueType::Mat3,
            Self::Mat4(_) => ValueType::Mat4,
            Self::Sampler(_) => ValueType::Sampler2D,
        }
    }

    /// Builds a value of type `vt` from a flat slice, `None` unless the
    /// slice length is exactly the arity of `vt`.
    pub fn from_slice(vt: ValueType, v: &[f32]) -> Option<Self> {
        if v.len() != vt.arity() {
            return None;
        }
        Some(match vt {
            ValueType::Scalar => Self::Scalar(v[0]),
            ValueType::Vec2 => Self::Vec2(v.try_into().ok()?),
            ValueType::Vec3 => Self::Vec3(v.try_into().ok()?),
            ValueType::Vec4 => Self::Vec4(v.try_into().ok()?),
            ValueType::Mat3 => Self::Mat3(v.try_into().ok()?),
            ValueType::Mat4 => Self::Mat4(v.try_into().ok()?),
            ValueType::Sampler2D => Self::Sampler(v[0] as i32),
        })
    }
}

/// Vertex attribute layout, read from the currently bound array buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribLayout {
    pub data_type: u32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: i32,
}

impl Default for AttribLayout {
    fn default() -> Self {
        Self {
            data_type: glow::FLOAT,
            normalized: false,
            stride: 0,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Slot<L> {
    Attribute(u32),
    Uniform(L),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDesc<L> {
    pub slot: Slot<L>,
    pub value_type: ValueType,
}

impl<L> ParamDesc<L> {
    pub fn kind(&self) -> ParamKind {
        match self.slot {
            Slot::Attribute(_) => ParamKind::Attribute,
            Slot::Uniform(_) => ParamKind::Uniform,
        }
    }
}

/// name -> descriptor for every active input of a linked program
#[derive(Debug, Clone)]
pub struct BindingTable<L> {
    params: HashMap<String, ParamDesc<L>>,
}

impl<L> Default for BindingTable<L> {
    fn default() -> Self {
        Self {
            params: HashMap::new(),
        }
    }
}

impl<L> BindingTable<L> {
    pub fn get(&self, name: &str) -> Option<&ParamDesc<L>> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("create {what} failed: {reason}")]
    Create { what: &'static str, reason: String },
    #[error("{stage} shader compile error: {log}")]
    Compile { stage: &'static str, log: String },
    #[error("program link error: {log}")]
    Link { log: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("`{name}` is declared {expected:?}, got {found:?}")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },
    #[error("`{name}` is {declared:?}, not bindable this way")]
    KindMismatch { name: String, declared: ParamKind },
    #[error("`{name}` needs {expected} values, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("`{name}` of type {value_type:?} cannot be a vertex attribute")]
    UnsupportedAttribute { name: String, value_type: ValueType },
}

fn stage_name(stage: u32) -> &'static str {
    if stage == glow::VERTEX_SHADER {
        "vertex"
    } else {
        "fragment"
    }
}

fn compile_stage<G: Gpu>(
    gpu: &G,
    stage: u32,
    ver: &str,
    source: &str,
) -> Result<G::Shader, ShaderError> {
    let shader = gpu.create_shader(stage).map_err(|reason| ShaderError::Create {
        what: stage_name(stage),
        reason,
    })?;
    if ver.is_empty() {
        gpu.shader_source(shader, source);
    } else {
        gpu.shader_source(shader, &format!("{}\n{}", ver, source));
    }
    gpu.compile_shader(shader);
    if !gpu.shader_compile_status(shader) {
        let log = gpu.shader_info_log(shader);
        gpu.delete_shader(shader);
        return Err(ShaderError::Compile {
            stage: stage_name(stage),
            log,
        });
    }
    Ok(shader)
}

/// Linked program plus its binding table.
pub struct ShaderProgram<G: Gpu> {
    program: Option<G::Program>,
    table: BindingTable<G::UniformLocation>,
}

impl<G: Gpu> ShaderProgram<G> {
    /// Compiles and links a program, then introspects its active inputs.
    /// The stage objects are released whatever the outcome.
    pub fn compile(
        gpu: &G,
        ver: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vs = compile_stage(gpu, glow::VERTEX_SHADER, ver, vertex_source)?;
        let fs = match compile_stage(gpu, glow::FRAGMENT_SHADER, ver, fragment_source) {
            Ok(fs) => fs,
            Err(e) => {
                gpu.delete_shader(vs);
                return Err(e);
            }
        };
        let program = match gpu.create_program() {
            Ok(p) => p,
            Err(reason) => {
                gpu.delete_shader(vs);
                gpu.delete_shader(fs);
                return Err(ShaderError::Create {
                    what: "program",
                    reason,
                });
            }
        };
        gpu.attach_shader(program, vs);
        gpu.attach_shader(program, fs);
        gpu.link_program(program);
        let linked = gpu.program_link_status(program);
        let table = if linked {
            Self::introspect(gpu, program)
        } else {
            BindingTable::default()
        };
        gpu.detach_shader(program, vs);
        gpu.detach_shader(program, fs);
        gpu.delete_shader(vs);
        gpu.delete_shader(fs);
        if !linked {
            let log = gpu.program_info_log(program);
            gpu.delete_program(program);
            return Err(ShaderError::Link { log });
        }
        Ok(Self {
            program: Some(program),
            table,
        })
    }

    /// Like [`compile`](Self::compile), but a failure is logged and yields an
    /// invalid program whose binds are all no-ops.
    pub fn compile_or_invalid(
        gpu: &G,
        ver: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Self {
        match Self::compile(gpu, ver, vertex_source, fragment_source) {
            Ok(p) => p,
            Err(e) => {
                error!("shader build failed: {}", e);
                Self::invalid()
            }
        }
    }

    pub fn invalid() -> Self {
        Self {
            program: None,
            table: BindingTable::default(),
        }
    }

    fn introspect(gpu: &G, program: G::Program) -> BindingTable<G::UniformLocation> {
        let mut params = HashMap::new();
        for input in gpu.active_attributes(program) {
            let Some(value_type) = ValueType::from_gl(input.gl_type) else {
                warn!("attribute {} has unsupported type 0x{:x}", input.name, input.gl_type);
                continue;
            };
            if let Some(loc) = gpu.attrib_location(program, &input.name) {
                params.insert(
                    input.name,
                    ParamDesc {
                        slot: Slot::Attribute(loc),
                        value_type,
                    },
                );
            }
        }
        for input in gpu.active_uniforms(program) {
            let Some(value_type) = ValueType::from_gl(input.gl_type) else {
                warn!("uniform {} has unsupported type 0x{:x}", input.name, input.gl_type);
                continue;
            };
            if let Some(loc) = gpu.uniform_location(program, &input.name) {
                let name = input.name.trim_end_matches("[0]").to_string();
                params.insert(
                    name,
                    ParamDesc {
                        slot: Slot::Uniform(loc),
                        value_type,
                    },
                );
            }
        }
        BindingTable { params }
    }

    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<G::Program> {
        self.program
    }

    pub fn table(&self) -> &BindingTable<G::UniformLocation> {
        &self.table
    }

    pub fn bind(&self, gpu: &G) {
        if let Some(p) = self.program {
            gpu.use_program(Some(p));
        }
    }

    pub fn unbind(&self, gpu: &G) {
        if self.program.is_some() {
            gpu.use_program(None);
        }
    }

    /// Uploads a uniform. The program must be bound.
    pub fn set_uniform(&self, gpu: &G, name: &str, value: UniformValue) -> Result<(), BindError> {
        let Some(desc) = self.table.get(name) else {
            return Ok(());
        };
        let Slot::Uniform(loc) = &desc.slot else {
            return Err(BindError::KindMismatch {
                name: name.to_string(),
                declared: ParamKind::Attribute,
            });
        };
        if value.value_type() != desc.value_type {
            return Err(BindError::TypeMismatch {
                name: name.to_string(),
                expected: desc.value_type,
                found: value.value_type(),
            });
        }
        match value {
            UniformValue::Scalar(x) => gpu.uniform_1_f32(loc, x),
            UniformValue::Vec2([x, y]) => gpu.uniform_2_f32(loc, x, y),
            UniformValue::Vec3([x, y, z]) => gpu.uniform_3_f32(loc, x, y, z),
            UniformValue::Vec4([x, y, z, w]) => gpu.uniform_4_f32(loc, x, y, z, w),
            UniformValue::Mat3(m) => gpu.uniform_matrix_3_f32(loc, &m),
            UniformValue::Mat4(m) => gpu.uniform_matrix_4_f32(loc, &m),
            UniformValue::Sampler(unit) => gpu.uniform_1_i32(loc, unit),
        }
        Ok(())
    }

    /// Enables an attribute and points it at the bound array buffer.
    pub fn set_attribute(&self, gpu: &G, name: &str, layout: AttribLayout) -> Result<(), BindError> {
        let Some(desc) = self.table.get(name) else {
            return Ok(());
        };
        let Slot::Attribute(loc) = desc.slot else {
            return Err(BindError::KindMismatch {
                name: name.to_string(),
                declared: ParamKind::Uniform,
            });
        };
        let Some(size) = desc.value_type.attribute_components() else {
            return Err(BindError::UnsupportedAttribute {
                name: name.to_string(),
                value_type: desc.value_type,
            });
        };
        gpu.enable_vertex_attrib_array(loc);
        gpu.vertex_attrib_pointer_f32(
            loc,
            size,
            layout.data_type,
            layout.normalized,
            layout.stride,
            layout.offset,
        );
        Ok(())
    }

    /// Binds an untyped option value against the declared uniform type.
    pub fn set_option(&self, gpu: &G, name: &str, values: &[f32]) -> Result<(), BindError> {
        let Some(desc) = self.table.get(name) else {
            return Ok(());
        };
        if desc.kind() == ParamKind::Attribute {
            return Err(BindError::KindMismatch {
                name: name.to_string(),
                declared: ParamKind::Attribute,
            });
        }
        let value =
            UniformValue::from_slice(desc.value_type, values).ok_or_else(|| BindError::ArityMismatch {
                name: name.to_string(),
                expected: desc.value_type.arity(),
                found: values.len(),
            })?;
        self.set_uniform(gpu, name, value)
    }

    pub fn release(&mut self, gpu: &G) {
        if let Some(p) = self.program.take() {
            gpu.delete_program(p);
        }
        self.table = BindingTable::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GlCall, TraceGpu};
    use crate::render::shader_source::*;

    const VER: &str = "#version 330 core";

    #[test]
    fn sprite_table_has_every_active_input() {
        let gpu = TraceGpu::new();
        let sp = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_SPRITE, FRAGMENT_SRC_SPRITE).unwrap();
        let t = sp.table();
        // 2 attributes + 5 uniforms
        assert_eq!(t.len(), 7);
        assert_eq!(t.get("a_position").unwrap().kind(), ParamKind::Attribute);
        assert_eq!(t.get("a_texCoord").unwrap().value_type, ValueType::Vec2);
        assert_eq!(t.get("u_world").unwrap().value_type, ValueType::Mat3);
        assert_eq!(t.get("u_object").unwrap().value_type, ValueType::Mat3);
        assert_eq!(t.get("u_frame").unwrap().value_type, ValueType::Vec2);
        assert_eq!(t.get("u_color").unwrap().value_type, ValueType::Vec4);
        assert_eq!(t.get("u_image").unwrap().value_type, ValueType::Sampler2D);
        assert_eq!(t.get("u_image").unwrap().kind(), ParamKind::Uniform);
    }

    #[test]
    fn stage_objects_are_released_after_link() {
        let gpu = TraceGpu::new();
        let _ = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_COMPOSITE, FRAGMENT_SRC_COMPOSITE)
            .unwrap();
        let calls = gpu.calls();
        assert_eq!(
            calls.iter().filter(|c| matches!(c, GlCall::DetachShader(..))).count(),
            2
        );
        assert_eq!(
            calls.iter().filter(|c| matches!(c, GlCall::DeleteShader(_))).count(),
            2
        );
    }

    #[test]
    fn absent_names_are_silent_no_ops() {
        let gpu = TraceGpu::new();
        let sp = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_COMPOSITE, FRAGMENT_SRC_COMPOSITE)
            .unwrap();
        gpu.take_calls();
        assert_eq!(sp.set_uniform(&gpu, "u_missing", UniformValue::Scalar(1.0)), Ok(()));
        assert_eq!(sp.set_attribute(&gpu, "a_missing", AttribLayout::default()), Ok(()));
        assert_eq!(sp.set_option(&gpu, "scalex", &[2.0]), Ok(()));
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn mismatches_are_rejected_before_the_gpu() {
        let gpu = TraceGpu::new();
        let sp = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_SPRITE, FRAGMENT_SRC_SPRITE).unwrap();
        gpu.take_calls();
        assert!(matches!(
            sp.set_uniform(&gpu, "u_color", UniformValue::Vec2([1.0, 1.0])),
            Err(BindError::TypeMismatch { .. })
        ));
        assert!(matches!(
            sp.set_uniform(&gpu, "a_position", UniformValue::Vec2([1.0, 1.0])),
            Err(BindError::KindMismatch { .. })
        ));
        assert!(matches!(
            sp.set_attribute(&gpu, "u_world", AttribLayout::default()),
            Err(BindError::KindMismatch { .. })
        ));
        assert_eq!(
            sp.set_option(&gpu, "u_color", &[1.0, 0.5]),
            Err(BindError::ArityMismatch {
                name: "u_color".to_string(),
                expected: 4,
                found: 2
            })
        );
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn uniform_dispatch_by_type() {
        let gpu = TraceGpu::new();
        let sp = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_SPRITE, FRAGMENT_SRC_SPRITE).unwrap();
        sp.bind(&gpu);
        gpu.take_calls();
        sp.set_option(&gpu, "u_color", &[0.5, 0.25, 1.0, 1.0]).unwrap();
        sp.set_option(&gpu, "u_image", &[0.0]).unwrap();
        sp.set_uniform(&gpu, "u_frame", UniformValue::Vec2([0.5, 0.0])).unwrap();
        let loc = |name: &str| match sp.table().get(name).unwrap().slot {
            Slot::Uniform(l) => l,
            Slot::Attribute(_) => panic!("{} is not a uniform", name),
        };
        assert_eq!(
            gpu.take_calls(),
            vec![
                GlCall::Uniform4f(loc("u_color"), 0.5, 0.25, 1.0, 1.0),
                GlCall::Uniform1i(loc("u_image"), 0),
                GlCall::Uniform2f(loc("u_frame"), 0.5, 0.0),
            ]
        );
    }

    #[test]
    fn attribute_uses_default_layout() {
        let gpu = TraceGpu::new();
        let sp = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_SPRITE, FRAGMENT_SRC_SPRITE).unwrap();
        gpu.take_calls();
        sp.set_attribute(&gpu, "a_texCoord", AttribLayout::default()).unwrap();
        let calls = gpu.take_calls();
        let Slot::Attribute(loc) = sp.table().get("a_texCoord").unwrap().slot else {
            panic!("a_texCoord is not an attribute");
        };
        assert_eq!(calls[0], GlCall::EnableVertexAttribArray(loc));
        assert_eq!(
            calls[1],
            GlCall::VertexAttribPointer {
                index: loc,
                size: 2,
                data_type: glow::FLOAT,
                normalized: false,
                stride: 0,
                offset: 0,
            }
        );
    }

    #[test]
    fn compile_failure_reports_stage_and_log() {
        let gpu = TraceGpu::new();
        let err = ShaderProgram::compile(&gpu, VER, "in vec2 a;", FRAGMENT_SRC_SPRITE)
            .err()
            .unwrap();
        assert!(matches!(err, ShaderError::Compile { stage: "vertex", .. }));
    }

    #[test]
    fn link_failure_gives_invalid_no_op_program() {
        let gpu = TraceGpu::new();
        gpu.set_link_failure(true);
        let err = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_SPRITE, FRAGMENT_SRC_SPRITE)
            .err()
            .unwrap();
        assert!(matches!(err, ShaderError::Link { .. }));

        let sp = ShaderProgram::compile_or_invalid(&gpu, VER, VERTEX_SRC_SPRITE, FRAGMENT_SRC_SPRITE);
        assert!(!sp.is_valid());
        assert!(sp.table().is_empty());
        gpu.take_calls();
        sp.bind(&gpu);
        sp.set_option(&gpu, "u_color", &[1.0, 1.0, 1.0, 1.0]).unwrap();
        sp.unbind(&gpu);
        assert!(gpu.calls().is_empty());
    }

    #[test]
    fn unsupported_types_are_left_out() {
        let gpu = TraceGpu::new();
        let fs = r#"
            uniform sampler2D u_image;
            uniform int u_mode;
            uniform float u_weights[4];
            in vec2 v_texCoord;
            out vec4 fragColor;
            void main() {
                fragColor = texture(u_image, v_texCoord) * float(u_mode) * u_weights[1];
            }
        "#;
        let sp = ShaderProgram::compile(&gpu, VER, VERTEX_SRC_COMPOSITE, fs).unwrap();
        let t = sp.table();
        assert!(!t.contains("u_mode"));
        assert!(t.contains("u_weights"));
        assert!(!t.contains("u_weights[0]"));
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn option_arity_per_type() {
        for (vt, n) in [
            (ValueType::Scalar, 1),
            (ValueType::Vec3, 3),
            (ValueType::Mat3, 9),
            (ValueType::Mat4, 16),
            (ValueType::Sampler2D, 1),
        ] {
            assert_eq!(vt.arity(), n);
            assert!(UniformValue::from_slice(vt, &vec![0.0; n]).is_some());
            assert!(UniformValue::from_slice(vt, &vec![0.0; n + 1]).is_none());
        }
    }
}
