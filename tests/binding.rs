// RustPixel
// copyright zipxing@hotmail.com 2022～2025

use pixel_compositor::{
    gpu::{Gpu, TraceGpu},
    render::{AttribLayout, BindError, ParamKind, ShaderProgram, UniformValue, ValueType},
};

const VS: &str = r#"
    in vec2 a_position;
    in vec3 a_normal;
    in float a_weight;
    in vec4 a_unused;
    uniform mat4 u_projection;
    uniform mat3 u_world;
    out float v_weight;
    void main() {
        v_weight = a_weight + a_normal.x;
        gl_Position = u_projection * vec4(u_world * vec3(a_position, 1.0), 1.0);
    }
"#;

const FS: &str = r#"
    precision mediump float;
    uniform sampler2D u_image;
    uniform vec3 u_light;
    uniform float u_time;
    uniform vec4 u_unused;
    in float v_weight;
    out vec4 fragColor;
    void main() {
        fragColor = texture(u_image, vec2(u_time)) * vec4(u_light, v_weight);
    }
"#;

fn program(gpu: &TraceGpu) -> ShaderProgram<TraceGpu> {
    ShaderProgram::compile(gpu, "#version 330 core", VS, FS).unwrap()
}

#[test]
fn test_table_matches_active_inputs() {
    let gpu = TraceGpu::new();
    let sp = program(&gpu);
    let p = sp.program().unwrap();
    let attrs = gpu.active_attributes(p);
    let uniforms = gpu.active_uniforms(p);
    assert_eq!(attrs.len(), 3);
    assert_eq!(uniforms.len(), 5);
    assert_eq!(sp.table().len(), attrs.len() + uniforms.len());

    let expect = [
        ("a_position", ParamKind::Attribute, ValueType::Vec2),
        ("a_normal", ParamKind::Attribute, ValueType::Vec3),
        ("a_weight", ParamKind::Attribute, ValueType::Scalar),
        ("u_projection", ParamKind::Uniform, ValueType::Mat4),
        ("u_world", ParamKind::Uniform, ValueType::Mat3),
        ("u_image", ParamKind::Uniform, ValueType::Sampler2D),
        ("u_light", ParamKind::Uniform, ValueType::Vec3),
        ("u_time", ParamKind::Uniform, ValueType::Scalar),
    ];
    for (name, kind, vt) in expect {
        let d = sp.table().get(name).unwrap();
        assert_eq!(d.kind(), kind, "{}", name);
        assert_eq!(d.value_type, vt, "{}", name);
    }
    assert!(!sp.table().contains("a_unused"));
    assert!(!sp.table().contains("u_unused"));
}

#[test]
fn test_absent_names_leave_gpu_untouched() {
    let gpu = TraceGpu::new();
    let sp = program(&gpu);
    sp.bind(&gpu);
    gpu.take_calls();
    assert_eq!(sp.set_uniform(&gpu, "u_unused", UniformValue::Vec4([0.0; 4])), Ok(()));
    assert_eq!(sp.set_attribute(&gpu, "a_unused", AttribLayout::default()), Ok(()));
    assert_eq!(sp.set_option(&gpu, "u_nothing", &[1.0, 2.0, 3.0]), Ok(()));
    assert!(gpu.calls().is_empty());
}

#[test]
fn test_fixed_arity_binders() {
    let gpu = TraceGpu::new();
    let sp = program(&gpu);
    sp.bind(&gpu);
    assert_eq!(sp.set_option(&gpu, "u_projection", &[0.0; 16]), Ok(()));
    assert_eq!(sp.set_option(&gpu, "u_light", &[1.0, 1.0, 1.0]), Ok(()));
    assert_eq!(sp.set_option(&gpu, "u_time", &[0.5]), Ok(()));
    assert!(matches!(
        sp.set_option(&gpu, "u_projection", &[0.0; 9]),
        Err(BindError::ArityMismatch { expected: 16, found: 9, .. })
    ));
    assert!(matches!(
        sp.set_uniform(&gpu, "u_light", UniformValue::Vec4([0.0; 4])),
        Err(BindError::TypeMismatch {
            expected: ValueType::Vec3,
            found: ValueType::Vec4,
            ..
        })
    ));
    assert!(matches!(
        sp.set_option(&gpu, "a_weight", &[1.0]),
        Err(BindError::KindMismatch { .. })
    ));
    assert_eq!(sp.set_attribute(&gpu, "a_weight", AttribLayout::default()), Ok(()));
}
