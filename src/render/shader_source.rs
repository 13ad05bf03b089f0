// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! GLSL sources. The version line is not part of the sources, it is
//! prepended at compile time from the render settings (`#version 330 core`
//! on desktop GL, `#version 300 es` on GLES / WebGL2).

// sprite shader ...
pub const VERTEX_SRC_SPRITE: &str = r#"
            in vec2 a_position;
            in vec2 a_texCoord;
            uniform mat3 u_world;
            uniform mat3 u_object;
            uniform vec2 u_frame;
            out vec2 v_texCoord;
            void main() {
                gl_Position = vec4(u_world * u_object * vec3(a_position, 1.0), 1.0);
                v_texCoord = a_texCoord + u_frame;
            }
        "#;

pub const FRAGMENT_SRC_SPRITE: &str = r#"
            precision mediump float;
            uniform sampler2D u_image;
            uniform vec4 u_color;
            in vec2 v_texCoord;
            out vec4 fragColor;
            void main() {
                fragColor = texture(u_image, v_texCoord) * u_color;
            }
        "#;

// render target composite shader, draws the target texture as a full quad
pub const VERTEX_SRC_COMPOSITE: &str = r#"
            in vec2 a_position;
            in vec2 a_texCoord;
            out vec2 v_texCoord;
            void main() {
                gl_Position = vec4(a_position, 1.0, 1.0);
                v_texCoord = a_texCoord;
            }
        "#;

pub const FRAGMENT_SRC_COMPOSITE: &str = r#"
            precision mediump float;
            uniform sampler2D u_image;
            in vec2 v_texCoord;
            out vec4 fragColor;
            void main() {
                fragColor = texture(u_image, v_texCoord);
            }
        "#;
