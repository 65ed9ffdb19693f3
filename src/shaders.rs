use crate::gpu::ShaderKind;

/// Names of the vertex inputs shared by both programs.
pub const POSITION_ATTRIBUTE: &str = "aVertexPosition";
pub const TEXTURE_COORD_ATTRIBUTE: &str = "aTextureCoord";
pub const COLOR_ATTRIBUTE: &str = "aColor";

/// Textured quads modulated by a per-vertex RGBA tint read from four normalized bytes. The
/// tint's alpha carries the node's world alpha.
pub const SPRITE_WGSL: &str = r#"
struct Projection {
    matrix: mat3x3<f32>,
}
@group(0) @binding(0) var<uniform> projection: Projection;

@group(1) @binding(0) var t_diffuse: texture_2d<f32>;
@group(1) @binding(1) var s_diffuse: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) tint: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) tint: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let clip = projection.matrix * vec3<f32>(input.position, 1.0);
    out.clip_position = vec4<f32>(clip.xy, 0.0, 1.0);
    out.uv = input.uv;
    out.tint = input.tint;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(t_diffuse, s_diffuse, input.uv) * input.tint;
}
"#;

/// Glyph quads: the glyph texture modulated by an opaque per-vertex RGB color.
pub const TEXT_WGSL: &str = r#"
struct Projection {
    matrix: mat3x3<f32>,
}
@group(0) @binding(0) var<uniform> projection: Projection;

@group(1) @binding(0) var t_glyph: texture_2d<f32>;
@group(1) @binding(1) var s_glyph: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let clip = projection.matrix * vec3<f32>(input.position, 1.0);
    out.clip_position = vec4<f32>(clip.xy, 0.0, 1.0);
    out.uv = input.uv;
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(t_glyph, s_glyph, input.uv) * vec4<f32>(input.color, 1.0);
}
"#;

pub fn source(kind: ShaderKind) -> &'static str {
    match kind {
        ShaderKind::Sprite => SPRITE_WGSL,
        ShaderKind::Text => TEXT_WGSL,
    }
}

/// Binding locations of the named vertex inputs, as declared in the WGSL above.
pub fn attribute_location(kind: ShaderKind, name: &str) -> Option<u32> {
    match (kind, name) {
        (_, POSITION_ATTRIBUTE) => Some(0),
        (_, TEXTURE_COORD_ATTRIBUTE) => Some(1),
        (_, COLOR_ATTRIBUTE) => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_locations_match_wgsl_declarations() {
        for kind in [ShaderKind::Sprite, ShaderKind::Text] {
            let wgsl = source(kind);
            for name in [POSITION_ATTRIBUTE, TEXTURE_COORD_ATTRIBUTE, COLOR_ATTRIBUTE] {
                let location = attribute_location(kind, name).unwrap();
                assert!(wgsl.contains(&format!("@location({location})")));
            }
            assert_eq!(attribute_location(kind, "aUnknown"), None);
        }
    }
}
