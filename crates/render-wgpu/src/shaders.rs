use shadowcast_render::ShaderSource;

/// WGSL for textured, lit, shadow-receiving surfaces.
///
/// Group 0 holds the per-object and light records, group 1 the surface
/// texture, group 2 the shadow map with its comparison sampler. Only the
/// first directional light is shadowed.
pub const LIT_SHADER: &str = r#"
struct PerObject {
    world: mat4x4<f32>,
    world_inv_transpose: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
};

struct Light {
    color: vec3<f32>,
    kind: u32,
    direction: vec3<f32>,
    range: f32,
    position: vec3<f32>,
    intensity: f32,
};

struct LightData {
    camera_position: vec3<f32>,
    light_count: u32,
    lights: array<Light, 8>,
};

const MAX_LIGHTS: u32 = 8u;
const LIGHT_DIRECTIONAL: u32 = 0u;
const AMBIENT: f32 = 0.15;

@group(0) @binding(0)
var<uniform> object: PerObject;
@group(0) @binding(1)
var<uniform> light_data: LightData;

@group(1) @binding(0)
var surface_texture: texture_2d<f32>;
@group(1) @binding(1)
var surface_sampler: sampler;

@group(2) @binding(0)
var shadow_map: texture_depth_2d;
@group(2) @binding(1)
var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) light_clip: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = object.world * vec4<f32>(vertex.position, 1.0);
    var out: VertexOutput;
    out.clip_position = object.projection * object.view * world_pos;
    out.world_position = world_pos.xyz;
    out.world_normal = (object.world_inv_transpose * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.uv = vertex.uv;
    out.light_clip = object.light_view_proj * world_pos;
    return out;
}

// 3x3 percentage-closer filter. Outside the light volume counts as lit.
fn shadow_factor(light_clip: vec4<f32>) -> f32 {
    let ndc = light_clip.xyz / light_clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }
    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var lit = 0.0;
    for (var y = -1; y <= 1; y++) {
        for (var x = -1; x <= 1; x++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, ndc.z);
        }
    }
    return lit / 9.0;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(surface_texture, surface_sampler, input.uv);
    let normal = normalize(input.world_normal);
    let shadow = shadow_factor(input.light_clip);

    var diffuse = vec3<f32>(0.0);
    var shadow_used = false;
    let count = min(light_data.light_count, MAX_LIGHTS);
    for (var i = 0u; i < count; i++) {
        let light = light_data.lights[i];
        var to_light: vec3<f32>;
        var attenuation = 1.0;
        if (light.kind == LIGHT_DIRECTIONAL) {
            to_light = -light.direction;
            if (!shadow_used) {
                attenuation = shadow;
                shadow_used = true;
            }
        } else {
            let offset = light.position - input.world_position;
            let dist = length(offset);
            to_light = offset / max(dist, 0.0001);
            attenuation = saturate(1.0 - dist / light.range);
        }
        let n_dot_l = max(dot(normal, to_light), 0.0);
        diffuse += light.color * light.intensity * n_dot_l * attenuation;
    }

    let color = albedo.rgb * (vec3<f32>(AMBIENT) + diffuse);
    return vec4<f32>(color, albedo.a);
}
"#;

/// WGSL for the depth-only shadow pass. No fragment stage.
pub const SHADOW_SHADER: &str = r#"
struct PerObject {
    world: mat4x4<f32>,
    world_inv_transpose: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> object: PerObject;

@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return object.light_view_proj * object.world * vec4<f32>(position, 1.0);
}
"#;

pub fn source(shader: ShaderSource) -> &'static str {
    match shader {
        ShaderSource::Lit => LIT_SHADER,
        ShaderSource::Shadow => SHADOW_SHADER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadowcast_render::ProgramDesc;

    #[test]
    fn entry_points_exist() {
        for desc in [ProgramDesc::lit(), ProgramDesc::shadow()] {
            let vertex = source(desc.vertex.source);
            assert!(vertex.contains(&format!("fn {}(", desc.vertex.entry)));
            if let Some(pixel) = &desc.pixel {
                assert!(source(pixel.source).contains(&format!("fn {}(", pixel.entry)));
            }
        }
    }

    #[test]
    fn light_capacity_matches_record() {
        let decl = format!("array<Light, {}>", shadowcast_scene::MAX_LIGHTS);
        assert!(LIT_SHADER.contains(&decl));
    }
}
