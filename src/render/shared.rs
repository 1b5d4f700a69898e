/// Ray-march program. Binding 0 carries [`crate::uniforms::RayMarchUniforms`]
/// and is checked against the host struct by
/// [`crate::uniforms::validate_shader_layout`] before the pipeline is built.
pub const RAY_MARCH_SHADER: &str = r#"
struct RayMarchUniforms {
    cam_to_world: mat4x4<f32>,
    cam_inv_proj: mat4x4<f32>,
    cam_pos: vec3<f32>,
    eps: f32,
    clear_color: vec3<f32>,
    max_dis: f32,
    light_dir: vec3<f32>,
    max_steps: u32,
    light_color: vec3<f32>,
    time: f32,
    diff_intensity: f32,
    spec_intensity: f32,
    ambient_intensity: f32,
    shininess: f32,
    exhaust_policy: u32,
}

struct QuadTransform {
    model: mat4x4<f32>,
    view_proj: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> u: RayMarchUniforms;

@group(0) @binding(1)
var<uniform> quad: QuadTransform;

struct VertexInput {
    @location(0) position: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let clip = quad.view_proj * quad.model * vec4<f32>(input.position, 1.0);
    // The quad lies on the near plane; pin depth so rounding cannot clip it.
    out.position = vec4<f32>(clip.xy, 0.0, clip.w);
    out.ndc = input.position.xy * 2.0;
    return out;
}

fn smooth_min(a: f32, b: f32, k: f32) -> f32 {
    let h = clamp(0.5 + 0.5 * (b - a) / k, 0.0, 1.0);
    return mix(b, a, h) - k * h * (1.0 - h);
}

fn scene_distance(p: vec3<f32>) -> f32 {
    let t = u.time;
    let satellite = vec3<f32>(cos(t) * 1.6, sin(t * 0.7) * 0.6, sin(t) * 1.6);
    let body = length(p) - 1.0;
    let moon = length(p - satellite) - 0.45;
    return smooth_min(body, moon, 0.4);
}

fn scene_normal(p: vec3<f32>) -> vec3<f32> {
    let h = u.eps;
    let dx = vec3<f32>(h, 0.0, 0.0);
    let dy = vec3<f32>(0.0, h, 0.0);
    let dz = vec3<f32>(0.0, 0.0, h);
    return normalize(vec3<f32>(
        scene_distance(p + dx) - scene_distance(p - dx),
        scene_distance(p + dy) - scene_distance(p - dy),
        scene_distance(p + dz) - scene_distance(p - dz)
    ));
}

fn shade(p: vec3<f32>, dir: vec3<f32>) -> vec3<f32> {
    let normal = scene_normal(p);
    let to_light = normalize(u.light_dir);
    let diffuse = max(dot(normal, to_light), 0.0) * u.diff_intensity;
    let reflected = reflect(-to_light, normal);
    let specular = pow(max(dot(reflected, -dir), 0.0), u.shininess) * u.spec_intensity;
    let color = u.light_color * (u.ambient_intensity + diffuse + specular);
    return clamp(color, vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let view_pos = u.cam_inv_proj * vec4<f32>(input.ndc, 0.0, 1.0);
    let world = (u.cam_to_world * vec4<f32>(view_pos.xyz / view_pos.w, 1.0)).xyz;
    let origin = u.cam_pos;
    let offset = world - origin;
    let forward = normalize((u.cam_to_world * vec4<f32>(0.0, 0.0, -1.0, 0.0)).xyz);
    let dir = select(normalize(offset), forward, length(offset) < 1e-6);

    var travelled: f32 = 0.0;
    for (var i: u32 = 0u; i < u.max_steps; i = i + 1u) {
        let d = scene_distance(origin + dir * travelled);
        if d < u.eps {
            return vec4<f32>(shade(origin + dir * travelled, dir), 1.0);
        }
        travelled = travelled + d;
        if travelled > u.max_dis {
            return vec4<f32>(u.clear_color, 1.0);
        }
    }

    if u.exhaust_policy == 1u {
        return vec4<f32>(shade(origin + dir * travelled, dir), 1.0);
    }
    return vec4<f32>(u.clear_color, 1.0);
}
"#;

/// Unit quad in the XY plane, centred on the origin.
pub const QUAD_VERTICES: &[f32] = &[
    -0.5, -0.5, 0.0, //
    0.5, -0.5, 0.0, //
    0.5, 0.5, 0.0, //
    -0.5, 0.5, 0.0, //
];

pub const QUAD_INDICES: &[u16] = &[0, 1, 2, 0, 2, 3];
