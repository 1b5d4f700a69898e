//! Host-side mirror of the shader's uniform blocks.
//!
//! The WGSL source is parsed once with `naga` at start-up and its
//! `RayMarchUniforms` block is compared member by member against
//! [`RAY_MARCH_FIELDS`], so a renamed, retyped or reordered member fails
//! loudly before any pipeline is created.

use std::mem::{offset_of, size_of};

use bytemuck::{Pod, Zeroable};
use naga::{AddressSpace, ScalarKind, TypeInner, VectorSize};
use thiserror::Error;

/// Per-frame parameters consumed by the ray-march fragment stage.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RayMarchUniforms {
    pub cam_to_world: [[f32; 4]; 4],
    pub cam_inv_proj: [[f32; 4]; 4],
    pub cam_pos: [f32; 3],
    pub eps: f32,
    pub clear_color: [f32; 3],
    pub max_dis: f32,
    pub light_dir: [f32; 3],
    pub max_steps: u32,
    pub light_color: [f32; 3],
    pub time: f32,
    pub diff_intensity: f32,
    pub spec_intensity: f32,
    pub ambient_intensity: f32,
    pub shininess: f32,
    pub exhaust_policy: u32,
    pub _padding: [u32; 3],
}

/// Vertex-stage transform of the screen quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadTransform {
    pub model: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    F32,
    U32,
    Vec3F32,
    Mat4F32,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::U32 => "u32",
            Self::Vec3F32 => "vec3<f32>",
            Self::Mat4F32 => "mat4x4<f32>",
        }
    }

    fn matches(self, inner: &TypeInner) -> bool {
        match (self, inner) {
            (Self::F32, TypeInner::Scalar(scalar)) => is_32bit(scalar, ScalarKind::Float),
            (Self::U32, TypeInner::Scalar(scalar)) => is_32bit(scalar, ScalarKind::Uint),
            (Self::Vec3F32, TypeInner::Vector { size, scalar }) => {
                *size == VectorSize::Tri && is_32bit(scalar, ScalarKind::Float)
            }
            (
                Self::Mat4F32,
                TypeInner::Matrix {
                    columns,
                    rows,
                    scalar,
                },
            ) => {
                *columns == VectorSize::Quad
                    && *rows == VectorSize::Quad
                    && is_32bit(scalar, ScalarKind::Float)
            }
            _ => false,
        }
    }
}

fn is_32bit(scalar: &naga::Scalar, kind: ScalarKind) -> bool {
    scalar.kind == kind && scalar.width == 4
}

/// One member of a host uniform struct as the shader must declare it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformField {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

const fn field(name: &'static str, offset: usize, kind: FieldKind) -> UniformField {
    UniformField { name, offset, kind }
}

/// Expected shader-side layout of [`RayMarchUniforms`]; trailing padding is
/// host-only.
pub const RAY_MARCH_FIELDS: &[UniformField] = &[
    field("cam_to_world", offset_of!(RayMarchUniforms, cam_to_world), FieldKind::Mat4F32),
    field("cam_inv_proj", offset_of!(RayMarchUniforms, cam_inv_proj), FieldKind::Mat4F32),
    field("cam_pos", offset_of!(RayMarchUniforms, cam_pos), FieldKind::Vec3F32),
    field("eps", offset_of!(RayMarchUniforms, eps), FieldKind::F32),
    field("clear_color", offset_of!(RayMarchUniforms, clear_color), FieldKind::Vec3F32),
    field("max_dis", offset_of!(RayMarchUniforms, max_dis), FieldKind::F32),
    field("light_dir", offset_of!(RayMarchUniforms, light_dir), FieldKind::Vec3F32),
    field("max_steps", offset_of!(RayMarchUniforms, max_steps), FieldKind::U32),
    field("light_color", offset_of!(RayMarchUniforms, light_color), FieldKind::Vec3F32),
    field("time", offset_of!(RayMarchUniforms, time), FieldKind::F32),
    field("diff_intensity", offset_of!(RayMarchUniforms, diff_intensity), FieldKind::F32),
    field("spec_intensity", offset_of!(RayMarchUniforms, spec_intensity), FieldKind::F32),
    field("ambient_intensity", offset_of!(RayMarchUniforms, ambient_intensity), FieldKind::F32),
    field("shininess", offset_of!(RayMarchUniforms, shininess), FieldKind::F32),
    field("exhaust_policy", offset_of!(RayMarchUniforms, exhaust_policy), FieldKind::U32),
];

pub const RAY_MARCH_BINDING: (u32, u32) = (0, 0);

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to parse shader:\n{0}")]
    Parse(String),
    #[error("shader failed validation:\n{0}")]
    Validation(String),
    #[error("shader declares no uniform block at group {group} binding {binding}")]
    MissingBlock { group: u32, binding: u32 },
    #[error("uniform block at group {group} binding {binding} is not a struct")]
    NotAStruct { group: u32, binding: u32 },
    #[error("uniform block has {found} members, host struct expects {expected}")]
    MemberCount { expected: usize, found: usize },
    #[error("uniform member #{index} is named `{found}`, expected `{expected}`")]
    NameMismatch {
        index: usize,
        expected: &'static str,
        found: String,
    },
    #[error("uniform `{name}` sits at offset {found}, host struct has it at {expected}")]
    OffsetMismatch {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("uniform `{name}` is not declared as {expected}")]
    TypeMismatch {
        name: &'static str,
        expected: &'static str,
    },
    #[error("uniform block spans {found} bytes, host struct is {expected} bytes")]
    SizeMismatch { expected: usize, found: usize },
}

/// Parses and validates `source`, then checks the ray-march uniform block
/// against [`RayMarchUniforms`].
pub fn validate_shader_layout(source: &str) -> Result<(), LayoutError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| LayoutError::Parse(err.emit_to_string(source)))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|err| LayoutError::Validation(err.emit_to_string(source)))?;

    let (group, binding) = RAY_MARCH_BINDING;
    check_uniform_block(
        &module,
        group,
        binding,
        RAY_MARCH_FIELDS,
        size_of::<RayMarchUniforms>(),
    )
}

/// Compares one uniform block of a parsed module against a host layout.
pub fn check_uniform_block(
    module: &naga::Module,
    group: u32,
    binding: u32,
    fields: &[UniformField],
    host_size: usize,
) -> Result<(), LayoutError> {
    let variable = module
        .global_variables
        .iter()
        .map(|(_, variable)| variable)
        .find(|variable| {
            variable.space == AddressSpace::Uniform
                && variable
                    .binding
                    .as_ref()
                    .is_some_and(|b| b.group == group && b.binding == binding)
        })
        .ok_or(LayoutError::MissingBlock { group, binding })?;

    let TypeInner::Struct { members, span } = &module.types[variable.ty].inner else {
        return Err(LayoutError::NotAStruct { group, binding });
    };

    if members.len() != fields.len() {
        return Err(LayoutError::MemberCount {
            expected: fields.len(),
            found: members.len(),
        });
    }

    for (index, (member, expected)) in members.iter().zip(fields).enumerate() {
        let name = member.name.as_deref().unwrap_or_default();
        if name != expected.name {
            return Err(LayoutError::NameMismatch {
                index,
                expected: expected.name,
                found: name.to_string(),
            });
        }
        if member.offset as usize != expected.offset {
            return Err(LayoutError::OffsetMismatch {
                name: expected.name,
                expected: expected.offset,
                found: member.offset as usize,
            });
        }
        if !expected.kind.matches(&module.types[member.ty].inner) {
            return Err(LayoutError::TypeMismatch {
                name: expected.name,
                expected: expected.kind.describe(),
            });
        }
    }

    if *span as usize != host_size {
        return Err(LayoutError::SizeMismatch {
            expected: host_size,
            found: *span as usize,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shared::RAY_MARCH_SHADER;

    #[test]
    fn host_struct_is_uniform_aligned() {
        assert_eq!(size_of::<RayMarchUniforms>() % 16, 0);
        assert_eq!(size_of::<RayMarchUniforms>(), 224);
        assert_eq!(size_of::<QuadTransform>(), 128);
    }

    #[test]
    fn bundled_shader_matches_host_layout() {
        validate_shader_layout(RAY_MARCH_SHADER).unwrap();
    }

    #[test]
    fn renamed_member_is_rejected() {
        let shader = RAY_MARCH_SHADER.replace("    eps: f32,", "    epsilon: f32,");
        let shader = shader.replace("u.eps", "u.epsilon");
        match validate_shader_layout(&shader) {
            Err(LayoutError::NameMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, "eps");
                assert_eq!(found, "epsilon");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn retyped_member_is_rejected() {
        let shader = RAY_MARCH_SHADER.replace("    max_steps: u32,", "    max_steps: f32,");
        let shader = shader.replace("i < u.max_steps", "f32(i) < u.max_steps");
        assert!(matches!(
            validate_shader_layout(&shader),
            Err(LayoutError::TypeMismatch {
                name: "max_steps",
                ..
            })
        ));
    }

    #[test]
    fn missing_block_is_rejected() {
        let shader = RAY_MARCH_SHADER.replace("@group(0) @binding(0)", "@group(1) @binding(0)");
        assert!(matches!(
            validate_shader_layout(&shader),
            Err(LayoutError::MissingBlock { group: 0, binding: 0 })
        ));
    }

    #[test]
    fn broken_source_reports_parse_error() {
        assert!(matches!(
            validate_shader_layout("fn broken( {"),
            Err(LayoutError::Parse(_))
        ));
    }
}
