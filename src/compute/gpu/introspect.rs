//! Compile, link and introspect WGSL shader pairs.
//!
//! "Compiling" a stage parses and validates it with naga; "linking" checks
//! that the fragment stage only consumes what the vertex stage produces and
//! that bindings shared by both stages agree. The validated modules are then
//! walked to list every uniform, vertex attribute and texture the program
//! exposes. None of this touches a GPU device.

use std::collections::BTreeMap;
use std::fmt;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Module, ScalarKind, TypeInner};

use super::uniform::{Arity, UniformKind, UniformLayout};

/// Uniform blocks are uploaded in multiples of this many bytes.
const BLOCK_ALIGNMENT: u64 = 16;

/// Pipeline stage of a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// A program that failed to compile or link; carries the diagnostic log.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgramLinkError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("program failed to link: {log}")]
    Link { log: String },
}

fn link_error(log: impl Into<String>) -> ProgramLinkError {
    ProgramLinkError::Link { log: log.into() }
}

/// One named uniform inside a block.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    /// Index into [`ProgramInterface::blocks`].
    pub block: usize,
    pub layout: UniformLayout,
}

/// A `var<uniform>` binding.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    pub name: String,
    pub binding: u32,
    /// Buffer size in bytes, padded to 16.
    pub size: u64,
}

/// A vertex shader input.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    pub components: u32,
    pub format: wgpu::VertexFormat,
}

/// A sampled texture binding, paired with the sampler of the same slot index.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBinding {
    pub name: String,
    pub binding: u32,
    pub sampler: Option<u32>,
}

/// Everything a linked program exposes to the host.
#[derive(Debug, Clone, Default)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub blocks: Vec<UniformBlock>,
    pub uniforms: Vec<UniformInfo>,
    pub attributes: Vec<AttributeInfo>,
    pub textures: Vec<TextureBinding>,
    pub samplers: Vec<u32>,
}

/// Resource declared at one `@binding` slot of group 0.
#[derive(Debug, Clone, PartialEq)]
enum Resource {
    Uniform {
        name: String,
        size: u64,
        members: Vec<(String, UniformLayout)>,
    },
    Texture {
        name: String,
    },
    Sampler,
}

impl ProgramInterface {
    /// Compile both stages, link them and introspect the result.
    pub fn link(vertex_src: &str, fragment_src: &str) -> Result<Self, ProgramLinkError> {
        let vertex = compile(ShaderStage::Vertex, vertex_src)?;
        let fragment = compile(ShaderStage::Fragment, fragment_src)?;

        let vs = vertex
            .entry_points
            .iter()
            .find(|ep| ep.stage == naga::ShaderStage::Vertex)
            .ok_or_else(|| link_error("vertex module has no @vertex entry point"))?;
        let fs = fragment
            .entry_points
            .iter()
            .find(|ep| ep.stage == naga::ShaderStage::Fragment)
            .ok_or_else(|| link_error("fragment module has no @fragment entry point"))?;

        let attributes = vertex_inputs(&vertex, &vs.function)?;
        let outputs = vertex_outputs(&vertex, &vs.function);
        check_varyings(&outputs, &fragment, &fs.function)?;

        // Merge resources of both stages by binding slot
        let mut slots: BTreeMap<u32, Resource> = BTreeMap::new();
        for (stage, module) in [
            (ShaderStage::Vertex, &vertex),
            (ShaderStage::Fragment, &fragment),
        ] {
            for (binding, resource) in resources(stage, module)? {
                match slots.get(&binding) {
                    Some(existing) if *existing != resource => {
                        return Err(link_error(format!(
                            "@binding({binding}) is declared differently in the vertex and fragment stages"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        slots.insert(binding, resource);
                    }
                }
            }
        }

        let mut interface = ProgramInterface {
            vertex_entry: vs.name.clone(),
            fragment_entry: fs.name.clone(),
            attributes,
            ..Default::default()
        };
        for (binding, resource) in slots {
            match resource {
                Resource::Uniform {
                    name,
                    size,
                    members,
                } => {
                    let block = interface.blocks.len();
                    for (member, layout) in members {
                        if interface.uniforms.iter().any(|u| u.name == member) {
                            return Err(link_error(format!(
                                "uniform '{member}' is declared in more than one block"
                            )));
                        }
                        interface.uniforms.push(UniformInfo {
                            name: member,
                            block,
                            layout,
                        });
                    }
                    interface.blocks.push(UniformBlock {
                        name,
                        binding,
                        size,
                    });
                }
                Resource::Texture { name } => interface.textures.push(TextureBinding {
                    name,
                    binding,
                    sampler: None,
                }),
                Resource::Sampler => interface.samplers.push(binding),
            }
        }
        // Texture slot i samples through sampler slot i
        for (texture, sampler) in interface.textures.iter_mut().zip(&interface.samplers) {
            texture.sampler = Some(*sampler);
        }

        log::debug!(
            "linked {}/{}: {} uniforms, {} attributes, {} textures",
            interface.vertex_entry,
            interface.fragment_entry,
            interface.uniforms.len(),
            interface.attributes.len(),
            interface.textures.len()
        );
        Ok(interface)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Parse and validate one stage.
fn compile(stage: ShaderStage, src: &str) -> Result<Module, ProgramLinkError> {
    let module = naga::front::wgsl::parse_str(src).map_err(|e| ProgramLinkError::Compile {
        stage,
        log: e.emit_to_string(src),
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ProgramLinkError::Compile {
            stage,
            log: e.emit_to_string(src),
        })?;
    Ok(module)
}

/// Location-bound values of a function signature, flattening struct members.
fn located<'a>(
    module: &'a Module,
    name: Option<&'a String>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&'a Binding>,
    out: &mut Vec<(u32, Option<&'a String>, &'a TypeInner)>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.push((*location, name, &module.types[ty].inner));
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    located(module, m.name.as_ref(), m.ty, m.binding.as_ref(), out);
                }
            }
        }
    }
}

fn vertex_inputs(
    module: &Module,
    function: &naga::Function,
) -> Result<Vec<AttributeInfo>, ProgramLinkError> {
    let mut inputs = Vec::new();
    for arg in &function.arguments {
        located(module, arg.name.as_ref(), arg.ty, arg.binding.as_ref(), &mut inputs);
    }
    let mut attributes = Vec::with_capacity(inputs.len());
    for (location, name, inner) in inputs {
        let name = name
            .cloned()
            .ok_or_else(|| link_error(format!("vertex input at location {location} is unnamed")))?;
        let (kind, components) = match inner {
            TypeInner::Scalar(s) => (s.kind, 1),
            TypeInner::Vector { size, scalar } => (scalar.kind, *size as u32),
            _ => {
                return Err(link_error(format!(
                    "vertex input '{name}' is not a scalar or vector"
                )));
            }
        };
        let format = vertex_format(kind, components)
            .ok_or_else(|| link_error(format!("vertex input '{name}' has an unsupported type")))?;
        attributes.push(AttributeInfo {
            name,
            location,
            components,
            format,
        });
    }
    attributes.sort_by_key(|a| a.location);
    Ok(attributes)
}

fn vertex_format(kind: ScalarKind, components: u32) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    Some(match (kind, components) {
        (ScalarKind::Float, 1) => F::Float32,
        (ScalarKind::Float, 2) => F::Float32x2,
        (ScalarKind::Float, 3) => F::Float32x3,
        (ScalarKind::Float, 4) => F::Float32x4,
        (ScalarKind::Sint, 1) => F::Sint32,
        (ScalarKind::Sint, 2) => F::Sint32x2,
        (ScalarKind::Sint, 3) => F::Sint32x3,
        (ScalarKind::Sint, 4) => F::Sint32x4,
        (ScalarKind::Uint, 1) => F::Uint32,
        (ScalarKind::Uint, 2) => F::Uint32x2,
        (ScalarKind::Uint, 3) => F::Uint32x3,
        (ScalarKind::Uint, 4) => F::Uint32x4,
        _ => return None,
    })
}

fn vertex_outputs<'a>(
    module: &'a Module,
    function: &'a naga::Function,
) -> BTreeMap<u32, &'a TypeInner> {
    let mut outputs = Vec::new();
    if let Some(result) = &function.result {
        located(module, None, result.ty, result.binding.as_ref(), &mut outputs);
    }
    outputs.into_iter().map(|(loc, _, inner)| (loc, inner)).collect()
}

fn check_varyings(
    outputs: &BTreeMap<u32, &TypeInner>,
    fragment: &Module,
    function: &naga::Function,
) -> Result<(), ProgramLinkError> {
    let mut inputs = Vec::new();
    for arg in &function.arguments {
        located(fragment, arg.name.as_ref(), arg.ty, arg.binding.as_ref(), &mut inputs);
    }
    for (location, name, inner) in inputs {
        let label = name.map(String::as_str).unwrap_or("?");
        match outputs.get(&location) {
            None => {
                return Err(link_error(format!(
                    "fragment input '{label}' at location {location} is not written by the vertex stage"
                )));
            }
            Some(out) if *out != inner => {
                return Err(link_error(format!(
                    "fragment input '{label}' at location {location} does not match the vertex output type"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Group-0 resources declared by one module, keyed by binding.
fn resources(stage: ShaderStage, module: &Module) -> Result<Vec<(u32, Resource)>, ProgramLinkError> {
    let mut found = Vec::new();
    for (_, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        if rb.group != 0 {
            return Err(link_error(format!(
                "{stage} resource '{name}' uses @group({}); only group 0 is supported",
                rb.group
            )));
        }
        let inner = &module.types[var.ty].inner;
        let resource = match (var.space, inner) {
            (AddressSpace::Uniform, _) => uniform_block(module, &name, var.ty)?,
            (AddressSpace::Handle, TypeInner::Image { .. }) => Resource::Texture { name },
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => Resource::Sampler,
            _ => {
                return Err(link_error(format!(
                    "{stage} resource '{name}' has an unsupported binding type"
                )));
            }
        };
        found.push((rb.binding, resource));
    }
    Ok(found)
}

fn uniform_block(
    module: &Module,
    name: &str,
    ty: naga::Handle<naga::Type>,
) -> Result<Resource, ProgramLinkError> {
    let size = module.types[ty].inner.size(module.to_ctx()) as u64;
    let size = size.div_ceil(BLOCK_ALIGNMENT) * BLOCK_ALIGNMENT;

    let members = match &module.types[ty].inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .map(|m| {
                let member = m.name.clone().unwrap_or_default();
                uniform_layout(module, m.ty, m.offset as usize)
                    .map(|layout| (member.clone(), layout))
                    .ok_or_else(|| {
                        link_error(format!("uniform '{member}' has an unsupported type"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            let layout = uniform_layout(module, ty, 0)
                .ok_or_else(|| link_error(format!("uniform '{name}' has an unsupported type")))?;
            vec![(name.to_string(), layout)]
        }
    };
    Ok(Resource::Uniform {
        name: name.to_string(),
        size,
        members,
    })
}

fn element_kind(inner: &TypeInner) -> Option<UniformKind> {
    let int = |kind: ScalarKind| match kind {
        ScalarKind::Sint | ScalarKind::Uint => Some(true),
        ScalarKind::Float => Some(false),
        _ => None,
    };
    match inner {
        TypeInner::Scalar(s) if s.width == 4 => UniformKind::vector(int(s.kind)?, 1),
        TypeInner::Vector { size, scalar } if scalar.width == 4 => {
            UniformKind::vector(int(scalar.kind)?, *size as usize)
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if columns == rows && scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            UniformKind::matrix(*columns as usize)
        }
        _ => None,
    }
}

fn uniform_layout(
    module: &Module,
    ty: naga::Handle<naga::Type>,
    offset: usize,
) -> Option<UniformLayout> {
    match &module.types[ty].inner {
        TypeInner::Array {
            base,
            size: naga::ArraySize::Constant(n),
            stride,
        } => Some(UniformLayout {
            kind: element_kind(&module.types[*base].inner)?,
            arity: Arity::Array(n.get()),
            offset,
            stride: *stride as usize,
        }),
        inner => Some(UniformLayout {
            kind: element_kind(inner)?,
            arity: Arity::Scalar,
            offset,
            stride: 0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

struct Globals {
    u_scale: f32,
    u_offset: vec2<f32>,
    u_matrix: mat3x3<f32>,
    u_weights: array<vec4<f32>, 3>,
    u_mode: i32,
};

@group(0) @binding(0) var<uniform> globals: Globals;

@vertex
fn vs_main(@location(0) a_position: vec2<f32>, @location(1) a_texcoord: vec2<f32>) -> VsOut {
    var out: VsOut;
    let p = globals.u_matrix * vec3<f32>(a_position * globals.u_scale + globals.u_offset, 1.0);
    out.position = vec4<f32>(p.xy, 0.0, 1.0) + globals.u_weights[0] * f32(globals.u_mode);
    out.uv = a_texcoord;
    return out;
}
"#;

    const FS: &str = r#"
@group(0) @binding(1) var u_texture: texture_2d<f32>;
@group(0) @binding(2) var u_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSampleLevel(u_texture, u_sampler, uv, 0.0);
}
"#;

    #[test]
    fn test_introspects_uniform_layout() {
        let program = ProgramInterface::link(VS, FS).unwrap();
        assert_eq!(program.blocks.len(), 1);
        assert_eq!(program.blocks[0].binding, 0);
        assert_eq!(program.blocks[0].size % 16, 0);

        let scale = program.uniform("u_scale").unwrap();
        assert_eq!(scale.layout.kind, UniformKind::Float);
        assert_eq!(scale.layout.offset, 0);

        let offset = program.uniform("u_offset").unwrap();
        assert_eq!(offset.layout.kind, UniformKind::FloatVec2);
        assert_eq!(offset.layout.offset, 8);

        let matrix = program.uniform("u_matrix").unwrap();
        assert_eq!(matrix.layout.kind, UniformKind::FloatMat3);
        assert_eq!(matrix.layout.offset, 16);

        let weights = program.uniform("u_weights").unwrap();
        assert_eq!(weights.layout.arity, Arity::Array(3));
        assert_eq!(weights.layout.stride, 16);

        assert_eq!(program.uniform("u_mode").unwrap().layout.kind, UniformKind::Int);
    }

    #[test]
    fn test_introspects_attributes_and_textures() {
        let program = ProgramInterface::link(VS, FS).unwrap();
        let names: Vec<&str> = program.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a_position", "a_texcoord"]);
        assert_eq!(program.attribute("a_texcoord").unwrap().components, 2);
        assert_eq!(
            program.textures,
            vec![TextureBinding {
                name: "u_texture".into(),
                binding: 1,
                sampler: Some(2),
            }]
        );
    }

    #[test]
    fn test_compile_error_carries_log() {
        let err = ProgramInterface::link("fn broken( {", FS).unwrap_err();
        match err {
            ProgramLinkError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unmatched_varying_fails_to_link() {
        let fs = r#"
@fragment
fn fs_main(@location(3) v: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(v);
}
"#;
        let err = ProgramInterface::link(VS, fs).unwrap_err();
        assert!(matches!(err, ProgramLinkError::Link { .. }), "{err}");
    }

    #[test]
    fn test_conflicting_binding_fails_to_link() {
        let fs = r#"
@group(0) @binding(0) var u_other: texture_2d<f32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureLoad(u_other, vec2<i32>(uv), 0);
}
"#;
        let err = ProgramInterface::link(VS, fs).unwrap_err();
        assert!(err.to_string().contains("@binding(0)"));
    }

    #[test]
    fn test_missing_entry_point_fails_to_link() {
        let err = ProgramInterface::link(FS, FS).unwrap_err();
        assert!(err.to_string().contains("@vertex"));
    }
}
