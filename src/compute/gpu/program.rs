//! GPU Program - a linked shader pair with its uniforms, attributes and textures.
//!
//! A [`GpuProgram`] is built from a vertex and a fragment WGSL source. Linking
//! introspects both stages (see [`ProgramInterface`]) and derives the bind
//! group layout, one vertex buffer slot per attribute, and a uniform dispatch
//! table. Draw calls then only need a [`RenderTarget`].

use std::collections::{HashMap, HashSet};

use super::introspect::{AttributeInfo, ProgramInterface, TextureBinding, UniformBlock};
use super::texture::{Framebuffer, RenderTarget, Texture, TextureOptions, TextureParams};
use super::uniform::{UniformSlot, UniformValue, UsageHint};
use super::{GpuContext, GpuError};
use crate::schema::BYTES_PER_TEXEL;

/// Options for [`GpuProgram::create`].
#[derive(Debug, Clone, Copy)]
pub struct ProgramConfig {
    pub label: &'static str,
    /// Primitive mode used by draw calls that do not override it.
    pub topology: wgpu::PrimitiveTopology,
}

impl ProgramConfig {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }

    pub fn topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self::new("Program")
    }
}

/// Parameters of one draw call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DrawCall {
    /// Overrides the program's configured topology.
    pub topology: Option<wgpu::PrimitiveTopology>,
    pub first: u32,
    /// Vertices to draw; defaults to the largest attribute vertex count.
    pub count: Option<u32>,
    /// Clear the target before drawing.
    pub clear: Option<wgpu::Color>,
}

impl DrawCall {
    /// Draw every vertex with the program's topology.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology(mut self, topology: wgpu::PrimitiveTopology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn range(mut self, first: u32, count: u32) -> Self {
        self.first = first;
        self.count = Some(count);
        self
    }

    pub fn clear(mut self, color: wgpu::Color) -> Self {
        self.clear = Some(color);
        self
    }
}

/// Two triangles covering the rectangle `(x, y, w, h)`, as 2-component positions.
pub fn rect_array(x: f32, y: f32, w: f32, h: f32) -> [f32; 12] {
    let (x1, y1) = (x + w, y + h);
    [x, y, x1, y, x, y1, x, y1, x1, y, x1, y1]
}

struct AttributeSlot {
    info: AttributeInfo,
    buffer: Option<wgpu::Buffer>,
    vertex_count: u32,
}

struct BlockState {
    info: UniformBlock,
    shadow: Vec<u8>,
    buffer: wgpu::Buffer,
    dirty: bool,
}

struct TextureSlot {
    info: TextureBinding,
    bound: Option<(wgpu::TextureView, wgpu::Sampler)>,
}

/// A compiled, linked and introspected shader program.
pub struct GpuProgram {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: ProgramConfig,
    interface: ProgramInterface,

    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<(wgpu::PrimitiveTopology, wgpu::TextureFormat), wgpu::RenderPipeline>,

    uniforms: HashMap<String, UniformSlot>,
    blocks: Vec<BlockState>,
    attributes: Vec<AttributeSlot>,
    textures: Vec<TextureSlot>,
    /// Names already reported as unknown.
    reported: HashSet<String>,
}

impl GpuProgram {
    /// Compile and link a program.
    ///
    /// Fails with [`GpuError::ProgramLink`] carrying the compiler or linker
    /// log; no partially built program is ever returned.
    pub fn create(
        ctx: &GpuContext,
        vertex_src: &str,
        fragment_src: &str,
        config: ProgramConfig,
    ) -> Result<Self, GpuError> {
        let interface = ProgramInterface::link(vertex_src, fragment_src)?;
        let device = ctx.device.clone();

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(config.label),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(config.label),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });

        let bind_group_layout = create_bind_group_layout(&device, &interface, config.label);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(config.label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        // Dispatch table and shadow buffers, built once
        let uniforms = interface
            .uniforms
            .iter()
            .map(|u| (u.name.clone(), UniformSlot::new(u.block, u.layout)))
            .collect();
        let blocks = interface
            .blocks
            .iter()
            .map(|info| BlockState {
                info: info.clone(),
                shadow: vec![0u8; info.size as usize],
                buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(info.name.as_str()),
                    size: info.size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                dirty: true,
            })
            .collect();
        let attributes = interface
            .attributes
            .iter()
            .map(|info| AttributeSlot {
                info: info.clone(),
                buffer: None,
                vertex_count: 0,
            })
            .collect();
        let textures = interface
            .textures
            .iter()
            .map(|info| TextureSlot {
                info: info.clone(),
                bound: None,
            })
            .collect();

        log::debug!("created program '{}'", config.label);
        Ok(Self {
            device,
            queue: ctx.queue.clone(),
            config,
            interface,
            vertex_module,
            fragment_module,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            uniforms,
            blocks,
            attributes,
            textures,
            reported: HashSet::new(),
        })
    }

    /// The introspected interface.
    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    fn report_unknown(&mut self, what: &str, name: &str) {
        if self.reported.insert(name.to_string()) {
            log::warn!("{}: no active {what} named '{name}'", self.config.label);
        }
    }

    /// Set a uniform through its typed setter.
    ///
    /// Unknown names and values of the wrong type are logged and ignored.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let Some(slot) = self.uniforms.get(name).copied() else {
            self.report_unknown("uniform", name);
            return;
        };
        let value = value.into();
        let block = &mut self.blocks[slot.block];
        if slot.apply(&value, &mut block.shadow) {
            block.dirty = true;
        } else {
            log::warn!(
                "{}: value of {} scalars does not fit uniform '{name}' ({:?})",
                self.config.label,
                value.len(),
                slot.layout.kind
            );
        }
    }

    /// Upload vertex data for an attribute, respecifying its buffer in place when it fits.
    pub fn set_attribute(&mut self, name: &str, data: &[f32], hint: UsageHint) {
        let Some(index) = self.attributes.iter().position(|a| a.info.name == name) else {
            self.report_unknown("attribute", name);
            return;
        };
        let device = &self.device;
        let slot = &mut self.attributes[index];
        let components = slot.info.components as usize;
        if data.len() % components != 0 {
            log::warn!(
                "{}: attribute '{name}' data length {} is not a multiple of {components}",
                self.config.label,
                data.len()
            );
        }
        slot.vertex_count = (data.len() / components) as u32;
        if data.is_empty() {
            return;
        }

        let bytes: &[u8] = bytemuck::cast_slice(data);
        let needed = bytes.len() as u64;
        let fits = slot.buffer.as_ref().is_some_and(|b| b.size() >= needed);
        if !fits {
            let size = match hint {
                UsageHint::Static => needed,
                UsageHint::Dynamic | UsageHint::Stream => needed.next_power_of_two(),
            };
            slot.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(name),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &slot.buffer {
            self.queue.write_buffer(buffer, 0, bytes);
        }
    }

    /// Vertex count of the largest bound attribute.
    pub fn vertex_count(&self) -> u32 {
        self.attributes
            .iter()
            .filter(|a| a.buffer.is_some())
            .map(|a| a.vertex_count)
            .max()
            .unwrap_or(0)
    }

    /// Bind a texture (and its sampler) to the texture named `name`.
    pub fn set_texture(&mut self, name: &str, texture: &Texture) {
        match self.textures.iter().position(|t| t.info.name == name) {
            Some(unit) => self.set_texture_unit(unit, texture),
            None => self.report_unknown("texture", name),
        }
    }

    /// Bind a texture to the `unit`-th texture slot.
    pub fn set_texture_unit(&mut self, unit: usize, texture: &Texture) {
        match self.textures.get_mut(unit) {
            Some(slot) => {
                slot.bound = Some((texture.view().clone(), texture.sampler().clone()));
            }
            None => log::warn!("{}: no texture unit {unit}", self.config.label),
        }
    }

    fn ensure_pipeline(&mut self, topology: wgpu::PrimitiveTopology, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&(topology, format)) {
            return;
        }
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = self
            .attributes
            .iter()
            .map(|a| {
                [wgpu::VertexAttribute {
                    format: a.info.format,
                    offset: 0,
                    shader_location: a.info.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = self
            .attributes
            .iter()
            .zip(&attributes)
            .map(|(a, attr)| wgpu::VertexBufferLayout {
                array_stride: a.info.format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attr,
            })
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(self.config.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.vertex_module,
                    entry_point: Some(self.interface.vertex_entry.as_str()),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &self.fragment_module,
                    entry_point: Some(self.interface.fragment_entry.as_str()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
        log::debug!(
            "{}: built pipeline for {:?} -> {:?}",
            self.config.label,
            topology,
            format
        );
        self.pipelines.insert((topology, format), pipeline);
    }

    /// Draw into `target`.
    ///
    /// Skipped with a warning when an attribute has no data or a texture
    /// slot is unbound.
    pub fn draw(&mut self, target: &RenderTarget, call: DrawCall) {
        if let Some(missing) = self.attributes.iter().find(|a| a.buffer.is_none()) {
            log::warn!(
                "{}: attribute '{}' has no data; skipping draw",
                self.config.label,
                missing.info.name
            );
            return;
        }
        if let Some(missing) = self.textures.iter().find(|t| t.bound.is_none()) {
            log::warn!(
                "{}: texture '{}' is unbound; skipping draw",
                self.config.label,
                missing.info.name
            );
            return;
        }

        for block in self.blocks.iter_mut().filter(|b| b.dirty) {
            self.queue.write_buffer(&block.buffer, 0, &block.shadow);
            block.dirty = false;
        }
        let topology = call.topology.unwrap_or(self.config.topology);
        self.ensure_pipeline(topology, target.format);
        let Some(pipeline) = self.pipelines.get(&(topology, target.format)) else {
            return;
        };

        let mut entries = Vec::new();
        for block in &self.blocks {
            entries.push(wgpu::BindGroupEntry {
                binding: block.info.binding,
                resource: block.buffer.as_entire_binding(),
            });
        }
        for slot in &self.textures {
            if let Some((view, sampler)) = &slot.bound {
                entries.push(wgpu::BindGroupEntry {
                    binding: slot.info.binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                if let Some(binding) = slot.info.sampler {
                    entries.push(wgpu::BindGroupEntry {
                        binding,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    });
                }
            }
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.config.label),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        let count = call.count.unwrap_or_else(|| self.vertex_count());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(self.config.label),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(self.config.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match call.clear {
                            Some(color) => wgpu::LoadOp::Clear(color),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            for (slot, attribute) in self.attributes.iter().enumerate() {
                if let Some(buffer) = &attribute.buffer {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
            }
            pass.draw(call.first..call.first + count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Allocate a texture on this program's device.
    pub fn new_texture(
        &self,
        width: u32,
        height: u32,
        options: TextureOptions,
        data: Option<&[u8]>,
    ) -> Result<Texture, GpuError> {
        Texture::new(&self.device, &self.queue, width, height, options, data)
    }

    /// Re-upload a texture, reallocating it when the size changed.
    pub fn update_texture(
        &self,
        texture: &mut Texture,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<(), GpuError> {
        texture.update(&self.device, &self.queue, width, height, data)
    }

    /// Allocate a framebuffer over a fresh renderable texture.
    pub fn new_framebuffer(
        &self,
        width: u32,
        height: u32,
        params: TextureParams,
        data: Option<&[u8]>,
    ) -> Result<Framebuffer, GpuError> {
        let options = TextureOptions::new(params).renderable().label("Framebuffer");
        Ok(Framebuffer::new(self.new_texture(width, height, options, data)?))
    }

    fn begin_readback(&self, texture: &Texture, x: u32, y: u32, w: u32, h: u32) -> Readback {
        let row_bytes = w * BYTES_PER_TEXEL as u32;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_row * h) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: texture.raw(),
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(h),
                },
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        Readback {
            buffer,
            row_bytes: row_bytes as usize,
            padded_row: padded_row as usize,
        }
    }

    /// Synchronous readback of a `w` x `h` RGBA8 rectangle at `(x, y)`.
    ///
    /// Flushes all queued GPU work; use only on interaction paths.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_pixels(
        &self,
        texture: &Texture,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Vec<u8>, GpuError> {
        let readback = self.begin_readback(texture, x, y, w, h);
        let slice = readback.buffer.slice(..);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv()
            .map_err(|_| GpuError::BufferMap(wgpu::BufferAsyncError))??;

        Ok(readback.finish())
    }

    /// Async readback for WASM, where the browser drives buffer mapping.
    ///
    /// The copy is submitted before this returns; the future owns the
    /// staging buffer and borrows nothing, so callers may keep using the
    /// program while it resolves.
    #[cfg(target_arch = "wasm32")]
    pub fn read_pixels_async(
        &self,
        texture: &Texture,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> impl Future<Output = Result<Vec<u8>, GpuError>> + use<> {
        let readback = self.begin_readback(texture, x, y, w, h);

        let (sender, receiver) = futures_channel::oneshot::channel();
        readback
            .buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        async move {
            receiver
                .await
                .map_err(|_| GpuError::BufferMap(wgpu::BufferAsyncError))??;
            Ok(readback.finish())
        }
    }
}

/// A copy in flight from a texture to a mappable buffer.
struct Readback {
    buffer: wgpu::Buffer,
    row_bytes: usize,
    padded_row: usize,
}

impl Readback {
    /// Strip row padding from the mapped buffer.
    fn finish(self) -> Vec<u8> {
        let pixels: Vec<u8> = {
            let data = self.buffer.slice(..).get_mapped_range();
            data.chunks(self.padded_row)
                .flat_map(|row| &row[..self.row_bytes])
                .copied()
                .collect()
        };
        self.buffer.unmap();
        pixels
    }
}

fn create_bind_group_layout(
    device: &wgpu::Device,
    interface: &ProgramInterface,
    label: &str,
) -> wgpu::BindGroupLayout {
    let mut entries = Vec::new();
    for block in &interface.blocks {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: block.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(block.size),
            },
            count: None,
        });
    }
    for texture in &interface.textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: texture.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    for &binding in &interface.samplers {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
@vertex
fn vs_main(@location(0) a_position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(a_position, 0.0, 1.0);
}
"#;

    const FS: &str = r#"
struct Paint {
    u_color: vec4<f32>,
};
@group(0) @binding(0) var<uniform> paint: Paint;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return paint.u_color;
}
"#;

    fn context() -> Option<GpuContext> {
        match pollster::block_on(GpuContext::headless()) {
            Ok(ctx) => Some(ctx),
            Err(GpuError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
                None
            }
            Err(e) => panic!("Failed to acquire GPU: {:?}", e),
        }
    }

    #[test]
    fn test_rect_array_covers_corners() {
        let r = rect_array(1.0, 2.0, 3.0, 4.0);
        assert_eq!(&r[0..2], &[1.0, 2.0]);
        assert_eq!(&r[10..12], &[4.0, 6.0]);
    }

    #[test]
    fn test_fill_and_read_back() {
        let Some(ctx) = context() else { return };
        let mut program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        let fb = program
            .new_framebuffer(4, 4, TextureParams::NEAREST_REPEAT, None)
            .unwrap();

        program.set_attribute("a_position", &rect_array(-1.0, -1.0, 2.0, 2.0), UsageHint::Static);
        assert_eq!(program.vertex_count(), 6);
        program.set_uniform("u_color", [1.0f32, 0.0, 0.0, 1.0]);
        program.draw(&fb.target(), DrawCall::new());

        let pixels = program.read_pixels(fb.texture(), 1, 2, 2, 1).unwrap();
        assert_eq!(pixels, vec![255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let Some(ctx) = context() else { return };
        let mut program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        program.set_uniform("u_missing", 1.0f32);
        program.set_uniform("u_color", 1.0f32);
        program.set_attribute("a_missing", &[0.0, 1.0], UsageHint::Stream);
        assert_eq!(program.vertex_count(), 0);
    }

    #[test]
    fn test_draw_without_attribute_data_is_skipped() {
        let Some(ctx) = context() else { return };
        let mut program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        let fb = program
            .new_framebuffer(2, 2, TextureParams::NEAREST_REPEAT, None)
            .unwrap();
        program.set_uniform("u_color", [1.0f32, 1.0, 1.0, 1.0]);
        program.draw(&fb.target(), DrawCall::new());

        let pixels = program.read_pixels(fb.texture(), 0, 0, 2, 2).unwrap();
        assert!(pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_link_failure_is_reported() {
        let Some(ctx) = context() else { return };
        let result = GpuProgram::create(&ctx, VS, "not wgsl", ProgramConfig::default());
        assert!(matches!(result, Err(GpuError::ProgramLink(_))));
    }

    #[test]
    fn test_dynamic_buffer_is_respecified_in_place() {
        let Some(ctx) = context() else { return };
        let mut program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        program.set_attribute("a_position", &rect_array(0.0, 0.0, 1.0, 1.0), UsageHint::Dynamic);
        program.set_attribute("a_position", &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], UsageHint::Dynamic);
        assert_eq!(program.vertex_count(), 3);
    }

    #[test]
    fn test_configured_strip_topology_fills_quad() {
        let Some(ctx) = context() else { return };
        let config = ProgramConfig::new("Strip").topology(wgpu::PrimitiveTopology::TriangleStrip);
        let mut program = GpuProgram::create(&ctx, VS, FS, config).unwrap();
        let fb = program
            .new_framebuffer(4, 4, TextureParams::NEAREST_REPEAT, None)
            .unwrap();

        // Four vertices only cover the target as a strip
        program.set_attribute(
            "a_position",
            &[-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
            UsageHint::Static,
        );
        program.set_uniform("u_color", [0.0f32, 1.0, 0.0, 1.0]);
        program.draw(&fb.target(), DrawCall::new());

        let pixels = program.read_pixels(fb.texture(), 0, 0, 4, 4).unwrap();
        assert!(pixels.chunks_exact(4).all(|t| t == [0, 255, 0, 255]));
    }

    #[test]
    fn test_range_draws_first_triangle_only() {
        let Some(ctx) = context() else { return };
        let mut program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        let fb = program
            .new_framebuffer(4, 4, TextureParams::NEAREST_REPEAT, None)
            .unwrap();

        program.set_attribute("a_position", &rect_array(-1.0, -1.0, 2.0, 2.0), UsageHint::Static);
        program.set_uniform("u_color", [1.0f32, 1.0, 1.0, 1.0]);
        program.draw(&fb.target(), DrawCall::new().range(0, 3));

        // First triangle covers clip (-1,-1), (1,-1), (-1,1): the bottom-left half
        let pixels = program.read_pixels(fb.texture(), 0, 0, 4, 4).unwrap();
        let texel_alpha = |x: usize, y: usize| pixels[(y * 4 + x) * 4 + 3];
        assert_eq!(texel_alpha(0, 3), 255);
        assert_eq!(texel_alpha(3, 0), 0);
    }

    #[test]
    fn test_explicit_topology_overrides_config() {
        let Some(ctx) = context() else { return };
        let mut program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        let fb = program
            .new_framebuffer(4, 4, TextureParams::NEAREST_REPEAT, None)
            .unwrap();

        program.set_attribute(
            "a_position",
            &[-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
            UsageHint::Static,
        );
        program.set_uniform("u_color", [0.0f32, 0.0, 1.0, 1.0]);
        program.draw(
            &fb.target(),
            DrawCall::new().topology(wgpu::PrimitiveTopology::TriangleStrip),
        );

        let pixels = program.read_pixels(fb.texture(), 3, 3, 1, 1).unwrap();
        assert_eq!(pixels, vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_interface_reports_linked_names() {
        let Some(ctx) = context() else { return };
        let program = GpuProgram::create(&ctx, VS, FS, ProgramConfig::new("Fill")).unwrap();
        let interface = program.interface();

        assert_eq!(interface.vertex_entry, "vs_main");
        assert_eq!(interface.fragment_entry, "fs_main");
        let attributes: Vec<&str> = interface.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attributes, vec!["a_position"]);
        let uniforms: Vec<&str> = interface.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(uniforms, vec!["u_color"]);
        assert!(interface.textures.is_empty());
    }
}
