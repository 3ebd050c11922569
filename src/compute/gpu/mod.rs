//! GPU Backend for the Life widget
//!
//! Shader programs, textures and the simulation/render pipeline on WebGPU (wgpu).

mod context;
mod engine;
mod introspect;
mod program;
mod renderer;
mod texture;
mod uniform;

pub use context::GpuContext;
pub use engine::{DrawMode, SimulationEngine};
pub use introspect::{
    AttributeInfo, ProgramInterface, ProgramLinkError, ShaderStage, TextureBinding, UniformBlock,
    UniformInfo,
};
pub use program::{DrawCall, GpuProgram, ProgramConfig, rect_array};
pub use renderer::{Renderer, Screen};
pub use texture::{
    Filter, Framebuffer, RenderTarget, STATE_FORMAT, Texture, TextureOptions, TextureParams, Wrap,
};
pub use uniform::{Arity, UniformKind, UniformLayout, UniformValue, UsageHint};

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create drawing surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("Surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Texture size {width}x{height} outside 1..={max}")]
    TextureSize { width: u32, height: u32, max: u32 },

    #[error("Texture data has {actual} bytes, expected {expected}")]
    TextureData { expected: usize, actual: usize },

    #[error(transparent)]
    ProgramLink(#[from] ProgramLinkError),
}
