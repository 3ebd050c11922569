//! Textures, samplers and framebuffers.
//!
//! Every wgpu format/usage/filter literal used by the pipeline lives here, so
//! the simulation and renderer only speak in [`Filter`], [`Wrap`] and
//! [`TextureParams`].

use super::GpuError;
use crate::schema::BYTES_PER_TEXEL;

/// Storage format for simulation state and display textures.
pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const SAMPLED_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

const FRAMEBUFFER_USAGE: wgpu::TextureUsages =
    SAMPLED_USAGE.union(wgpu::TextureUsages::RENDER_ATTACHMENT);

/// Texel filtering for minification and magnification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

impl Filter {
    fn mode(self) -> wgpu::FilterMode {
        match self {
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Behavior of texture coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Repeat,
    Clamp,
}

impl Wrap {
    fn address_mode(self) -> wgpu::AddressMode {
        match self {
            Wrap::Repeat => wgpu::AddressMode::Repeat,
            Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
        }
    }
}

/// Sampling parameters of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParams {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

impl TextureParams {
    /// Toroidal cell lookups.
    pub const NEAREST_REPEAT: TextureParams = TextureParams {
        min_filter: Filter::Nearest,
        mag_filter: Filter::Nearest,
        wrap_s: Wrap::Repeat,
        wrap_t: Wrap::Repeat,
    };

    /// Smooth sampling of the rotated display texture.
    pub const LINEAR_CLAMP: TextureParams = TextureParams {
        min_filter: Filter::Linear,
        mag_filter: Filter::Linear,
        wrap_s: Wrap::Clamp,
        wrap_t: Wrap::Clamp,
    };

    fn create_sampler(&self, device: &wgpu::Device) -> wgpu::Sampler {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: self.wrap_s.address_mode(),
            address_mode_v: self.wrap_t.address_mode(),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: self.mag_filter.mode(),
            min_filter: self.min_filter.mode(),
            ..Default::default()
        })
    }
}

/// Allocation options for [`Texture::new`].
#[derive(Debug, Clone, Copy)]
pub struct TextureOptions {
    pub params: TextureParams,
    /// Allow the texture to be a color attachment.
    pub renderable: bool,
    pub label: &'static str,
}

impl TextureOptions {
    pub fn new(params: TextureParams) -> Self {
        Self {
            params,
            renderable: false,
            label: "Texture",
        }
    }

    pub fn renderable(mut self) -> Self {
        self.renderable = true;
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}

/// A 2D RGBA8 texture with its sampler.
#[derive(Debug)]
pub struct Texture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    options: TextureOptions,
}

impl Texture {
    /// Allocate a texture, uploading `data` (tightly packed RGBA8 rows) if given.
    ///
    /// Without data the contents are zeroed by the backend. Sizes of zero or
    /// beyond the device's 2D texture limit are rejected before allocation.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        options: TextureOptions,
        data: Option<&[u8]>,
    ) -> Result<Self, GpuError> {
        let max = device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::TextureSize { width, height, max });
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(options.label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: if options.renderable {
                FRAMEBUFFER_USAGE
            } else {
                SAMPLED_USAGE
            },
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = options.params.create_sampler(device);

        let tex = Self {
            texture,
            view,
            sampler,
            width,
            height,
            options,
        };
        if let Some(bytes) = data {
            tex.write(queue, bytes)?;
        }
        Ok(tex)
    }

    /// Replace the full contents of the texture.
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8]) -> Result<(), GpuError> {
        let expected = self.byte_len();
        if data.len() != expected {
            return Err(GpuError::TextureData {
                expected,
                actual: data.len(),
            });
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * BYTES_PER_TEXEL as u32),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
        Ok(())
    }

    /// Upload new contents, reallocating when the size changed.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<(), GpuError> {
        if width != self.width || height != self.height {
            log::debug!(
                "reallocating {} {}x{} -> {}x{}",
                self.options.label,
                self.width,
                self.height,
                width,
                height
            );
            *self = Texture::new(device, queue, width, height, self.options, data)?;
            return Ok(());
        }
        match data {
            Some(bytes) => self.write(queue, bytes),
            None => Ok(()),
        }
    }

    /// Size in bytes of a tightly packed copy of the contents.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_TEXEL
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn raw(&self) -> &wgpu::Texture {
        &self.texture
    }
}

/// A render target bound to exactly one texture.
#[derive(Debug)]
pub struct Framebuffer {
    texture: Texture,
}

impl Framebuffer {
    /// Wrap a renderable texture.
    pub fn new(texture: Texture) -> Self {
        debug_assert!(texture.options.renderable, "framebuffer over a non-renderable texture");
        Self { texture }
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn texture_mut(&mut self) -> &mut Texture {
        &mut self.texture
    }

    /// Color attachment description for a draw into this framebuffer.
    pub fn target(&self) -> RenderTarget {
        RenderTarget {
            view: self.texture.view.clone(),
            format: STATE_FORMAT,
            width: self.texture.width,
            height: self.texture.height,
        }
    }
}

/// Where a draw call writes: a framebuffer texture or a surface frame.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}
