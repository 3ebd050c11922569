//! Renderer - styles the simulation into a display texture and presents it.
//!
//! Two passes per frame. The render pass draws the state into an oversized
//! square display texture (side `2 × max(target side)`, so the 45° rotation
//! never clips a corner), adding grid lines, the circular mask and the
//! shimmer. The present pass draws that texture as a quad through the
//! presentation transform onto the screen.

use super::program::{DrawCall, GpuProgram, ProgramConfig, rect_array};
use super::texture::{Framebuffer, RenderTarget, Texture, TextureOptions, TextureParams};
use super::uniform::UsageHint;
use super::{GpuContext, GpuError};
use crate::compute::{FrameParams, Mask, TargetRect, Viewport, presentation_transform};

const QUAD_SHADER: &str = include_str!("shaders/quad.vert.wgsl");
const RENDER_SHADER: &str = include_str!("shaders/render.frag.wgsl");
const PRESENT_VERTEX_SHADER: &str = include_str!("shaders/present.vert.wgsl");
const PRESENT_FRAGMENT_SHADER: &str = include_str!("shaders/present.frag.wgsl");

const TRANSPARENT: wgpu::Color = wgpu::Color::TRANSPARENT;

/// Where presented frames go.
pub enum Screen {
    /// A configured window or canvas surface.
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// An offscreen texture (headless runs, snapshots, tests).
    Offscreen(Framebuffer),
}

impl Screen {
    /// Configure `surface` for presentation at the viewport size.
    pub fn surface(ctx: &GpuContext, surface: wgpu::Surface<'static>, viewport: Viewport) -> Self {
        let caps = surface.get_capabilities(&ctx.adapter);
        // Shaders output final colors, so skip sRGB re-encoding
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let alpha_mode = if caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width.max(1),
            height: viewport.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&ctx.device, &config);
        Screen::Surface { surface, config }
    }

    /// An offscreen screen of the viewport size.
    pub fn offscreen(ctx: &GpuContext, viewport: Viewport) -> Result<Self, GpuError> {
        let texture = Texture::new(
            &ctx.device,
            &ctx.queue,
            viewport.width.max(1),
            viewport.height.max(1),
            TextureOptions::new(TextureParams::LINEAR_CLAMP)
                .renderable()
                .label("Screen"),
            None,
        )?;
        Ok(Screen::Offscreen(Framebuffer::new(texture)))
    }
}

/// Styles and presents simulation state.
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    render_program: GpuProgram,
    present_program: GpuProgram,
    display: Framebuffer,
    screen: Screen,
    viewport: Viewport,
    target: TargetRect,
    cellsize: f32,
    max_side: u32,
}

impl Renderer {
    /// Build both programs and lay out the display for `target`.
    pub fn new(
        ctx: &GpuContext,
        screen: Screen,
        grid: (u32, u32),
        cellsize: f32,
        viewport: Viewport,
        target: TargetRect,
    ) -> Result<Self, GpuError> {
        let mut render_program = GpuProgram::create(
            ctx,
            QUAD_SHADER,
            RENDER_SHADER,
            ProgramConfig::new("Render Program"),
        )?;
        let present_program = GpuProgram::create(
            ctx,
            PRESENT_VERTEX_SHADER,
            PRESENT_FRAGMENT_SHADER,
            ProgramConfig::new("Present Program"),
        )?;

        render_program.set_attribute(
            "a_position",
            &rect_array(-1.0, -1.0, 2.0, 2.0),
            UsageHint::Static,
        );
        render_program.set_uniform("u_texsize", [grid.0 as f32, grid.1 as f32]);
        render_program.set_uniform("u_cellsize", cellsize);

        let display = render_program.new_framebuffer(1, 1, TextureParams::LINEAR_CLAMP, None)?;
        let mut renderer = Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            render_program,
            present_program,
            display,
            screen,
            viewport,
            target,
            cellsize,
            max_side: ctx.max_texture_side(),
        };
        renderer.resize(viewport, target)?;
        Ok(renderer)
    }

    /// Recompute the display size and the presentation transform.
    pub fn resize(&mut self, viewport: Viewport, target: TargetRect) -> Result<(), GpuError> {
        self.viewport = viewport;
        self.target = target;

        let wanted = (2.0 * target.max_side()).ceil().max(1.0) as u32;
        let side = wanted.min(self.max_side);
        if side < wanted {
            log::warn!("display texture clamped to {side}px (wanted {wanted}px)");
        }
        let display = self.display.texture_mut();
        if display.width() != side {
            display.update(&self.device, &self.queue, side, side, None)?;
        }

        match &mut self.screen {
            Screen::Surface { surface, config } => {
                config.width = viewport.width.max(1);
                config.height = viewport.height.max(1);
                surface.configure(&self.device, config);
            }
            Screen::Offscreen(fb) => {
                let (w, h) = (viewport.width.max(1), viewport.height.max(1));
                fb.texture_mut().update(&self.device, &self.queue, w, h, None)?;
            }
        }

        let half = side as f32 / 2.0;
        self.render_program.set_uniform("u_center", [half, half]);
        self.present_program.set_attribute(
            "a_position",
            &rect_array(-half, -half, side as f32, side as f32),
            UsageHint::Dynamic,
        );
        self.present_program.set_attribute(
            "a_texcoord",
            &rect_array(0.0, 0.0, 1.0, 1.0),
            UsageHint::Static,
        );
        self.present_program
            .set_uniform("u_transform", presentation_transform(&target, viewport));

        log::debug!(
            "layout: viewport {}x{}, target {:?}, display {side}px",
            viewport.width,
            viewport.height,
            target
        );
        Ok(())
    }

    pub fn set_cellsize(&mut self, cellsize: f32) {
        self.cellsize = cellsize;
        self.render_program.set_uniform("u_cellsize", cellsize);
    }

    #[inline]
    pub fn cellsize(&self) -> f32 {
        self.cellsize
    }

    /// Render `source` and present it.
    pub fn render(&mut self, source: &Texture, frame: &FrameParams) -> Result<(), GpuError> {
        let (masked, radius) = match frame.mask {
            Mask::Circle { radius } => (true, radius),
            Mask::None => (false, 0.0),
        };
        self.render_program.set_texture("u_state", source);
        self.render_program.set_uniform("u_masked", masked);
        self.render_program.set_uniform("u_rad", radius);
        self.render_program.set_uniform("u_phase", frame.phase);
        self.render_program
            .draw(&self.display.target(), DrawCall::new().clear(TRANSPARENT));

        self.present_program
            .set_texture("u_display", self.display.texture());
        match &self.screen {
            Screen::Surface { surface, config } => {
                let output = match surface.get_current_texture() {
                    Ok(output) => output,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        log::debug!("surface lost; reconfiguring");
                        surface.configure(&self.device, config);
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };
                let target = RenderTarget {
                    view: output
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default()),
                    format: config.format,
                    width: config.width,
                    height: config.height,
                };
                self.present_program
                    .draw(&target, DrawCall::new().clear(TRANSPARENT));
                output.present();
            }
            Screen::Offscreen(fb) => {
                self.present_program
                    .draw(&fb.target(), DrawCall::new().clear(TRANSPARENT));
            }
        }
        Ok(())
    }

    /// Read back the presented frame; `None` when presenting to a surface.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_screen(&self) -> Result<Option<(u32, u32, Vec<u8>)>, GpuError> {
        match &self.screen {
            Screen::Surface { .. } => Ok(None),
            Screen::Offscreen(fb) => {
                let texture = fb.texture();
                let (w, h) = (texture.width(), texture.height());
                let pixels = self.present_program.read_pixels(texture, 0, 0, w, h)?;
                Ok(Some((w, h, pixels)))
            }
        }
    }

    /// Side of the square display texture.
    pub fn display_side(&self) -> u32 {
        self.display.texture().width()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn target(&self) -> TargetRect {
        self.target
    }
}
