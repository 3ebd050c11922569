//! Simulation Engine - ping-pong state textures advanced by the step program.

use super::program::{DrawCall, GpuProgram, ProgramConfig, rect_array};
use super::texture::{Framebuffer, Texture, TextureParams};
use super::uniform::UsageHint;
use super::{GpuContext, GpuError};
use crate::compute::{SimulationStats, wrap_cell};
use crate::compute::rule::{self, ALIVE_INTENSITY};
use crate::schema::{ALIVE, BYTES_PER_TEXEL, Seed};

// Embed shader sources at compile time
const QUAD_SHADER: &str = include_str!("shaders/quad.vert.wgsl");
const STEP_SHADER: &str = include_str!("shaders/step.frag.wgsl");

/// What a drawing step writes under the cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrawMode {
    /// Normal rule-based stepping.
    #[default]
    Off,
    /// Force the cell under the cursor alive.
    Paint,
    /// Force the cell under the cursor dead.
    Erase,
}

impl DrawMode {
    fn value(self) -> f32 {
        match self {
            DrawMode::Paint => ALIVE_INTENSITY,
            DrawMode::Off | DrawMode::Erase => 0.0,
        }
    }

    #[inline]
    pub fn is_drawing(self) -> bool {
        self != DrawMode::Off
    }
}

/// GPU-resident Life simulation on a fixed toroidal grid.
pub struct SimulationEngine {
    program: GpuProgram,
    states: [Framebuffer; 2],
    width: u32,
    height: u32,
    generation: u64,
    drawing: DrawMode,
    cursor: (f32, f32),
}

impl SimulationEngine {
    /// Allocate both state textures and seed generation 0.
    pub fn new(ctx: &GpuContext, width: u32, height: u32, seed: &Seed) -> Result<Self, GpuError> {
        let fragment = format!("{}{}", rule::wgsl_constants(), STEP_SHADER);
        let mut program =
            GpuProgram::create(ctx, QUAD_SHADER, &fragment, ProgramConfig::new("Step Program"))?;

        program.set_attribute("a_position", &rect_array(-1.0, -1.0, 2.0, 2.0), UsageHint::Static);
        program.set_uniform("u_texsize", [width as f32, height as f32]);

        let data = seed.generate(width, height);
        let states = [
            program.new_framebuffer(width, height, TextureParams::NEAREST_REPEAT, Some(&data))?,
            program.new_framebuffer(width, height, TextureParams::NEAREST_REPEAT, None)?,
        ];
        log::info!("simulation engine ready: {width}x{height}");

        Ok(Self {
            program,
            states,
            width,
            height,
            generation: 0,
            drawing: DrawMode::Off,
            cursor: (0.0, 0.0),
        })
    }

    #[inline]
    fn source_index(&self) -> usize {
        (self.generation % 2) as usize
    }

    /// Texture holding the current generation.
    pub fn source(&self) -> &Texture {
        self.states[self.source_index()].texture()
    }

    /// Advance one generation; in drawing mode only the cursor cell changes.
    pub fn step(&mut self) {
        self.step_with(self.drawing);
    }

    fn step_with(&mut self, mode: DrawMode) {
        let src = self.source_index();
        let dst = 1 - src;

        self.program.set_texture("u_state", self.states[src].texture());
        self.program.set_uniform("u_drawing", mode.is_drawing());
        self.program.set_uniform("u_draw_value", mode.value());
        let (cx, cy) = wrap_cell(self.cursor, self.width, self.height);
        self.program.set_uniform("u_cursor", [cx as f32, cy as f32]);
        self.program.draw(&self.states[dst].target(), DrawCall::new());

        self.generation += 1;
    }

    /// Advance `steps` generations.
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Replace the state with a fresh seed and reset the generation counter.
    pub fn reseed(&mut self, seed: &Seed) -> Result<(), GpuError> {
        let data = seed.generate(self.width, self.height);
        self.generation = 0;
        let (width, height) = (self.width, self.height);
        let texture = self.states[0].texture_mut();
        self.program
            .update_texture(texture, width, height, Some(&data))
    }

    /// Reseed with Bernoulli(0.5) noise, then run `warmup` rule steps.
    pub fn randomize(&mut self, warmup: u32, seed: Option<u64>) -> Result<(), GpuError> {
        self.reseed(&Seed::random(seed))?;
        for _ in 0..warmup {
            self.step_with(DrawMode::Off);
        }
        log::debug!("randomized with {warmup} warm-up steps");
        Ok(())
    }

    pub fn set_drawing(&mut self, mode: DrawMode) {
        self.drawing = mode;
    }

    #[inline]
    pub fn drawing(&self) -> DrawMode {
        self.drawing
    }

    /// Move the draw cursor, in fractional grid coordinates.
    pub fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor = (x, y);
    }

    #[inline]
    pub fn cursor(&self) -> (f32, f32) {
        self.cursor
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    fn wrap(&self, gx: i64, gy: i64) -> (u32, u32) {
        (
            gx.rem_euclid(self.width as i64) as u32,
            gy.rem_euclid(self.height as i64) as u32,
        )
    }

    /// Whether the cell at wrapped grid coordinates is fully alive.
    ///
    /// Blocks on a GPU readback; only call from pointer-down handling.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn sample_cell(&self, gx: i64, gy: i64) -> Result<bool, GpuError> {
        let (x, y) = self.wrap(gx, gy);
        let texel = self.program.read_pixels(self.source(), x, y, 1, 1)?;
        Ok(texel.first() == Some(&ALIVE))
    }

    /// Async variant of `sample_cell` for WASM.
    ///
    /// Samples the generation current at call time; the returned future
    /// does not borrow the engine.
    #[cfg(target_arch = "wasm32")]
    pub fn sample_cell_async(
        &self,
        gx: i64,
        gy: i64,
    ) -> impl Future<Output = Result<bool, GpuError>> + use<> {
        let (x, y) = self.wrap(gx, gy);
        let texel = self.program.read_pixels_async(self.source(), x, y, 1, 1);
        async move { Ok(texel.await?.first() == Some(&ALIVE)) }
    }

    /// Current intensities, row-major.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_state(&self) -> Result<Vec<f32>, GpuError> {
        let pixels = self
            .program
            .read_pixels(self.source(), 0, 0, self.width, self.height)?;
        Ok(intensities(&pixels))
    }

    /// Statistics of the current generation.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn stats(&self) -> Result<SimulationStats, GpuError> {
        Ok(SimulationStats::from_intensities(
            self.generation,
            &self.read_state()?,
        ))
    }

    /// Async variant of `stats` for WASM; the returned future does not borrow the engine.
    #[cfg(target_arch = "wasm32")]
    pub fn stats_async(&self) -> impl Future<Output = Result<SimulationStats, GpuError>> + use<> {
        let generation = self.generation;
        let pixels = self
            .program
            .read_pixels_async(self.source(), 0, 0, self.width, self.height);
        async move {
            Ok(SimulationStats::from_intensities(
                generation,
                &intensities(&pixels.await?),
            ))
        }
    }
}

/// Red channel of RGBA8 texels as intensities in `[0, 1]`.
fn intensities(pixels: &[u8]) -> Vec<f32> {
    pixels
        .chunks_exact(BYTES_PER_TEXEL)
        .map(|texel| texel[0] as f32 / ALIVE as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(width: u32, height: u32, seed: &Seed) -> Option<SimulationEngine> {
        let ctx = match pollster::block_on(GpuContext::headless()) {
            Ok(ctx) => ctx,
            Err(GpuError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
                return None;
            }
            Err(e) => panic!("Failed to acquire GPU: {:?}", e),
        };
        Some(SimulationEngine::new(&ctx, width, height, seed).unwrap())
    }

    fn alive_cells(state: &[f32], width: usize) -> Vec<(usize, usize)> {
        state
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == 1.0)
            .map(|(i, _)| (i % width, i / width))
            .collect()
    }

    #[test]
    fn test_blinker_rotates_on_4x4_torus() {
        let seed = Seed::cells([(0, 1), (1, 1), (2, 1)]);
        let Some(mut engine) = engine(4, 4, &seed) else { return };

        assert_eq!(alive_cells(&engine.read_state().unwrap(), 4), vec![(0, 1), (1, 1), (2, 1)]);
        engine.step();
        assert_eq!(engine.generation(), 1);
        assert_eq!(alive_cells(&engine.read_state().unwrap(), 4), vec![(1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_drawing_step_only_touches_cursor_cell() {
        let Some(mut engine) = engine(8, 8, &Seed::random(Some(7))) else { return };
        engine.run(2);
        let before = engine.read_state().unwrap();

        engine.set_drawing(DrawMode::Paint);
        engine.set_cursor(2.5, 5.7);
        engine.step();
        let after = engine.read_state().unwrap();

        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            if i == 5 * 8 + 2 {
                assert_eq!(*a, 1.0);
            } else {
                assert_eq!(a.to_bits(), b.to_bits(), "texel {i} changed");
            }
        }
    }

    #[test]
    fn test_erase_clears_cursor_cell_with_wrapping() {
        let seed = Seed::cells([(1, 1)]);
        let Some(mut engine) = engine(4, 4, &seed) else { return };
        engine.set_drawing(DrawMode::Erase);
        engine.set_cursor(-2.5, 5.0);
        engine.step();
        assert!(engine.read_state().unwrap().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_gpu_matches_cpu_rule() {
        let (w, h) = (16usize, 12usize);
        let Some(mut engine) = engine(w as u32, h as u32, &Seed::random(Some(42))) else {
            return;
        };
        for _ in 0..6 {
            let state = engine.read_state().unwrap();
            let expected = rule::step_grid(&state, w, h);
            engine.step();
            let actual = engine.read_state().unwrap();
            for (i, (e, a)) in expected.iter().zip(&actual).enumerate() {
                assert!((e - a).abs() <= 1.0 / 255.0, "texel {i}: cpu {e} gpu {a}");
            }
        }
    }

    #[test]
    fn test_corner_birth_wraps_both_edges() {
        // (0, 0) sees (15, 11) across both edges plus (1, 0) and (0, 1)
        let seed = Seed::cells([(15, 11), (1, 0), (0, 1)]);
        let Some(mut engine) = engine(16, 12, &seed) else { return };
        let expected = rule::step_grid(&engine.read_state().unwrap(), 16, 12);
        engine.step();
        let actual = engine.read_state().unwrap();
        assert_eq!(actual[0], 1.0, "corner birth across the wrap");
        for (i, (e, a)) in expected.iter().zip(&actual).enumerate() {
            assert!((e - a).abs() <= 1.0 / 255.0, "texel {i}: cpu {e} gpu {a}");
        }
    }

    #[test]
    fn test_oversized_grid_is_rejected() {
        let ctx = match pollster::block_on(GpuContext::headless()) {
            Ok(ctx) => ctx,
            Err(GpuError::NoAdapter) => {
                eprintln!("Skipping GPU test: no adapter available");
                return;
            }
            Err(e) => panic!("Failed to acquire GPU: {:?}", e),
        };
        let max = ctx.max_texture_side();
        let result = SimulationEngine::new(&ctx, max + 1, 4, &Seed::empty());
        assert!(matches!(
            result,
            Err(GpuError::TextureSize { width, max: m, .. }) if width == max + 1 && m == max
        ));
    }

    #[test]
    fn test_sample_cell_wraps() {
        let seed = Seed::cells([(1, 1)]);
        let Some(engine) = engine(4, 4, &seed) else { return };
        assert!(engine.sample_cell(1, 1).unwrap());
        assert!(engine.sample_cell(-3, 5).unwrap());
        assert!(!engine.sample_cell(0, 0).unwrap());
    }

    #[test]
    fn test_randomize_runs_warmup() {
        let Some(mut engine) = engine(32, 32, &Seed::default()) else { return };
        engine.run(3);
        engine.randomize(5, Some(1)).unwrap();
        assert_eq!(engine.generation(), 5);

        let stats = engine.stats().unwrap();
        assert_eq!(stats.generation, 5);
        assert!(stats.live_cells > 0);
    }
}
