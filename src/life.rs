//! The Life widget: engine, renderer and scheduler behind one command surface.
//!
//! [`Life`] is what a host drives. It owns every GPU resource and all
//! mutable widget state; the host forwards frame callbacks to [`Life::tick`],
//! input events to the `pointer_*` methods, and UI commands to the rest.

use crate::compute::gpu::{DrawMode, GpuContext, GpuError, Renderer, Screen, SimulationEngine};
use crate::compute::{
    FrameParams, FrameStrategy, Scheduler, Stage, TargetRect, Viewport, client_to_grid,
};
use crate::schema::{ConfigError, LifeConfig, Seed};

/// Error type for widget construction.
#[derive(Debug, thiserror::Error)]
pub enum LifeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Borrows the engine and renderer for one scheduler call.
struct Frame<'a> {
    engine: &'a mut SimulationEngine,
    renderer: &'a mut Renderer,
}

impl Stage for Frame<'_> {
    fn step(&mut self) {
        self.engine.step();
    }

    fn render(&mut self, frame: &FrameParams) {
        if let Err(e) = self.renderer.render(self.engine.source(), frame) {
            log::warn!("render failed: {e}");
        }
    }
}

/// Windowed mask radius for a target region.
fn window_radius(target: &TargetRect, fallback: f32) -> f32 {
    if target.height > 0.0 {
        target.height / 2.0
    } else {
        fallback
    }
}

/// A pointer press with the state of the cell under it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPress {
    /// Fractional grid coordinate of the press.
    pub grid: (f32, f32),
    /// The pressed cell was fully alive, so the drag erases.
    pub alive: bool,
}

/// A running Life widget.
pub struct Life {
    config: LifeConfig,
    engine: SimulationEngine,
    renderer: Renderer,
    scheduler: Scheduler,
    /// A pointer drag is in progress.
    pointer_drawing: bool,
}

impl Life {
    /// Build the pipeline, seed it, run the warm-up steps and render once.
    pub fn new(
        ctx: &GpuContext,
        screen: Screen,
        config: LifeConfig,
        seed: &Seed,
        viewport: Viewport,
        target: TargetRect,
    ) -> Result<Self, LifeError> {
        config.validate()?;

        let mut engine = SimulationEngine::new(ctx, config.width, config.height, seed)?;
        engine.run(config.init_steps as u64);
        let renderer = Renderer::new(
            ctx,
            screen,
            (config.width, config.height),
            config.cellsize,
            viewport,
            target,
        )?;

        let radius = window_radius(&target, config.radius);
        let mut scheduler = Scheduler::new(FrameStrategy::from_framerate(config.framerate), radius);
        scheduler.set_layout(radius, viewport.max_side() as f32);

        let mut life = Self {
            config,
            engine,
            renderer,
            scheduler,
            pointer_drawing: false,
        };
        life.render();
        log::info!(
            "life widget ready ({}x{}, {:?})",
            life.config.width,
            life.config.height,
            life.scheduler.strategy()
        );
        Ok(life)
    }

    fn frame(&mut self) -> Frame<'_> {
        Frame {
            engine: &mut self.engine,
            renderer: &mut self.renderer,
        }
    }

    /// Render the current state immediately.
    pub fn render(&mut self) {
        let params = self.scheduler.frame_params();
        self.frame().render(&params);
    }

    /// Host frame callback; returns the number of timesteps consumed.
    pub fn tick(&mut self, now_ms: f64) -> u32 {
        let mut frame = Frame {
            engine: &mut self.engine,
            renderer: &mut self.renderer,
        };
        self.scheduler.tick(now_ms, &mut frame)
    }

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn toggle(&mut self) {
        self.scheduler.toggle();
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Advance exactly one generation and render, playing or not.
    pub fn step(&mut self) {
        let mut frame = Frame {
            engine: &mut self.engine,
            renderer: &mut self.renderer,
        };
        self.scheduler.step_once(&mut frame);
    }

    /// Reseed randomly, warm up, and render once.
    pub fn randomize(&mut self) -> Result<(), GpuError> {
        self.engine.randomize(self.config.init_steps, None)?;
        self.render();
        Ok(())
    }

    /// Change the on-screen cell size in pixels.
    pub fn set_cellsize(&mut self, cellsize: f32) {
        if !(cellsize > 0.0 && cellsize.is_finite()) {
            log::warn!("ignoring invalid cell size {cellsize}");
            return;
        }
        self.config.cellsize = cellsize;
        self.renderer.set_cellsize(cellsize);
        self.render();
    }

    /// Turn painting on or off from the command surface.
    pub fn set_drawing(&mut self, drawing: bool) {
        self.engine
            .set_drawing(if drawing { DrawMode::Paint } else { DrawMode::Off });
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.scheduler.set_fullscreen(fullscreen);
        self.render();
    }

    /// Speed up (`n > 0`) or slow down (`n < 0`) by factors of 4; defaults to one step faster.
    pub fn step_speed(&mut self, n: Option<i32>) -> u32 {
        self.scheduler.step_speed(n.unwrap_or(1))
    }

    /// Recompute layout for a new viewport/target and render immediately.
    pub fn resize(&mut self, viewport: Viewport, target: TargetRect) -> Result<(), GpuError> {
        self.renderer.resize(viewport, target)?;
        self.scheduler.set_layout(
            window_radius(&target, self.config.radius),
            viewport.max_side() as f32,
        );
        self.render();
        Ok(())
    }

    /// Grid coordinate under a client pixel.
    fn pointer_grid(&self, x: f32, y: f32) -> (f32, f32) {
        client_to_grid(&self.renderer.target(), self.config.cellsize, x, y)
    }

    /// Start drawing from a sampled press: erase over a live cell, paint otherwise.
    pub fn begin_press(&mut self, press: PointerPress) {
        let mode = if press.alive {
            DrawMode::Erase
        } else {
            DrawMode::Paint
        };
        self.engine.set_cursor(press.grid.0, press.grid.1);
        self.engine.set_drawing(mode);
        self.pointer_drawing = true;
        self.step();
    }

    /// Start drawing at a client pixel: erase if the cell is alive, paint otherwise.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn pointer_down(&mut self, x: f32, y: f32) -> Result<(), GpuError> {
        let grid = self.pointer_grid(x, y);
        let alive = self
            .engine
            .sample_cell(grid.0.floor() as i64, grid.1.floor() as i64)?;
        self.begin_press(PointerPress { grid, alive });
        Ok(())
    }

    /// Sample the cell under a client pixel for WASM.
    ///
    /// The future holds no borrow of the widget, so frames keep running while
    /// the readback resolves; hand the result to [`Life::begin_press`].
    #[cfg(target_arch = "wasm32")]
    pub fn pointer_down_async(
        &self,
        x: f32,
        y: f32,
    ) -> impl Future<Output = Result<PointerPress, GpuError>> + use<> {
        let grid = self.pointer_grid(x, y);
        let alive = self
            .engine
            .sample_cell_async(grid.0.floor() as i64, grid.1.floor() as i64);
        async move {
            Ok(PointerPress {
                grid,
                alive: alive.await?,
            })
        }
    }

    /// Move the cursor; while drawing, apply one drawing step there.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.pointer_drawing {
            return;
        }
        let grid = self.pointer_grid(x, y);
        self.engine.set_cursor(grid.0, grid.1);
        self.step();
    }

    pub fn pointer_up(&mut self) {
        self.pointer_drawing = false;
        self.engine.set_drawing(DrawMode::Off);
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Touch release; a tap that did not draw toggles playback.
    pub fn touch_end(&mut self) {
        if self.pointer_drawing {
            self.pointer_up();
        } else {
            self.toggle();
        }
    }

    #[inline]
    pub fn is_drawing(&self) -> bool {
        self.pointer_drawing
    }

    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.engine.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::FullscreenPhase;

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

    fn life_with(config: LifeConfig, seed: &Seed) -> Option<(Life, TargetRect)> {
        let ctx = context()?;
        let viewport = Viewport::new(128, 96);
        let target = TargetRect::centered(viewport, 0.5);
        let screen = Screen::offscreen(&ctx, viewport).unwrap();
        let life = Life::new(&ctx, screen, config, seed, viewport, target).unwrap();
        Some((life, target))
    }

    fn life(seed: &Seed, init_steps: u32) -> Option<(Life, TargetRect)> {
        let config = LifeConfig {
            width: 16,
            height: 16,
            cellsize: 4.0,
            init_steps,
            ..Default::default()
        };
        life_with(config, seed)
    }

    fn screen_alpha(life: &Life, x: u32, y: u32) -> u8 {
        let (w, _, pixels) = life.renderer().read_screen().unwrap().unwrap();
        pixels[((y * w + x) * 4 + 3) as usize]
    }

    #[test]
    fn test_warmup_runs_at_init() {
        let Some((life, _)) = life(&Seed::random(Some(3)), 5) else { return };
        assert_eq!(life.generation(), 5);
    }

    #[test]
    fn test_tick_is_capped_and_gated_by_play() {
        let Some((mut life, _)) = life(&Seed::default(), 0) else { return };
        life.tick(0.0);
        assert_eq!(life.tick(1000.0), 3);
        assert_eq!(life.generation(), 0);

        life.start();
        life.tick(2000.0);
        assert_eq!(life.generation(), 3);
    }

    #[test]
    fn test_step_while_paused() {
        let Some((mut life, _)) = life(&Seed::default(), 0) else { return };
        life.step();
        life.step();
        assert!(!life.is_playing());
        assert_eq!(life.generation(), 2);
    }

    #[test]
    fn test_pointer_paints_then_erases() {
        let Some((mut life, target)) = life(&Seed::empty(), 0) else { return };
        let (cx, cy) = target.center();

        life.pointer_down(cx, cy).unwrap();
        assert!(life.is_drawing());
        life.pointer_up();
        let stats = life.engine().stats().unwrap();
        assert_eq!(stats.live_cells, 1);
        assert!(life.engine().sample_cell(0, 0).unwrap());

        life.pointer_down(cx, cy).unwrap();
        life.pointer_up();
        assert!(!life.engine().sample_cell(0, 0).unwrap());
    }

    #[test]
    fn test_press_on_live_cell_erases() {
        let Some((mut life, _)) = life(&Seed::cells([(3, 4)]), 0) else { return };
        life.begin_press(PointerPress {
            grid: (3.5, 4.5),
            alive: true,
        });
        assert!(life.is_drawing());
        assert_eq!(life.engine().drawing(), DrawMode::Erase);
        assert!(!life.engine().sample_cell(3, 4).unwrap());
        assert_eq!(life.generation(), 1);
    }

    #[test]
    fn test_touch_tap_toggles_play() {
        let Some((mut life, _)) = life(&Seed::empty(), 0) else { return };
        life.touch_end();
        assert!(life.is_playing());
        life.touch_end();
        assert!(!life.is_playing());
    }

    #[test]
    fn test_step_speed_defaults_to_faster() {
        let Some((mut life, _)) = life(&Seed::empty(), 0) else { return };
        assert_eq!(life.step_speed(Some(-2)), 16);
        assert_eq!(life.step_speed(None), 4);
    }

    #[test]
    fn test_resize_updates_display_and_mask() {
        let Some((mut life, _)) = life(&Seed::empty(), 0) else { return };
        let viewport = Viewport::new(128, 96);
        life.resize(viewport, TargetRect::new(10.0, 10.0, 40.0, 30.0))
            .unwrap();

        assert_eq!(life.renderer().display_side(), 80);
        assert_eq!(life.renderer().target(), TargetRect::new(10.0, 10.0, 40.0, 30.0));
        assert_eq!(life.scheduler().mask_radius(), 15.0);
    }

    #[test]
    fn test_randomize_reruns_warmup() {
        let Some((mut life, _)) = life(&Seed::random(Some(7)), 3) else { return };
        for _ in 0..4 {
            life.step();
        }
        assert_eq!(life.generation(), 7);

        life.randomize().unwrap();
        assert_eq!(life.generation(), 3);
    }

    #[test]
    fn test_fullscreen_unmasks_after_expansion() {
        let config = LifeConfig {
            width: 16,
            height: 16,
            cellsize: 4.0,
            framerate: 0,
            ..Default::default()
        };
        let Some((mut life, target)) = life_with(config, &Seed::random(Some(1))) else {
            return;
        };
        // 38px above the center of a 64x48 target: outside the 24px window radius
        let (cx, cy) = target.center();
        let (x, y) = (cx as u32, cy as u32 - 38);
        assert_eq!(life.scheduler().mask_radius(), 24.0);
        assert_eq!(screen_alpha(&life, x, y), 0);

        life.set_fullscreen(true);
        let mut t = 0.0;
        while life.scheduler().fullscreen() != FullscreenPhase::Full {
            life.tick(t);
            t += 16.0;
            assert!(t < 10_000.0, "expansion never completed");
        }
        assert_eq!(screen_alpha(&life, x, y), 255);
        assert_eq!(life.generation(), 0);
    }

    #[test]
    fn test_oversized_grid_is_a_gpu_error() {
        let Some(ctx) = context() else { return };
        let config = LifeConfig {
            width: ctx.max_texture_side() + 1,
            height: 4,
            ..Default::default()
        };
        let viewport = Viewport::new(10, 10);
        let screen = Screen::offscreen(&ctx, viewport).unwrap();
        let result = Life::new(
            &ctx,
            screen,
            config,
            &Seed::empty(),
            viewport,
            TargetRect::centered(viewport, 1.0),
        );
        assert!(matches!(
            result,
            Err(LifeError::Gpu(GpuError::TextureSize { .. }))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let Some(ctx) = context() else { return };
        let config = LifeConfig {
            width: 0,
            ..Default::default()
        };
        let viewport = Viewport::new(10, 10);
        let screen = Screen::offscreen(&ctx, viewport).unwrap();
        let result = Life::new(
            &ctx,
            screen,
            config,
            &Seed::empty(),
            viewport,
            TargetRect::centered(viewport, 1.0),
        );
        assert!(matches!(result, Err(LifeError::Config(_))));
    }
}
