//! Fixed-timestep scheduler coupling simulation rate to render rate.
//!
//! The host calls [`Scheduler::tick`] once per frame callback with a
//! millisecond timestamp. Elapsed time is accumulated and consumed in whole
//! timesteps, at most [`MAX_TIMESTEPS_PER_TICK`] per callback; anything left
//! over after the cap is dropped so a stalled tab does not trigger a catch-up
//! burst. Within one timestep a simulation step always precedes the render
//! that observes it.

use serde::Serialize;

/// Maximum timesteps consumed by a single tick.
pub const MAX_TIMESTEPS_PER_TICK: u32 = 3;

/// Factor applied to the speed divisor by [`Scheduler::step_speed`].
pub const SPEED_FACTOR: u32 = 4;

/// Largest speed divisor (4^15).
pub const MAX_SPEED_DIVISOR: u32 = 1 << 30;

/// Per-timestep growth of the mask radius while expanding to fullscreen.
pub const EXPAND_RATE: f32 = 1.1;

/// Smoothing weight of the newest sample in the fps estimate.
const FPS_SMOOTHING: f64 = 0.1;

/// The work driven by the scheduler.
pub trait Stage {
    /// Advance the simulation by one generation.
    fn step(&mut self);

    /// Draw the current simulation state.
    fn render(&mut self, frame: &FrameParams);
}

/// Visibility mask applied when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Mask {
    /// Only cells inside this radius (pixels) are shown.
    Circle { radius: f32 },
    /// Full-bleed, nothing masked.
    None,
}

/// Per-render parameters produced by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameParams {
    /// Position within the current generation, `substep / speed` in `[0, 1)`.
    pub phase: f32,
    pub mask: Mask,
}

/// How host callbacks are turned into timesteps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameStrategy {
    /// Accumulate elapsed time and consume fixed timesteps.
    FixedTimestep { timestep_ms: f64 },
    /// One timestep per host callback, paced by the display's vsync.
    VsyncLocked,
}

impl FrameStrategy {
    /// Strategy for a target frame rate; `0` selects vsync-locked pacing.
    pub fn from_framerate(framerate: u32) -> Self {
        if framerate == 0 {
            FrameStrategy::VsyncLocked
        } else {
            FrameStrategy::FixedTimestep {
                timestep_ms: 1000.0 / framerate as f64,
            }
        }
    }
}

/// Fullscreen presentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FullscreenPhase {
    Windowed,
    /// Mask radius is growing towards full-bleed.
    Expanding,
    Full,
}

/// Single-threaded frame scheduler owning the transport state.
#[derive(Debug, Clone)]
pub struct Scheduler {
    strategy: FrameStrategy,
    speed: u32,
    playing: bool,
    fullscreen: FullscreenPhase,
    frame: u64,
    accumulator_ms: f64,
    last_timestamp: Option<f64>,
    fps: f64,
    window_radius: f32,
    mask_radius: f32,
    viewport_max: f32,
}

impl Scheduler {
    /// Create a paused scheduler at speed divisor 1.
    pub fn new(strategy: FrameStrategy, window_radius: f32) -> Self {
        Self {
            strategy,
            speed: 1,
            playing: false,
            fullscreen: FullscreenPhase::Windowed,
            frame: 0,
            accumulator_ms: 0.0,
            last_timestamp: None,
            fps: 0.0,
            window_radius,
            mask_radius: window_radius,
            viewport_max: 0.0,
        }
    }

    /// Consume the time elapsed since the previous tick.
    ///
    /// Returns the number of timesteps consumed.
    pub fn tick<S: Stage>(&mut self, now_ms: f64, stage: &mut S) -> u32 {
        let elapsed = match self.last_timestamp.replace(now_ms) {
            Some(last) => (now_ms - last).max(0.0),
            None => 0.0,
        };
        if elapsed > 0.0 {
            let sample = 1000.0 / elapsed;
            self.fps = if self.fps == 0.0 {
                sample
            } else {
                self.fps * (1.0 - FPS_SMOOTHING) + sample * FPS_SMOOTHING
            };
        }

        match self.strategy {
            FrameStrategy::VsyncLocked => {
                self.advance(stage);
                1
            }
            FrameStrategy::FixedTimestep { timestep_ms } => {
                self.accumulator_ms += elapsed;
                let mut consumed = 0;
                while self.accumulator_ms >= timestep_ms {
                    if consumed == MAX_TIMESTEPS_PER_TICK {
                        log::debug!(
                            "dropping {:.1}ms of accumulated time",
                            self.accumulator_ms
                        );
                        self.accumulator_ms = 0.0;
                        break;
                    }
                    self.advance(stage);
                    self.accumulator_ms -= timestep_ms;
                    consumed += 1;
                }
                consumed
            }
        }
    }

    /// One timestep: maybe step, maybe grow the mask, maybe render.
    fn advance<S: Stage>(&mut self, stage: &mut S) {
        self.frame += 1;
        if self.playing && self.frame % self.speed as u64 == 0 {
            stage.step();
        }

        let transitioning = self.fullscreen == FullscreenPhase::Expanding;
        if transitioning {
            self.mask_radius *= EXPAND_RATE;
            if self.mask_radius > 2.0 * self.viewport_max {
                self.fullscreen = FullscreenPhase::Full;
            }
        }

        if self.playing || transitioning {
            stage.render(&self.frame_params());
        }
    }

    /// Render parameters for the current frame.
    pub fn frame_params(&self) -> FrameParams {
        let mask = match self.fullscreen {
            FullscreenPhase::Full => Mask::None,
            _ => Mask::Circle {
                radius: self.mask_radius,
            },
        };
        FrameParams {
            phase: self.shimmer_phase(),
            mask,
        }
    }

    /// Sub-step position within the current generation, in `[0, 1)`.
    pub fn shimmer_phase(&self) -> f32 {
        (self.frame % self.speed as u64) as f32 / self.speed as f32
    }

    /// Force exactly one step and one render, regardless of play state.
    pub fn step_once<S: Stage>(&mut self, stage: &mut S) {
        stage.step();
        stage.render(&self.frame_params());
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Change speed by `steps` factors of [`SPEED_FACTOR`].
    ///
    /// Positive `steps` speed the simulation up (smaller divisor), negative
    /// slow it down. The divisor never drops below 1.
    pub fn step_speed(&mut self, steps: i32) -> u32 {
        for _ in 0..steps.unsigned_abs() {
            self.speed = if steps > 0 {
                (self.speed / SPEED_FACTOR).max(1)
            } else {
                (self.speed.saturating_mul(SPEED_FACTOR)).min(MAX_SPEED_DIVISOR)
            };
        }
        log::debug!("speed divisor is now {}", self.speed);
        self.speed
    }

    /// Current speed divisor: one generation every `speed` timesteps.
    #[inline]
    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Enter the expanding transition, or drop straight back to windowed.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if fullscreen {
            if self.fullscreen == FullscreenPhase::Windowed {
                self.fullscreen = FullscreenPhase::Expanding;
                // Growth is multiplicative, so a zero radius would never leave Expanding
                self.mask_radius = self.mask_radius.max(1.0);
            }
        } else {
            self.fullscreen = FullscreenPhase::Windowed;
            self.mask_radius = self.window_radius;
        }
    }

    #[inline]
    pub fn fullscreen(&self) -> FullscreenPhase {
        self.fullscreen
    }

    /// Record the windowed mask radius and the viewport size after a resize.
    pub fn set_layout(&mut self, window_radius: f32, viewport_max: f32) {
        self.window_radius = window_radius;
        self.viewport_max = viewport_max;
        if self.fullscreen == FullscreenPhase::Windowed {
            self.mask_radius = window_radius;
        }
    }

    #[inline]
    pub fn mask_radius(&self) -> f32 {
        self.mask_radius
    }

    /// Timesteps consumed since creation.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Exponentially smoothed callback rate.
    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    pub fn strategy(&self) -> FrameStrategy {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        steps: u32,
        renders: Vec<FrameParams>,
        log: Vec<&'static str>,
    }

    impl Stage for Recorder {
        fn step(&mut self) {
            self.steps += 1;
            self.log.push("step");
        }

        fn render(&mut self, frame: &FrameParams) {
            self.renders.push(*frame);
            self.log.push("render");
        }
    }

    fn fixed_60() -> Scheduler {
        Scheduler::new(FrameStrategy::from_framerate(60), 100.0)
    }

    #[test]
    fn test_long_stall_is_capped() {
        let mut scheduler = fixed_60();
        let mut stage = Recorder::default();
        scheduler.start();

        assert_eq!(scheduler.tick(0.0, &mut stage), 0);
        assert_eq!(scheduler.tick(1000.0, &mut stage), MAX_TIMESTEPS_PER_TICK);
        assert_eq!(stage.steps, 3);

        // Remainder was discarded, so a short follow-up consumes one step
        assert_eq!(scheduler.tick(1017.0, &mut stage), 1);
    }

    #[test]
    fn test_accumulates_partial_timesteps() {
        let mut scheduler = fixed_60();
        let mut stage = Recorder::default();
        scheduler.tick(0.0, &mut stage);
        assert_eq!(scheduler.tick(10.0, &mut stage), 0);
        assert_eq!(scheduler.tick(20.0, &mut stage), 1);
        assert_eq!(scheduler.frame(), 1);
    }

    #[test]
    fn test_vsync_locked_consumes_one_per_callback() {
        let mut scheduler = Scheduler::new(FrameStrategy::from_framerate(0), 50.0);
        let mut stage = Recorder::default();
        scheduler.start();
        assert_eq!(scheduler.tick(0.0, &mut stage), 1);
        assert_eq!(scheduler.tick(1000.0, &mut stage), 1);
        assert_eq!(stage.steps, 2);
    }

    #[test]
    fn test_step_precedes_render() {
        let mut scheduler = Scheduler::new(FrameStrategy::VsyncLocked, 50.0);
        let mut stage = Recorder::default();
        scheduler.start();
        scheduler.tick(0.0, &mut stage);
        assert_eq!(stage.log, vec!["step", "render"]);
    }

    #[test]
    fn test_paused_neither_steps_nor_renders() {
        let mut scheduler = Scheduler::new(FrameStrategy::VsyncLocked, 50.0);
        let mut stage = Recorder::default();
        for t in 0..10 {
            scheduler.tick(t as f64 * 16.0, &mut stage);
        }
        assert_eq!(stage.steps, 0);
        assert!(stage.renders.is_empty());
    }

    #[test]
    fn test_step_once_ignores_play_state() {
        let mut scheduler = fixed_60();
        let mut stage = Recorder::default();
        scheduler.step_once(&mut stage);
        assert_eq!(stage.steps, 1);
        assert_eq!(stage.renders.len(), 1);
    }

    #[test]
    fn test_speed_divisor_steps_by_four() {
        let mut scheduler = fixed_60();
        assert_eq!(scheduler.step_speed(-1), 4);
        assert_eq!(scheduler.step_speed(-2), 64);
        assert_eq!(scheduler.step_speed(1), 16);
        assert_eq!(scheduler.step_speed(5), 1);
    }

    #[test]
    fn test_speed_divisor_gates_steps_and_drives_phase() {
        let mut scheduler = Scheduler::new(FrameStrategy::VsyncLocked, 50.0);
        let mut stage = Recorder::default();
        scheduler.step_speed(-1);
        scheduler.start();
        for t in 0..8 {
            scheduler.tick(t as f64, &mut stage);
        }
        assert_eq!(stage.steps, 2);
        let phases: Vec<f32> = stage.renders.iter().map(|f| f.phase).collect();
        assert_eq!(phases, vec![0.25, 0.5, 0.75, 0.0, 0.25, 0.5, 0.75, 0.0]);
    }

    #[test]
    fn test_fullscreen_expands_then_goes_full() {
        let mut scheduler = Scheduler::new(FrameStrategy::VsyncLocked, 100.0);
        let mut stage = Recorder::default();
        scheduler.set_layout(100.0, 400.0);
        scheduler.set_fullscreen(true);
        assert_eq!(scheduler.fullscreen(), FullscreenPhase::Expanding);

        let mut t = 0.0;
        while scheduler.fullscreen() == FullscreenPhase::Expanding {
            scheduler.tick(t, &mut stage);
            t += 16.0;
            assert!(t < 10_000.0, "transition never completed");
        }
        assert_eq!(scheduler.fullscreen(), FullscreenPhase::Full);
        assert!(scheduler.mask_radius() > 800.0);
        // Rendered every transition timestep although paused
        assert_eq!(stage.renders.len() as u64, scheduler.frame());
        assert_eq!(scheduler.frame_params().mask, Mask::None);
        assert_eq!(stage.steps, 0);
    }

    #[test]
    fn test_fullscreen_expands_from_zero_radius() {
        let mut scheduler = Scheduler::new(FrameStrategy::VsyncLocked, 0.0);
        let mut stage = Recorder::default();
        scheduler.set_layout(0.0, 400.0);
        scheduler.start();
        scheduler.set_fullscreen(true);

        for i in 0..200 {
            if scheduler.fullscreen() == FullscreenPhase::Full {
                break;
            }
            scheduler.tick(i as f64 * 16.0, &mut stage);
        }
        assert_eq!(scheduler.fullscreen(), FullscreenPhase::Full);
    }

    #[test]
    fn test_leaving_fullscreen_is_instant() {
        let mut scheduler = Scheduler::new(FrameStrategy::VsyncLocked, 100.0);
        let mut stage = Recorder::default();
        scheduler.set_layout(100.0, 400.0);
        scheduler.set_fullscreen(true);
        scheduler.tick(0.0, &mut stage);
        scheduler.set_fullscreen(false);
        assert_eq!(scheduler.fullscreen(), FullscreenPhase::Windowed);
        assert_eq!(
            scheduler.frame_params().mask,
            Mask::Circle { radius: 100.0 }
        );
    }

    #[test]
    fn test_fps_estimate() {
        let mut scheduler = fixed_60();
        let mut stage = Recorder::default();
        for i in 0..50 {
            scheduler.tick(i as f64 * 20.0, &mut stage);
        }
        assert!((scheduler.fps() - 50.0).abs() < 1e-6);
    }
}
