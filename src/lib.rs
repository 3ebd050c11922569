//! GPU Life - Conway's Game of Life as a decorative page widget.
//!
//! The simulation runs entirely on the GPU: two ping-ponged RGBA8 state
//! textures hold cell intensities, a fragment pass advances one generation
//! per timestep (dead cells fade rather than vanish), and a two-pass renderer
//! styles the state and presents it rotated 45° under a circular mask
//! centered on a page element.
//!
//! # Architecture
//!
//! - `schema`: Configuration and seeding types
//! - `compute`: Affine transforms, the step rule, frame scheduling, and the
//!   GPU program/texture/engine/renderer stack under `compute::gpu`
//! - `life`: The [`Life`] widget tying it all together behind one command surface
//!
//! # Example
//!
//! ```rust,no_run
//! use gpu_life::compute::gpu::{GpuContext, Screen};
//! use gpu_life::compute::{TargetRect, Viewport};
//! use gpu_life::{Life, LifeConfig, Seed};
//!
//! let ctx = pollster::block_on(GpuContext::headless()).unwrap();
//! let viewport = Viewport::new(512, 512);
//! let target = TargetRect::centered(viewport, 0.25);
//! let screen = Screen::offscreen(&ctx, viewport).unwrap();
//!
//! let mut life = Life::new(
//!     &ctx,
//!     screen,
//!     LifeConfig::default(),
//!     &Seed::random(Some(42)),
//!     viewport,
//!     target,
//! )
//! .unwrap();
//!
//! for _ in 0..100 {
//!     life.step();
//! }
//! println!("{}", life.engine().stats().unwrap());
//! ```

pub mod compute;
pub mod life;
pub mod schema;

// WebAssembly bindings (only for wasm32 target)
#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Re-export commonly used types
pub use compute::{AffineMatrix, SimulationStats};
pub use life::{Life, LifeError, PointerPress};
pub use schema::{LifeConfig, Pattern, Seed};
