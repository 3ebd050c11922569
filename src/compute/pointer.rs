//! Placement of the simulation on screen and the inverse pointer mapping.
//!
//! The display texture is presented rotated by 45° around the center of a
//! target region. A display-space offset `pos` (pixels from the display
//! center) lands on the client pixel `rotate(π/4) → translate(center)`, and a
//! display offset belongs to grid cell `floor(pos / cellsize + 0.5)`.
//! [`pointer_transform`] is the exact inverse of that chain (cell-size scale
//! aside); the two must be edited together.

use std::f32::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};

use super::AffineMatrix;

/// Rotation applied to the grid when it is presented.
pub const PRESENT_ANGLE: f32 = FRAC_PI_4;

/// Page region the simulation is centered on, in client pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl TargetRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Region centered in a viewport, with sides `fraction` of the viewport's.
    pub fn centered(viewport: Viewport, fraction: f32) -> Self {
        let width = viewport.width as f32 * fraction;
        let height = viewport.height as f32 * fraction;
        Self::new(
            (viewport.width as f32 - width) / 2.0,
            (viewport.height as f32 - height) / 2.0,
            width,
            height,
        )
    }

    /// Center in client pixels.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (
            self.left + self.width / 2.0,
            self.top + self.height / 2.0,
        )
    }

    /// Larger of width and height.
    #[inline]
    pub fn max_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

/// Size of the visible drawing surface in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Larger of width and height.
    #[inline]
    pub fn max_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Rotate+translate part of the presentation: display offset to client pixel.
pub fn placement_transform(target: &TargetRect) -> AffineMatrix {
    let (cx, cy) = target.center();
    let mut m = AffineMatrix::identity();
    m.rotate(PRESENT_ANGLE).translate(cx, cy);
    m
}

/// Full presentation transform: display offset to clip space.
pub fn presentation_transform(target: &TargetRect, viewport: Viewport) -> AffineMatrix {
    let mut m = placement_transform(target);
    m.normalize(viewport.width as f32, viewport.height as f32, true);
    m
}

/// Target-relative pixel to fractional grid coordinate.
pub fn pointer_transform(target: &TargetRect, cellsize: f32) -> AffineMatrix {
    let mut m = AffineMatrix::identity();
    m.translate(-target.width / 2.0, -target.height / 2.0)
        .scale(1.0 / cellsize, 1.0 / cellsize)
        .rotate(-PRESENT_ANGLE)
        .translate(0.5, 0.5);
    m
}

/// Map a client pixel coordinate to a fractional grid coordinate.
///
/// The integer part (wrapped, see [`wrap_cell`]) is the cell under the pointer.
pub fn client_to_grid(target: &TargetRect, cellsize: f32, x: f32, y: f32) -> (f32, f32) {
    pointer_transform(target, cellsize).project(x - target.left, y - target.top)
}

/// Cell containing a fractional grid coordinate, wrapped onto a `width` x `height` torus.
pub fn wrap_cell(grid: (f32, f32), width: u32, height: u32) -> (u32, u32) {
    let x = (grid.0.floor() as i64).rem_euclid(width as i64);
    let y = (grid.1.floor() as i64).rem_euclid(height as i64);
    (x as u32, y as u32)
}
