//! 2D affine transforms as 3x3 homogeneous matrices.
//!
//! Matrices are stored row-major and act on row-vector points `(x, y, 1)`,
//! so a point is transformed as `p' = p × M`. Builder methods right-multiply
//! (`self := self × primitive`), which means the first builder call issued is
//! the first transform applied to a point:
//!
//! ```
//! use gpu_life::compute::AffineMatrix;
//!
//! let mut m = AffineMatrix::identity();
//! m.scale(2.0, 2.0).translate(1.0, 0.0);
//! assert_eq!(m.project(1.0, 1.0), (3.0, 2.0));
//! ```

use std::ops::Mul;

/// Composable 3x3 homogeneous 2D transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    data: [f32; 9],
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix {
        data: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Wrap 9 row-major values.
    #[inline]
    pub fn from_values(data: [f32; 9]) -> Self {
        Self { data }
    }

    /// Row-major values, laid out the way the shaders consume them.
    #[inline]
    pub fn values(&self) -> &[f32; 9] {
        &self.data
    }

    /// Non-uniform scale about the origin.
    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self::from_values([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    /// Rotation by `rad` radians.
    ///
    /// Under the row-vector convention `rotation(θ).project(1, 0)` yields
    /// `(cos θ, -sin θ)`.
    pub fn rotation(rad: f32) -> Self {
        let (s, c) = rad.sin_cos();
        Self::from_values([c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0])
    }

    /// Translation by `(tx, ty)`.
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::from_values([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, tx, ty, 1.0])
    }

    /// Map pixel space `[0, width] x [0, height]` onto clip space `[-1, 1]²`.
    ///
    /// With `flip_y` the Y axis is inverted (screen Y-down to clip Y-up).
    /// A degenerate size falls back to the identity transform.
    pub fn normalizing(width: f32, height: f32, flip_y: bool) -> Self {
        if !(width > 0.0 && height > 0.0) {
            log::warn!("normalizing a degenerate {width}x{height} region; using identity");
            return Self::IDENTITY;
        }
        let flip = if flip_y { -1.0 } else { 1.0 };
        Self::from_values([
            2.0 / width,
            0.0,
            0.0,
            0.0,
            2.0 / height * flip,
            0.0,
            -1.0,
            -flip,
            1.0,
        ])
    }

    /// Matrix product `self × other`.
    pub fn times(&self, other: &AffineMatrix) -> Self {
        let a = &self.data;
        let b = &other.data;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Self::from_values(out)
    }

    /// Append a scale.
    pub fn scale(&mut self, sx: f32, sy: f32) -> &mut Self {
        *self = self.times(&Self::scaling(sx, sy));
        self
    }

    /// Append a rotation.
    pub fn rotate(&mut self, rad: f32) -> &mut Self {
        *self = self.times(&Self::rotation(rad));
        self
    }

    /// Append a translation.
    pub fn translate(&mut self, tx: f32, ty: f32) -> &mut Self {
        *self = self.times(&Self::translation(tx, ty));
        self
    }

    /// Append a pixel-to-clip normalization.
    pub fn normalize(&mut self, width: f32, height: f32, flip_y: bool) -> &mut Self {
        *self = self.times(&Self::normalizing(width, height, flip_y));
        self
    }

    /// Apply the transform to the point `(x, y, 1)`.
    #[inline]
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.data;
        (
            m[0] * x + m[3] * y + m[6],
            m[1] * x + m[4] * y + m[7],
        )
    }

    /// Algebraic inverse, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.data;
        let det = m[0] * m[4] - m[1] * m[3];
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = m[4] * inv_det;
        let b = -m[1] * inv_det;
        let c = -m[3] * inv_det;
        let d = m[0] * inv_det;
        // Translation row: -t × L⁻¹
        let tx = -(m[6] * a + m[7] * c);
        let ty = -(m[6] * b + m[7] * d);
        Some(Self::from_values([a, b, 0.0, c, d, 0.0, tx, ty, 1.0]))
    }
}

impl Mul for AffineMatrix {
    type Output = AffineMatrix;

    fn mul(self, rhs: AffineMatrix) -> AffineMatrix {
        self.times(&rhs)
    }
}
