//! Typed uniform setters.
//!
//! Each uniform discovered at link time gets a [`UniformKind`] and an
//! [`Arity`]; [`UniformSlot::new`] picks the matching setter once, and every
//! later `set_uniform` call goes straight through that function pointer into
//! the CPU shadow of the uniform block.

use crate::compute::AffineMatrix;

const WORD: usize = 4;

/// Closed set of uniform types a program may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    FloatMat2,
    FloatMat3,
    FloatMat4,
}

impl UniformKind {
    /// Number of scalars in one element.
    pub fn components(self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 1,
            UniformKind::IntVec2 | UniformKind::FloatVec2 => 2,
            UniformKind::IntVec3 | UniformKind::FloatVec3 => 3,
            UniformKind::IntVec4 | UniformKind::FloatVec4 | UniformKind::FloatMat2 => 4,
            UniformKind::FloatMat3 => 9,
            UniformKind::FloatMat4 => 16,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            UniformKind::Int | UniformKind::IntVec2 | UniformKind::IntVec3 | UniformKind::IntVec4
        )
    }

    /// Square matrix dimension, for matrix kinds.
    pub fn matrix_dim(self) -> Option<usize> {
        match self {
            UniformKind::FloatMat2 => Some(2),
            UniformKind::FloatMat3 => Some(3),
            UniformKind::FloatMat4 => Some(4),
            _ => None,
        }
    }

    /// Kind for a vector of `size` components (1 = scalar).
    pub fn vector(int: bool, size: usize) -> Option<Self> {
        Some(match (int, size) {
            (true, 1) => UniformKind::Int,
            (true, 2) => UniformKind::IntVec2,
            (true, 3) => UniformKind::IntVec3,
            (true, 4) => UniformKind::IntVec4,
            (false, 1) => UniformKind::Float,
            (false, 2) => UniformKind::FloatVec2,
            (false, 3) => UniformKind::FloatVec3,
            (false, 4) => UniformKind::FloatVec4,
            _ => return None,
        })
    }

    /// Kind for a square float matrix.
    pub fn matrix(dim: usize) -> Option<Self> {
        match dim {
            2 => Some(UniformKind::FloatMat2),
            3 => Some(UniformKind::FloatMat3),
            4 => Some(UniformKind::FloatMat4),
            _ => None,
        }
    }
}

/// Scalar uniform or fixed-length array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Scalar,
    Array(u32),
}

impl Arity {
    pub fn len(self) -> usize {
        match self {
            Arity::Scalar => 1,
            Arity::Array(n) => n as usize,
        }
    }
}

/// A value handed to `set_uniform`, flattened to scalars.
///
/// Matrices are column-major; a row-major [`AffineMatrix`] converts
/// unchanged because the shaders multiply `matrix * vec3(p, 1.0)`.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
}

impl UniformValue {
    pub fn len(&self) -> usize {
        match self {
            UniformValue::Ints(v) => v.len(),
            UniformValue::Floats(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Ints(vec![v])
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Ints(vec![v as i32])
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Floats(vec![v])
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(v: [f32; N]) -> Self {
        UniformValue::Floats(v.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for UniformValue {
    fn from(v: [i32; N]) -> Self {
        UniformValue::Ints(v.to_vec())
    }
}

impl From<(f32, f32)> for UniformValue {
    fn from((x, y): (f32, f32)) -> Self {
        UniformValue::Floats(vec![x, y])
    }
}

impl From<&[f32]> for UniformValue {
    fn from(v: &[f32]) -> Self {
        UniformValue::Floats(v.to_vec())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        UniformValue::Floats(v)
    }
}

impl From<&AffineMatrix> for UniformValue {
    fn from(m: &AffineMatrix) -> Self {
        UniformValue::Floats(m.values().to_vec())
    }
}

impl From<AffineMatrix> for UniformValue {
    fn from(m: AffineMatrix) -> Self {
        UniformValue::from(&m)
    }
}

/// Hint for how often an attribute buffer is respecified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsageHint {
    /// Uploaded once.
    #[default]
    Static,
    /// Respecified occasionally.
    Dynamic,
    /// Respecified every draw.
    Stream,
}

/// Byte layout of one uniform inside its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLayout {
    pub kind: UniformKind,
    pub arity: Arity,
    /// Byte offset from the start of the block.
    pub offset: usize,
    /// Byte distance between array elements.
    pub stride: usize,
}

impl UniformLayout {
    /// Bytes from the first to one past the last written byte.
    pub fn extent(&self) -> usize {
        let element = match self.kind.matrix_dim() {
            Some(dim) => (dim - 1) * column_stride(dim) + dim * WORD,
            None => self.kind.components() * WORD,
        };
        (self.arity.len() - 1) * self.stride + element
    }
}

/// Writes a value into a block's shadow bytes; `false` when the value is rejected.
type Setter = fn(&UniformLayout, &UniformValue, &mut [u8]) -> bool;

/// One entry of a program's uniform dispatch table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniformSlot {
    /// Index of the owning uniform block.
    pub block: usize,
    pub layout: UniformLayout,
    setter: Setter,
}

impl UniformSlot {
    pub fn new(block: usize, layout: UniformLayout) -> Self {
        let setter: Setter = match (layout.kind, layout.arity) {
            (k, Arity::Scalar) if k.is_int() => set_int,
            (k, Arity::Array(_)) if k.is_int() => set_int_array,
            (
                UniformKind::FloatMat2 | UniformKind::FloatMat3 | UniformKind::FloatMat4,
                Arity::Scalar,
            ) => set_matrix,
            (
                UniformKind::FloatMat2 | UniformKind::FloatMat3 | UniformKind::FloatMat4,
                Arity::Array(_),
            ) => set_matrix_array,
            (_, Arity::Scalar) => set_float,
            (_, Arity::Array(_)) => set_float_array,
        };
        Self {
            block,
            layout,
            setter,
        }
    }

    /// Write `value` into `shadow`; `false` when its type or length does not fit.
    pub fn apply(&self, value: &UniformValue, shadow: &mut [u8]) -> bool {
        if shadow.len() < self.layout.offset + self.layout.extent() {
            return false;
        }
        (self.setter)(&self.layout, value, shadow)
    }
}

#[inline]
fn column_stride(rows: usize) -> usize {
    if rows == 2 { 2 * WORD } else { 4 * WORD }
}

fn put(shadow: &mut [u8], at: usize, word: [u8; 4]) {
    shadow[at..at + WORD].copy_from_slice(&word);
}

fn set_int(layout: &UniformLayout, value: &UniformValue, shadow: &mut [u8]) -> bool {
    match value {
        UniformValue::Ints(v) if v.len() == layout.kind.components() => {
            for (i, x) in v.iter().enumerate() {
                put(shadow, layout.offset + i * WORD, x.to_ne_bytes());
            }
            true
        }
        _ => false,
    }
}

fn set_float(layout: &UniformLayout, value: &UniformValue, shadow: &mut [u8]) -> bool {
    match value {
        UniformValue::Floats(v) if v.len() == layout.kind.components() => {
            for (i, x) in v.iter().enumerate() {
                put(shadow, layout.offset + i * WORD, x.to_ne_bytes());
            }
            true
        }
        _ => false,
    }
}

/// Number of whole elements in `len` scalars, if it fits the array.
fn array_elements(layout: &UniformLayout, len: usize) -> Option<usize> {
    let comps = layout.kind.components();
    let n = len / comps;
    (len % comps == 0 && n >= 1 && n <= layout.arity.len()).then_some(n)
}

fn set_int_array(layout: &UniformLayout, value: &UniformValue, shadow: &mut [u8]) -> bool {
    let UniformValue::Ints(v) = value else {
        return false;
    };
    let Some(n) = array_elements(layout, v.len()) else {
        return false;
    };
    let comps = layout.kind.components();
    for e in 0..n {
        for c in 0..comps {
            let at = layout.offset + e * layout.stride + c * WORD;
            put(shadow, at, v[e * comps + c].to_ne_bytes());
        }
    }
    true
}

fn set_float_array(layout: &UniformLayout, value: &UniformValue, shadow: &mut [u8]) -> bool {
    let UniformValue::Floats(v) = value else {
        return false;
    };
    let Some(n) = array_elements(layout, v.len()) else {
        return false;
    };
    let comps = layout.kind.components();
    for e in 0..n {
        for c in 0..comps {
            let at = layout.offset + e * layout.stride + c * WORD;
            put(shadow, at, v[e * comps + c].to_ne_bytes());
        }
    }
    true
}

fn write_matrix(shadow: &mut [u8], base: usize, dim: usize, values: &[f32]) {
    let stride = column_stride(dim);
    for col in 0..dim {
        for row in 0..dim {
            put(
                shadow,
                base + col * stride + row * WORD,
                values[col * dim + row].to_ne_bytes(),
            );
        }
    }
}

fn set_matrix(layout: &UniformLayout, value: &UniformValue, shadow: &mut [u8]) -> bool {
    let (UniformValue::Floats(v), Some(dim)) = (value, layout.kind.matrix_dim()) else {
        return false;
    };
    if v.len() != dim * dim {
        return false;
    }
    write_matrix(shadow, layout.offset, dim, v);
    true
}

fn set_matrix_array(layout: &UniformLayout, value: &UniformValue, shadow: &mut [u8]) -> bool {
    let (UniformValue::Floats(v), Some(dim)) = (value, layout.kind.matrix_dim()) else {
        return false;
    };
    let Some(n) = array_elements(layout, v.len()) else {
        return false;
    };
    for (e, chunk) in v.chunks_exact(dim * dim).take(n).enumerate() {
        write_matrix(shadow, layout.offset + e * layout.stride, dim, chunk);
    }
    true
}
