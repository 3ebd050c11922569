//! Seed types for initializing the Life grid.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Bytes per texel of the state textures (RGBA8).
pub const BYTES_PER_TEXEL: usize = 4;

/// Stored value of a fully alive cell.
pub const ALIVE: u8 = 255;

/// Complete seed specification for grid initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    /// Pattern to use for seeding.
    pub pattern: Pattern,
}

/// Predefined patterns for initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// Every cell independently alive with probability 0.5.
    Random {
        /// Optional RNG seed for reproducible grids.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Explicit list of live cells as (x, y); everything else dead.
    /// Coordinates wrap around the grid.
    Cells { cells: Vec<(i64, i64)> },
    /// All cells dead.
    Empty,
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Random { seed: None }
    }
}

impl Seed {
    /// Random seed, optionally reproducible.
    pub fn random(seed: Option<u64>) -> Self {
        Self {
            pattern: Pattern::Random { seed },
        }
    }

    /// All cells dead.
    pub fn empty() -> Self {
        Self {
            pattern: Pattern::Empty,
        }
    }

    /// Seed from explicit live cells.
    pub fn cells(cells: impl IntoIterator<Item = (i64, i64)>) -> Self {
        Self {
            pattern: Pattern::Cells {
                cells: cells.into_iter().collect(),
            },
        }
    }

    /// Generate RGBA8 texel data for a `width` x `height` grid.
    ///
    /// All four channels of a texel carry the same value; only red is read
    /// by the shaders.
    pub fn generate(&self, width: u32, height: u32) -> Vec<u8> {
        let (w, h) = (width as usize, height as usize);
        let mut data = vec![0u8; w * h * BYTES_PER_TEXEL];

        match &self.pattern {
            Pattern::Random { seed } => {
                let mut rng = match seed {
                    Some(s) => StdRng::seed_from_u64(*s),
                    None => StdRng::from_entropy(),
                };
                for texel in data.chunks_exact_mut(BYTES_PER_TEXEL) {
                    let value = if rng.gen_bool(0.5) { ALIVE } else { 0 };
                    texel.fill(value);
                }
            }
            Pattern::Cells { cells } => {
                for &(x, y) in cells {
                    let x = x.rem_euclid(w as i64) as usize;
                    let y = y.rem_euclid(h as i64) as usize;
                    let i = (y * w + x) * BYTES_PER_TEXEL;
                    data[i..i + BYTES_PER_TEXEL].fill(ALIVE);
                }
            }
            Pattern::Empty => {}
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_is_binary_and_channel_uniform() {
        let data = Seed::random(Some(7)).generate(32, 32);
        assert_eq!(data.len(), 32 * 32 * 4);
        for texel in data.chunks_exact(4) {
            assert!(texel[0] == 0 || texel[0] == ALIVE);
            assert!(texel.iter().all(|&c| c == texel[0]));
        }
    }

    #[test]
    fn test_random_density_near_half() {
        let data = Seed::random(Some(42)).generate(128, 128);
        let alive = data.chunks_exact(4).filter(|t| t[0] == ALIVE).count();
        let fraction = alive as f32 / (128.0 * 128.0);
        assert!((fraction - 0.5).abs() < 0.03, "density {fraction}");
    }

    #[test]
    fn test_random_seed_is_reproducible() {
        assert_eq!(
            Seed::random(Some(3)).generate(16, 16),
            Seed::random(Some(3)).generate(16, 16)
        );
    }

    #[test]
    fn test_cells_wrap() {
        let data = Seed::cells([(-1, 0), (1, 5)]).generate(4, 4);
        let alive: Vec<usize> = data
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, t)| t[0] == ALIVE)
            .map(|(i, _)| i)
            .collect();
        // (-1, 0) -> (3, 0); (1, 5) -> (1, 1)
        assert_eq!(alive, vec![3, 5]);
    }

    #[test]
    fn test_pattern_json_tag() {
        let seed: Seed = serde_json::from_str(r#"{ "pattern": { "type": "Empty" } }"#).unwrap();
        assert!(seed.generate(2, 2).iter().all(|&b| b == 0));
    }
}
