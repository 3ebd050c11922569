//! The Life step rule with decaying death.
//!
//! The GPU step shader is generated from the constants below; [`next_intensity`]
//! is the scalar form of the same rule, used to check GPU output.

/// Intensity of a fully alive cell.
pub const ALIVE_INTENSITY: f32 = 1.0;

/// Factor applied to a cell's intensity each step it does not end up alive.
pub const DECAY_FACTOR: f32 = 0.5;

/// Live-neighbor count that brings any cell to life.
pub const BIRTH_COUNT: i32 = 3;

/// Live-neighbor count that keeps an alive cell alive.
pub const SURVIVE_COUNT: i32 = 2;

/// Contribution of one neighbor to the live-neighbor count.
///
/// Intensities are truncated, so only fully alive neighbors count; decaying
/// neighbors contribute nothing.
#[inline]
pub fn neighbor_weight(intensity: f32) -> i32 {
    intensity as i32
}

/// Next intensity of a cell with intensity `c` and `live_neighbors` live neighbors.
#[inline]
pub fn next_intensity(c: f32, live_neighbors: i32) -> f32 {
    let alive = c >= ALIVE_INTENSITY;
    if live_neighbors == BIRTH_COUNT || (live_neighbors == SURVIVE_COUNT && alive) {
        ALIVE_INTENSITY
    } else {
        c * DECAY_FACTOR
    }
}

/// Apply the rule to the center of a 3x3 neighborhood (row-major, center at index 4).
pub fn step_neighborhood(cells: &[f32; 9]) -> f32 {
    let live: i32 = cells
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != 4)
        .map(|(_, &c)| neighbor_weight(c))
        .sum();
    next_intensity(cells[4], live)
}

/// Apply the rule to a whole toroidal grid of intensities (row-major).
pub fn step_grid(cells: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut next = vec![0.0f32; cells.len()];
    for y in 0..height {
        for x in 0..width {
            let mut live = 0;
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = (x as isize + dx).rem_euclid(width as isize) as usize;
                    let ny = (y as isize + dy).rem_euclid(height as isize) as usize;
                    live += neighbor_weight(cells[ny * width + nx]);
                }
            }
            next[y * width + x] = next_intensity(cells[y * width + x], live);
        }
    }
    next
}

/// WGSL constant declarations mirroring this module, prepended to the step shader.
pub fn wgsl_constants() -> String {
    format!(
        "const ALIVE: f32 = {ALIVE_INTENSITY:?};\n\
         const DECAY: f32 = {DECAY_FACTOR:?};\n\
         const BIRTH: i32 = {BIRTH_COUNT};\n\
         const SURVIVE: i32 = {SURVIVE_COUNT};\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Neighborhood with `live` fully alive neighbors around `center`.
    fn neighborhood(center: f32, live: usize) -> [f32; 9] {
        let mut cells = [0.0f32; 9];
        cells[4] = center;
        for i in [0, 1, 2, 3, 5, 6, 7, 8].into_iter().take(live) {
            cells[i] = 1.0;
        }
        cells
    }

    #[test]
    fn test_three_neighbors_births_regardless_of_state() {
        for center in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(step_neighborhood(&neighborhood(center, 3)), 1.0);
        }
    }

    #[test]
    fn test_two_neighbors_keeps_alive() {
        assert_eq!(step_neighborhood(&neighborhood(1.0, 2)), 1.0);
    }

    #[test]
    fn test_two_neighbors_keeps_dead() {
        assert_eq!(step_neighborhood(&neighborhood(0.0, 2)), 0.0);
    }

    #[test]
    fn test_other_counts_decay_alive_cells() {
        for live in [0, 1, 4, 5, 8] {
            assert_eq!(step_neighborhood(&neighborhood(1.0, live)), 0.5);
        }
    }

    #[test]
    fn test_other_counts_keep_dead_cells_dead() {
        for live in [0, 1, 4, 8] {
            assert_eq!(step_neighborhood(&neighborhood(0.0, live)), 0.0);
        }
    }

    #[test]
    fn test_decaying_neighbors_do_not_count() {
        let mut cells = neighborhood(0.0, 2);
        cells[8] = 0.5;
        assert_eq!(step_neighborhood(&cells), 0.0);
    }

    #[test]
    fn test_decay_trail_halves() {
        assert_eq!(next_intensity(0.5, 0), 0.25);
    }

    #[test]
    fn test_blinker_rotates() {
        // Horizontal blinker on a 5x5 torus becomes vertical
        let (w, h) = (5, 5);
        let mut grid = vec![0.0f32; w * h];
        for x in 1..4 {
            grid[2 * w + x] = 1.0;
        }
        let next = step_grid(&grid, w, h);
        let alive: Vec<(usize, usize)> = (0..w * h)
            .filter(|&i| next[i] == 1.0)
            .map(|i| (i % w, i / w))
            .collect();
        assert_eq!(alive, vec![(2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn test_wgsl_constants_are_float_literals() {
        let src = wgsl_constants();
        assert!(src.contains("const ALIVE: f32 = 1.0;"));
        assert!(src.contains("const DECAY: f32 = 0.5;"));
        assert!(src.contains("const BIRTH: i32 = 3;"));
    }
}
