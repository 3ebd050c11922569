//! Summary statistics over a simulation state snapshot.

use serde::Serialize;

use super::rule::ALIVE_INTENSITY;

/// Aggregate view of one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    pub generation: u64,
    /// Cells at full intensity.
    pub live_cells: usize,
    /// Cells with an intensity strictly between dead and alive.
    pub decaying_cells: usize,
    pub mean_intensity: f32,
}

impl SimulationStats {
    /// Compute statistics from per-cell intensities in `[0, 1]`.
    pub fn from_intensities(generation: u64, intensities: &[f32]) -> Self {
        let mut live_cells = 0;
        let mut decaying_cells = 0;
        let mut total = 0.0f64;
        for &c in intensities {
            if c >= ALIVE_INTENSITY {
                live_cells += 1;
            } else if c > 0.0 {
                decaying_cells += 1;
            }
            total += c as f64;
        }
        let mean_intensity = if intensities.is_empty() {
            0.0
        } else {
            (total / intensities.len() as f64) as f32
        };
        Self {
            generation,
            live_cells,
            decaying_cells,
            mean_intensity,
        }
    }

    /// Fraction of cells that are fully alive.
    pub fn live_fraction(&self, total_cells: usize) -> f32 {
        if total_cells == 0 {
            0.0
        } else {
            self.live_cells as f32 / total_cells as f32
        }
    }
}

impl std::fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gen {:>6}  live {:>7}  decaying {:>7}  mean {:.4}",
            self.generation, self.live_cells, self.decaying_cells, self.mean_intensity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_class() {
        let stats = SimulationStats::from_intensities(7, &[1.0, 1.0, 0.5, 0.25, 0.0, 0.0]);
        assert_eq!(stats.generation, 7);
        assert_eq!(stats.live_cells, 2);
        assert_eq!(stats.decaying_cells, 2);
        assert!((stats.mean_intensity - 0.458_333).abs() < 1e-5);
    }

    #[test]
    fn test_empty_state() {
        let stats = SimulationStats::from_intensities(0, &[]);
        assert_eq!(stats.mean_intensity, 0.0);
        assert_eq!(stats.live_fraction(0), 0.0);
    }

    #[test]
    fn test_serializes_to_json() {
        let stats = SimulationStats::from_intensities(1, &[1.0]);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"live_cells\":1"));
    }
}
