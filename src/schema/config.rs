//! Configuration types for the Life widget.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level widget configuration.
///
/// Every field has a default, so a partial JSON document is merged over
/// [`LifeConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    /// Grid width in cells. Fixed for the lifetime of the engine.
    pub width: u32,
    /// Grid height in cells. Fixed for the lifetime of the engine.
    pub height: u32,
    /// Size of one cell in device pixels.
    pub cellsize: f32,
    /// Target frame rate in frames per second. `0` means vsync-locked:
    /// every host frame callback consumes exactly one timestep.
    pub framerate: u32,
    /// Number of warm-up steps run after seeding, before the first render.
    pub init_steps: u32,
    /// Initial radius (pixels) of the circular visibility mask.
    pub radius: f32,
    /// Identifier of the canvas element the widget draws into.
    pub canvas_element_id: String,
    /// Identifier of the page element the simulation is centered on.
    pub target_element_id: String,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            cellsize: 8.0,
            framerate: 60,
            init_steps: 5,
            radius: 80.0,
            canvas_element_id: "life".to_string(),
            target_element_id: "life-target".to_string(),
        }
    }
}

impl LifeConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: LifeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Total number of cells in the grid.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if !(self.cellsize.is_finite() && self.cellsize > 0.0) {
            return Err(ConfigError::InvalidCellsize(self.cellsize));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::InvalidRadius(self.radius));
        }
        Ok(())
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero")]
    InvalidDimensions,
    #[error("Cell size must be a positive number, got {0}")]
    InvalidCellsize(f32),
    #[error("Mask radius must be a positive number, got {0}")]
    InvalidRadius(f32),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LifeConfig::default();
        assert_eq!((config.width, config.height), (512, 512));
        assert_eq!(config.cellsize, 8.0);
        assert_eq!(config.framerate, 60);
        assert_eq!(config.init_steps, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_merges_defaults() {
        let config = LifeConfig::from_json(r#"{ "width": 64, "framerate": 0 }"#).unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 512);
        assert_eq!(config.framerate, 0);
        assert_eq!(config.target_element_id, "life-target");
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let err = LifeConfig::from_json(r#"{ "height": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDimensions));
    }

    #[test]
    fn test_rejects_bad_cellsize() {
        let config = LifeConfig {
            cellsize: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCellsize(_))
        ));
    }

    #[test]
    fn test_rejects_zero_radius() {
        let err = LifeConfig::from_json(r#"{ "radius": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRadius(r) if r == 0.0));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cellsize": 4.0, "init_steps": 2 }}"#).unwrap();

        let config = LifeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cellsize, 4.0);
        assert_eq!(config.init_steps, 2);
    }
}
