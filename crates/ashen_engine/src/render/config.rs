//! Renderer configuration
//!
//! Applications customize the renderer through [`RendererConfig`], either
//! programmatically with the builder methods or by loading a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration for the render context
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Maximum frames in flight (clamped to 1..=8)
    pub max_frames_in_flight: usize,
    /// Background clear color, RGBA in 0.0-1.0
    pub clear_color: [f32; 4],
    /// Whether to enable validation layers; `None` follows the build profile
    pub enable_validation: Option<bool>,
    /// Directory containing pre-compiled SPIR-V shaders
    pub shader_dir: PathBuf,
    /// Enable the per-object forward render system
    pub enable_forward_system: bool,
    /// Enable the GPU-instanced render system
    pub enable_instanced_system: bool,
    /// Capacity of the per-frame instance attribute buffers
    pub max_instances: usize,
}

impl RendererConfig {
    /// Configuration with defaults for the given application name
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        Ok(config.clamped())
    }

    /// Set the maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self.clamped()
    }

    /// Set the background clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable validation layers explicitly
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = Some(enable);
        self
    }

    /// Set the SPIR-V shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    /// Enable or disable the forward render system
    pub fn with_forward_system(mut self, enable: bool) -> Self {
        self.enable_forward_system = enable;
        self
    }

    /// Enable or disable the instanced render system
    pub fn with_instanced_system(mut self, enable: bool) -> Self {
        self.enable_instanced_system = enable;
        self
    }

    /// Set the instance buffer capacity
    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self.clamped()
    }

    /// Whether validation layers should be active for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    fn clamped(mut self) -> Self {
        self.max_frames_in_flight = self.max_frames_in_flight.clamp(1, 8);
        self.max_instances = self.max_instances.max(1);
        self
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Ashen Application".to_string(),
            max_frames_in_flight: 2,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            enable_validation: None,
            shader_dir: PathBuf::from("shaders"),
            enable_forward_system: true,
            enable_instanced_system: true,
            max_instances: 1024,
        }
    }
}

/// Errors produced while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("failed to read config {path:?}: {source}")]
    Io {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The file was not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.max_frames_in_flight, 2);
        assert!(config.enable_forward_system);
        assert!(config.enable_instanced_system);
        assert!(config.max_instances > 0);
    }

    #[test]
    fn test_frames_in_flight_clamped() {
        let config = RendererConfig::default().with_max_frames_in_flight(0);
        assert_eq!(config.max_frames_in_flight, 1);
        let config = RendererConfig::default().with_max_frames_in_flight(64);
        assert_eq!(config.max_frames_in_flight, 8);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: RendererConfig = toml::from_str(
            r#"
            application_name = "demo"
            max_frames_in_flight = 3
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.application_name, "demo");
        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.clear_color, [0.1, 0.2, 0.3, 1.0]);
        // Unspecified fields fall back to defaults
        assert!(config.enable_forward_system);
    }
}
