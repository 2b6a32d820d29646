use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TesseraError, TesseraResult};
use crate::time::Rational;

/// Which render device a worker creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// CPU rasterization, always available.
    #[default]
    Software,
    /// Headless wgpu device (Metal, Vulkan, DX12, GL).
    Wgpu,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Software => write!(f, "software"),
            BackendKind::Wgpu => write!(f, "wgpu"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "software" => Ok(BackendKind::Software),
            "wgpu" => Ok(BackendKind::Wgpu),
            other => Err(TesseraError::InvalidArgument(format!(
                "unknown backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub backend: BackendKind,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            backend: BackendKind::Software,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub frame_rate: Rational,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: Rational::from_integer(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TesseraConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TesseraConfig {
    pub fn from_toml_str(contents: &str) -> TesseraResult<Self> {
        let config: TesseraConfig =
            toml::from_str(contents).map_err(|e| TesseraError::config(e.to_string(), "<inline>"))?;
        config.validate("<inline>")?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> TesseraResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TesseraConfig =
            toml::from_str(&contents).map_err(|e| TesseraError::config(e.to_string(), path))?;
        config.validate(path)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> TesseraResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| TesseraError::config(e.to_string(), path))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self, origin: impl AsRef<Path>) -> TesseraResult<()> {
        if self.render.width == 0 || self.render.height == 0 {
            return Err(TesseraError::config(
                format!(
                    "render size {}x{} must be non-zero",
                    self.render.width, self.render.height
                ),
                origin.as_ref(),
            ));
        }
        if self.timeline.frame_rate <= Rational::ZERO {
            return Err(TesseraError::config(
                format!("frame rate {} must be positive", self.timeline.frame_rate),
                origin.as_ref(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = TesseraConfig::from_toml_str("").unwrap();
        assert_eq!(config.render.width, 1920);
        assert_eq!(config.render.backend, BackendKind::Software);
        assert_eq!(config.timeline.frame_rate, Rational::from_integer(30));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_parse_full() {
        let config = TesseraConfig::from_toml_str(
            r#"
            [render]
            width = 640
            height = 360
            backend = "wgpu"

            [timeline]
            frame_rate = "30000/1001"

            [logging]
            filter = "tessera_node=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.render.width, 640);
        assert_eq!(config.render.backend, BackendKind::Wgpu);
        assert_eq!(
            config.timeline.frame_rate,
            Rational::new(30000, 1001).unwrap()
        );
        assert_eq!(config.logging.filter, "tessera_node=debug");
    }

    #[test]
    fn test_rejects_zero_size() {
        let err = TesseraConfig::from_toml_str("[render]\nwidth = 0\n").unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(TesseraConfig::from_toml_str("[render]\nbackend = \"vulkan\"\n").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("tessera-config-{}.toml", std::process::id()));
        let mut config = TesseraConfig::default();
        config.render.width = 320;
        config.save_to_file(&path).unwrap();
        let loaded = TesseraConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.render.width, 320);
    }
}
