use crate::connectivity::GraphMethod;
use crate::detection::{BlobMethod, DEFAULT_NUM_SIGMA};
use crate::logging::LoggingConfig;
use crate::pipeline::{CalibrationSource, PipelineOptions, ProfileChoice};
use crate::profiles::{DetectionProfile, ProfileRegistry, DEFAULT_PROFILE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
    /// Registered on top of the built-in profiles; a name clash replaces the
    /// built-in.
    pub custom_profiles: Vec<DetectionProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub profile: String,
    pub blob_method: BlobMethod,
    pub neighbor_graph: GraphMethod,
    pub num_sigma: usize,
    pub calibration: CalibrationConfig,
}

/// Scale bar, magnification, or neither (estimate at 700x).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub scale_bar_um: Option<f64>,
    pub scale_bar_px: Option<f64>,
    pub magnification: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            blob_method: BlobMethod::default(),
            neighbor_graph: GraphMethod::default(),
            num_sigma: DEFAULT_NUM_SIGMA,
            calibration: CalibrationConfig::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn source(&self) -> CalibrationSource {
        match (self.scale_bar_um, self.scale_bar_px, self.magnification) {
            (Some(scale_bar_um), Some(scale_bar_px), _) => CalibrationSource::Manual {
                scale_bar_um,
                scale_bar_px,
            },
            (_, _, Some(m)) => CalibrationSource::Magnification(m),
            _ => CalibrationSource::Estimated,
        }
    }

    fn validate(&self, errors: &mut Vec<String>) {
        match (self.scale_bar_um, self.scale_bar_px) {
            (Some(_), None) | (None, Some(_)) => errors
                .push("calibration needs both scale_bar_um and scale_bar_px".to_string()),
            _ => {}
        }
        for (name, value) in [
            ("scale_bar_um", self.scale_bar_um),
            ("scale_bar_px", self.scale_bar_px),
            ("magnification", self.magnification),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    errors.push(format!("calibration {} must be positive, got {}", name, v));
                }
            }
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if self.pipeline.num_sigma == 0 {
            errors.push("pipeline num_sigma must be positive".to_string());
        }

        self.pipeline.calibration.validate(&mut errors);

        for profile in &self.custom_profiles {
            if let Err(e) = profile.validate() {
                errors.push(e.to_string());
            }
        }

        match self.registry() {
            Ok(registry) => {
                if let Err(e) = registry.get(&self.pipeline.profile) {
                    errors.push(e.to_string());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Built-in profiles plus the custom ones.
    pub fn registry(&self) -> Result<ProfileRegistry> {
        let mut registry = ProfileRegistry::builtin();
        for profile in &self.custom_profiles {
            registry.register(profile.clone())?;
        }
        Ok(registry)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            profile: ProfileChoice::Named(self.pipeline.profile.clone()),
            calibration: self.pipeline.calibration.source(),
            blob_method: self.pipeline.blob_method,
            neighbor_graph: self.pipeline.neighbor_graph,
            num_sigma: self.pipeline.num_sigma,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ConfigFormat {
    Json,
    Toml,
}

/// Load and validate `config_path`; all problems are reported in one error.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let config = Config::load_from_file(config_path)?;
    config.validate().map_err(|errors| {
        Error::InvalidConfiguration(format!(
            "{}: {}",
            config_path.display(),
            errors.join("; ")
        ))
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn json_and_toml_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.pipeline.profile = "lepisosteus".to_string();
        config.pipeline.neighbor_graph = GraphMethod::Rng;
        config.pipeline.calibration.magnification = Some(500.0);

        for (name, format) in [("c.json", ConfigFormat::Json), ("c.toml", ConfigFormat::Toml)] {
            let path = dir.path().join(name);
            config.save_to_file(&path, format).unwrap();
            assert_eq!(Config::load_from_file(&path).unwrap(), config);
        }
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            profile = "scanned"
            blob_method = "dog"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.blob_method, BlobMethod::Dog);
        assert_eq!(config.pipeline.num_sigma, DEFAULT_NUM_SIGMA);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn unknown_profile_fails_validation() {
        let mut config = Config::default();
        config.pipeline.profile = "mystery".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("mystery")));
    }

    #[test]
    fn half_specified_scale_bar_fails_validation() {
        let mut config = Config::default();
        config.pipeline.calibration.scale_bar_um = Some(10.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn custom_profiles_are_selectable() {
        let mut config = Config::default();
        config.custom_profiles.push(DetectionProfile {
            name: "my-scope".to_string(),
            threshold: 0.08,
            ..DetectionProfile::default()
        });
        config.pipeline.profile = "my-scope".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.registry().unwrap().get("my-scope").unwrap().threshold, 0.08);
    }

    #[test]
    fn calibration_source_prefers_scale_bar() {
        let calibration = CalibrationConfig {
            scale_bar_um: Some(10.0),
            scale_bar_px: Some(40.0),
            magnification: Some(700.0),
        };
        assert!(matches!(calibration.source(), CalibrationSource::Manual { .. }));
        assert_eq!(CalibrationConfig::default().source(), CalibrationSource::Estimated);
    }

    #[test]
    fn invalid_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"pipeline": {"num_sigma": 0}}"#).unwrap();
        assert!(matches!(load_config(&path), Err(Error::InvalidConfiguration(_))));
    }
}
