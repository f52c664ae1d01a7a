// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Scheduler and host-loop configuration, loadable from TOML.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```toml
//! default_owner_name = "default-context"
//! time_scale = 1.0
//! fixed_timestep = 0.02
//! max_fixed_steps_per_frame = 8
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_FIXED_TIMESTEP: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Name given to the lazily created default execution context.
    pub default_owner_name: String,
    /// Multiplier from real to game time. 0 pauses game time.
    pub time_scale: f64,
    /// Fixed-step length in seconds.
    pub fixed_timestep: f64,
    /// Upper bound on fixed steps run to catch up within one frame.
    pub max_fixed_steps_per_frame: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_owner_name: "default-context".to_string(),
            time_scale: 1.0,
            fixed_timestep: 0.02,
            max_fixed_steps_per_frame: 8,
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded scheduler config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_owner_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_owner_name",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(ConfigError::Invalid {
                field: "time_scale",
                reason: format!("expected a finite value >= 0, got {}", self.time_scale),
            });
        }
        if !self.fixed_timestep.is_finite() || self.fixed_timestep <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "fixed_timestep",
                reason: format!("expected a finite value > 0, got {}", self.fixed_timestep),
            });
        }
        if self.max_fixed_steps_per_frame == 0 {
            return Err(ConfigError::Invalid {
                field: "max_fixed_steps_per_frame",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// `fixed_timestep` as a duration. Values that do not give a positive
    /// duration (zero, negative, NaN, below a nanosecond) fall back to 20ms.
    pub fn fixed_timestep_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.fixed_timestep)
            .ok()
            .filter(|step| !step.is_zero())
            .unwrap_or(DEFAULT_FIXED_TIMESTEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.fixed_timestep_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_partial_override() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            time_scale = 0.5
            default_owner_name = "statics"
            "#,
        )
        .unwrap();
        assert_eq!(config.time_scale, 0.5);
        assert_eq!(config.default_owner_name, "statics");
        assert_eq!(config.max_fixed_steps_per_frame, 8);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SchedulerConfig::from_toml_str("time_scale = -1.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "time_scale",
                ..
            }
        ));

        let err = SchedulerConfig::from_toml_str("fixed_timestep = 0.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "fixed_timestep",
                ..
            }
        ));

        let err = SchedulerConfig::from_toml_str("max_fixed_steps_per_frame = 0").unwrap_err();
        assert!(err.to_string().contains("max_fixed_steps_per_frame"));
    }

    #[test]
    fn test_unusable_timestep_falls_back_to_default() {
        for fixed_timestep in [0.0, -0.5, f64::NAN, 1e-12] {
            let config = SchedulerConfig {
                fixed_timestep,
                ..Default::default()
            };
            assert_eq!(config.fixed_timestep_duration(), Duration::from_millis(20));
        }
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let err = SchedulerConfig::from_toml_str("tick_rate = 60").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fixed_timestep = 0.01").unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.fixed_timestep_duration(), Duration::from_millis(10));

        let missing = SchedulerConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
