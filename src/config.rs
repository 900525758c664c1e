use crate::error::{Result, SalesEngineError};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    #[schemars(
        description = "Attainment (percent of the active monthly goal) at which a goal-threshold notification is raised. Default 75."
    )]
    pub notification_trigger_percentage: f64,

    #[schemars(description = "Attainment counted as 'on target' in the overview KPIs. Default 100.")]
    pub on_target_percentage: f64,

    #[schemars(description = "Attainment below which a collaborator counts as lagging. Default 80.")]
    pub lagging_percentage: f64,

    #[schemars(description = "Whether recorded sales are evaluated for goal-threshold notifications.")]
    pub notifications_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notification_trigger_percentage: 75.0,
            on_target_percentage: 100.0,
            lagging_percentage: 80.0,
            notifications_enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            (
                "notification_trigger_percentage",
                self.notification_trigger_percentage,
            ),
            ("on_target_percentage", self.on_target_percentage),
            ("lagging_percentage", self.lagging_percentage),
        ] {
            if !(value > 0.0 && value <= 1000.0) {
                return Err(SalesEngineError::validation(
                    "EngineConfig",
                    format!("{} must be in (0, 1000], got {}", name, value),
                ));
            }
        }

        if self.lagging_percentage > self.on_target_percentage {
            return Err(SalesEngineError::validation(
                "EngineConfig",
                format!(
                    "lagging_percentage ({}) cannot exceed on_target_percentage ({})",
                    self.lagging_percentage, self.on_target_percentage
                ),
            ));
        }

        Ok(())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(EngineConfig);
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.notification_trigger_percentage, 75.0);
        assert_eq!(config.on_target_percentage, 100.0);
        assert_eq!(config.lagging_percentage, 80.0);
        assert!(config.notifications_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "notification_trigger_percentage": 90 }"#)
            .unwrap();
        assert_eq!(config.notification_trigger_percentage, 90.0);
        assert_eq!(config.lagging_percentage, 80.0);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let result = EngineConfig::from_json_str(
            r#"{ "on_target_percentage": 70, "lagging_percentage": 80 }"#,
        );
        assert!(matches!(
            result,
            Err(SalesEngineError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_trigger() {
        let config = EngineConfig {
            notification_trigger_percentage: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = EngineConfig::from_json_file("/definitely/not/here/engine.json");
        assert!(matches!(result, Err(SalesEngineError::IoError(_))));
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = EngineConfig::schema_as_json().unwrap();
        assert!(schema.contains("notification_trigger_percentage"));
    }
}
