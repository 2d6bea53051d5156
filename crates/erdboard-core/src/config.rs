//! Engine tuning knobs and the per-document project configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};
use crate::layer::RelationType;

/// Configuration for a [`CanvasEngine`](crate::canvas::CanvasEngine).
///
/// Hosts may load this from JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of entities created by the insert tool.
    pub default_entity_width: f64,
    /// Height of entities created by the insert tool.
    pub default_entity_height: f64,
    /// Manhattan distance a press must travel before it becomes a marquee.
    pub drag_threshold: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    /// Floor applied to width and height while resizing.
    pub min_layer_size: f64,
    /// Maximum number of undo steps kept by the store.
    pub max_undo_steps: usize,
    /// Relation type selected in the toolbar at startup.
    pub relation_type: RelationType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_entity_width: 240.0,
            default_entity_height: 140.0,
            drag_threshold: 5.0,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            zoom_step: ZOOM_STEP,
            min_layer_size: 1.0,
            max_undo_steps: 100,
            relation_type: RelationType::Association,
        }
    }
}

/// Rejected engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid zoom bounds: min {min} must be positive and not above max {max}")]
    ZoomBounds { min: f64, max: f64 },
    #[error("{field} must be a positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
}

impl EngineConfig {
    /// Parse and validate a config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_zoom, self.max_zoom);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::ZoomBounds { min, max });
        }
        let positive = [
            ("zoom_step", self.zoom_step),
            ("min_layer_size", self.min_layer_size),
            ("default_entity_width", self.default_entity_width),
            ("default_entity_height", self.default_entity_height),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if !(self.drag_threshold.is_finite() && self.drag_threshold >= 0.0) {
            return Err(ConfigError::NotPositive {
                field: "drag_threshold",
                value: self.drag_threshold,
            });
        }
        Ok(())
    }
}

/// Database engine targeted by the backend generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Mysql,
    #[default]
    Postgresql,
    Oracle,
}

/// Build artifact packaging for the backend generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    #[default]
    Jar,
    War,
}

/// Build parameters consumed by code generators. Stored once per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_name: String,
    pub description: String,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub java_version: String,
    pub spring_boot_version: String,
    pub packaging: Packaging,
    pub database: Database,
    pub database_name: String,
    pub database_host: String,
    pub database_port: u16,
    pub database_username: String,
    pub database_password: String,
    pub server_port: u16,
    pub context_path: String,
    pub flutter_enabled: bool,
    pub flutter_version: String,
    pub flutter_package_name: String,
    pub flutter_base_url: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: "mi-proyecto".to_string(),
            description: String::new(),
            group_id: "com.ejemplo.proyecto".to_string(),
            artifact_id: "mi-proyecto".to_string(),
            version: "1.0.0".to_string(),
            java_version: "17".to_string(),
            spring_boot_version: "3.2.0".to_string(),
            packaging: Packaging::Jar,
            database: Database::Postgresql,
            database_name: "mi_proyecto_db".to_string(),
            database_host: "localhost".to_string(),
            database_port: 5432,
            database_username: "postgres".to_string(),
            database_password: "password".to_string(),
            server_port: 8080,
            context_path: "/api".to_string(),
            flutter_enabled: false,
            flutter_version: "3.16.0".to_string(),
            flutter_package_name: "com.ejemplo.proyecto_app".to_string(),
            flutter_base_url: "http://localhost:8080/api".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"drag_threshold": 8.0}"#).unwrap();
        assert!((config.drag_threshold - 8.0).abs() < f64::EPSILON);
        assert!((config.default_entity_width - 240.0).abs() < f64::EPSILON);
        assert_eq!(config.relation_type, RelationType::Association);
    }

    #[test]
    fn test_engine_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::from_json(r#"{"zoom_step": 0.25}"#).is_ok());

        let inverted = EngineConfig::from_json(r#"{"min_zoom": 2.0, "max_zoom": 0.5}"#);
        assert!(matches!(inverted, Err(ConfigError::ZoomBounds { .. })));
        let zero_min = EngineConfig::from_json(r#"{"min_zoom": 0.0}"#);
        assert!(matches!(zero_min, Err(ConfigError::ZoomBounds { .. })));
        let step = EngineConfig::from_json(r#"{"zoom_step": -0.1}"#);
        assert!(matches!(step, Err(ConfigError::NotPositive { field: "zoom_step", .. })));
        let size = EngineConfig::from_json(r#"{"min_layer_size": 0.0}"#);
        assert!(matches!(size, Err(ConfigError::NotPositive { field: "min_layer_size", .. })));
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_project_config_camel_case() {
        let value = serde_json::to_value(ProjectConfig::default()).unwrap();
        assert_eq!(value["groupId"], "com.ejemplo.proyecto");
        assert_eq!(value["databasePort"], 5432);
        assert_eq!(value["database"], "postgresql");
        assert_eq!(value["flutterEnabled"], false);
    }

    #[test]
    fn test_project_config_fills_missing_fields() {
        let config: ProjectConfig =
            serde_json::from_str(r#"{"projectName": "tienda", "database": "mysql"}"#).unwrap();
        assert_eq!(config.project_name, "tienda");
        assert_eq!(config.database, Database::Mysql);
        assert_eq!(config.server_port, 8080);
    }
}
