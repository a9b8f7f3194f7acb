//! Selection configuration files.
//!
//! A single YAML (or JSON) document carries the diagnostic switches and the
//! matching defaults every library built from a [`crate::LibrarySpec`]
//! inherits. Diagnostics can additionally be forced on or off through
//! environment variables without editing the file.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "mi300 tuning"
//!
//! diagnostics:
//!   enable_debug_selection: false
//!   print_property_evaluation: false
//!   print_library_logic_index: true
//!
//! matching:
//!   distance:
//!     type: ratio
//!   evaluation_policy: granularity
//!   default_top_k: 4
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use matching::{Diagnostics, Distance, EvaluationPolicy, NearestResolvable, PreferLogicIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::gemm::{GemmProblem, GranularityPolicy, KernelSolution};

pub const ENV_DEBUG_SELECTION: &str = "KERNEL_MATCH_DEBUG_SELECTION";
pub const ENV_PRINT_PROPERTY_EVALUATION: &str = "KERNEL_MATCH_PRINT_PROPERTY_EVALUATION";
pub const ENV_PRINT_LIBRARY_LOGIC_INDEX: &str = "KERNEL_MATCH_PRINT_LIBRARY_LOGIC_INDEX";

/// Errors that can occur when loading configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid value {value:?} for {var}: expected a boolean")]
    InvalidOverride { var: String, value: String },
}

/// Top-level selection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub diagnostics: Diagnostics,

    #[serde(default)]
    pub matching: MatchingConfig,
}

impl SelectionConfig {
    /// Load a configuration file; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: SelectionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        let config: SelectionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.matching.validate()
    }

    /// Apply the `KERNEL_MATCH_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigLoadError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable source. Unset variables
    /// leave the configured value alone.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flags = [
            (
                ENV_DEBUG_SELECTION,
                &mut self.diagnostics.enable_debug_selection,
            ),
            (
                ENV_PRINT_PROPERTY_EVALUATION,
                &mut self.diagnostics.print_property_evaluation,
            ),
            (
                ENV_PRINT_LIBRARY_LOGIC_INDEX,
                &mut self.diagnostics.print_library_logic_index,
            ),
        ];

        for (var, flag) in flags {
            let Some(value) = lookup(var) else {
                continue;
            };
            *flag = parse_flag(var, &value)?;
            debug!(var, enabled = *flag, "diagnostic_override");
        }
        Ok(())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            diagnostics: Diagnostics::default(),
            matching: MatchingConfig::default(),
        }
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigLoadError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigLoadError::InvalidOverride {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Policy used when debug selection is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    NearestResolvable,
    PreferLogicIndex,
    Granularity,
}

impl PolicyKind {
    pub fn policy(self) -> Arc<dyn EvaluationPolicy<GemmProblem, KernelSolution>> {
        match self {
            PolicyKind::NearestResolvable => Arc::new(NearestResolvable),
            PolicyKind::PreferLogicIndex => Arc::new(PreferLogicIndex),
            PolicyKind::Granularity => Arc::new(GranularityPolicy),
        }
    }
}

/// Defaults for matching libraries built from specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Metric for tables that do not name their own.
    #[serde(default)]
    pub distance: Distance,

    #[serde(default)]
    pub evaluation_policy: PolicyKind,

    /// `k` used by `KernelSelector::candidates`.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl MatchingConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.default_top_k == 0 {
            return Err(ConfigLoadError::Validation(
                "matching.default_top_k must be >= 1".into(),
            ));
        }
        if let Distance::Weighted { weights, .. } = &self.distance {
            self.distance
                .validate(weights.len())
                .map_err(|err| ConfigLoadError::Validation(format!("matching.distance: {err}")))?;
        }
        Ok(())
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance: Distance::default(),
            evaluation_policy: PolicyKind::default(),
            default_top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "mi300 tuning"
diagnostics:
  print_library_logic_index: true
matching:
  distance:
    type: ratio
  evaluation_policy: granularity
  default_top_k: 4
"#;

        let config = SelectionConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("mi300 tuning"));
        assert!(config.diagnostics.print_library_logic_index);
        assert!(!config.diagnostics.enable_debug_selection);
        assert_eq!(config.matching.distance, Distance::Ratio);
        assert_eq!(config.matching.evaluation_policy, PolicyKind::Granularity);
        assert_eq!(config.matching.default_top_k, 4);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = SelectionConfig::from_yaml("version: \"1\"\n").unwrap();
        assert_eq!(config.diagnostics, Diagnostics::default());
        assert_eq!(config.matching, MatchingConfig::default());
    }

    #[test]
    fn test_load_from_yaml_and_json_files() {
        let mut yaml_file = NamedTempFile::new().unwrap();
        yaml_file
            .write_all(b"version: \"1.0\"\ndiagnostics:\n  enable_debug_selection: true\n")
            .unwrap();
        let config = SelectionConfig::from_file(yaml_file.path()).unwrap();
        assert!(config.diagnostics.enable_debug_selection);

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json_file
            .write_all(br#"{"version": "1.0", "matching": {"evaluation_policy": "prefer_logic_index"}}"#)
            .unwrap();
        let config = SelectionConfig::from_file(json_file.path()).unwrap();
        assert_eq!(config.matching.evaluation_policy, PolicyKind::PreferLogicIndex);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = SelectionConfig::from_file("/nonexistent/selection.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileRead(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let err = SelectionConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_matching_validation() {
        let yaml = r#"
version: "1.0"
matching:
  default_top_k: 0
"#;
        let err = SelectionConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("default_top_k"));

        let yaml = r#"
version: "1.0"
matching:
  distance:
    type: weighted
    weights: [1.0, -2.0]
    inner:
      type: euclidean
"#;
        let err = SelectionConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("matching.distance"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DEBUG_SELECTION, "true"),
            (ENV_PRINT_LIBRARY_LOGIC_INDEX, "0"),
        ]
        .into_iter()
        .collect();

        let mut config = SelectionConfig::default();
        config.diagnostics.print_library_logic_index = true;
        config.diagnostics.print_property_evaluation = true;
        config
            .apply_overrides(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();

        assert!(config.diagnostics.enable_debug_selection);
        assert!(config.diagnostics.print_property_evaluation);
        assert!(!config.diagnostics.print_library_logic_index);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config = SelectionConfig::default();
        let err = config
            .apply_overrides(|var| (var == ENV_PRINT_PROPERTY_EVALUATION).then(|| "maybe".into()))
            .unwrap_err();
        assert!(
            matches!(err, ConfigLoadError::InvalidOverride { ref var, .. } if var == ENV_PRINT_PROPERTY_EVALUATION)
        );
    }

    #[test]
    fn test_policy_kind_builds_named_policy() {
        assert_eq!(PolicyKind::NearestResolvable.policy().name(), "NearestResolvable");
        assert_eq!(PolicyKind::PreferLogicIndex.policy().name(), "PreferLogicIndex");
        assert_eq!(PolicyKind::Granularity.policy().name(), "Granularity");
    }
}
