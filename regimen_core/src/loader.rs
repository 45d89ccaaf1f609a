//! Regimen model file loader.
//!
//! Models are read from TOML or JSON, chosen by file extension. Anything
//! that fails to parse (bad syntax, missing keys, unknown rule kinds) is
//! reported as a validation error naming the file.

use crate::{Error, RegimenModel, Result};
use std::path::Path;

/// Supported model file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Toml,
    Json,
}

impl ModelFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("toml") => Ok(ModelFormat::Toml),
            Some("json") => Ok(ModelFormat::Json),
            _ => Err(Error::Validation(format!(
                "{}: unsupported model file extension (expected .toml or .json)",
                path.display()
            ))),
        }
    }
}

/// Load a regimen model from `path`
///
/// The model is parsed only; call `validate_model` (or a generation entry
/// point, which validates) before relying on its references.
pub fn load_model(path: &Path) -> Result<RegimenModel> {
    let format = ModelFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)?;
    let model = parse_model(&contents, format).map_err(|e| match e {
        Error::Validation(msg) => Error::Validation(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;

    tracing::info!(
        "Loaded model from {:?}: {} supplements, {} events",
        path,
        model.supplements.len(),
        model.events.len()
    );
    Ok(model)
}

/// Parse model text in the given format
///
/// Malformed text and unknown kind tags are both validation errors.
pub fn parse_model(contents: &str, format: ModelFormat) -> Result<RegimenModel> {
    let parsed = match format {
        ModelFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        ModelFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
    };
    parsed.map_err(Error::Validation)
}

/// Write a model to `path` in the format implied by its extension
pub fn save_model(model: &RegimenModel, path: &Path) -> Result<()> {
    let contents = match ModelFormat::from_path(path)? {
        ModelFormat::Toml => toml::to_string_pretty(model)
            .map_err(|e| Error::Config(format!("Failed to serialize model: {}", e)))?,
        ModelFormat::Json => serde_json::to_string_pretty(model)?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;

    tracing::info!("Saved model to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_model;
    use crate::validate::validate_model;

    #[test]
    fn test_toml_model_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("regimen.toml");

        save_model(&build_default_model(), &path).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded, build_default_model());
        validate_model(&loaded).unwrap();
    }

    #[test]
    fn test_json_model_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("regimen.json");

        save_model(&build_default_model(), &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.supplements.len(), build_default_model().supplements.len());
    }

    #[test]
    fn test_unknown_rule_kind_is_validation_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");

        let mut value = serde_json::to_value(build_default_model()).unwrap();
        value["supplements"]["nmn"]["schedule_rules"][0]["type"] = "fortnightly".into();
        std::fs::write(&path, value.to_string()).unwrap();

        match load_model(&path) {
            Err(Error::Validation(msg)) => assert!(msg.contains("bad.json")),
            other => panic!("Expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_toml_is_validation_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "pipeline = [\n").unwrap();

        let result = load_model(&path);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_model_from_text() {
        let json = serde_json::to_string(&build_default_model()).unwrap();
        let model = parse_model(&json, ModelFormat::Json).unwrap();
        assert_eq!(model, build_default_model());

        match parse_model("pipeline = [\n", ModelFormat::Toml) {
            Err(Error::Validation(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ModelFormat::from_path(Path::new("regimen.yaml"));
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(ModelFormat::from_path(Path::new("A.TOML")).unwrap(), ModelFormat::Toml);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_model(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
