//! Configuration file loading
//!
//! Options can be kept in a `.json` or `.toml` file. Every field is optional;
//! fields that are present override the corresponding [`CompilerOptions`] value.

use crate::error::{CompilerError, Result};
use crate::CompilerOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub debug_mode: Option<bool>,
    pub enable_custom_binary: Option<bool>,
    pub disabled_serializers: Option<Vec<String>>,
    pub max_element_depth: Option<usize>,
    pub strict_reader: Option<bool>,
}

impl ConfigFile {
    /// Overlay the fields present in this file onto `options`
    pub fn apply(&self, options: &mut CompilerOptions) {
        if let Some(debug_mode) = self.debug_mode {
            options.debug_mode = debug_mode;
        }
        if let Some(enable) = self.enable_custom_binary {
            options.enable_custom_binary = enable;
        }
        if let Some(disabled) = &self.disabled_serializers {
            options.disabled_serializers = disabled.clone();
        }
        if let Some(depth) = self.max_element_depth {
            options.max_element_depth = depth;
        }
        if let Some(strict) = self.strict_reader {
            options.strict_reader = strict;
        }
    }
}

pub fn load<P: AsRef<Path>>(config_path: P) -> Result<ConfigFile> {
    let path = config_path.as_ref();
    let config_content = fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", path.display(), e),
    })?;

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?,
        Some("toml") => toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?,
        _ => {
            return Err(CompilerError::InvalidFormat {
                message: "Config file must be .json or .toml format".to_string(),
            })
        }
    };

    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default options with the file at `config_path` applied on top
pub fn load_options<P: AsRef<Path>>(config_path: P) -> Result<CompilerOptions> {
    let mut options = CompilerOptions::default();
    load(config_path)?.apply(&mut options);

    if options.max_element_depth == 0 {
        return Err(CompilerError::InvalidFormat {
            message: "max_element_depth must be at least 1".to_string(),
        });
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn config_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml() {
        let file = config_file(
            ".toml",
            "debug_mode = true\nmax_element_depth = 64\ndisabled_serializers = [\"BrushSerializer\"]\n",
        );
        let options = load_options(file.path()).unwrap();
        assert!(options.debug_mode);
        assert_eq!(options.max_element_depth, 64);
        assert_eq!(options.disabled_serializers, vec!["BrushSerializer".to_string()]);
        // Absent fields keep their defaults
        assert!(options.enable_custom_binary);
        assert!(!options.strict_reader);
    }

    #[test]
    fn test_load_json() {
        let file = config_file(".json", r#"{ "enable_custom_binary": false, "strict_reader": true }"#);
        let options = load_options(file.path()).unwrap();
        assert!(!options.enable_custom_binary);
        assert!(options.strict_reader);
    }

    #[test]
    fn test_invalid_configs() {
        let file = config_file(".yaml", "debug_mode: true");
        assert!(matches!(load(file.path()), Err(CompilerError::InvalidFormat { .. })));

        let file = config_file(".json", "{ debug_mode: }");
        assert!(matches!(load(file.path()), Err(CompilerError::InvalidFormat { .. })));

        let file = config_file(".toml", "optimization_level = 2");
        assert!(matches!(load(file.path()), Err(CompilerError::InvalidFormat { .. })));

        let file = config_file(".toml", "max_element_depth = 0");
        assert!(load_options(file.path()).is_err());

        assert!(matches!(
            load("/nonexistent/bamlc.toml"),
            Err(CompilerError::FileNotFound { .. })
        ));
    }
}
