//! tether.toml parsing and serialization

use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tether_core::error::TetherError;
use tether_core::types::{Manifest, ProjectRoot, RawProperties};
use tether_core::utils::path::is_valid_import_path;

use crate::ConfigResult;

/// File name of the manifest
pub const MANIFEST_NAME: &str = "tether.toml";

/// On-disk shape of the manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestToml {
    /// Ignored package paths; `/*` suffix ignores a subtree
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ignored: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    constraints: BTreeMap<String, RawProperties>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    overrides: BTreeMap<String, RawProperties>,
}

impl From<&Manifest> for ManifestToml {
    fn from(manifest: &Manifest) -> Self {
        Self {
            ignored: manifest.ignored.iter().cloned().collect(),
            constraints: manifest
                .constraints
                .iter()
                .map(|(root, props)| (root.to_string(), RawProperties::from(props)))
                .collect(),
            overrides: manifest
                .overrides
                .iter()
                .map(|(root, props)| (root.to_string(), RawProperties::from(props)))
                .collect(),
        }
    }
}

/// Parse tether.toml content into a manifest
pub fn parse_manifest(content: &str) -> ConfigResult<Manifest> {
    // First try with toml_edit for better error reporting
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| toml_error(format!("TOML syntax error: {}", e)))?;

    // Then parse with serde for type safety
    let raw: ManifestToml = toml::from_str(content).map_err(|e| toml_error(format!("TOML parsing error: {}", e)))?;

    let mut manifest = Manifest::new();
    for rule in raw.ignored {
        validate_ignore(&rule)?;
        manifest.ignored.insert(rule);
    }
    for (root, props) in raw.constraints {
        validate_root(&root, "constraints")?;
        let props = props.into_properties(&root)?;
        manifest.constraints.insert(ProjectRoot::new(root), props);
    }
    for (root, props) in raw.overrides {
        validate_root(&root, "overrides")?;
        let props = props.into_properties(&root)?;
        manifest.overrides.insert(ProjectRoot::new(root), props);
    }

    debug!(
        constraints = manifest.constraints.len(),
        overrides = manifest.overrides.len(),
        ignored = manifest.ignored.len(),
        "Parsed manifest"
    );
    Ok(manifest)
}

/// Serialize a manifest to tether.toml content; keys come out sorted
pub fn serialize_manifest(manifest: &Manifest) -> ConfigResult<String> {
    toml::to_string_pretty(&ManifestToml::from(manifest))
        .map_err(|e| toml_error(format!("TOML serialization error: {}", e)))
}

/// Load and parse tether.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<Manifest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TetherError::io(format!("Failed to read {}", path), e))?;

    parse_manifest(&content).map_err(|e| match e {
        TetherError::TomlParse { message, .. } => TetherError::TomlParse {
            file: path.to_string(),
            message,
        },
        other => other,
    })
}

fn toml_error(message: String) -> TetherError {
    TetherError::TomlParse {
        file: MANIFEST_NAME.to_string(),
        message,
    }
}

fn validate_root(root: &str, table: &str) -> ConfigResult<()> {
    if is_valid_import_path(root) {
        Ok(())
    } else {
        Err(TetherError::ManifestValidation {
            field: format!("{}.{}", table, root),
            reason: "not a valid project root".to_string(),
        })
    }
}

/// An ignore rule is an import path, optionally ending in `/*`
fn validate_ignore(rule: &str) -> ConfigResult<()> {
    let path = rule.strip_suffix("/*").unwrap_or(rule);
    if is_valid_import_path(path) && !path.contains('*') {
        Ok(())
    } else {
        Err(TetherError::ManifestValidation {
            field: "ignored".to_string(),
            reason: format!("'{}' is not a package path or a path ending in /*", rule),
        })
    }
}
