//! Export formats for declarations.
//!
//! Both the JSON and the YAML form of a [`Declaration`] mirror its fields and
//! nesting exactly, so an exported declaration imports back unchanged.

use serde::{Deserialize, Serialize};

use crate::declaration::Declaration;
use crate::error::ExportError;
use crate::primitive::{ConfirmationStatus, PrimitiveId};

/// Serializes declarations to and from an external format.
pub trait DeclarationExporter {
    fn format(&self) -> &'static str;

    fn export(&self, declaration: &Declaration) -> Result<String, ExportError>;

    fn import(&self, input: &str) -> Result<Declaration, ExportError>;
}

/// JSON exporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter {
    pub pretty: bool,
}

impl JsonExporter {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl DeclarationExporter for JsonExporter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn export(&self, declaration: &Declaration) -> Result<String, ExportError> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(declaration)
        } else {
            serde_json::to_string(declaration)
        };
        encoded.map_err(|e| ExportError::Encode {
            format: self.format(),
            message: e.to_string(),
        })
    }

    fn import(&self, input: &str) -> Result<Declaration, ExportError> {
        serde_json::from_str(input).map_err(|e| ExportError::Decode {
            format: self.format(),
            message: e.to_string(),
        })
    }
}

/// YAML exporter. Same document shape as [`JsonExporter`], block style.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlExporter;

impl DeclarationExporter for YamlExporter {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn export(&self, declaration: &Declaration) -> Result<String, ExportError> {
        serde_yaml::to_string(declaration).map_err(|e| ExportError::Encode {
            format: self.format(),
            message: e.to_string(),
        })
    }

    fn import(&self, input: &str) -> Result<Declaration, ExportError> {
        serde_yaml::from_str(input).map_err(|e| ExportError::Decode {
            format: self.format(),
            message: e.to_string(),
        })
    }
}

/// Compact completion summary of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationSummary {
    pub id: String,
    pub scope_id: PrimitiveId,
    pub version: u64,
    pub created_at: u64,
    pub last_confirmed_at: Option<u64>,
    pub confirmed_count: usize,
    pub unconfirmed_count: usize,
    pub flagged_count: usize,
    pub completion_percentage: f64,
    pub primitive_count: usize,
    pub provenance_count: usize,
}

impl From<&Declaration> for DeclarationSummary {
    fn from(decl: &Declaration) -> Self {
        Self {
            id: decl.id.clone(),
            scope_id: decl.scope.id.clone(),
            version: decl.version,
            created_at: decl.created_at,
            last_confirmed_at: decl.last_confirmed_at,
            confirmed_count: decl.confirmed_count,
            unconfirmed_count: decl.unconfirmed_count,
            flagged_count: decl.count_status(ConfirmationStatus::Flagged),
            completion_percentage: decl.completion_percentage,
            primitive_count: decl.primitives().count(),
            provenance_count: decl.provenance.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{HumanIdentity, Scope};

    #[test]
    fn exported_json_uses_declaration_field_names() {
        let decl = Declaration::empty(
            Scope::new("org", "Org", HumanIdentity::new("o@example.com", "O")),
            42,
        );
        let json = JsonExporter::default().export(&decl).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in [
            "id",
            "version",
            "scope",
            "child_scopes",
            "capabilities",
            "provenance",
            "completion_percentage",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["scope"]["owner_identity"]["email"], "o@example.com");
    }

    #[test]
    fn import_rejects_wrong_shape() {
        let err = JsonExporter::default().import(r#"{"id": 3}"#).unwrap_err();
        assert!(matches!(err, ExportError::Decode { format: "json", .. }));
    }

    #[test]
    fn yaml_uses_declaration_field_names() {
        let decl = Declaration::empty(
            Scope::new("org", "Org", HumanIdentity::new("o@example.com", "O")),
            42,
        );
        let yaml = YamlExporter.export(&decl).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["scope"]["owner_identity"]["email"].as_str(), Some("o@example.com"));
        assert_eq!(value["version"].as_u64(), Some(decl.version));
        let back = YamlExporter.import(&yaml).unwrap();
        assert_eq!(back, decl);
    }

    #[test]
    fn yaml_import_rejects_wrong_shape() {
        let err = YamlExporter.import("id: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ExportError::Decode { format: "yaml", .. }));
    }

    #[test]
    fn summary_counts_flags() {
        let decl = Declaration::empty(
            Scope::new("org", "Org", HumanIdentity::new("o@example.com", "O")),
            1,
        );
        let summary = DeclarationSummary::from(&decl);
        assert_eq!(summary.scope_id.as_str(), "org");
        assert_eq!(summary.primitive_count, 1);
        assert_eq!(summary.flagged_count, 0);
    }
}
