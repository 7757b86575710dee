use crate::error::{Result, ZpkError};
use crate::format::StorageFormat;
use crate::policy::Policy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk loader configuration (TOML). Every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub default_format: StorageFormat,
    pub policy: Policy,
}

impl LoaderConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ZpkError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = LoaderConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.default_format, StorageFormat::Zip);
        assert_eq!(cfg.policy.max_entries, Policy::default().max_entries);
        assert!(!cfg.policy.allow_data_descriptors);
    }

    #[test]
    fn reads_format_and_policy_overrides() {
        let cfg = LoaderConfig::from_toml_str(
            r#"
            default_format = "OFOPXMLFormat"

            [policy]
            max_entries = 12
            allow_data_descriptors = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_format, StorageFormat::OfOpXml);
        assert_eq!(cfg.policy.max_entries, 12);
        assert!(cfg.policy.allow_data_descriptors);
        assert_eq!(cfg.policy.max_ratio, Policy::default().max_ratio);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = LoaderConfig::from_toml_str("policy = 3").unwrap_err();
        assert!(matches!(err, ZpkError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("zpk.toml");
        std::fs::write(&p, "default_format = \"package\"\n").unwrap();
        let cfg = LoaderConfig::from_file(&p).unwrap();
        assert_eq!(cfg.default_format, StorageFormat::Package);
    }
}
