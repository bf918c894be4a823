//! Host-data schema version definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Marker key carried by legacy (upper-camel-case) host documents.
pub const LEGACY_VERSION_KEY: &str = "HostDataSchemaVersion";

/// Marker key carried by current (lower-camel-case) host documents.
pub const VERSION_KEY: &str = "schemaVersion";

/// Host-data document schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Legacy agent format: upper-camel keys, clusters and exadata under `Extra`.
    V0,
    /// Current format: lower-camel keys, clusters at the root, exadata under `features`.
    V1,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVersion::V0 => write!(f, "v0"),
            SchemaVersion::V1 => write!(f, "v1"),
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v0" | "0" => Ok(SchemaVersion::V0),
            "v1" | "1" => Ok(SchemaVersion::V1),
            _ => Err(crate::Error::UnsupportedSchemaVersion(s.to_string())),
        }
    }
}

impl SchemaVersion {
    /// All supported versions, oldest first.
    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::V0, SchemaVersion::V1];

    /// Detect the version from the marker embedded in a document.
    ///
    /// `schemaVersion` wins over `HostDataSchemaVersion` when both are present.
    pub fn detect(document: &Value) -> crate::Result<Self> {
        if let Some(marker) = document.get(VERSION_KEY) {
            return match marker.as_u64() {
                Some(1) => Ok(SchemaVersion::V1),
                _ => Err(crate::Error::UnsupportedSchemaVersion(marker.to_string())),
            };
        }

        match document.get(LEGACY_VERSION_KEY) {
            Some(marker) if marker.is_u64() => Ok(SchemaVersion::V0),
            Some(marker) => Err(crate::Error::UnsupportedSchemaVersion(marker.to_string())),
            None => Err(crate::Error::UnknownSchemaVersion),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_schema_version() {
        assert_eq!(SchemaVersion::from_str("v0").unwrap(), SchemaVersion::V0);
        assert_eq!(SchemaVersion::from_str("V1").unwrap(), SchemaVersion::V1);
        assert_eq!(SchemaVersion::from_str("1").unwrap(), SchemaVersion::V1);
        assert!(SchemaVersion::from_str("v9").is_err());
    }

    #[test]
    fn test_display_schema_version() {
        assert_eq!(SchemaVersion::V0.to_string(), "v0");
        assert_eq!(SchemaVersion::V1.to_string(), "v1");
    }

    #[test]
    fn test_detect_current_marker() {
        let doc = json!({"hostname": "srv-db-01", "schemaVersion": 1});
        assert_eq!(SchemaVersion::detect(&doc).unwrap(), SchemaVersion::V1);
    }

    #[test]
    fn test_detect_legacy_marker() {
        let doc = json!({"Hostname": "srv-db-01", "HostDataSchemaVersion": 3});
        assert_eq!(SchemaVersion::detect(&doc).unwrap(), SchemaVersion::V0);
    }

    #[test]
    fn test_detect_unsupported_marker() {
        let doc = json!({"schemaVersion": 2});
        assert!(matches!(
            SchemaVersion::detect(&doc),
            Err(crate::Error::UnsupportedSchemaVersion(v)) if v == "2"
        ));

        let doc = json!({"HostDataSchemaVersion": "three"});
        assert!(SchemaVersion::detect(&doc).is_err());
    }

    #[test]
    fn test_detect_without_marker() {
        assert!(matches!(
            SchemaVersion::detect(&json!({"Hostname": "x"})),
            Err(crate::Error::UnknownSchemaVersion)
        ));
        assert!(matches!(
            SchemaVersion::detect(&json!([1, 2])),
            Err(crate::Error::UnknownSchemaVersion)
        ));
    }
}
