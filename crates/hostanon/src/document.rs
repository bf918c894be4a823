//! Anonymization of a single serialized document.

use anyhow::{Context, Result};
use hostanon_common::{Error, SchemaVersion};
use hostanon_pseudonym::{TableSet, TransformStats};
use serde::Deserialize;
use serde_json::Value;

/// An anonymized document ready to be written.
#[derive(Debug)]
pub struct Anonymized {
    pub text: String,
    pub version: SchemaVersion,
    pub stats: TransformStats,
}

/// How the schema version of a document is chosen.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionPolicy {
    /// Used regardless of the document's marker.
    pub forced: Option<SchemaVersion>,
    /// Used only when the document carries no marker.
    pub fallback: Option<SchemaVersion>,
}

impl VersionPolicy {
    /// Version to anonymize `document` with.
    ///
    /// A marker that is present but unsupported stays an error even with a fallback.
    pub fn resolve(&self, document: &Value) -> hostanon_common::Result<SchemaVersion> {
        if let Some(version) = self.forced {
            return Ok(version);
        }
        match SchemaVersion::detect(document) {
            Err(Error::UnknownSchemaVersion) => self.fallback.ok_or(Error::UnknownSchemaVersion),
            detected => detected,
        }
    }
}

/// Parse a document without a nesting limit.
pub fn parse_document(input: &str) -> Result<Value> {
    let mut deserializer = serde_json::Deserializer::from_str(input);
    deserializer.disable_recursion_limit();
    let document = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(document)
}

/// Parse, anonymize and re-serialize `input`.
///
/// The output is only produced once the whole table has been applied.
pub fn anonymize_text(
    tables: &TableSet,
    input: &str,
    policy: VersionPolicy,
    pretty: bool,
) -> Result<Anonymized> {
    let mut document = parse_document(input).context("Invalid JSON document")?;
    let version = policy.resolve(&document)?;
    let (version, stats) = tables.anonymize(&mut document, Some(version))?;

    let mut text = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    text.push('\n');

    Ok(Anonymized {
        text,
        version,
        stats,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hostanon_pseudonym::Corpora;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    pub(crate) fn tables() -> TableSet {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../corpus");
        TableSet::builtin(&Corpora::load_dir(&dir).unwrap()).unwrap()
    }

    fn detect() -> VersionPolicy {
        VersionPolicy::default()
    }

    #[test]
    fn test_numbers_and_order_pass_through() {
        let input = r#"{"Hostname":"srv-db-01","Info":{"CPUCores":16,"MemoryTotal":15.50},"HostDataSchemaVersion":7}"#;
        let out = anonymize_text(&tables(), input, detect(), false).unwrap();

        assert_eq!(out.version, SchemaVersion::V0);
        assert_eq!(
            out.text,
            "{\"Hostname\":\"arcturus-38945154f3fd2aeaaf54a81446a5ffea\",\
             \"Info\":{\"CPUCores\":16,\"MemoryTotal\":15.50},\"HostDataSchemaVersion\":7}\n"
        );
        assert_eq!(out.stats.substituted, 1);
    }

    #[test]
    fn test_forced_version() {
        let input = r#"{"hostname":"srv-db-01"}"#;
        assert!(anonymize_text(&tables(), input, detect(), false).is_err());

        let policy = VersionPolicy {
            forced: Some(SchemaVersion::V1),
            fallback: None,
        };
        let out = anonymize_text(&tables(), input, policy, true).unwrap();
        assert!(out.text.contains("arcturus-38945154f3fd2aeaaf54a81446a5ffea"));
        assert!(out.text.starts_with("{\n"));
    }

    #[test]
    fn test_fallback_does_not_override_marker() {
        let policy = VersionPolicy {
            forced: None,
            fallback: Some(SchemaVersion::V1),
        };
        let input = r#"{"HostDataSchemaVersion":3,"Hostname":"srv-db-01","Info":{"Hostname":"srv-db-01"}}"#;
        let out = anonymize_text(&tables(), input, policy, false).unwrap();

        assert_eq!(out.version, SchemaVersion::V0);
        assert_eq!(out.stats.substituted, 2);
        assert!(!out.text.contains("srv-db-01"));
    }

    #[test]
    fn test_fallback_applies_without_marker() {
        let policy = VersionPolicy {
            forced: None,
            fallback: Some(SchemaVersion::V1),
        };
        assert_eq!(
            policy.resolve(&json!({"hostname": "a"})).unwrap(),
            SchemaVersion::V1
        );
        assert!(matches!(
            policy.resolve(&json!({"schemaVersion": 2})),
            Err(Error::UnsupportedSchemaVersion(_))
        ));
        assert!(matches!(
            detect().resolve(&json!({})),
            Err(Error::UnknownSchemaVersion)
        ));
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 200;
        let input = format!(
            r#"{{"HostDataSchemaVersion":3,"Hostname":"srv-db-01","Deep":{}1{}}}"#,
            r#"{"d":"#.repeat(depth),
            "}".repeat(depth)
        );
        let out = anonymize_text(&tables(), &input, detect(), false).unwrap();

        assert!(out.text.contains("arcturus-38945154f3fd2aeaaf54a81446a5ffea"));
        let parsed = parse_document(&out.text).unwrap();
        let mut node = &parsed["Deep"];
        for _ in 0..depth {
            node = &node["d"];
        }
        assert_eq!(node, &json!(1));
    }

    #[test]
    fn test_invalid_json() {
        let err = anonymize_text(&tables(), "{\"Hostname\":", detect(), false).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
        assert!(parse_document("{} trailing").is_err());
    }
}
