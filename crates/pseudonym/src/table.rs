//! Declarative path tables, one per document schema version.
//!
//! All version differences (key casing, relocated substructures) live in
//! these tables; the traversal engine has no version conditionals.

use crate::corpus::CorpusKind;
use crate::path::Location;
use hostanon_common::{Error, Result, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Cluster name marking a host that belongs to no cluster.
pub const NOT_IN_CLUSTER: &str = "not_in_cluster";

/// How the value at a resolved site is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Format {
    /// Corpus entry plus fingerprint.
    Substitute { corpus: CorpusKind },
    /// Space-separated list, each token substituted.
    Tokens { corpus: CorpusKind },
    /// Fingerprint only.
    HashOnly,
    /// Fill an empty string with `prefix + <sibling> + suffix`.
    ///
    /// Runs after the rules declared before it, so the sibling is already
    /// anonymized when those rules target it.
    Endpoint {
        from: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
    },
}

impl Format {
    /// Corpus this format draws from, if any.
    pub fn corpus(&self) -> Option<CorpusKind> {
        match self {
            Format::Substitute { corpus } | Format::Tokens { corpus } => Some(*corpus),
            Format::HashOnly | Format::Endpoint { .. } => None,
        }
    }
}

/// One location to rewrite and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub path: Location,
    #[serde(flatten)]
    pub format: Format,
    /// Values left untouched, compared exactly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keep: Vec<String>,
}

impl PathRule {
    pub fn new(path: &str, format: Format) -> Result<Self> {
        Ok(Self {
            path: path.parse()?,
            format,
            keep: Vec::new(),
        })
    }

    pub fn keep(mut self, value: &str) -> Self {
        self.keep.push(value.to_string());
        self
    }
}

/// Ordered rules for one schema version. Rules apply in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SchemaVersion>,
    pub rules: Vec<PathRule>,
}

#[derive(Clone, Copy)]
enum Builtin {
    Sub(CorpusKind),
    Tokens(CorpusKind),
    Hash,
    ClusterName,
    FetchEndpoint,
}

const HOST: Builtin = Builtin::Sub(CorpusKind::Host);
const CLUSTER: Builtin = Builtin::Sub(CorpusKind::Cluster);
const DATABASE: Builtin = Builtin::Sub(CorpusKind::Database);
const DATABASE_LIST: Builtin = Builtin::Tokens(CorpusKind::Database);
const OWNER: Builtin = Builtin::Sub(CorpusKind::Owner);
const FS_PATH: Builtin = Builtin::Sub(CorpusKind::Path);
const SCRUB: Builtin = Builtin::Hash;
const CLUSTER_NAME: Builtin = Builtin::ClusterName;
const FETCH_ENDPOINT: Builtin = Builtin::FetchEndpoint;

const V0_RULES: &[(&str, Builtin)] = &[
    ("Hostname", HOST),
    ("Info.Hostname", HOST),
    ("Databases", DATABASE_LIST),
    ("Schemas", DATABASE_LIST),
    ("Extra.Filesystems[*].Filesystem", FS_PATH),
    ("Extra.Filesystems[*].MountedOn", FS_PATH),
    ("Extra.Databases[*].Name", DATABASE),
    ("Extra.Databases[*].UniqueName", DATABASE),
    ("Extra.Databases[*].Patches[*].Database", DATABASE),
    ("Extra.Databases[*].Tablespaces[*].Database", DATABASE),
    ("Extra.Databases[*].Tablespaces[*].Name", DATABASE),
    ("Extra.Databases[*].Schemas[*].Database", DATABASE),
    ("Extra.Databases[*].Schemas[*].User", DATABASE),
    ("Extra.Databases[*].SegmentAdvisors[*].SegmentOwner", OWNER),
    ("Extra.Databases[*].SegmentAdvisors[*].SegmentName", DATABASE),
    ("Extra.Databases[*].SegmentAdvisors[*].Recommendation", SCRUB),
    ("Extra.Clusters[*].Name", CLUSTER_NAME),
    ("Extra.Clusters[*].VMs[*].Name", HOST),
    ("Extra.Clusters[*].VMs[*].Hostname", HOST),
    ("Extra.Clusters[*].VMs[*].VirtualizationNode", HOST),
    ("Extra.Clusters[*].VMs[*].ClusterName", CLUSTER),
    ("Extra.Exadata.Devices[*].Hostname", HOST),
    ("Extra.Exadata.Devices[*].CellDisks[*].Name", HOST),
];

const V1_RULES: &[(&str, Builtin)] = &[
    ("hostname", HOST),
    ("info.hostname", HOST),
    ("databases", DATABASE_LIST),
    ("schemas", DATABASE_LIST),
    ("extra.filesystems[*].filesystem", FS_PATH),
    ("extra.filesystems[*].mountedOn", FS_PATH),
    ("extra.databases[*].name", DATABASE),
    ("extra.databases[*].uniqueName", DATABASE),
    ("extra.databases[*].patches[*].database", DATABASE),
    ("extra.databases[*].tablespaces[*].database", DATABASE),
    ("extra.databases[*].tablespaces[*].name", DATABASE),
    ("extra.databases[*].schemas[*].database", DATABASE),
    ("extra.databases[*].schemas[*].user", DATABASE),
    ("extra.databases[*].segmentAdvisors[*].segmentOwner", OWNER),
    ("extra.databases[*].segmentAdvisors[*].segmentName", DATABASE),
    ("extra.databases[*].segmentAdvisors[*].recommendation", SCRUB),
    ("clusters[*].name", CLUSTER_NAME),
    ("clusters[*].vms[*].name", HOST),
    ("clusters[*].vms[*].hostname", HOST),
    ("clusters[*].vms[*].virtualizationNode", HOST),
    ("clusters[*].vms[*].clusterName", CLUSTER),
    ("clusters[*].fetchEndpoint", FETCH_ENDPOINT),
    ("features.oracle.exadata.components[*].hostname", HOST),
    ("features.oracle.exadata.components[*].cellDisks[*].name", HOST),
];

fn build(path: &str, builtin: Builtin, sibling_name: &str) -> Result<PathRule> {
    let rule = match builtin {
        Builtin::Sub(corpus) => PathRule::new(path, Format::Substitute { corpus })?,
        Builtin::Tokens(corpus) => PathRule::new(path, Format::Tokens { corpus })?,
        Builtin::Hash => PathRule::new(path, Format::HashOnly)?,
        Builtin::ClusterName => PathRule::new(
            path,
            Format::Substitute {
                corpus: CorpusKind::Cluster,
            },
        )?
        .keep(NOT_IN_CLUSTER),
        Builtin::FetchEndpoint => PathRule::new(
            path,
            Format::Endpoint {
                from: sibling_name.to_string(),
                prefix: "http://".to_string(),
                suffix: ".test".to_string(),
                max_len: Some(64),
            },
        )?,
    };
    Ok(rule)
}

impl PathTable {
    /// Built-in table for a schema version.
    pub fn builtin(version: SchemaVersion) -> Result<Self> {
        let (rules, name_key) = match version {
            SchemaVersion::V0 => (V0_RULES, "Name"),
            SchemaVersion::V1 => (V1_RULES, "name"),
        };

        let rules = rules
            .iter()
            .map(|(path, builtin)| build(path, *builtin, name_key))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: Some(version),
            rules,
        })
    }

    /// Parse a custom table from YAML.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let table: PathTable = serde_yaml::from_str(text)?;
        table.validate()?;
        Ok(table)
    }

    /// Read a custom table from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject tables that would silently anonymize nothing or nonsense.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::Config("path table has no rules".to_string()));
        }
        for rule in &self.rules {
            if let Format::Endpoint { from, max_len, .. } = &rule.format {
                if from.is_empty() {
                    return Err(Error::Config(format!(
                        "rule '{}': endpoint needs a sibling key",
                        rule.path
                    )));
                }
                if *max_len == Some(0) {
                    return Err(Error::Config(format!(
                        "rule '{}': max_len must be positive",
                        rule.path
                    )));
                }
            }
        }
        Ok(())
    }
}
