//! Configuration file handling.

use anyhow::{bail, Context, Result};
use hostanon_common::SchemaVersion;
use hostanon_pseudonym::{Corpora, CorpusKind, PathTable, TableSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// hostanon configuration, read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the corpus files.
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// Corpus file names relative to `corpus_dir`, overriding the defaults.
    #[serde(default)]
    pub corpora: BTreeMap<CorpusKind, PathBuf>,

    /// Expected SHA-256 checksums of corpora.
    #[serde(default)]
    pub checksums: BTreeMap<CorpusKind, String>,

    /// Version used when a document declares none.
    #[serde(default)]
    pub schema_version: Option<SchemaVersion>,

    /// Custom path tables replacing the built-in ones.
    #[serde(default)]
    pub tables: BTreeMap<SchemaVersion, PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_dir: default_corpus_dir(),
            corpora: BTreeMap::new(),
            checksums: BTreeMap::new(),
            schema_version: None,
            tables: BTreeMap::new(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("corpus")
}

impl Config {
    /// Load the config file if given, else the defaults.
    ///
    /// Relative paths in the file are resolved against the file's directory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {:?}", path))?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if self.corpus_dir.is_relative() {
            self.corpus_dir = base.join(&self.corpus_dir);
        }
        for table in self.tables.values_mut() {
            if table.is_relative() {
                *table = base.join(&*table);
            }
        }
    }

    /// Path of every corpus file, one per kind.
    pub fn corpus_files(&self) -> Vec<(CorpusKind, PathBuf)> {
        CorpusKind::ALL
            .into_iter()
            .map(|kind| {
                let name = self
                    .corpora
                    .get(&kind)
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from(kind.default_file_name()));
                (kind, self.corpus_dir.join(name))
            })
            .collect()
    }

    /// Load all corpora and check pinned checksums.
    pub fn load_corpora(&self) -> Result<Corpora> {
        let corpora = Corpora::load_files(self.corpus_files())?;
        corpora.verify_checksums(&self.checksums)?;
        Ok(corpora)
    }

    /// Built-in tables, replaced by configured ones and finally by `extra`.
    ///
    /// `extra` applies to the version it declares, or to `version`.
    pub fn table_set(
        &self,
        corpora: &Corpora,
        extra: Option<&Path>,
        version: Option<SchemaVersion>,
    ) -> Result<TableSet> {
        let mut tables = TableSet::builtin(corpora)?;

        for (version, path) in &self.tables {
            let table = load_table(path)?;
            check_declared_version(&table, *version, path)?;
            info!("Using table {:?} for {}", path, version);
            tables.insert(*version, table, corpora)?;
        }

        if let Some(path) = extra {
            let table = load_table(path)?;
            let Some(target) = table.version.or(version).or(self.schema_version) else {
                bail!(
                    "Table {:?} declares no version; pass --schema-version",
                    path
                );
            };
            check_declared_version(&table, target, path)?;
            info!("Using table {:?} for {}", path, target);
            tables.insert(target, table, corpora)?;
        }

        Ok(tables)
    }
}

fn load_table(path: &Path) -> Result<PathTable> {
    PathTable::load(path).with_context(|| format!("Failed to load path table {:?}", path))
}

fn check_declared_version(table: &PathTable, version: SchemaVersion, path: &Path) -> Result<()> {
    match table.version {
        Some(declared) if declared != version => bail!(
            "Table {:?} declares version {} but is configured for {}",
            path,
            declared,
            version
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shipped_corpus_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../corpus")
    }

    #[test]
    fn test_default_config() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.corpus_dir, PathBuf::from("corpus"));
        assert!(config.checksums.is_empty());
        assert_eq!(
            config.corpus_files()[0],
            (CorpusKind::Host, PathBuf::from("corpus/list0.txt"))
        );
    }

    #[test]
    fn test_parse_config() {
        let config = Config::from_yaml(
            r#"
corpus_dir: /srv/corpora
corpora:
  host: hosts.txt
checksums:
  cluster: "abc"
schema_version: v1
"#,
        )
        .unwrap();

        assert_eq!(config.schema_version, Some(SchemaVersion::V1));
        assert_eq!(config.checksums[&CorpusKind::Cluster], "abc");
        let files = config.corpus_files();
        assert_eq!(files[0].1, PathBuf::from("/srv/corpora/hosts.txt"));
        assert_eq!(files[1].1, PathBuf::from("/srv/corpora/list1.txt"));
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostanon.yaml");
        std::fs::write(&path, "corpus_dir: lists\ntables:\n  v0: legacy.yaml\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.corpus_dir, dir.path().join("lists"));
        assert_eq!(config.tables[&SchemaVersion::V0], dir.path().join("legacy.yaml"));
    }

    #[test]
    fn test_unknown_corpus_kind_rejected() {
        assert!(Config::from_yaml("corpora:\n  planets: x.txt\n").is_err());
    }

    #[test]
    fn test_load_corpora_checksum_mismatch() {
        let mut config = Config {
            corpus_dir: shipped_corpus_dir(),
            ..Default::default()
        };
        assert!(config.load_corpora().is_ok());

        config
            .checksums
            .insert(CorpusKind::Host, "0".repeat(64));
        let err = config.load_corpora().unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_extra_table_needs_version() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("table.yaml");
        std::fs::write(&table, "rules:\n  - path: Serial\n    format: hash_only\n").unwrap();

        let config = Config {
            corpus_dir: shipped_corpus_dir(),
            ..Default::default()
        };
        let corpora = config.load_corpora().unwrap();

        assert!(config.table_set(&corpora, Some(&table), None).is_err());

        let tables = config
            .table_set(&corpora, Some(&table), Some(SchemaVersion::V0))
            .unwrap();
        let mut doc = serde_json::json!({"Serial": "A1", "Hostname": "srv-db-01"});
        tables.anonymize(&mut doc, Some(SchemaVersion::V0)).unwrap();
        assert_eq!(doc["Serial"], hostanon_pseudonym::hash_only("A1"));
        assert_eq!(doc["Hostname"], "srv-db-01");
    }

    #[test]
    fn test_configured_table_version_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("table.yaml");
        std::fs::write(
            &table,
            "version: v1\nrules:\n  - path: serial\n    format: hash_only\n",
        )
        .unwrap();

        let mut config = Config {
            corpus_dir: shipped_corpus_dir(),
            ..Default::default()
        };
        config.tables.insert(SchemaVersion::V0, table);
        let corpora = config.load_corpora().unwrap();
        assert!(config.table_set(&corpora, None, None).is_err());
    }
}
