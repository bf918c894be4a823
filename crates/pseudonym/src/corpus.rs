//! Substitute corpora: ordered lists of realistic-looking tokens.
//!
//! A corpus entry is selected by position, so the order of a corpus file is
//! part of the mapping. Re-ordering a corpus changes every substitute ever
//! produced from it; [`Corpus::checksum`] exists so that can be detected.

use hostanon_common::hash::sha256_str;
use hostanon_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Semantic category of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    /// Host, VM and virtualization node names.
    Host,
    /// Cluster names.
    Cluster,
    /// Database, schema, tablespace and segment names.
    Database,
    /// Segment owners.
    Owner,
    /// Filesystems and mount points.
    Path,
}

impl CorpusKind {
    pub const ALL: [CorpusKind; 5] = [
        CorpusKind::Host,
        CorpusKind::Cluster,
        CorpusKind::Database,
        CorpusKind::Owner,
        CorpusKind::Path,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusKind::Host => "host",
            CorpusKind::Cluster => "cluster",
            CorpusKind::Database => "database",
            CorpusKind::Owner => "owner",
            CorpusKind::Path => "path",
        }
    }

    /// File name of this corpus in the legacy fixture layout.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            CorpusKind::Host => "list0.txt",
            CorpusKind::Cluster => "list1.txt",
            CorpusKind::Database => "list2.txt",
            CorpusKind::Owner => "list3.txt",
            CorpusKind::Path => "list4.txt",
        }
    }
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorpusKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CorpusKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown corpus kind: {}", s)))
    }
}

/// An immutable, non-empty list of distinct substitute tokens.
#[derive(Debug, Clone)]
pub struct Corpus {
    kind: CorpusKind,
    entries: Vec<String>,
    size: NonZeroUsize,
}

impl Corpus {
    /// Build a corpus from entries, rejecting empty, blank or duplicate ones.
    pub fn new(kind: CorpusKind, entries: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.is_empty() {
                return Err(Error::InvalidCorpus {
                    kind: kind.to_string(),
                    line: i + 1,
                    reason: "empty entry".to_string(),
                });
            }
            if !seen.insert(entry.as_str()) {
                return Err(Error::InvalidCorpus {
                    kind: kind.to_string(),
                    line: i + 1,
                    reason: format!("duplicate entry '{}'", entry),
                });
            }
        }

        let size = NonZeroUsize::new(entries.len()).ok_or_else(|| Error::EmptyCorpus {
            kind: kind.to_string(),
        })?;

        Ok(Self {
            kind,
            entries,
            size,
        })
    }

    /// Parse a corpus from text, one entry per line.
    ///
    /// Line terminators (`\n` or `\r\n`) are trimmed and trailing empty lines
    /// dropped. Nothing else is trimmed.
    pub fn from_lines(kind: CorpusKind, text: &str) -> Result<Self> {
        let mut entries: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();

        while entries.last().is_some_and(|line| line.is_empty()) {
            entries.pop();
        }

        Self::new(kind, entries)
    }

    /// Read a corpus file in full.
    pub fn load(kind: CorpusKind, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::CorpusRead {
            kind: kind.to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        let corpus = Self::from_lines(kind, &text)?;
        info!(
            "Loaded corpus '{}' from {:?}: {} entries, checksum {}",
            kind,
            path,
            corpus.size(),
            &corpus.checksum()[..12]
        );
        Ok(corpus)
    }

    pub fn kind(&self) -> CorpusKind {
        self.kind
    }

    /// Number of entries; never zero.
    pub fn size(&self) -> NonZeroUsize {
        self.size
    }

    /// Entry at `index`, which must be below [`Corpus::size`].
    pub fn entry(&self, index: usize) -> &str {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// SHA-256 of the entries joined by `\n`. Changes whenever the order does.
    pub fn checksum(&self) -> String {
        sha256_str(&self.entries.join("\n"))
    }
}

/// The set of corpora available to a pseudonymizer, at most one per kind.
///
/// Corpora are shared read-only; cloning the set only bumps reference counts.
#[derive(Debug, Clone, Default)]
pub struct Corpora {
    corpora: BTreeMap<CorpusKind, Arc<Corpus>>,
}

impl Corpora {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a corpus, returning the one it replaces.
    pub fn insert(&mut self, corpus: Corpus) -> Option<Arc<Corpus>> {
        self.corpora.insert(corpus.kind(), Arc::new(corpus))
    }

    pub fn get(&self, kind: CorpusKind) -> Option<&Arc<Corpus>> {
        self.corpora.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Corpus> {
        self.corpora.values().map(|corpus| corpus.as_ref())
    }

    /// Load every corpus from the given files.
    pub fn load_files<I>(files: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CorpusKind, PathBuf)>,
    {
        let mut corpora = Self::new();
        for (kind, path) in files {
            corpora.insert(Corpus::load(kind, &path)?);
        }
        Ok(corpora)
    }

    /// Load all five corpora from `dir` using the default file names.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        debug!("Loading corpora from {:?}", dir);
        Self::load_files(
            CorpusKind::ALL
                .into_iter()
                .map(|kind| (kind, dir.join(kind.default_file_name()))),
        )
    }

    /// Check the loaded corpora against pinned checksums.
    ///
    /// A pin for a kind that is not loaded is an error too.
    pub fn verify_checksums(&self, pinned: &BTreeMap<CorpusKind, String>) -> Result<()> {
        for (kind, expected) in pinned {
            let actual = match self.get(*kind) {
                Some(corpus) => corpus.checksum(),
                None => {
                    return Err(Error::Config(format!(
                        "checksum pinned for corpus '{}' which is not loaded",
                        kind
                    )))
                }
            };
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Error::ChecksumMismatch {
                    kind: kind.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }
}
