//! Traversal engine: applies a path table to a document.

use crate::corpus::{Corpora, Corpus, CorpusKind};
use crate::formatter::{hash_only, substitute, substitute_tokens};
use crate::path::Step;
use crate::table::{Format, PathRule, PathTable};
use hostanon_common::{Error, Result, SchemaVersion};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Why a site was not rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A key along the location is absent.
    Missing,
    /// Expected an object to descend into.
    NotObject,
    /// Expected an array to fan out over.
    NotArray,
    /// The array to fan out over has no elements.
    EmptyArray,
    /// The target value is not a string.
    NotString,
}

/// Counters for one rule.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub substituted: usize,
    pub exempted: usize,
    pub skipped: usize,
}

/// Statistics about one or more transformations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    /// Sites rewritten.
    pub substituted: usize,
    /// Sites resolved but left as they were (kept values, endpoints already set).
    pub exempted: usize,
    /// Sites that did not resolve, by reason.
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Counters per rule, keyed by the rule's path.
    pub per_rule: BTreeMap<String, RuleStats>,
}

impl TransformStats {
    /// Total number of skipped sites.
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Merge with another stats.
    pub fn merge(&mut self, other: &TransformStats) {
        self.substituted += other.substituted;
        self.exempted += other.exempted;
        for (reason, count) in &other.skipped {
            *self.skipped.entry(*reason).or_insert(0) += count;
        }
        for (path, rule) in &other.per_rule {
            let entry = self.per_rule.entry(path.clone()).or_default();
            entry.substituted += rule.substituted;
            entry.exempted += rule.exempted;
            entry.skipped += rule.skipped;
        }
    }
}

/// A rule's format with its corpus resolved.
#[derive(Debug)]
enum Action {
    Substitute(Arc<Corpus>),
    Tokens(Arc<Corpus>),
    HashOnly,
    Endpoint {
        from: String,
        prefix: String,
        suffix: String,
        max_len: Option<usize>,
    },
}

#[derive(Debug)]
struct CompiledRule {
    rule: PathRule,
    action: Action,
}

/// Outcome of one resolved site.
enum Site {
    Rewritten,
    Kept,
    Skipped(SkipReason),
}

/// Applies one path table using a fixed set of corpora.
///
/// Construction checks the whole configuration; once built, [`apply`]
/// cannot fail. Sites that do not resolve are skipped one by one without
/// affecting other sites or rules.
///
/// [`apply`]: Pseudonymizer::apply
#[derive(Debug)]
pub struct Pseudonymizer {
    version: Option<SchemaVersion>,
    rules: Vec<CompiledRule>,
}

impl Pseudonymizer {
    /// Bind a table to corpora. Fails if a rule needs a corpus that is not loaded.
    pub fn new(table: PathTable, corpora: &Corpora) -> Result<Self> {
        table.validate()?;

        let rules = table
            .rules
            .into_iter()
            .map(|rule| -> Result<CompiledRule> {
                let action = match &rule.format {
                    Format::Substitute { corpus } => {
                        Action::Substitute(lookup(corpora, &rule, *corpus)?)
                    }
                    Format::Tokens { corpus } => Action::Tokens(lookup(corpora, &rule, *corpus)?),
                    Format::HashOnly => Action::HashOnly,
                    Format::Endpoint {
                        from,
                        prefix,
                        suffix,
                        max_len,
                    } => Action::Endpoint {
                        from: from.clone(),
                        prefix: prefix.clone(),
                        suffix: suffix.clone(),
                        max_len: *max_len,
                    },
                };
                Ok(CompiledRule { rule, action })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: table.version,
            rules,
        })
    }

    /// Version of the table this pseudonymizer applies, if declared.
    pub fn version(&self) -> Option<SchemaVersion> {
        self.version
    }

    /// Rewrite every resolvable site of `document` in place.
    pub fn apply(&self, document: &mut Value) -> TransformStats {
        let mut stats = TransformStats::default();

        for compiled in &self.rules {
            let mut rule_stats = RuleStats::default();
            let leaf = compiled.rule.path.leaf();

            walk(document, compiled.rule.path.parent(), &mut |resolved| {
                let site = match resolved {
                    Ok(object) => rewrite(object, leaf, compiled),
                    Err(reason) => Site::Skipped(reason),
                };
                match site {
                    Site::Rewritten => rule_stats.substituted += 1,
                    Site::Kept => rule_stats.exempted += 1,
                    Site::Skipped(reason) => skip(&mut stats, &mut rule_stats, compiled, reason),
                }
            });

            debug!(
                "Rule {}: {} substituted, {} exempted, {} skipped",
                compiled.rule.path, rule_stats.substituted, rule_stats.exempted, rule_stats.skipped
            );
            stats.substituted += rule_stats.substituted;
            stats.exempted += rule_stats.exempted;
            stats
                .per_rule
                .insert(compiled.rule.path.to_string(), rule_stats);
        }

        stats
    }

    /// Owned variant of [`Pseudonymizer::apply`].
    pub fn transform(&self, mut document: Value) -> (Value, TransformStats) {
        let stats = self.apply(&mut document);
        (document, stats)
    }
}

fn lookup(corpora: &Corpora, rule: &PathRule, kind: CorpusKind) -> Result<Arc<Corpus>> {
    corpora
        .get(kind)
        .cloned()
        .ok_or_else(|| Error::MissingCorpus {
            rule: rule.path.to_string(),
            kind: kind.to_string(),
        })
}

fn skip(
    stats: &mut TransformStats,
    rule_stats: &mut RuleStats,
    compiled: &CompiledRule,
    reason: SkipReason,
) {
    trace!("Skipped {} ({:?})", compiled.rule.path, reason);
    rule_stats.skipped += 1;
    *stats.skipped.entry(reason).or_insert(0) += 1;
}

/// An object reached by following a location, or why it could not be reached.
type Resolved<'a> = std::result::Result<&'a mut Map<String, Value>, SkipReason>;

/// Follow `steps` from `node`, calling `visit` once for every concrete path
/// the steps fan out into.
fn walk(node: &mut Value, steps: &[Step], visit: &mut dyn FnMut(Resolved<'_>)) {
    match steps.split_first() {
        None => match node.as_object_mut() {
            Some(object) => visit(Ok(object)),
            None => visit(Err(SkipReason::NotObject)),
        },
        Some((Step::Key(key), rest)) => match node {
            Value::Object(object) => match object.get_mut(key) {
                Some(child) => walk(child, rest, visit),
                None => visit(Err(SkipReason::Missing)),
            },
            _ => visit(Err(SkipReason::NotObject)),
        },
        Some((Step::Each, rest)) => match node {
            Value::Array(items) if items.is_empty() => visit(Err(SkipReason::EmptyArray)),
            Value::Array(items) => {
                for item in items {
                    walk(item, rest, visit);
                }
            }
            _ => visit(Err(SkipReason::NotArray)),
        },
    }
}

fn rewrite(object: &mut Map<String, Value>, leaf: &str, compiled: &CompiledRule) -> Site {
    let current = match object.get(leaf) {
        None => return Site::Skipped(SkipReason::Missing),
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Site::Skipped(SkipReason::NotString),
    };

    if compiled.rule.keep.iter().any(|kept| kept == current) {
        return Site::Kept;
    }

    let replacement = match &compiled.action {
        Action::Substitute(corpus) => substitute(current, corpus),
        Action::Tokens(corpus) => substitute_tokens(current, corpus),
        Action::HashOnly => hash_only(current),
        Action::Endpoint {
            from,
            prefix,
            suffix,
            max_len,
        } => {
            if !current.is_empty() {
                return Site::Kept;
            }
            let sibling = match object.get(from) {
                None => return Site::Skipped(SkipReason::Missing),
                Some(Value::String(s)) => s,
                Some(_) => return Site::Skipped(SkipReason::NotString),
            };
            let endpoint = format!("{}{}{}", prefix, sibling, suffix);
            match max_len {
                Some(n) => endpoint.chars().take(*n).collect(),
                None => endpoint,
            }
        }
    };

    if replacement == current {
        return Site::Kept;
    }
    object.insert(leaf.to_string(), Value::String(replacement));
    Site::Rewritten
}

/// One pseudonymizer per supported schema version.
#[derive(Debug, Default)]
pub struct TableSet {
    by_version: BTreeMap<SchemaVersion, Pseudonymizer>,
}

impl TableSet {
    /// Built-in tables for every supported version.
    pub fn builtin(corpora: &Corpora) -> Result<Self> {
        let mut set = Self::default();
        for version in SchemaVersion::ALL {
            set.insert(version, PathTable::builtin(version)?, corpora)?;
        }
        Ok(set)
    }

    /// Use `table` for documents of `version`, replacing any previous table.
    pub fn insert(&mut self, version: SchemaVersion, table: PathTable, corpora: &Corpora) -> Result<()> {
        self.by_version
            .insert(version, Pseudonymizer::new(table, corpora)?);
        Ok(())
    }

    pub fn get(&self, version: SchemaVersion) -> Option<&Pseudonymizer> {
        self.by_version.get(&version)
    }

    /// Anonymize with the table for `version`, or the version the document declares.
    ///
    /// Nothing is modified when the version cannot be resolved.
    pub fn anonymize(
        &self,
        document: &mut Value,
        version: Option<SchemaVersion>,
    ) -> Result<(SchemaVersion, TransformStats)> {
        let version = match version {
            Some(version) => version,
            None => SchemaVersion::detect(document)?,
        };
        let pseudonymizer = self
            .get(version)
            .ok_or_else(|| Error::UnsupportedSchemaVersion(version.to_string()))?;
        Ok((version, pseudonymizer.apply(document)))
    }
}
