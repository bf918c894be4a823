//! Deterministic pseudonymization of host-inventory documents.
//!
//! Identifying strings (hostnames, cluster, database and schema names,
//! filesystem paths, segment owners) are replaced by a realistic-looking
//! corpus entry followed by the value's fingerprint:
//!
//! ```text
//! srv-db-01  ->  arcturus-38945154f3fd2aeaaf54a81446a5ffea
//! ```
//!
//! The mapping depends only on the value and the corpus, so the same input
//! yields the same output across runs and documents and relations between
//! documents survive. Which fields are rewritten is declared per schema
//! version in a [`PathTable`]; [`Pseudonymizer`] applies one.
//!
//! The transformation is **not idempotent**: anonymizing an already
//! anonymized document rewrites the substitutes again. Do not run it twice
//! over the same data expecting a no-op.

pub mod corpus;
pub mod engine;
pub mod formatter;
pub mod migrate;
pub mod path;
pub mod table;

pub use corpus::{Corpora, Corpus, CorpusKind};
pub use engine::{Pseudonymizer, RuleStats, SkipReason, TableSet, TransformStats};
pub use formatter::{hash_only, index, substitute, substitute_tokens};
pub use migrate::{migrate_and_anonymize, MigrationOrder, MigrationOutcome, SchemaMigrator};
pub use path::{Location, Step};
pub use table::{Format, PathRule, PathTable, NOT_IN_CLUSTER};
