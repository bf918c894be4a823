//! Boundary with the schema migrator that upgrades documents between versions.
//!
//! Migration itself lives elsewhere; this module only fixes the contract and
//! which path table applies on each side of it.

use crate::engine::{TableSet, TransformStats};
use hostanon_common::{Error, Result, SchemaVersion};
use serde_json::Value;
use tracing::{info, warn};

/// Result of migrating one document.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub document: Value,
    /// Human-readable validation errors; empty on success.
    pub errors: Vec<String>,
}

impl MigrationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Converts documents from one schema version to the next.
pub trait SchemaMigrator {
    fn source(&self) -> SchemaVersion;
    fn target(&self) -> SchemaVersion;
    fn migrate(&self, document: Value) -> MigrationOutcome;
}

/// Whether anonymization runs on the source or the migrated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOrder {
    /// Anonymize with the source version's table, then migrate.
    AnonymizeFirst,
    /// Migrate, then anonymize with the target version's table.
    MigrateFirst,
}

/// Run `migrator` and anonymization in the requested order.
pub fn migrate_and_anonymize(
    tables: &TableSet,
    migrator: &dyn SchemaMigrator,
    document: Value,
    order: MigrationOrder,
) -> Result<(MigrationOutcome, TransformStats)> {
    let (source, target) = (migrator.source(), migrator.target());
    info!("Migrating {} -> {} ({:?})", source, target, order);

    let pseudonymizer = move |version: SchemaVersion| {
        tables
            .get(version)
            .ok_or_else(|| Error::UnsupportedSchemaVersion(version.to_string()))
    };

    let (outcome, stats) = match order {
        MigrationOrder::AnonymizeFirst => {
            let (document, stats) = pseudonymizer(source)?.transform(document);
            (migrator.migrate(document), stats)
        }
        MigrationOrder::MigrateFirst => {
            let target_table = pseudonymizer(target)?;
            let mut outcome = migrator.migrate(document);
            let stats = target_table.apply(&mut outcome.document);
            (outcome, stats)
        }
    };

    if !outcome.is_valid() {
        warn!("Migration reported {} validation errors", outcome.errors.len());
    }
    Ok((outcome, stats))
}
