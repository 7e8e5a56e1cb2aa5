//! Catalog configuration: parsing, normalization, and loading.
//!
//! The catalog TOML lists, per database and schema, the objects usage may be
//! reported for:
//!
//! ```toml
//! [[databases.dev.public]]
//! name = "orders"
//!
//! [[databases.dev.public]]
//! name = "v_orders"
//! kind = "view"
//! ```
//!
//! Key behaviors:
//! - Database, schema and object names are trimmed but keep their case; the
//!   engine matches them case-sensitively against warehouse output.
//! - Objects are de-duplicated by name within a schema, first occurrence wins.
//! - Schemas left empty after normalization are dropped, as are databases
//!   without schemas.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_catalog_str`]
//! - Parse + normalize from a file path: [`load_catalog_path`]

use std::{collections::HashSet, mem};

use anyhow::{Context, bail};
use indexmap::IndexMap;
use toml::from_str;

use super::{CatalogObject, TableCatalog};

/// Summary of changes performed during normalization.
///
/// All counters are additive for the processed catalog.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CatalogNormalizationReport {
    /// Number of database, schema or object names that changed when trimming.
    pub names_trimmed: usize,
    /// Count of removed duplicate objects.
    pub objects_deduped: usize,
    /// Count of schemas dropped because they listed no objects.
    pub empty_schemas_dropped: usize,
}

fn trimmed(raw: &str, what: &str, report: &mut CatalogNormalizationReport) -> anyhow::Result<String> {
    let t = raw.trim();
    if t.is_empty() {
        bail!("{what} name cannot be empty after trimming");
    }
    if t != raw {
        report.names_trimmed += 1;
    }
    Ok(t.to_string())
}

/// Normalize a catalog in-place.
///
/// Errors:
/// - Empty database, schema or object names after trimming
/// - Two database (or schema) keys that collide after trimming
pub fn normalize_catalog(cat: &mut TableCatalog) -> anyhow::Result<CatalogNormalizationReport> {
    let mut report = CatalogNormalizationReport::default();
    let mut rebuilt: IndexMap<String, IndexMap<String, Vec<CatalogObject>>> = IndexMap::new();

    for (raw_db, schemas) in mem::take(&mut cat.databases) {
        let db = trimmed(&raw_db, "database", &mut report)?;
        if rebuilt.contains_key(&db) {
            bail!("duplicate database after normalization: {db}");
        }

        let mut norm_schemas = IndexMap::new();
        for (raw_schema, objects) in schemas {
            let schema = trimmed(&raw_schema, "schema", &mut report)?;
            if norm_schemas.contains_key(&schema) {
                bail!("duplicate schema after normalization: {db}.{schema}");
            }

            let before_len = objects.len();
            let mut seen = HashSet::new();
            let mut out = Vec::with_capacity(before_len);
            for mut obj in objects {
                obj.name = trimmed(&obj.name, "object", &mut report)?;
                if seen.insert(obj.name.clone()) {
                    out.push(obj);
                }
            }
            report.objects_deduped += before_len - out.len();

            if out.is_empty() {
                report.empty_schemas_dropped += 1;
                continue;
            }
            norm_schemas.insert(schema, out);
        }

        if !norm_schemas.is_empty() {
            rebuilt.insert(db, norm_schemas);
        }
    }

    cat.databases = rebuilt;
    Ok(report)
}

/// Parse and normalize a catalog from a TOML string.
pub fn load_catalog_str(toml_str: &str) -> anyhow::Result<TableCatalog> {
    let mut cat: TableCatalog = from_str(toml_str).context("failed to parse catalog TOML")?;
    let report = normalize_catalog(&mut cat).context("normalize_catalog failed")?;
    tracing::debug!(?report, objects = cat.object_count(), "catalog loaded");
    Ok(cat)
}

/// Read a catalog TOML file from disk, parse, and normalize it.
///
/// See [`load_catalog_str`] for details on parsing and normalization.
pub fn load_catalog_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<TableCatalog> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read catalog file {}", path.as_ref().display()))?;
    load_catalog_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObjectKind;

    #[test]
    fn parses_nested_arrays_of_tables() {
        let cat = load_catalog_str(
            r#"
            [[databases.dev.public]]
            name = "orders"

            [[databases.dev.public]]
            name = "v_orders"
            kind = "view"

            [[databases.dev.sales]]
            name = "leads"
            "#,
        )
        .unwrap();

        assert!(cat.contains("dev", "public", "orders"));
        assert!(cat.contains("dev", "sales", "leads"));
        assert_eq!(cat.databases["dev"]["public"][1].kind, ObjectKind::View);
        assert_eq!(cat.object_count(), 3);
    }

    #[test]
    fn trims_and_dedupes_but_keeps_case() {
        let mut cat = TableCatalog::new()
            .with_table(" dev ", "public", " Orders ")
            .with_table(" dev ", "public", "Orders")
            .with_table(" dev ", "public", "orders");

        let rep = normalize_catalog(&mut cat).unwrap();
        assert_eq!(rep.objects_deduped, 1);
        assert_eq!(rep.names_trimmed, 2); // " dev " and " Orders "
        let names: Vec<_> = cat.databases["dev"]["public"]
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["Orders", "orders"]);
    }

    #[test]
    fn empty_schemas_are_dropped() {
        let mut cat = TableCatalog::new().with_table("dev", "public", "orders");
        cat.databases
            .get_mut("dev")
            .unwrap()
            .insert("empty".into(), Vec::new());

        let rep = normalize_catalog(&mut cat).unwrap();
        assert_eq!(rep.empty_schemas_dropped, 1);
        assert!(!cat.databases["dev"].contains_key("empty"));
    }

    #[test]
    fn colliding_databases_error() {
        let mut cat = TableCatalog::new()
            .with_table("dev", "public", "a")
            .with_table("dev ", "public", "b");
        let err = normalize_catalog(&mut cat).unwrap_err();
        assert!(err.to_string().contains("duplicate database"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = load_catalog_str(
            r#"
            [[databases.dev.public]]
            name = "orders"
            owner = "bob"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("parse catalog"));
    }
}
