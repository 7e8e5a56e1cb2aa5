//! Table catalog: the allow-list of objects usage may be reported for.
//!
//! The catalog is a two-level mapping `database -> schema -> [object]`, built
//! upstream after allow/deny pattern filtering. The engine only ever asks one
//! question of it: is `database.schema.table` a known object? Lookups are
//! exact and case-sensitive. See [`config`] for the TOML form.

pub mod config;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Whether a catalog object is a table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Table,
    View,
}

/// One table or view known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogObject {
    /// Object name as the warehouse reports it.
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
}

impl CatalogObject {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Table,
        }
    }

    pub fn view(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::View,
        }
    }
}

/// `database -> schema -> objects`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableCatalog {
    #[serde(default)]
    pub databases: IndexMap<String, IndexMap<String, Vec<CatalogObject>>>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object, creating the database and schema entries as needed.
    pub fn insert(&mut self, database: &str, schema: &str, object: CatalogObject) {
        self.databases
            .entry(database.to_string())
            .or_default()
            .entry(schema.to_string())
            .or_default()
            .push(object);
    }

    /// Builder-style [`TableCatalog::insert`] for a plain table.
    pub fn with_table(mut self, database: &str, schema: &str, table: &str) -> Self {
        self.insert(database, schema, CatalogObject::table(table));
        self
    }

    /// True if `database.schema.table` names an object in the catalog.
    ///
    /// The database must be a key, the schema a key under it, and the table
    /// must match at least one object in that schema by exact name.
    pub fn contains(&self, database: &str, schema: &str, table: &str) -> bool {
        self.databases
            .get(database)
            .and_then(|schemas| schemas.get(schema))
            .is_some_and(|objects| objects.iter().any(|o| o.name == table))
    }

    /// Number of objects across all databases and schemas.
    pub fn object_count(&self) -> usize {
        self.databases
            .values()
            .flat_map(|schemas| schemas.values())
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TableCatalog {
        let mut cat = TableCatalog::new().with_table("dev", "public", "orders");
        cat.insert("dev", "public", CatalogObject::view("v_orders"));
        cat
    }

    #[test]
    fn contains_requires_all_three_levels() {
        let cat = catalog();
        assert!(cat.contains("dev", "public", "orders"));
        assert!(cat.contains("dev", "public", "v_orders"));
        assert!(!cat.contains("prod", "public", "orders"));
        assert!(!cat.contains("dev", "sales", "orders"));
        assert!(!cat.contains("dev", "public", "customers"));
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let cat = catalog();
        assert!(!cat.contains("DEV", "public", "orders"));
        assert!(!cat.contains("dev", "public", "Orders"));
    }

    #[test]
    fn object_count_spans_schemas() {
        let mut cat = catalog();
        cat.insert("dev", "sales", CatalogObject::table("leads"));
        assert_eq!(cat.object_count(), 3);
    }
}
