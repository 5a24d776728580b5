//! TOML schema files.
//!
//! ```toml
//! [[tables]]
//! name = "employees"
//! primary_key = ["id"]
//! columns = [
//!   { name = "id", type = "int" },
//!   { name = "manager_id", type = "int", nullable = true },
//!   { name = "name", type = "text" },
//! ]
//!
//! [[tables.relations]]
//! name = "manager"
//! kind = "belongs_to"
//! target = "employees"
//! foreign_key = "manager_id"
//! ```
//!
//! Key fields accept a single column name or a list.

use std::path::Path;

use serde::Deserialize;

use super::{
    ColumnDef, ColumnRef, ColumnType, LoadStrategy, PivotDef, RelationDef, RelationKind,
    SchemaRegistry, TableDef,
};
use crate::error::{SchemaError, SchemaResult};

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    tables: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    name: String,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    primary_key: Keys,
    #[serde(default)]
    columns: Vec<ColumnEntry>,
    #[serde(default)]
    relations: Vec<RelationEntry>,
}

#[derive(Debug, Deserialize)]
struct ColumnEntry {
    name: String,
    #[serde(rename = "type", default)]
    column_type: ColumnType,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    references: Option<ColumnRef>,
}

#[derive(Debug, Deserialize)]
struct RelationEntry {
    name: String,
    kind: RelationKind,
    target: String,
    #[serde(default)]
    foreign_key: Keys,
    #[serde(default)]
    references: Keys,
    #[serde(default)]
    pivot: Option<PivotEntry>,
    #[serde(default)]
    load: LoadStrategy,
}

#[derive(Debug, Deserialize)]
struct PivotEntry {
    table: String,
    source_key: Keys,
    target_key: Keys,
}

/// One column name or several.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Keys {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Keys {
    fn into_vec(self) -> Vec<String> {
        match self {
            Keys::None => Vec::new(),
            Keys::One(k) => vec![k],
            Keys::Many(ks) => ks,
        }
    }
}

impl From<TableEntry> for TableDef {
    fn from(entry: TableEntry) -> Self {
        let mut table = TableDef::new(entry.name).primary_key(entry.primary_key.into_vec());
        table.schema = entry.schema;
        for c in entry.columns {
            table = table.column(ColumnDef {
                name: c.name,
                column_type: c.column_type,
                nullable: c.nullable,
                default: c.default,
                unique: c.unique,
                references: c.references,
            });
        }
        for r in entry.relations {
            table = table.relation(RelationDef {
                name: r.name,
                kind: r.kind,
                target: r.target,
                foreign_key: r.foreign_key.into_vec(),
                references: r.references.into_vec(),
                pivot: r.pivot.map(|p| PivotDef {
                    table: p.table,
                    source_key: p.source_key.into_vec(),
                    target_key: p.target_key.into_vec(),
                }),
                load: r.load,
            });
        }
        table
    }
}

/// Parse a schema document and register every table into a fresh, validated registry.
pub fn parse_schema(content: &str) -> SchemaResult<SchemaRegistry> {
    let file: SchemaFile = toml::from_str(content)?;
    let mut registry = SchemaRegistry::new();
    for entry in file.tables {
        registry.register(entry.into())?;
    }
    registry.validate()?;
    Ok(registry)
}

/// Load and validate a schema file.
pub fn load_schema_file<P: AsRef<Path>>(path: P) -> SchemaResult<SchemaRegistry> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SchemaError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_schema(&content)
}
