//! Table and relation definitions.
//!
//! A [`TableDef`] describes one physical table: its ordered columns, primary key
//! and outgoing relations. Relation targets are table *names*, resolved against a
//! [`SchemaRegistry`] at query-build time, so self-references and forward
//! references need no special handling.
//!
//! ```ignore
//! let employees = TableDef::new("employees")
//!     .primary_key(["id"])
//!     .column(ColumnDef::new("id", ColumnType::Int))
//!     .column(ColumnDef::new("manager_id", ColumnType::Int).nullable())
//!     .column(ColumnDef::new("name", ColumnType::Text))
//!     .relation(RelationDef::belongs_to("manager", "employees", ["manager_id"]));
//! ```

pub mod loader;
pub mod registry;

pub use loader::{load_schema_file, parse_schema};
pub use registry::SchemaRegistry;

use indexmap::IndexMap;
use serde::Deserialize;

// =============================================================================
// Columns
// =============================================================================

/// Column type tag. The query core only uses it to decode executor values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    #[default]
    Text,
    Bool,
    Date,
    Timestamp,
    Json,
}

/// Column pointed at by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    /// SQL default, as written in the schema source.
    pub default: Option<String>,
    pub unique: bool,
    pub references: Option<ColumnRef>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
            unique: false,
            references: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, sql: impl Into<String>) -> Self {
        self.default = Some(sql.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ColumnRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

// =============================================================================
// Relations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Foreign key lives on the source table.
    BelongsTo,
    /// Foreign key lives on the target table; many targets per source.
    HasMany,
    /// Foreign key lives on the target table; at most one target per source.
    HasOne,
    /// Linked through a pivot table holding keys to both sides.
    BelongsToMany,
}

impl RelationKind {
    /// Whether hydration yields an array for this relation.
    pub fn is_to_many(self) -> bool {
        matches!(self, RelationKind::HasMany | RelationKind::BelongsToMany)
    }
}

/// Default loading strategy for a relation when included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// LEFT JOIN in the main query.
    #[default]
    Eager,
    /// Separate batched `IN` query after the main query.
    Lazy,
}

/// Pivot table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotDef {
    pub table: String,
    /// Pivot columns referencing the source table's key.
    pub source_key: Vec<String>,
    /// Pivot columns referencing the target table's key.
    pub target_key: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub kind: RelationKind,
    pub target: String,
    /// BelongsTo: columns on the source. HasOne/HasMany: columns on the target.
    /// Unused for BelongsToMany.
    pub foreign_key: Vec<String>,
    /// Columns the foreign key points at. Empty means the primary key of the
    /// referenced side (target for BelongsTo, source for HasOne/HasMany).
    pub references: Vec<String>,
    pub pivot: Option<PivotDef>,
    pub load: LoadStrategy,
}

fn owned(cols: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    cols.into_iter().map(Into::into).collect()
}

impl RelationDef {
    fn with_kind(
        name: impl Into<String>,
        kind: RelationKind,
        target: impl Into<String>,
        foreign_key: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key,
            references: Vec::new(),
            pivot: None,
            load: LoadStrategy::Eager,
        }
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::with_kind(name, RelationKind::BelongsTo, target, owned(foreign_key))
    }

    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::with_kind(name, RelationKind::HasMany, target, owned(foreign_key))
    }

    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::with_kind(name, RelationKind::HasOne, target, owned(foreign_key))
    }

    pub fn belongs_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        pivot_table: impl Into<String>,
        pivot_source_key: impl IntoIterator<Item = impl Into<String>>,
        pivot_target_key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut rel = Self::with_kind(name, RelationKind::BelongsToMany, target, Vec::new());
        rel.pivot = Some(PivotDef {
            table: pivot_table.into(),
            source_key: owned(pivot_source_key),
            target_key: owned(pivot_target_key),
        });
        rel
    }

    /// Point the foreign key at columns other than the primary key.
    pub fn references(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.references = owned(cols);
        self
    }

    /// Load this relation with a separate query by default.
    pub fn lazy(mut self) -> Self {
        self.load = LoadStrategy::Lazy;
        self
    }
}

// =============================================================================
// Tables
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub schema: Option<String>,
    pub columns: IndexMap<String, ColumnDef>,
    /// Kept as a list so duplicate names can be reported at registration.
    pub relations: Vec<RelationDef>,
    pub primary_key: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: IndexMap::new(),
            relations: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn primary_key(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.primary_key = owned(cols);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}
