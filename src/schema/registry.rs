//! Explicit table registry.
//!
//! There is no global instance: whoever bootstraps the application (or a test)
//! owns the registry and hands `&SchemaRegistry` to query builders.

use indexmap::IndexMap;

use super::{RelationDef, RelationKind, TableDef};
use crate::error::{QueryError, QueryResult, SchemaError, SchemaResult};

/// Column pairs linking two tables, `(left column, right column)`.
pub type KeyPairs = Vec<(String, String)>;

/// How a relation's target is reached from its source.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationKeys<'a> {
    /// `(target column, source column)` pairs.
    Direct { target: &'a TableDef, pairs: KeyPairs },
    /// Through a pivot: `(pivot column, source column)` then `(target column, pivot column)`.
    Pivot {
        pivot: &'a TableDef,
        target: &'a TableDef,
        source_pairs: KeyPairs,
        target_pairs: KeyPairs,
    },
}

impl<'a> RelationKeys<'a> {
    pub fn target(&self) -> &'a TableDef {
        match self {
            RelationKeys::Direct { target, .. } | RelationKeys::Pivot { target, .. } => target,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: IndexMap<String, TableDef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. Relation targets are not checked here; see [`SchemaRegistry::validate`].
    pub fn register(&mut self, table: TableDef) -> SchemaResult<()> {
        if self.tables.contains_key(&table.name) {
            return Err(SchemaError::DuplicateTable(table.name));
        }
        for (i, rel) in table.relations.iter().enumerate() {
            if table.relations[..i].iter().any(|r| r.name == rel.name) {
                return Err(SchemaError::DuplicateRelation {
                    table: table.name.clone(),
                    relation: rel.name.clone(),
                });
            }
        }
        tracing::trace!(table = %table.name, relations = table.relations.len(), "registered table");
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Like [`SchemaRegistry::get`], as a query error.
    pub fn table(&self, name: &str) -> QueryResult<&TableDef> {
        self.get(name)
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))
    }

    /// All tables in registration order.
    pub fn get_all(&self) -> Vec<&TableDef> {
        self.tables.values().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Look up `source.relation` and its join keys.
    pub fn relation<'a>(
        &'a self,
        source: &'a TableDef,
        relation: &str,
    ) -> QueryResult<(&'a RelationDef, RelationKeys<'a>)> {
        let rel = source
            .get_relation(relation)
            .ok_or_else(|| QueryError::UnknownRelation {
                table: source.name.clone(),
                relation: relation.to_string(),
            })?;
        let keys = self.relation_keys(source, rel)?;
        Ok((rel, keys))
    }

    /// Resolve the key columns of `rel`, defaulting to primary keys where unspecified.
    pub fn relation_keys<'a>(
        &'a self,
        source: &'a TableDef,
        rel: &RelationDef,
    ) -> SchemaResult<RelationKeys<'a>> {
        let unknown_target = |target: &str| SchemaError::UnknownTarget {
            table: source.name.clone(),
            relation: rel.name.clone(),
            target: target.to_string(),
        };
        let target = self
            .tables
            .get(&rel.target)
            .ok_or_else(|| unknown_target(&rel.target))?;

        match rel.kind {
            RelationKind::BelongsTo => {
                let referenced = key_or_pk(&rel.references, target, source, rel)?;
                let pairs = zip_keys(&referenced, &rel.foreign_key, source, rel)?;
                Ok(RelationKeys::Direct { target, pairs })
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                let referenced = key_or_pk(&rel.references, source, source, rel)?;
                let pairs = zip_keys(&rel.foreign_key, &referenced, source, rel)?;
                Ok(RelationKeys::Direct { target, pairs })
            }
            RelationKind::BelongsToMany => {
                let pivot_def = rel.pivot.as_ref().ok_or_else(|| SchemaError::InvalidRelation {
                    table: source.name.clone(),
                    relation: rel.name.clone(),
                    message: "many-to-many relation needs a pivot".into(),
                })?;
                let pivot = self
                    .tables
                    .get(&pivot_def.table)
                    .ok_or_else(|| unknown_target(&pivot_def.table))?;
                let source_pk = key_or_pk(&[], source, source, rel)?;
                let target_pk = key_or_pk(&rel.references, target, source, rel)?;
                Ok(RelationKeys::Pivot {
                    pivot,
                    target,
                    source_pairs: zip_keys(&pivot_def.source_key, &source_pk, source, rel)?,
                    target_pairs: zip_keys(&target_pk, &pivot_def.target_key, source, rel)?,
                })
            }
        }
    }

    /// Check every relation target, key column and primary key.
    pub fn validate(&self) -> SchemaResult<()> {
        for table in self.tables.values() {
            for pk in &table.primary_key {
                check_column(table, pk, &format!("{}.primary_key", table.name))?;
            }
            for rel in &table.relations {
                let context = format!("{}.{}", table.name, rel.name);
                match self.relation_keys(table, rel)? {
                    RelationKeys::Direct { target, pairs } => {
                        let (target_side, source_side) = (target, table);
                        for (t, s) in &pairs {
                            check_column(target_side, t, &context)?;
                            check_column(source_side, s, &context)?;
                        }
                    }
                    RelationKeys::Pivot {
                        pivot,
                        target,
                        source_pairs,
                        target_pairs,
                    } => {
                        for (p, s) in &source_pairs {
                            check_column(pivot, p, &context)?;
                            check_column(table, s, &context)?;
                        }
                        for (t, p) in &target_pairs {
                            check_column(target, t, &context)?;
                            check_column(pivot, p, &context)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_column(table: &TableDef, column: &str, context: &str) -> SchemaResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(SchemaError::UnknownKeyColumn {
            context: context.to_string(),
            table: table.name.clone(),
            column: column.to_string(),
        })
    }
}

fn key_or_pk(
    explicit: &[String],
    table: &TableDef,
    source: &TableDef,
    rel: &RelationDef,
) -> SchemaResult<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    if table.primary_key.is_empty() {
        return Err(SchemaError::InvalidRelation {
            table: source.name.clone(),
            relation: rel.name.clone(),
            message: format!("'{}' has no primary key to reference", table.name),
        });
    }
    Ok(table.primary_key.clone())
}

fn zip_keys(
    left: &[String],
    right: &[String],
    source: &TableDef,
    rel: &RelationDef,
) -> SchemaResult<KeyPairs> {
    if left.is_empty() || left.len() != right.len() {
        return Err(SchemaError::InvalidRelation {
            table: source.name.clone(),
            relation: rel.name.clone(),
            message: format!(
                "key column count mismatch ({} vs {})",
                left.len(),
                right.len()
            ),
        });
    }
    Ok(left.iter().cloned().zip(right.iter().cloned()).collect())
}
