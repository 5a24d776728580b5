//! Collision-free table naming within one statement.
//!
//! The first occurrence of a physical table keeps its bare name. Later
//! occurrences are aliased after the relation they were reached through
//! (`manager`, `assignee`), falling back to `table_2`, `table_3`, ... when that
//! name is already exposed. The exposed-name set spans the whole statement,
//! correlated subqueries and derived tables included.

use std::collections::HashSet;

/// Per-statement alias allocator. Never shared between statements.
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    exposed: HashSet<String>,
    /// `(table, exposed name)` in reservation order.
    reservations: Vec<(String, String)>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an exposed name for one occurrence of `table`.
    ///
    /// `hint` is the relation name the table is joined through, if any.
    pub fn reserve(&mut self, table: &str, hint: Option<&str>) -> String {
        let name = if !self.exposed.contains(table) {
            table.to_string()
        } else {
            match hint {
                Some(h) if !h.is_empty() && !self.exposed.contains(h) => h.to_string(),
                _ => self.numbered(table),
            }
        };

        tracing::trace!(table, exposed = %name, "reserved table name");
        self.exposed.insert(name.clone());
        self.reservations.push((table.to_string(), name.clone()));
        name
    }

    fn numbered(&self, table: &str) -> String {
        (2..)
            .map(|n| format!("{}_{}", table, n))
            .find(|candidate| !self.exposed.contains(candidate))
            .unwrap_or_else(|| table.to_string())
    }

    pub fn is_exposed(&self, name: &str) -> bool {
        self.exposed.contains(name)
    }

    /// Every name reserved for `table`, in order.
    pub fn names_for(&self, table: &str) -> Vec<&str> {
        self.reservations
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, n)| n.as_str())
            .collect()
    }

    /// All reservations, `(table, exposed name)`, in order.
    pub fn reservations(&self) -> &[(String, String)] {
        &self.reservations
    }
}
