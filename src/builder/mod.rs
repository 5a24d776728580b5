//! Select query builder.
//!
//! A [`SelectBuilder`] accumulates columns, filters, includes, ordering and
//! paging against one root table. Every method consumes the builder and
//! returns the new state, so a builder that has been cloned for one query is
//! never changed by another.
//!
//! Building allocates every table occurrence through a single
//! [`AliasRegistry`]: the root first, then include joins depth-first in request
//! order, then the joins and correlated subqueries of each filter. The same
//! input therefore always yields the same SQL.

mod output;
mod page;
mod request;

pub use output::QueryOutput;
pub use page::{Page, Pagination};
pub use request::{OrderRequest, QueryRequest};

use crate::error::{ExecutorError, QueryError, QueryResult};
use crate::executor::{Executor, Row, Session};
use crate::filter::Filter;
use crate::hydrate::hydrate;
use crate::relation::{
    key_link, table_ref, AliasRegistry, ColumnAliasPlan, Include, IncludeTree,
    RelationFilterTranslator, RelationResolver,
};
use crate::schema::{LoadStrategy, SchemaRegistry, TableDef};
use crate::sql::{
    count_distinct, count_star, exists, lit_int, table_col, CompiledQuery, Dialect, ExprExt,
    LimitOffset, NullsOrder, OrderByExpr, Query, SortDir, TableRef,
};

/// Exposed name of the derived table holding one page of root keys.
const PAGE_KEYS: &str = "page_keys";

/// An ordering term: `column` or `relation.path.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub path: String,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

impl OrderSpec {
    fn split(&self) -> (Vec<&str>, &str) {
        match self.path.rsplit_once('.') {
            Some((relations, column)) => (relations.split('.').collect(), column),
            None => (Vec::new(), self.path.as_str()),
        }
    }
}

/// A built statement and the plan for reshaping its rows.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub query: Query,
    pub plan: ColumnAliasPlan,
}

struct Assembled {
    query: Query,
    plan: ColumnAliasPlan,
}

#[derive(Debug, Clone)]
pub struct SelectBuilder<'a> {
    registry: &'a SchemaRegistry,
    table: &'a TableDef,
    columns: Option<Vec<String>>,
    filters: Vec<Filter>,
    includes: IncludeTree,
    order: Vec<OrderSpec>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<'a> SelectBuilder<'a> {
    /// Start a query on `table`.
    pub fn new(registry: &'a SchemaRegistry, table: &str) -> QueryResult<Self> {
        Ok(Self {
            registry,
            table: registry.table(table)?,
            columns: None,
            filters: Vec::new(),
            includes: IncludeTree::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        })
    }

    pub fn table(&self) -> &'a TableDef {
        self.table
    }

    /// Restrict the root's columns. Primary-key columns are always selected.
    #[must_use]
    pub fn select(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add a filter; multiple filters are ANDed.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn include(mut self, include: Include) -> Self {
        self.includes.push(include);
        self
    }

    #[must_use]
    pub fn include_tree(mut self, tree: IncludeTree) -> Self {
        for include in tree.iter() {
            self.includes.push(include.clone());
        }
        self
    }

    /// Order by a root column or a column of an included to-one or to-many
    /// relation, e.g. `"manager.name"`.
    #[must_use]
    pub fn order_by(self, path: impl Into<String>, dir: SortDir) -> Self {
        self.order_by_nulls(path, dir, None)
    }

    #[must_use]
    pub fn order_by_nulls(
        mut self,
        path: impl Into<String>,
        dir: SortDir,
        nulls: Option<NullsOrder>,
    ) -> Self {
        self.order.push(OrderSpec {
            path: path.into(),
            dir,
            nulls,
        });
        self
    }

    /// Limit the number of roots returned.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip this many roots.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Build the statement and its column plan.
    pub fn build(&self) -> QueryResult<BuiltQuery> {
        let mut aliases = AliasRegistry::new();
        let Assembled { mut query, plan } = self.assemble(&mut aliases, &self.includes)?;
        query.select = plan.select_list();
        let order = self.order_exprs(&plan)?;

        let paged = self.limit.is_some() || self.offset.is_some();
        if paged && plan.has_to_many() {
            let restriction = self.page_restriction(&plan, &mut aliases)?;
            query = query.filter(restriction);
            query.order_by = order;
        } else {
            query.order_by = order;
            if paged {
                query.limit_offset = Some(LimitOffset {
                    limit: self.limit,
                    offset: self.offset,
                });
            }
        }

        debug_assert!(
            query.unresolved_references().is_empty(),
            "unresolved references: {:?}",
            query.unresolved_references()
        );
        tracing::trace!(
            table = %self.table.name,
            joins = query.joins.len(),
            aliases = aliases.reservations().len(),
            "built select"
        );
        Ok(BuiltQuery { query, plan })
    }

    pub fn compile(&self, dialect: Dialect) -> QueryResult<CompiledQuery> {
        self.build()?.query.compile(dialect)
    }

    /// SQL with parameters inlined. For logs only.
    pub fn to_sql(&self, dialect: Dialect) -> QueryResult<String> {
        self.build()?.query.to_sql(dialect)
    }

    /// Root, includes and filters, with the root reserved first.
    fn assemble(
        &self,
        aliases: &mut AliasRegistry,
        includes: &IncludeTree,
    ) -> QueryResult<Assembled> {
        let root_alias = aliases.reserve(&self.table.name, None);
        let resolution = RelationResolver::new(self.registry).resolve(
            self.table,
            &root_alias,
            self.columns.as_deref(),
            includes,
            aliases,
        )?;

        let mut query = Query::new().from(table_ref(self.table, &root_alias));
        query.joins = resolution.joins;

        let translator = RelationFilterTranslator::new(self.registry);
        for filter in &self.filters {
            let translation = translator.translate(self.table, &root_alias, filter, aliases)?;
            query.joins.extend(translation.joins);
            if let Some(predicate) = translation.predicate {
                query = query.filter(predicate);
            }
        }

        Ok(Assembled {
            query,
            plan: resolution.plan,
        })
    }

    fn order_exprs(&self, plan: &ColumnAliasPlan) -> QueryResult<Vec<OrderByExpr>> {
        self.order
            .iter()
            .map(|spec| {
                let (relations, column) = spec.split();
                let mut table = self.table;
                for name in &relations {
                    let (_, keys) = self.registry.relation(table, name)?;
                    table = keys.target();
                }
                if !table.has_column(column) {
                    return Err(QueryError::UnknownColumn {
                        table: table.name.clone(),
                        column: column.to_string(),
                    });
                }
                let projection = plan.find(&relations).ok_or_else(|| {
                    QueryError::InvalidQuery(format!(
                        "cannot order by '{}': relation '{}' is not eagerly included",
                        spec.path,
                        relations.join(".")
                    ))
                })?;
                Ok(OrderByExpr {
                    expr: table_col(&projection.alias, column),
                    dir: Some(spec.dir),
                    nulls: spec.nulls,
                })
            })
            .collect()
    }

    /// Predicate keeping only the roots of the requested page.
    ///
    /// The page is cut from a keys-only statement that joins nothing that fans
    /// out, so LIMIT/OFFSET count roots rather than joined rows.
    fn page_restriction(
        &self,
        plan: &ColumnAliasPlan,
        aliases: &mut AliasRegistry,
    ) -> QueryResult<crate::sql::Expr> {
        let pk = &self.table.primary_key;
        if pk.is_empty() {
            return Err(QueryError::MissingPrimaryKey {
                table: self.table.name.clone(),
            });
        }
        for spec in &self.order {
            let (relations, _) = spec.split();
            if !plan.is_to_one_path(&relations) {
                return Err(QueryError::InvalidQuery(format!(
                    "cannot order a paged query by '{}' across a to-many relation",
                    spec.path
                )));
            }
        }

        let to_one = self.to_one_includes(self.table, &self.includes)?;
        let Assembled {
            query: keys,
            plan: keys_plan,
        } = self.assemble(aliases, &to_one)?;
        let keys_alias = keys_plan.root.alias.clone();

        let mut order = self.order_exprs(&keys_plan)?;
        for column in pk {
            let expr = table_col(&keys_alias, column);
            if !order.iter().any(|o| o.expr == expr) {
                order.push(OrderByExpr::asc(expr));
            }
        }
        let mut keys = keys
            .select(
                pk.iter()
                    .map(|c| table_col(&keys_alias, c).alias(c))
                    .collect::<Vec<_>>(),
            )
            .order_by(order);
        keys.limit_offset = Some(LimitOffset {
            limit: self.limit,
            offset: self.offset,
        });

        let page_alias = aliases.reserve(PAGE_KEYS, None);
        let root_alias = &plan.root.alias;
        let restriction = match pk.as_slice() {
            [column] => table_col(root_alias, column).in_subquery(
                Query::new()
                    .select(vec![table_col(&page_alias, column)])
                    .from(TableRef::derived(keys, &page_alias)),
            ),
            columns => {
                let pairs: Vec<(String, String)> =
                    columns.iter().map(|c| (c.clone(), c.clone())).collect();
                exists(
                    Query::new()
                        .select(vec![lit_int(1)])
                        .from(TableRef::derived(keys, &page_alias))
                        .filter(key_link(&page_alias, root_alias, &pairs)),
                )
            }
        };
        Ok(restriction)
    }

    /// Eager to-one includes of `tree`, recursively. Joining these cannot add rows.
    fn to_one_includes(&self, table: &TableDef, tree: &IncludeTree) -> QueryResult<IncludeTree> {
        let mut out = IncludeTree::new();
        for include in tree {
            let (rel, keys) = self.registry.relation(table, &include.relation)?;
            let lazy = include.lazy.unwrap_or(rel.load == LoadStrategy::Lazy);
            if lazy || rel.kind.is_to_many() {
                continue;
            }
            let mut pruned = include.clone();
            pruned.include = self.to_one_includes(keys.target(), &include.include)?;
            out.push(pruned);
        }
        Ok(out)
    }

    // =========================================================================
    // Counting
    // =========================================================================

    /// Statement counting distinct matching roots; includes are ignored.
    pub fn count_query(&self) -> QueryResult<Query> {
        let mut aliases = AliasRegistry::new();
        let Assembled { query, plan } = self.assemble(&mut aliases, &IncludeTree::new())?;
        let root = plan.root.alias.as_str();

        let query = match self.table.primary_key.as_slice() {
            [] => query.select(vec![count_star().alias("count")]),
            [pk] => query.select(vec![count_distinct(table_col(root, pk)).alias("count")]),
            pks => {
                let keys = query
                    .select(pks.iter().map(|c| table_col(root, c)).collect::<Vec<_>>())
                    .distinct();
                let counted = aliases.reserve("counted", None);
                Query::new()
                    .select(vec![count_star().alias("count")])
                    .from(TableRef::derived(keys, &counted))
            }
        };
        Ok(query)
    }

    /// Number of distinct roots matching the filters.
    pub async fn count<E: Executor>(&self, session: &Session<E>) -> QueryResult<u64> {
        let compiled = self.count_query()?.compile(session.dialect())?;
        let rows = session.run(&compiled).await?;
        read_count(&rows)
    }

    /// Number of rows the full joined statement returns.
    pub async fn count_rows<E: Executor>(&self, session: &Session<E>) -> QueryResult<u64> {
        let compiled = self.compile(session.dialect())?;
        Ok(session.run(&compiled).await?.len() as u64)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run the statement and hydrate its rows. Lazy relations stay as
    /// placeholders until [`QueryOutput::load_all`].
    pub async fn execute<E: Executor>(&self, session: &Session<E>) -> QueryResult<QueryOutput<'a>> {
        let BuiltQuery { query, plan } = self.build()?;
        let compiled = query.compile(session.dialect())?;
        let rows = session.run(&compiled).await?;
        let items = hydrate(&plan, &rows);
        Ok(QueryOutput::new(self.registry, plan, items))
    }

    /// One page of roots plus the distinct-root total.
    pub async fn execute_paged<E: Executor>(
        &self,
        session: &Session<E>,
        pagination: Pagination,
    ) -> QueryResult<Page<'a>> {
        if pagination.page_size == 0 {
            return Err(QueryError::InvalidQuery("page size must be at least 1".into()));
        }
        let total = self.count(session).await?;
        let items = self
            .clone()
            .limit(pagination.page_size)
            .offset(pagination.offset())
            .execute(session)
            .await?;
        Ok(Page::new(items, total, pagination))
    }
}

fn read_count(rows: &[Row]) -> QueryResult<u64> {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
        .ok_or_else(|| {
            QueryError::Executor(ExecutorError::Database(
                "count query returned no count".into(),
            ))
        })
}
