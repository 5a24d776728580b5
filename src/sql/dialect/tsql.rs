//! T-SQL (SQL Server / Azure SQL) dialect.
//!
//! T-SQL has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - No native boolean literal; BIT 1/0
//! - Named parameters `@p1`, `@p2`, ...
//! - TOP for simple limiting, OFFSET FETCH for pagination (requires ORDER BY)
//! - N'...' prefix for Unicode strings
//! - MERGE for upserts

use super::helpers;
use super::{SqlDialect, UpsertStyle};
use crate::sql::token::{Token, TokenStream};

/// T-SQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        helpers::quote_string_single(date)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        helpers::quote_string_single(ts)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_tsql(limit, offset)
    }

    fn emit_top(&self, limit: Option<u64>, offset: Option<u64>) -> Option<TokenStream> {
        match (limit, offset) {
            (Some(n), None) => {
                let mut ts = TokenStream::new();
                ts.push(Token::Top).space().push(Token::LitCount(n));
                Some(ts)
            }
            _ => None,
        }
    }

    fn requires_order_by_for_offset(&self) -> bool {
        true
    }

    fn supports_nulls_ordering(&self) -> bool {
        // NULLS FIRST/LAST is not available before SQL Server 2022
        false
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::Merge
    }
}
