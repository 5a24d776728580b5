//! SQLite dialect.
//!
//! SQLite differences from ANSI:
//! - Double-quote identifiers, `?` parameters
//! - No boolean type; 1/0
//! - Dates are plain TEXT, so date literals are bare strings
//! - No RIGHT or FULL OUTER JOIN (before 3.39)
//! - OFFSET needs a LIMIT; `LIMIT -1` means unbounded

use super::helpers;
use super::SqlDialect;
use crate::sql::token::{Token, TokenStream};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
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

    fn placeholder(&self, _index: usize) -> String {
        "?".into()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_with(limit, offset, Some(Token::LitInt(-1)))
    }

    fn supports_full_outer_join(&self) -> bool {
        false
    }

    fn supports_right_join(&self) -> bool {
        false
    }
}
