//! MySQL / MariaDB dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting
//! - Booleans are TINYINT(1), rendered as 1/0
//! - No FULL OUTER JOIN and no NULLS FIRST/LAST
//! - OFFSET needs a LIMIT; the maximum row count stands in for "no limit"
//! - ON DUPLICATE KEY UPDATE for upserts

use super::helpers;
use super::{SqlDialect, UpsertStyle};
use crate::sql::token::{Token, TokenStream};

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".into()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_with(limit, offset, Some(Token::LitCount(u64::MAX)))
    }

    fn supports_full_outer_join(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnDuplicateKey
    }
}
