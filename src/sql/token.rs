//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings. A [`TokenStream`] can be rendered two ways:
//!
//! - [`TokenStream::compile`] replaces every [`Token::Param`] with the dialect's
//!   placeholder and collects the values, in order, into [`CompiledQuery::params`].
//! - [`TokenStream::serialize`] inlines parameters as literals. Debug output only.

use serde::Serialize;

use super::dialect::{Dialect, SqlDialect};
use super::expr::Literal;

/// SQL Token - every element the builder can emit.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    GroupBy,
    Having,
    OrderBy,
    Asc,
    Desc,
    NullsFirst,
    NullsLast,
    Limit,
    Offset,
    Fetch,
    Next,
    Rows,
    Only,
    Top,
    Case,
    When,
    Then,
    Else,
    End,
    In,
    Like,
    Escape,
    IsNull,
    IsNotNull,
    Distinct,
    Exists,
    Null,
    True,
    False,

    // === DML Keywords ===
    Insert,
    Ignore,
    Into,
    Values,
    Update,
    Set,
    Conflict,
    Do,
    Nothing,
    Duplicate,
    Key,
    Merge,
    Using,
    Matched,
    Excluded,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,
    Semicolon,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Qualified identifier: schema.table or just table
    QualifiedIdent {
        schema: Option<String>,
        name: String,
    },
    /// Integer literal
    LitInt(i64),
    /// Unsigned row count (LIMIT / OFFSET / TOP)
    LitCount(u64),
    /// Float literal
    LitFloat(f64),
    /// String literal
    LitString(String),
    /// Boolean literal
    LitBool(bool),
    /// Date literal (`YYYY-MM-DD`)
    LitDate(String),
    /// Timestamp literal (`YYYY-MM-DD HH:MM:SS`)
    LitTimestamp(String),
    /// NULL literal
    LitNull,

    /// Bound parameter. Compiles to a placeholder; serializes inline for debugging.
    Param(Literal),

    // === Function Names ===
    /// Function name, emitted upper-cased
    FunctionName(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            // Keywords
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::Right => "RIGHT".into(),
            Token::Full => "FULL".into(),
            Token::Outer => "OUTER".into(),
            Token::Cross => "CROSS".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Having => "HAVING".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::NullsFirst => "NULLS FIRST".into(),
            Token::NullsLast => "NULLS LAST".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::Fetch => "FETCH".into(),
            Token::Next => "NEXT".into(),
            Token::Rows => "ROWS".into(),
            Token::Only => "ONLY".into(),
            Token::Top => "TOP".into(),
            Token::Case => "CASE".into(),
            Token::When => "WHEN".into(),
            Token::Then => "THEN".into(),
            Token::Else => "ELSE".into(),
            Token::End => "END".into(),
            Token::In => "IN".into(),
            Token::Like => "LIKE".into(),
            Token::Escape => "ESCAPE".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::Exists => "EXISTS".into(),
            Token::Null => "NULL".into(),
            Token::True => "TRUE".into(),
            Token::False => "FALSE".into(),

            // DML keywords
            Token::Insert => "INSERT".into(),
            Token::Ignore => "IGNORE".into(),
            Token::Into => "INTO".into(),
            Token::Values => "VALUES".into(),
            Token::Update => "UPDATE".into(),
            Token::Set => "SET".into(),
            Token::Conflict => "CONFLICT".into(),
            Token::Do => "DO".into(),
            Token::Nothing => "NOTHING".into(),
            Token::Duplicate => "DUPLICATE".into(),
            Token::Key => "KEY".into(),
            Token::Merge => "MERGE".into(),
            Token::Using => "USING".into(),
            Token::Matched => "MATCHED".into(),
            Token::Excluded => "EXCLUDED".into(),

            // Punctuation
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Semicolon => ";".into(),

            // Operators
            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),

            // Whitespace
            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            // Dynamic - dialect-specific formatting
            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { schema, name } => match schema {
                Some(s) => format!(
                    "{}.{}",
                    dialect.quote_identifier(s),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },
            Token::LitInt(n) => n.to_string(),
            Token::LitCount(n) => n.to_string(),
            Token::LitFloat(f) => format_float(*f, dialect),
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::LitDate(d) => dialect.format_date_literal(d),
            Token::LitTimestamp(ts) => dialect.format_timestamp_literal(ts),
            Token::LitNull => dialect.format_null().into(),

            Token::Param(value) => Token::from(value.clone()).serialize(dialect),

            Token::FunctionName(name) => name.to_uppercase(),
        }
    }
}

impl From<Literal> for Token {
    fn from(lit: Literal) -> Self {
        match lit {
            Literal::Int(n) => Token::LitInt(n),
            Literal::Float(f) => Token::LitFloat(f),
            Literal::String(s) => Token::LitString(s),
            Literal::Bool(b) => Token::LitBool(b),
            Literal::Date(d) => Token::LitDate(d),
            Literal::Timestamp(ts) => Token::LitTimestamp(ts),
            Literal::Null => Token::LitNull,
        }
    }
}

/// Non-finite floats have no SQL numeric spelling; they are emitted as strings
/// the way PostgreSQL spells them.
fn format_float(f: f64, dialect: Dialect) -> String {
    if f.is_nan() {
        return dialect.quote_string("NaN");
    }
    if f.is_infinite() {
        return dialect.quote_string(if f > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let mut buffer = ryu::Buffer::new();
    buffer.format(f).to_string()
}

// =============================================================================
// Compiled Output
// =============================================================================

/// SQL text plus its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Literal>,
}

// =============================================================================
// Token Stream
// =============================================================================

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Serialize all tokens to a SQL string with parameters inlined as literals.
    ///
    /// Never execute the result; use [`TokenStream::compile`] for that.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    /// Render SQL with placeholders and collect the bound parameters.
    ///
    /// Parameters are numbered left to right, so the n-th placeholder in the
    /// SQL text always corresponds to `params[n - 1]`.
    pub fn compile(&self, dialect: Dialect) -> CompiledQuery {
        let mut sql = String::new();
        let mut params = Vec::new();

        for token in &self.tokens {
            match token {
                Token::Param(value) => {
                    params.push(value.clone());
                    sql.push_str(&dialect.placeholder(params.len()));
                }
                other => sql.push_str(&other.serialize(dialect)),
            }
        }

        CompiledQuery { sql, params }
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
