//! SQLite FTS5-based search implementation.
//!
//! # Responsibility
//! - Maintain one `blocks_fts` row per block (caller-driven, no triggers).
//! - Provide keyword search over block content.
//!
//! # Invariants
//! - `index_block` replaces any previous entry for the same id.
//! - Result ordering is deterministic by rank, `updated_at` and id.

use crate::db::DbError;
use crate::model::block::Block;
use crate::repo::block_repo::{parse_block_row, JOINED_BLOCK_COLUMNS};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing, DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { .. } => None,
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search options for full-text query behavior.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// User query text.
    pub text: String,
    /// Optional exact block type filter.
    pub kind: Option<String>,
    /// Maximum number of hits to return.
    pub limit: u32,
    /// Whether to pass text directly as raw FTS5 expression.
    ///
    /// Default is `false` so free text never trips FTS5 syntax errors.
    pub raw_fts_syntax: bool,
}

impl SearchQuery {
    /// Creates a query with default limit and no type filter.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            limit: DEFAULT_SEARCH_LIMIT,
            raw_fts_syntax: false,
        }
    }
}

/// Single search hit returned by [`search_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub block: Block,
    /// Content excerpt with matches wrapped in `[` `]`.
    pub snippet: String,
}

/// Writes (or rewrites) the search entry for one block.
pub fn index_block(conn: &Connection, block: &Block) -> SearchResult<()> {
    remove_block(conn, &block.id)?;
    conn.execute(
        "INSERT INTO blocks_fts (id, content, type) VALUES (?1, ?2, ?3);",
        params![block.id, block.content, block.kind],
    )?;
    Ok(())
}

/// Drops the search entry for one block. Missing entries are ignored.
pub fn remove_block(conn: &Connection, id: &str) -> SearchResult<()> {
    conn.execute("DELETE FROM blocks_fts WHERE id = ?1;", [id])?;
    Ok(())
}

/// Searches blocks via FTS5 and returns ranked hits.
///
/// Returns an empty list for blank queries or `limit == 0`.
pub fn search_all(conn: &Connection, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
    let Some(match_expr) = build_match_expression(query) else {
        return Ok(Vec::new());
    };

    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let mut sql = format!(
        "SELECT {JOINED_BLOCK_COLUMNS},
            snippet(blocks_fts, 1, '[', ']', ' ... ', 10) AS snippet
         FROM blocks_fts
         JOIN blocks b ON b.id = blocks_fts.id
         WHERE blocks_fts MATCH ?"
    );
    let mut bind_values: Vec<Value> = vec![Value::Text(match_expr.clone())];

    if let Some(kind) = &query.kind {
        sql.push_str(" AND b.type = ?");
        bind_values.push(Value::Text(kind.clone()));
    }

    sql.push_str(" ORDER BY bm25(blocks_fts), b.updated_at DESC, b.id ASC LIMIT ?");
    bind_values.push(Value::Integer(i64::from(query.limit)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query(params_from_iter(bind_values))
        .map_err(|err| map_query_error(err, &match_expr))?;
    let mut hits = Vec::new();

    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        hits.push(parse_search_hit(row)?);
    }

    Ok(hits)
}

fn parse_search_hit(row: &Row<'_>) -> SearchResult<SearchHit> {
    let block = parse_block_row(row).map_err(|err| SearchError::InvalidData(err.to_string()))?;
    Ok(SearchHit {
        block,
        snippet: row.get("snippet")?,
    })
}

fn build_match_expression(query: &SearchQuery) -> Option<String> {
    let text = query.text.trim();
    if text.is_empty() {
        return None;
    }

    if query.raw_fts_syntax {
        return Some(text.to_string());
    }

    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_match_expression, escape_fts_term, SearchQuery};

    #[test]
    fn terms_are_quoted_and_joined_with_and() {
        let query = SearchQuery::new("  graph  store ");
        assert_eq!(
            build_match_expression(&query).as_deref(),
            Some("\"graph\" AND \"store\"")
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(escape_fts_term("say\"hi"), "\"say\"\"hi\"");
    }

    #[test]
    fn raw_syntax_is_passed_through_trimmed() {
        let mut query = SearchQuery::new(" alpha OR beta ");
        query.raw_fts_syntax = true;
        assert_eq!(
            build_match_expression(&query).as_deref(),
            Some("alpha OR beta")
        );
    }

    #[test]
    fn blank_text_builds_no_expression() {
        assert!(build_match_expression(&SearchQuery::new(" \t ")).is_none());
    }
}
