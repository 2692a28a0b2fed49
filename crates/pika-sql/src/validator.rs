// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statement safety validator.
//!
//! A candidate statement is accepted only if every rule below passes, in
//! this order; the first failing rule is the rejection reason.
//!
//! 1. At most one terminator, and nothing after it.
//! 2. The leading verb is `SELECT`, `INSERT` or `UPDATE` (allow-list), and a
//!    `SELECT` does not create a table with `INTO`.
//! 3. No denylisted keyword anywhere outside string literals, comment
//!    bodies included.
//! 4. The statement parses, references at least one relation, and every
//!    relation it references is in the known schema. Views are never a
//!    write target.
//! 5. No comment markers.
//! 6. The parsed statement is exactly one statement of the kind the leading
//!    verb announced.
//!
//! Rules 1-3 and 5 run on the token stream from [`crate::lexer`]; rules 4
//! and 6 run on the `sqlparser` syntax tree.

use std::ops::ControlFlow;

use sqlparser::ast::{ObjectName, Statement, visit_relations};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::lexer::{self, LexError, Token, TokenKind};
use crate::schema::{KnownSchema, RelationKind};

/// Destructive or administrative keywords that may not appear anywhere.
const DENYLISTED_KEYWORDS: &[&str] = &[
    "ALTER",
    "ATTACH",
    "CALL",
    "CLUSTER",
    "COPY",
    "CREATE",
    "DBLINK",
    "DELETE",
    "DETACH",
    "DISCARD",
    "DROP",
    "EXEC",
    "EXECUTE",
    "GRANT",
    "IMPORT",
    "LISTEN",
    "LOAD_EXTENSION",
    "LOCK",
    "MERGE",
    "NOTIFY",
    "PRAGMA",
    "REASSIGN",
    "REFRESH",
    "REINDEX",
    "REVOKE",
    "SET_CONFIG",
    "SHUTDOWN",
    "TRUNCATE",
    "VACUUM",
];

/// Server-function namespaces (`pg_sleep`, `pg_read_file`, `lo_import`, ...).
const DENYLISTED_PREFIXES: &[&str] = &["PG_", "LO_"];

/// The statement kinds the validator can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
}

impl StatementKind {
    /// Inserts and updates change rows; selects do not.
    pub fn is_write(self) -> bool {
        !matches!(self, StatementKind::Select)
    }
}

/// Why a candidate statement was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty statement")]
    Empty,

    #[error("statement cannot be tokenized: {0}")]
    Lex(#[from] LexError),

    #[error("more than one statement")]
    MultipleStatements,

    #[error("leading verb `{verb}` is not allowed")]
    VerbNotAllowed { verb: String },

    #[error("SELECT ... INTO is not allowed")]
    SelectInto,

    #[error("denylisted keyword `{keyword}`")]
    DenylistedKeyword { keyword: String },

    #[error("statement does not parse")]
    Unparseable,

    #[error("statement references no known relation")]
    NoRelation,

    #[error("unknown relation `{relation}`")]
    UnknownRelation { relation: String },

    #[error("view `{view}` is read-only")]
    ReadOnlyView { view: String },

    #[error("statement contains a comment")]
    Comment,

    #[error("parsed statement does not match its leading verb")]
    StructureMismatch,
}

impl ValidationError {
    /// Stable reason code for audit logs.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Empty => "empty",
            ValidationError::Lex(_) => "unterminated_literal",
            ValidationError::MultipleStatements => "multiple_statements",
            ValidationError::VerbNotAllowed { .. } => "verb_not_allowed",
            ValidationError::SelectInto => "select_into",
            ValidationError::DenylistedKeyword { .. } => "denylisted_keyword",
            ValidationError::Unparseable => "unparseable",
            ValidationError::NoRelation => "no_relation",
            ValidationError::UnknownRelation { .. } => "unknown_relation",
            ValidationError::ReadOnlyView { .. } => "read_only_view",
            ValidationError::Comment => "comment",
            ValidationError::StructureMismatch => "structure_mismatch",
        }
    }
}

/// A statement that passed every rule.
///
/// There is no public constructor: the only way to obtain one is
/// [`Validator::validate`], and the executor accepts nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedStatement {
    sql: String,
    kind: StatementKind,
    relations: Vec<String>,
}

impl ValidatedStatement {
    /// The statement text, trimmed and without its trailing terminator.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Relations the statement references, in first-seen order.
    pub fn relations(&self) -> &[String] {
        &self.relations
    }
}

/// Deterministic, stateless statement validator over a known schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    schema: KnownSchema,
}

impl Validator {
    pub const fn new(schema: KnownSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &KnownSchema {
        &self.schema
    }

    /// Accepts `candidate` with its normalized form, or rejects it with the
    /// first rule it breaks.
    pub fn validate(&self, candidate: &str) -> Result<ValidatedStatement, ValidationError> {
        let sql = candidate.trim();
        let tokens = lexer::tokenize(sql)?;

        let body_len = single_statement_body(&tokens)?;
        let body = &tokens[..body_len];

        let kind = leading_verb(body)?;
        check_denylist(body)?;

        let statement = parse_single(sql)?;
        let relations = self.check_relations(&statement, body, kind)?;

        if body.iter().any(|t| t.kind == TokenKind::Comment) {
            return Err(ValidationError::Comment);
        }

        check_structure(&statement, kind)?;

        let normalized = match tokens.get(body_len) {
            Some(terminator) => sql[..terminator.offset].trim_end(),
            None => sql,
        };

        Ok(ValidatedStatement {
            sql: normalized.to_string(),
            kind,
            relations,
        })
    }

    fn check_relations(
        &self,
        statement: &Statement,
        body: &[Token<'_>],
        kind: StatementKind,
    ) -> Result<Vec<String>, ValidationError> {
        let mut relations: Vec<String> = Vec::new();
        let mut unknown = None;

        let _ = visit_relations(statement, |name: &ObjectName| {
            let rendered = relation_name(name);
            if self.schema.relation(&rendered).is_none() {
                unknown = Some(rendered);
                return ControlFlow::Break(());
            }
            if !relations.contains(&rendered) {
                relations.push(rendered);
            }
            ControlFlow::Continue(())
        });

        if let Some(relation) = unknown {
            return Err(ValidationError::UnknownRelation { relation });
        }
        if relations.is_empty() {
            return Err(ValidationError::NoRelation);
        }

        if kind.is_write()
            && let Some(target) = write_target(body, kind)
            && let Some(relation) = self.schema.relation(&target)
            && relation.kind == RelationKind::View
        {
            return Err(ValidationError::ReadOnlyView { view: target });
        }

        Ok(relations)
    }
}

/// Rule 1. Returns the number of tokens before the (optional) trailing
/// terminator.
fn single_statement_body(tokens: &[Token<'_>]) -> Result<usize, ValidationError> {
    let first = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Terminator);
    match first {
        None => Ok(tokens.len()),
        Some(i) if i + 1 == tokens.len() => Ok(i),
        Some(_) => Err(ValidationError::MultipleStatements),
    }
}

/// Rule 2. Leading comments are skipped here and rejected by rule 5.
fn leading_verb(body: &[Token<'_>]) -> Result<StatementKind, ValidationError> {
    let first = body
        .iter()
        .find(|t| t.kind != TokenKind::Comment)
        .ok_or(ValidationError::Empty)?;

    let kind = match first.kind {
        TokenKind::Word => first.text.parse::<StatementKind>().map_err(|_| {
            ValidationError::VerbNotAllowed {
                verb: first.text.chars().take(32).collect::<String>().to_uppercase(),
            }
        })?,
        _ => {
            return Err(ValidationError::VerbNotAllowed {
                verb: "<symbol>".to_string(),
            });
        }
    };

    if kind == StatementKind::Select && body.iter().any(|t| t.is_word("INTO")) {
        return Err(ValidationError::SelectInto);
    }
    Ok(kind)
}

/// Rule 3.
fn check_denylist(body: &[Token<'_>]) -> Result<(), ValidationError> {
    for token in body {
        match token.kind {
            TokenKind::Word | TokenKind::QuotedIdent => {
                if let Some(word) = token.identifier() {
                    deny_word(&word)?;
                }
            }
            TokenKind::Comment => {
                for word in token
                    .text
                    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                {
                    deny_word(word)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn deny_word(word: &str) -> Result<(), ValidationError> {
    let upper = word.to_uppercase();
    if DENYLISTED_KEYWORDS.contains(&upper.as_str())
        || DENYLISTED_PREFIXES.iter().any(|p| upper.starts_with(p))
    {
        return Err(ValidationError::DenylistedKeyword { keyword: upper });
    }
    Ok(())
}

fn parse_single(sql: &str) -> Result<Statement, ValidationError> {
    let mut statements =
        Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|_| ValidationError::Unparseable)?;
    if statements.len() != 1 {
        return Err(ValidationError::MultipleStatements);
    }
    Ok(statements.remove(0))
}

/// Rule 6.
fn check_structure(statement: &Statement, kind: StatementKind) -> Result<(), ValidationError> {
    let matches = match (kind, statement) {
        (StatementKind::Select, Statement::Query(_)) => true,
        (StatementKind::Insert, Statement::Insert(_)) => true,
        (StatementKind::Update, Statement::Update { .. }) => true,
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(ValidationError::StructureMismatch)
    }
}

/// The relation an INSERT or UPDATE writes to, read from the token stream.
fn write_target(body: &[Token<'_>], kind: StatementKind) -> Option<String> {
    let mut tokens = body.iter().filter(|t| t.kind != TokenKind::Comment).skip(1);
    let mut next = tokens.next()?;
    match kind {
        StatementKind::Insert => {
            if !next.is_word("INTO") {
                return None;
            }
            next = tokens.next()?;
        }
        StatementKind::Update => {
            if next.is_word("ONLY") {
                next = tokens.next()?;
            }
        }
        StatementKind::Select => return None,
    }
    next.identifier()
}

/// Renders a possibly-qualified name the way the schema spells it:
/// bare identifiers fold to lowercase, quoted ones keep their case.
fn relation_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| {
            if ident.quote_style.is_some() {
                ident.value.clone()
            } else {
                ident.value.to_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
