// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Known schema and statement safety validation for the Pika gateway.
//!
//! Nothing reaches a database unless [`Validator::validate`] accepted it:
//! executors only take a [`ValidatedStatement`], which has no public
//! constructor.

pub mod lexer;
pub mod schema;
pub mod validator;

use sha2::{Digest, Sha256};

pub use lexer::{LexError, Token, TokenKind, count_statements, tokenize};
pub use schema::{CatalogProduct, Column, KnownSchema, Relation, RelationKind, catalog};
pub use validator::{StatementKind, ValidatedStatement, ValidationError, Validator};

/// Short, stable fingerprint of a statement for audit logs.
///
/// Rejected candidates are logged by fingerprint and length only, never by
/// content.
pub fn fingerprint(statement: &str) -> String {
    let digest = Sha256::digest(statement.as_bytes());
    hex::encode(&digest[..8])
}
