// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A small SQL lexer that knows where literals, quoted identifiers, and
//! comments start and end.
//!
//! Every keyword-level rule in the validator works on this token stream
//! instead of on the raw text, so text inside a string literal can never
//! look like a keyword, a terminator, or a comment marker.

use thiserror::Error;

/// The kinds of token the validator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare keyword or identifier.
    Word,
    /// `"quoted identifier"`.
    QuotedIdent,
    /// `'text'`, `E'text'`, or `$tag$text$tag$`.
    StringLiteral,
    Number,
    /// `;`
    Terminator,
    /// `-- line` or `/* block */`, including its body.
    Comment,
    /// Any other single character (operators, punctuation).
    Symbol,
}

/// One token, borrowing its text from the source statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token in the source.
    pub offset: usize,
}

impl Token<'_> {
    /// Case-insensitive keyword match on a bare word.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    /// The identifier this token names, if it is one. Bare words fold to
    /// lowercase; quoted identifiers keep their case.
    pub fn identifier(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text.to_lowercase()),
            TokenKind::QuotedIdent => {
                let inner = &self.text[1..self.text.len() - 1];
                Some(inner.replace("\"\"", "\""))
            }
            _ => None,
        }
    }
}

/// Statements the lexer cannot delimit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal at byte {0}")]
    UnterminatedString(usize),

    #[error("unterminated quoted identifier at byte {0}")]
    UnterminatedIdentifier(usize),

    #[error("unterminated dollar-quoted string at byte {0}")]
    UnterminatedDollarQuote(usize),
}

/// Splits `sql` into tokens, skipping whitespace.
pub fn tokenize(sql: &str) -> Result<Vec<Token<'_>>, LexError> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = sql[pos..].chars().next() {
        let start = pos;
        let kind = match c {
            c if c.is_whitespace() => {
                pos += c.len_utf8();
                continue;
            }
            ';' => {
                pos += 1;
                TokenKind::Terminator
            }
            '\'' => {
                pos = scan_quoted(bytes, pos, b'\'', false)
                    .ok_or(LexError::UnterminatedString(start))?;
                TokenKind::StringLiteral
            }
            '"' => {
                pos = scan_quoted(bytes, pos, b'"', false)
                    .ok_or(LexError::UnterminatedIdentifier(start))?;
                TokenKind::QuotedIdent
            }
            '-' if bytes.get(pos + 1) == Some(&b'-') => {
                pos = sql[pos..].find('\n').map_or(sql.len(), |i| pos + i);
                TokenKind::Comment
            }
            '/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = scan_block_comment(bytes, pos);
                TokenKind::Comment
            }
            '$' => match dollar_tag_end(bytes, pos) {
                Some(tag_end) => {
                    let tag = &sql[pos..tag_end];
                    let close = sql[tag_end..]
                        .find(tag)
                        .ok_or(LexError::UnterminatedDollarQuote(start))?;
                    pos = tag_end + close + tag.len();
                    TokenKind::StringLiteral
                }
                None => {
                    pos += 1;
                    TokenKind::Symbol
                }
            },
            c if c.is_ascii_digit() => {
                pos = scan_number(bytes, pos);
                TokenKind::Number
            }
            c if c == '_' || c.is_alphabetic() => {
                let word_end = scan_while(sql, pos, |c| c.is_alphanumeric() || c == '_' || c == '$');
                // Prefixed literals: E'..' (backslash escapes), X'..', B'..', N'..'.
                if word_end == pos + 1 && bytes.get(word_end) == Some(&b'\'') {
                    let escapes = matches!(c, 'e' | 'E');
                    pos = scan_quoted(bytes, word_end, b'\'', escapes)
                        .ok_or(LexError::UnterminatedString(start))?;
                    TokenKind::StringLiteral
                } else {
                    pos = word_end;
                    TokenKind::Word
                }
            }
            c => {
                pos += c.len_utf8();
                TokenKind::Symbol
            }
        };

        tokens.push(Token {
            kind,
            text: &sql[start..pos],
            offset: start,
        });
    }

    Ok(tokens)
}

/// Counts the non-empty statements in `sql`.
///
/// A segment between terminators that holds only comments does not count,
/// so `SELECT 1;` and `SELECT 1; -- done` are both one statement.
pub fn count_statements(sql: &str) -> Result<usize, LexError> {
    let tokens = tokenize(sql)?;
    let count = tokens
        .split(|t| t.kind == TokenKind::Terminator)
        .filter(|segment| segment.iter().any(|t| t.kind != TokenKind::Comment))
        .count();
    Ok(count)
}

/// Returns the position just past the closing quote, or `None` when the
/// quote never closes. A doubled quote is an escaped quote.
fn scan_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Block comments nest in PostgreSQL. An unterminated comment runs to the end.
fn scan_block_comment(bytes: &[u8], open: usize) -> usize {
    let mut depth = 1;
    let mut i = open + 2;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Recognises a dollar-quote opener (`$$` or `$tag$`) starting at `pos`.
/// Positional parameters like `$1` are not openers.
fn dollar_tag_end(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut i = pos + 1;
    match bytes.get(i) {
        Some(b'$') => return Some(i + 1),
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return None,
    }
    while let Some(b) = bytes.get(i) {
        if *b == b'$' {
            return Some(i + 1);
        }
        if !(b.is_ascii_alphanumeric() || *b == b'_') {
            return None;
        }
        i += 1;
    }
    None
}

/// Digits, an optional fraction, and an optional exponent. Letters after
/// the number start a new token, the way PostgreSQL and `sqlparser` read
/// `1drop` as `1` followed by `drop`.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let digits = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut i = digits(start);
    if bytes.get(i) == Some(&b'.') {
        i = digits(i + 1);
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(i + 1), Some(b'+' | b'-')));
        if bytes.get(i + 1 + sign).is_some_and(u8::is_ascii_digit) {
            i = digits(i + 1 + sign);
        }
    }
    i
}

fn scan_while(sql: &str, pos: usize, keep: impl Fn(char) -> bool) -> usize {
    sql[pos..]
        .char_indices()
        .find(|(_, c)| !keep(*c))
        .map_or(sql.len(), |(i, _)| pos + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn terminator_inside_literal_is_not_a_terminator() {
        let tokens = tokenize("SELECT 'a;b' FROM clients;").unwrap();
        let terminators = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Terminator)
            .count();
        assert_eq!(terminators, 1);
        assert_eq!(tokens[1].text, "'a;b'");
    }

    #[test]
    fn doubled_quote_is_escaped() {
        let tokens = tokenize("SELECT 'it''s -- fine'").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn escape_string_honours_backslash() {
        let tokens = tokenize(r"SELECT E'a\'; DROP'").unwrap();
        assert_eq!(kinds(r"SELECT E'a\'; DROP'"), vec![TokenKind::Word, TokenKind::StringLiteral]);
        assert_eq!(tokens[1].text, r"E'a\'; DROP'");
    }

    #[test]
    fn dollar_quoted_body_is_a_literal() {
        let sql = "SELECT $body$ ; DROP TABLE clients $body$";
        assert_eq!(kinds(sql), vec![TokenKind::Word, TokenKind::StringLiteral]);
    }

    #[test]
    fn positional_parameter_is_not_a_dollar_quote() {
        assert_eq!(
            kinds("SELECT $1"),
            vec![TokenKind::Word, TokenKind::Symbol, TokenKind::Number]
        );
    }

    #[test]
    fn letters_after_a_number_start_a_word() {
        let tokens = tokenize("SELECT 1drop, 2.5e3delete, 7e FROM x").unwrap();
        let texts: Vec<(TokenKind, &str)> = tokens.iter().map(|t| (t.kind, t.text)).collect();
        assert_eq!(
            texts,
            vec![
                (TokenKind::Word, "SELECT"),
                (TokenKind::Number, "1"),
                (TokenKind::Word, "drop"),
                (TokenKind::Symbol, ","),
                (TokenKind::Number, "2.5e3"),
                (TokenKind::Word, "delete"),
                (TokenKind::Symbol, ","),
                (TokenKind::Number, "7"),
                (TokenKind::Word, "e"),
                (TokenKind::Word, "FROM"),
                (TokenKind::Word, "x"),
            ]
        );
    }

    #[test]
    fn numbers_keep_fraction_and_signed_exponent() {
        let tokens = tokenize("SELECT 12.50, 1E-3, 4.").unwrap();
        let numbers: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.text)
            .collect();
        assert_eq!(numbers, vec!["12.50", "1E-3", "4."]);
    }

    #[test]
    fn comments_are_tokens() {
        let tokens = tokenize("SELECT 1 -- trailing\n/* block /* nested */ */ FROM x").unwrap();
        let comments: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Comment)
            .map(|t| t.text)
            .collect();
        assert_eq!(comments, vec!["-- trailing", "/* block /* nested */ */"]);
        assert!(tokens.last().unwrap().is_word("x"));
    }

    #[test]
    fn unterminated_literal_is_an_error() {
        assert_eq!(
            tokenize("SELECT 'oops").unwrap_err(),
            LexError::UnterminatedString(7)
        );
        assert!(matches!(
            tokenize("SELECT \"oops").unwrap_err(),
            LexError::UnterminatedIdentifier(_)
        ));
        assert!(matches!(
            tokenize("SELECT $a$ oops").unwrap_err(),
            LexError::UnterminatedDollarQuote(_)
        ));
    }

    #[test]
    fn non_ascii_words_and_literals() {
        let tokens = tokenize("SELECT 'Plátano y Queso' AS variante").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1].text, "'Plátano y Queso'");
        assert!(tokens[3].is_word("VARIANTE"));
    }

    #[test]
    fn quoted_identifier_keeps_case() {
        let tokens = tokenize(r#"SELECT * FROM "Clients""#).unwrap();
        assert_eq!(tokens[3].identifier().as_deref(), Some("Clients"));
        assert_eq!(tokens[2].identifier().as_deref(), Some("from"));
    }

    #[test]
    fn count_statements_ignores_trailing_comment_segment() {
        assert_eq!(count_statements("SELECT 1;").unwrap(), 1);
        assert_eq!(count_statements("SELECT 1; -- done").unwrap(), 1);
        assert_eq!(count_statements("SELECT 1; SELECT 2;").unwrap(), 2);
        assert_eq!(count_statements("SELECT ';'").unwrap(), 1);
        assert_eq!(count_statements("").unwrap(), 0);
    }
}
