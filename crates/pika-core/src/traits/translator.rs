// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statement translator trait for the external reasoning capability.

use async_trait::async_trait;

use crate::error::TranslationError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Translation, TranslationRequest};

/// Turns a natural-language message into a candidate statement.
///
/// Implementations wrap an opaque oracle. Whatever they return is untrusted
/// and is never executed without passing the statement validator.
#[async_trait]
pub trait StatementTranslator: PluginAdapter {
    /// Translates one message. Implementations enforce their own timeout and
    /// retry at most once, and only on timeouts or connection errors.
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<Translation, TranslationError>;
}
