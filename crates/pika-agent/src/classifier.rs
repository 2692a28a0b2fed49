// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splits incoming text into structured commands, confirmation answers and
//! free text for the translator.
//!
//! A slash command (`/resumen`, `/help@pika_bot extra words`) is recognized
//! by its first token. A bare keyword (`ayuda`) only counts when it is the
//! whole message, so free text that happens to start with one
//! ("clientes de Medellín con pedidos pendientes") still reaches the
//! translator.

use strum::{Display, EnumString};

use crate::session::PendingState;

/// The closed set of structured commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Command {
    Start,
    #[strum(serialize = "help", serialize = "ayuda")]
    Help,
    #[strum(serialize = "cancel", serialize = "cancelar")]
    Cancel,
    #[strum(serialize = "summary", serialize = "resumen")]
    Summary,
    #[strum(serialize = "clients", serialize = "clientes")]
    Clients,
    Id,
    Venta,
}

/// Words accepted as "yes" while a write or a sale awaits confirmation.
const CONFIRM_WORDS: &[&str] = &["si", "sí", "yes", "confirmar", "ok"];

/// Words accepted as "no" while a write or a sale awaits confirmation.
const DENY_WORDS: &[&str] = &["no"];

/// Where a message goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Command(Command),
    Confirm,
    Deny,
    /// Free text sent while a clarification question is open.
    ClarificationAnswer(String),
    /// An answer to the current step of a guided sale.
    SaleInput(String),
    FreeText(String),
}

/// Classifies `text` given the sender's current state.
///
/// Commands win in every state, so `/cancelar` always resets. Confirmation
/// words only mean something while a confirmation is pending; otherwise
/// they are free text like anything else.
pub fn classify(text: &str, state: &PendingState) -> Classification {
    let text = text.trim();

    if let Some(command) = parse_command(text) {
        return Classification::Command(command);
    }

    match state {
        PendingState::AwaitingConfirmation { .. } => {
            confirmation(text).unwrap_or_else(|| Classification::FreeText(text.to_string()))
        }
        PendingState::SaleAwaitingConfirmation { .. } => {
            confirmation(text).unwrap_or_else(|| Classification::SaleInput(text.to_string()))
        }
        PendingState::AwaitingClarification { .. } => {
            Classification::ClarificationAnswer(text.to_string())
        }
        state if state.is_sale() => Classification::SaleInput(text.to_string()),
        _ => Classification::FreeText(text.to_string()),
    }
}

fn confirmation(text: &str) -> Option<Classification> {
    let answer = normalize_answer(text);
    if CONFIRM_WORDS.contains(&answer.as_str()) {
        Some(Classification::Confirm)
    } else if DENY_WORDS.contains(&answer.as_str()) {
        Some(Classification::Deny)
    } else {
        None
    }
}

fn parse_command(text: &str) -> Option<Command> {
    let mut words = text.split_whitespace();
    let first = words.next()?;

    let keyword = match first.strip_prefix('/') {
        Some(rest) => rest.split_once('@').map_or(rest, |(name, _bot)| name),
        None if words.next().is_none() => first,
        None => return None,
    };
    keyword.parse().ok()
}

/// Lowercases and drops surrounding punctuation, so "¡Sí!" reads as "sí".
fn normalize_answer(text: &str) -> String {
    text.trim_matches(|c: char| c.is_ascii_punctuation() || matches!(c, '¡' | '¿'))
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pika_sql::Validator;

    fn awaiting_confirmation() -> PendingState {
        PendingState::AwaitingConfirmation {
            statement: Validator::default()
                .validate("INSERT INTO products (name) VALUES ('Brownie')")
                .unwrap(),
            summary: "Agregar producto".into(),
        }
    }

    fn awaiting_clarification() -> PendingState {
        PendingState::AwaitingClarification {
            original_message: "pedido de Juan".into(),
            question: "¿Cuál Juan?".into(),
        }
    }

    #[test]
    fn slash_commands_with_aliases_and_bot_suffix() {
        let idle = PendingState::Idle;
        assert_eq!(classify("/start", &idle), Classification::Command(Command::Start));
        assert_eq!(classify("/ayuda", &idle), Classification::Command(Command::Help));
        assert_eq!(classify("/HELP", &idle), Classification::Command(Command::Help));
        assert_eq!(
            classify("/resumen@pika_bot", &idle),
            Classification::Command(Command::Summary)
        );
        assert_eq!(
            classify("/clientes por favor", &idle),
            Classification::Command(Command::Clients)
        );
        assert_eq!(classify("  /id  ", &idle), Classification::Command(Command::Id));
    }

    #[test]
    fn bare_keyword_only_as_whole_message() {
        let idle = PendingState::Idle;
        assert_eq!(classify("cancelar", &idle), Classification::Command(Command::Cancel));
        assert_eq!(
            classify("clientes de Medellín", &idle),
            Classification::FreeText("clientes de Medellín".into())
        );
    }

    #[test]
    fn unknown_slash_command_is_free_text() {
        assert_eq!(
            classify("/borrar", &PendingState::Idle),
            Classification::FreeText("/borrar".into())
        );
    }

    #[test]
    fn sale_steps_take_raw_answers() {
        let idle = PendingState::Idle;
        assert_eq!(classify("/venta", &idle), Classification::Command(Command::Venta));
        assert_eq!(classify("venta", &idle), Classification::Command(Command::Venta));

        let phone = PendingState::SaleAwaitingPhone;
        assert_eq!(
            classify(" 300 123 4567 ", &phone),
            Classification::SaleInput("300 123 4567".into())
        );
        assert_eq!(
            classify("si", &phone),
            Classification::SaleInput("si".into())
        );
        assert_eq!(
            classify("/cancelar", &phone),
            Classification::Command(Command::Cancel)
        );
    }

    #[test]
    fn sale_confirmation_reads_yes_and_no() {
        let draft = crate::sale::SaleDraft::new(
            "3001234567".into(),
            crate::sale::SaleClient::New { name: "Ana".into() },
        );
        let pending = PendingState::SaleAwaitingConfirmation { draft };
        assert_eq!(classify("¡Sí!", &pending), Classification::Confirm);
        assert_eq!(classify("no", &pending), Classification::Deny);
        assert_eq!(
            classify("tal vez", &pending),
            Classification::SaleInput("tal vez".into())
        );
    }

    #[test]
    fn confirmation_words_only_when_pending() {
        let pending = awaiting_confirmation();
        for word in ["si", "Sí", "¡sí!", "YES", "confirmar", "ok."] {
            assert_eq!(classify(word, &pending), Classification::Confirm, "{word}");
        }
        assert_eq!(classify("No", &pending), Classification::Deny);
        assert_eq!(
            classify("si", &PendingState::Idle),
            Classification::FreeText("si".into())
        );
    }

    #[test]
    fn unrelated_text_while_pending_is_fresh_free_text() {
        assert_eq!(
            classify("ventas de marzo", &awaiting_confirmation()),
            Classification::FreeText("ventas de marzo".into())
        );
    }

    #[test]
    fn cancel_wins_over_pending_states() {
        assert_eq!(
            classify("/cancelar", &awaiting_confirmation()),
            Classification::Command(Command::Cancel)
        );
        assert_eq!(
            classify("/cancel", &awaiting_clarification()),
            Classification::Command(Command::Cancel)
        );
    }

    #[test]
    fn clarification_answer() {
        assert_eq!(
            classify("el de Medellín", &awaiting_clarification()),
            Classification::ClarificationAnswer("el de Medellín".into())
        );
    }
}
