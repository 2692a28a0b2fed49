// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns outcomes into the replies operators see.
//!
//! Replies are fixed Spanish templates. A rejected statement is never echoed
//! back and database detail never leaves the logs; a failed execution only
//! shows its correlation id.

use std::fmt::Write;

use pika_config::model::{RefusalPolicy, TelegramConfig};
use pika_sql::catalog;
use pika_storage::ExecutionReport;

use crate::sale::{self, CartItem, MIN_PHONE_DIGITS, SaleDraft};

/// Everything the dispatcher can end up replying about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Welcome,
    Help,
    Cancelled,
    /// The sender's own transport identity.
    SenderId(String),
    Summary(ExecutionReport),
    Clients(ExecutionReport),
    /// A validated write waits for a yes or no.
    ConfirmationRequested { summary: String },
    /// The sender said no to a pending write.
    Declined,
    ClarificationRequested { question: String },
    /// Conversational text from the translator.
    Reply(String),
    Executed { summary: String, report: ExecutionReport },
    /// The validator refused the candidate statement.
    Rejected,
    TranslationFailed,
    ExecutionFailed { correlation_id: String },
    Unauthorized,
    /// A step of the guided sale.
    Sale(SaleReply),
}

/// What the guided sale says at each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleReply {
    AskPhone,
    InvalidPhone,
    AskName,
    InvalidName,
    /// The numbered product list and the cart so far.
    Menu {
        notice: MenuNotice,
        items: Vec<CartItem>,
    },
    AskQuantity { product: String },
    InvalidQuantity,
    AskPrice { product: String },
    InvalidPrice,
    Summary(SaleDraft),
    Recorded { order: String },
    Cancelled,
}

/// The line shown above the product menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuNotice {
    ClientFound(String),
    NewClientNamed,
    ItemAdded(String),
    UnknownProduct,
    EmptyCart,
}

/// Settings that change what gets said.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposerPolicy {
    pub refusal: RefusalPolicy,
}

impl ComposerPolicy {
    pub fn from_config(config: &TelegramConfig) -> Self {
        Self {
            refusal: config.refusal_policy,
        }
    }
}

pub const WELCOME: &str = "🐷 ¡Bienvenido a Pika Snacks Bot!\n\n\
Escríbeme lo que necesitas en tus palabras, por ejemplo:\n\
• Agregar cliente Juan, tel 3001234567\n\
• ¿Cuántos pedidos pendientes hay?\n\n\
Usa /ayuda para ver los comandos.";

pub const HELP: &str = "📖 Cómo usar el bot:\n\n\
Escribe en lenguaje natural lo que quieres consultar o registrar. \
Antes de guardar cambios te pediré confirmación (sí / no).\n\n\
Comandos:\n\
• /venta - Registrar una venta paso a paso\n\
• /resumen - Resumen de clientes, pedidos y ventas\n\
• /clientes - Últimos clientes registrados\n\
• /cancelar - Cancela la operación actual\n\
• /id - Muestra tu ID de Telegram\n\
• /ayuda - Muestra esta ayuda";

const REFUSAL: &str = "⛔ No tienes permiso para usar este bot.";
const REJECTED: &str = "🚫 Esa operación no está permitida.";
const TRANSLATION_FAILED: &str =
    "🤔 No entendí la solicitud. ¿Puedes reformularla con otras palabras?";

/// Renders `outcome`; `None` means send nothing.
pub fn compose(outcome: &Outcome, policy: &ComposerPolicy) -> Option<String> {
    let text = match outcome {
        Outcome::Welcome => WELCOME.to_string(),
        Outcome::Help => HELP.to_string(),
        Outcome::Cancelled => "❌ Operación cancelada.".to_string(),
        Outcome::SenderId(id) => format!("🆔 Tu ID de Telegram es: {id}"),
        Outcome::Summary(report) => render_summary(report),
        Outcome::Clients(report) => {
            let mut out = String::from("👥 Últimos clientes\n");
            render_report(&mut out, report);
            out
        }
        Outcome::ConfirmationRequested { summary } => format!(
            "📝 {summary}\n\n¿Confirmas la operación? Responde sí o no."
        ),
        Outcome::Declined => "👌 Operación descartada, no se guardó nada.".to_string(),
        Outcome::ClarificationRequested { question } => format!("❓ {question}"),
        Outcome::Reply(text) => text.clone(),
        Outcome::Executed { summary, report } => {
            let mut out = format!("✅ {summary}\n");
            render_report(&mut out, report);
            out
        }
        Outcome::Rejected => REJECTED.to_string(),
        Outcome::TranslationFailed => TRANSLATION_FAILED.to_string(),
        Outcome::ExecutionFailed { correlation_id } => format!(
            "⚠️ No se pudo completar la operación. Intenta de nuevo.\n(ref: {correlation_id})"
        ),
        Outcome::Unauthorized => match policy.refusal {
            RefusalPolicy::Silent => return None,
            RefusalPolicy::Generic => REFUSAL.to_string(),
        },
        Outcome::Sale(reply) => render_sale(reply),
    };
    Some(text.trim_end().to_string())
}

fn render_report(out: &mut String, report: &ExecutionReport) {
    match report {
        ExecutionReport::Write { rows_affected } => {
            let _ = writeln!(out, "Filas afectadas: {rows_affected}");
        }
        ExecutionReport::Read {
            row_count: 0, ..
        } => out.push_str("Sin resultados.\n"),
        ExecutionReport::Read {
            row_count,
            columns,
            sample,
        } => {
            let noun = if *row_count == 1 { "resultado" } else { "resultados" };
            let _ = writeln!(out, "{row_count} {noun}:");
            if !columns.is_empty() {
                let _ = writeln!(out, "{}", columns.join(" | "));
            }
            for row in sample {
                let _ = writeln!(out, "{}", row.join(" | "));
            }
            let hidden = row_count.saturating_sub(sample.len());
            if hidden > 0 {
                let _ = writeln!(out, "… y {hidden} más");
            }
        }
    }
}

/// The summary query returns a single row; show it as `column: value` lines.
fn render_summary(report: &ExecutionReport) -> String {
    let mut out = String::from("📊 Resumen\n");
    match report {
        ExecutionReport::Read {
            columns, sample, ..
        } if sample.len() == 1 => {
            for (column, value) in columns.iter().zip(&sample[0]) {
                let _ = writeln!(out, "• {column}: {value}");
            }
        }
        other => render_report(&mut out, other),
    }
    out
}

fn render_sale(reply: &SaleReply) -> String {
    match reply {
        SaleReply::AskPhone => "📱 Nueva venta\n\nIngresa el teléfono del cliente:".to_string(),
        SaleReply::InvalidPhone => format!(
            "⚠️ Teléfono inválido. Ingresa al menos {MIN_PHONE_DIGITS} dígitos:"
        ),
        SaleReply::AskName => "👤 Cliente nuevo\n\nIngresa el nombre del cliente:".to_string(),
        SaleReply::InvalidName => "⚠️ Nombre muy corto. Ingresa el nombre completo:".to_string(),
        SaleReply::Menu { notice, items } => {
            let mut out = match notice {
                MenuNotice::ClientFound(name) => format!("✅ Cliente encontrado: {name}\n\n"),
                MenuNotice::NewClientNamed => String::new(),
                MenuNotice::ItemAdded(product) => format!("➕ Agregado: {product}\n\n"),
                MenuNotice::UnknownProduct => "⚠️ Elige un número de la lista.\n\n".to_string(),
                MenuNotice::EmptyCart => "⚠️ Agrega al menos un producto.\n\n".to_string(),
            };
            out.push_str("🛒 Selecciona los productos:\n");
            for (i, product) in catalog().iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, product.label());
            }
            if !items.is_empty() {
                out.push('\n');
                render_cart(&mut out, items);
            }
            out.push_str("\nEscribe el número del producto, o \"listo\" para terminar.");
            out
        }
        SaleReply::AskQuantity { product } => {
            format!("🔢 ¿Cuántas cajas de {product}? (1-{})", sale::MAX_QUANTITY)
        }
        SaleReply::InvalidQuantity => {
            format!("⚠️ Cantidad inválida. Ingresa un número de 1 a {}:", sale::MAX_QUANTITY)
        }
        SaleReply::AskPrice { product } => {
            format!("💲 Precio por caja de {product} (ej: 12000):")
        }
        SaleReply::InvalidPrice => {
            "⚠️ Precio inválido. Ingresa solo el número (ej: 12000):".to_string()
        }
        SaleReply::Summary(draft) => {
            let mut out = String::from("📦 Confirmar venta:\n\n");
            let marker = if draft.client.is_new() { " (nuevo)" } else { "" };
            let _ = writeln!(out, "👤 Cliente: {}{marker}", draft.client.name());
            let _ = writeln!(out, "📱 Tel: {}\n", draft.phone);
            render_cart(&mut out, &draft.items);
            let _ = writeln!(out, "\n💰 Total: ${} COP", sale::money(draft.total()));
            out.push_str("\n¿Confirmas la venta? Responde sí o no.");
            out
        }
        SaleReply::Recorded { order } => {
            format!("✅ Venta registrada correctamente (Orden #{order})")
        }
        SaleReply::Cancelled => "❌ Venta cancelada.".to_string(),
    }
}

fn render_cart(out: &mut String, items: &[CartItem]) {
    out.push_str("🛒 Productos:\n");
    for item in items {
        let _ = writeln!(
            out,
            "  • {}x {} a ${}",
            item.quantity,
            item.product.label(),
            sale::money(item.unit_price)
        );
    }
}
