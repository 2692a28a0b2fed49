// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs one authorized message through the pipeline.
//!
//! lock sender slot → classify → command handler, or translate → validate →
//! (confirm) → execute → compose. The only way to an executor is through
//! [`Validator::validate`], fixed command statements and guided-sale writes
//! included, and the translation is complete and validated before any
//! transaction opens.

use std::sync::Arc;

use pika_config::model::PikaConfig;
use pika_core::{
    ClarificationContext, InboundMessage, OutboundMessage, StatementTranslator, Translation,
    TranslationRequest,
};
use pika_sql::{ValidatedStatement, Validator};
use pika_storage::{ExecutionError, ExecutionReport, StatementExecutor};
use tracing::{debug, info, warn};

use crate::classifier::{Classification, Command, classify};
use crate::composer::{ComposerPolicy, MenuNotice, Outcome, SaleReply, compose};
use crate::sale::{self, CartItem, ProductChoice, SaleClient, SaleDraft};
use crate::session::{PendingState, SessionGuard, SessionStore};

/// Counts for the `/resumen` command, as one read.
const SUMMARY_SQL: &str = "SELECT \
    (SELECT COUNT(*) FROM clients) AS clientes, \
    (SELECT COUNT(*) FROM orders) AS pedidos, \
    (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pendientes, \
    (SELECT COALESCE(SUM(total), 0) FROM orders WHERE status <> 'cancelled') AS ventas";

/// The ten most recent clients, for `/clientes`.
const RECENT_CLIENTS_SQL: &str = "SELECT name, phone, source_client_id FROM clients \
    ORDER BY created_at DESC LIMIT 10";

/// How the dispatcher behaves, from `[session]` and `[telegram]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherSettings {
    pub confirm_writes: bool,
    pub policy: ComposerPolicy,
}

impl DispatcherSettings {
    pub fn from_config(config: &PikaConfig) -> Self {
        Self {
            confirm_writes: config.session.confirm_writes,
            policy: ComposerPolicy::from_config(&config.telegram),
        }
    }
}

/// Wires the session store, translator, validator and executor together.
pub struct Dispatcher {
    translator: Arc<dyn StatementTranslator>,
    executor: Arc<dyn StatementExecutor>,
    sessions: Arc<SessionStore>,
    validator: Validator,
    schema_description: String,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        translator: Arc<dyn StatementTranslator>,
        executor: Arc<dyn StatementExecutor>,
        sessions: Arc<SessionStore>,
        settings: DispatcherSettings,
    ) -> Self {
        let validator = Validator::default();
        Self {
            translator,
            executor,
            sessions,
            schema_description: validator.schema().describe(),
            validator,
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one message from an authorized sender. `None` means there is
    /// nothing to reply.
    pub async fn handle(&self, message: &InboundMessage) -> Option<OutboundMessage> {
        if message.text.trim().is_empty() {
            return None;
        }

        let mut session = self.sessions.lock(&message.sender).await;
        let state = session.state();
        let classification = classify(&message.text, &state);
        debug!(
            sender = %message.sender,
            state = state.name(),
            "message classified"
        );

        let outcome = match classification {
            Classification::Command(command) => {
                self.run_command(command, message, &mut session).await
            }
            Classification::Confirm => {
                session.clear();
                match state {
                    PendingState::AwaitingConfirmation { statement, summary } => {
                        self.execute(&statement, summary).await
                    }
                    PendingState::SaleAwaitingConfirmation { draft } => {
                        self.record_sale(&draft).await
                    }
                    _ => Outcome::Help,
                }
            }
            Classification::Deny => {
                session.clear();
                if state.is_sale() {
                    Outcome::Sale(SaleReply::Cancelled)
                } else {
                    Outcome::Declined
                }
            }
            Classification::SaleInput(text) => self.sale_step(state, &text, &mut session).await,
            Classification::ClarificationAnswer(answer) => {
                let context = match state {
                    PendingState::AwaitingClarification {
                        original_message,
                        question,
                    } => Some(ClarificationContext {
                        original_message,
                        question,
                    }),
                    _ => None,
                };
                self.translate(answer, context, &mut session).await
            }
            Classification::FreeText(text) => {
                if state != PendingState::Idle {
                    debug!(
                        sender = %message.sender,
                        discarded = state.name(),
                        "new request discards pending operation"
                    );
                    session.clear();
                }
                self.translate(text, None, &mut session).await
            }
        };

        self.reply(message, &outcome)
    }

    /// The reply for a sender that failed authorization, per refusal policy.
    pub fn refuse(&self, message: &InboundMessage) -> Option<OutboundMessage> {
        self.reply(message, &Outcome::Unauthorized)
    }

    fn reply(&self, message: &InboundMessage, outcome: &Outcome) -> Option<OutboundMessage> {
        compose(outcome, &self.settings.policy).map(|text| OutboundMessage::reply_to(message, text))
    }

    async fn run_command(
        &self,
        command: Command,
        message: &InboundMessage,
        session: &mut SessionGuard,
    ) -> Outcome {
        // Any command ends whatever was pending.
        session.clear();
        match command {
            Command::Start => Outcome::Welcome,
            Command::Help => Outcome::Help,
            Command::Cancel => Outcome::Cancelled,
            Command::Id => Outcome::SenderId(message.sender.to_string()),
            Command::Summary => self.run_fixed(SUMMARY_SQL, Outcome::Summary).await,
            Command::Clients => self.run_fixed(RECENT_CLIENTS_SQL, Outcome::Clients).await,
            Command::Venta => {
                session.set(PendingState::SaleAwaitingPhone);
                Outcome::Sale(SaleReply::AskPhone)
            }
        }
    }

    /// Advances the guided sale by one answer. Invalid answers leave the
    /// step as it was.
    async fn sale_step(
        &self,
        state: PendingState,
        text: &str,
        session: &mut SessionGuard,
    ) -> Outcome {
        let reply = match state {
            PendingState::SaleAwaitingPhone => {
                let Some(phone) = sale::phone_digits(text) else {
                    return Outcome::Sale(SaleReply::InvalidPhone);
                };
                let report = match self.read_fixed(&sale::lookup_client_sql(&phone)).await {
                    Ok(report) => report,
                    Err(outcome) => {
                        session.clear();
                        return outcome;
                    }
                };
                match sale::found_client(&report) {
                    Some(client) => {
                        let notice = MenuNotice::ClientFound(client.name().to_string());
                        session.set(PendingState::SaleChoosingProduct {
                            draft: SaleDraft::new(phone, client),
                        });
                        SaleReply::Menu {
                            notice,
                            items: Vec::new(),
                        }
                    }
                    None => {
                        session.set(PendingState::SaleAwaitingName { phone });
                        SaleReply::AskName
                    }
                }
            }
            PendingState::SaleAwaitingName { phone } => {
                let Some(name) = sale::client_name(text) else {
                    return Outcome::Sale(SaleReply::InvalidName);
                };
                session.set(PendingState::SaleChoosingProduct {
                    draft: SaleDraft::new(phone, SaleClient::New { name }),
                });
                SaleReply::Menu {
                    notice: MenuNotice::NewClientNamed,
                    items: Vec::new(),
                }
            }
            PendingState::SaleChoosingProduct { draft } => match sale::product_choice(text) {
                ProductChoice::Finish if draft.items.is_empty() => SaleReply::Menu {
                    notice: MenuNotice::EmptyCart,
                    items: Vec::new(),
                },
                ProductChoice::Finish => {
                    session.set(PendingState::SaleAwaitingConfirmation {
                        draft: draft.clone(),
                    });
                    SaleReply::Summary(draft)
                }
                ProductChoice::Pick(product) => {
                    session.set(PendingState::SaleAwaitingQuantity { draft, product });
                    SaleReply::AskQuantity {
                        product: product.label(),
                    }
                }
                ProductChoice::Unknown => SaleReply::Menu {
                    notice: MenuNotice::UnknownProduct,
                    items: draft.items,
                },
            },
            PendingState::SaleAwaitingQuantity { draft, product } => {
                let Some(quantity) = sale::quantity(text) else {
                    return Outcome::Sale(SaleReply::InvalidQuantity);
                };
                session.set(PendingState::SaleAwaitingPrice {
                    draft,
                    product,
                    quantity,
                });
                SaleReply::AskPrice {
                    product: product.label(),
                }
            }
            PendingState::SaleAwaitingPrice {
                mut draft,
                product,
                quantity,
            } => {
                let Some(unit_price) = sale::amount(text) else {
                    return Outcome::Sale(SaleReply::InvalidPrice);
                };
                draft.add(CartItem {
                    product,
                    quantity,
                    unit_price,
                });
                let items = draft.items.clone();
                session.set(PendingState::SaleChoosingProduct { draft });
                SaleReply::Menu {
                    notice: MenuNotice::ItemAdded(product.label()),
                    items,
                }
            }
            // Anything but yes or no shows the summary again.
            PendingState::SaleAwaitingConfirmation { draft } => SaleReply::Summary(draft),
            _ => return Outcome::Help,
        };
        Outcome::Sale(reply)
    }

    /// Writes a confirmed sale: the client when new, the order, then one
    /// line per cart item. Every statement is validated before the first
    /// one runs. If an item fails after the order was written, the order is
    /// marked cancelled so no pending order disagrees with its items.
    async fn record_sale(&self, draft: &SaleDraft) -> Outcome {
        let order_ref = sale::new_order_ref();
        let statements = draft.statements(&order_ref);

        let mut client = None;
        if let Some(sql) = &statements.client {
            let Some(statement) = self.validate(sql) else {
                return Outcome::Rejected;
            };
            client = Some(statement);
        }
        let Some(order) = self.validate(&statements.order) else {
            return Outcome::Rejected;
        };
        let mut items = Vec::with_capacity(statements.items.len());
        for sql in &statements.items {
            let Some(statement) = self.validate(sql) else {
                return Outcome::Rejected;
            };
            items.push(statement);
        }
        let Some(cancel) = self.validate(&statements.cancel) else {
            return Outcome::Rejected;
        };

        if let Some(client) = &client
            && let Err(outcome) = self.write(client).await
        {
            return outcome;
        }
        match self.write(&order).await {
            Ok(0) => {
                let e = ExecutionError::new("sale order insert matched no client");
                return Outcome::ExecutionFailed {
                    correlation_id: e.correlation_id,
                };
            }
            Ok(_) => {}
            Err(outcome) => return outcome,
        }
        for item in &items {
            if let Err(outcome) = self.write(item).await {
                if let Err(e) = self.executor.execute(&cancel).await {
                    warn!(
                        correlation_id = %e.correlation_id,
                        "could not cancel partially recorded sale"
                    );
                }
                return outcome;
            }
        }

        let order = sale::short_order_ref(&order_ref);
        info!(
            order = %order,
            items = draft.items.len(),
            new_client = draft.client.is_new(),
            "sale recorded"
        );
        Outcome::Sale(SaleReply::Recorded { order })
    }

    /// Runs a fixed read and hands back its report.
    async fn read_fixed(&self, sql: &str) -> Result<ExecutionReport, Outcome> {
        let Some(statement) = self.validate(sql) else {
            return Err(Outcome::Rejected);
        };
        self.executor
            .execute(&statement)
            .await
            .map_err(|e| Outcome::ExecutionFailed {
                correlation_id: e.correlation_id,
            })
    }

    /// Runs an already validated write and returns the rows it touched.
    async fn write(&self, statement: &ValidatedStatement) -> Result<u64, Outcome> {
        match self.executor.execute(statement).await {
            Ok(ExecutionReport::Write { rows_affected }) => Ok(rows_affected),
            Ok(ExecutionReport::Read { row_count, .. }) => Ok(row_count as u64),
            Err(e) => Err(Outcome::ExecutionFailed {
                correlation_id: e.correlation_id,
            }),
        }
    }

    async fn run_fixed(&self, sql: &str, wrap: fn(ExecutionReport) -> Outcome) -> Outcome {
        match self.read_fixed(sql).await {
            Ok(report) => wrap(report),
            Err(outcome) => outcome,
        }
    }

    async fn translate(
        &self,
        text: String,
        clarification: Option<ClarificationContext>,
        session: &mut SessionGuard,
    ) -> Outcome {
        let request = TranslationRequest {
            schema: self.schema_description.clone(),
            message: text,
            clarification,
        };

        // A failed translation leaves the session as it was, so an open
        // clarification can still be answered by a rephrased message.
        let translation = match self.translator.translate(&request).await {
            Ok(translation) => translation,
            Err(e) => {
                warn!(error = %e, "translation failed");
                return Outcome::TranslationFailed;
            }
        };

        match translation {
            Translation::Reply { text } => {
                session.clear();
                Outcome::Reply(text)
            }
            Translation::Clarify { question } => {
                let original_message = match request.clarification {
                    Some(previous) => format!("{}\n{}", previous.original_message, request.message),
                    None => request.message,
                };
                session.set(PendingState::AwaitingClarification {
                    original_message,
                    question: question.clone(),
                });
                Outcome::ClarificationRequested { question }
            }
            Translation::Statement { sql, summary } => {
                session.clear();
                let Some(statement) = self.validate(&sql) else {
                    return Outcome::Rejected;
                };
                if statement.kind().is_write() && self.settings.confirm_writes {
                    session.set(PendingState::AwaitingConfirmation {
                        statement,
                        summary: summary.clone(),
                    });
                    return Outcome::ConfirmationRequested { summary };
                }
                self.execute(&statement, summary).await
            }
        }
    }

    /// Rejections are audited by reason and fingerprint, never verbatim.
    fn validate(&self, sql: &str) -> Option<ValidatedStatement> {
        match self.validator.validate(sql) {
            Ok(statement) => {
                debug!(
                    kind = %statement.kind(),
                    statement = statement.sql(),
                    "statement accepted"
                );
                Some(statement)
            }
            Err(e) => {
                warn!(
                    target: "pika::audit",
                    reason = e.code(),
                    fingerprint = %pika_sql::fingerprint(sql),
                    length = sql.len(),
                    "statement rejected"
                );
                None
            }
        }
    }

    async fn execute(&self, statement: &ValidatedStatement, summary: String) -> Outcome {
        match self.executor.execute(statement).await {
            Ok(report) => {
                info!(kind = %statement.kind(), "statement executed");
                Outcome::Executed { summary, report }
            }
            Err(e) => Outcome::ExecutionFailed {
                correlation_id: e.correlation_id,
            },
        }
    }
}
