// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation handling for the Pika sales gateway.
//!
//! The [`Dispatcher`] is the central coordinator. For each authorized
//! message it:
//! - serializes work per sender through the [`SessionStore`]
//! - classifies the text into a command, a confirmation answer or free text
//! - asks the translator for a candidate statement and validates it
//! - executes accepted statements, after confirmation for writes
//! - walks a sender through `/venta`, the guided sale
//! - composes the Spanish reply

pub mod classifier;
pub mod composer;
pub mod dispatcher;
pub mod sale;
pub mod session;
pub mod shutdown;

pub use classifier::{Classification, Command, classify};
pub use composer::{ComposerPolicy, MenuNotice, Outcome, SaleReply, compose};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use session::{PendingState, SessionGuard, SessionStore};
