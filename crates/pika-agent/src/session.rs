// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-sender pending-operation store.
//!
//! Each sender owns one slot behind its own async mutex. The dispatcher holds
//! that lock for the whole of a message, so two near-simultaneous messages
//! from the same sender are processed one after the other, while different
//! senders never wait on each other. Slots older than the TTL read as
//! [`PendingState::Idle`] and are removed by [`SessionStore::evict_expired`].

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use pika_core::SenderId;
use pika_sql::{CatalogProduct, ValidatedStatement};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::sale::SaleDraft;

/// What a sender is in the middle of.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingState {
    #[default]
    Idle,
    /// A validated write was shown to the sender and needs a yes or no.
    AwaitingConfirmation {
        statement: ValidatedStatement,
        summary: String,
    },
    /// The translator asked a question; the next message answers it.
    AwaitingClarification {
        original_message: String,
        question: String,
    },
    /// `/venta` started; the next message is the client's phone.
    SaleAwaitingPhone,
    /// The phone is not on file; the next message is the new client's name.
    SaleAwaitingName { phone: String },
    SaleChoosingProduct { draft: SaleDraft },
    SaleAwaitingQuantity {
        draft: SaleDraft,
        product: CatalogProduct,
    },
    SaleAwaitingPrice {
        draft: SaleDraft,
        product: CatalogProduct,
        quantity: u32,
    },
    /// The cart is closed and its summary shown; needs a yes or no.
    SaleAwaitingConfirmation { draft: SaleDraft },
}

impl PendingState {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PendingState::Idle => "idle",
            PendingState::AwaitingConfirmation { .. } => "awaiting_confirmation",
            PendingState::AwaitingClarification { .. } => "awaiting_clarification",
            PendingState::SaleAwaitingPhone => "sale_awaiting_phone",
            PendingState::SaleAwaitingName { .. } => "sale_awaiting_name",
            PendingState::SaleChoosingProduct { .. } => "sale_choosing_product",
            PendingState::SaleAwaitingQuantity { .. } => "sale_awaiting_quantity",
            PendingState::SaleAwaitingPrice { .. } => "sale_awaiting_price",
            PendingState::SaleAwaitingConfirmation { .. } => "sale_awaiting_confirmation",
        }
    }

    /// Whether this is a step of the guided sale.
    pub fn is_sale(&self) -> bool {
        matches!(
            self,
            PendingState::SaleAwaitingPhone
                | PendingState::SaleAwaitingName { .. }
                | PendingState::SaleChoosingProduct { .. }
                | PendingState::SaleAwaitingQuantity { .. }
                | PendingState::SaleAwaitingPrice { .. }
                | PendingState::SaleAwaitingConfirmation { .. }
        )
    }
}

#[derive(Debug)]
struct Slot {
    state: PendingState,
    since: Instant,
}

impl Slot {
    fn idle() -> Self {
        Self {
            state: PendingState::Idle,
            since: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.since.elapsed() >= ttl
    }

    fn is_reclaimable(&self, ttl: Duration) -> bool {
        self.state == PendingState::Idle || self.is_expired(ttl)
    }
}

/// Exclusive access to one sender's slot.
pub struct SessionGuard {
    slot: OwnedMutexGuard<Slot>,
    ttl: Duration,
}

impl SessionGuard {
    /// The current state; an expired one reads as `Idle`.
    pub fn state(&self) -> PendingState {
        if self.slot.is_expired(self.ttl) {
            PendingState::Idle
        } else {
            self.slot.state.clone()
        }
    }

    /// Replaces the state and restarts its TTL.
    pub fn set(&mut self, state: PendingState) {
        self.slot.state = state;
        self.slot.since = Instant::now();
    }

    pub fn clear(&mut self) {
        self.set(PendingState::Idle);
    }
}

/// Keyed, TTL-bounded store of pending operations.
pub struct SessionStore {
    slots: DashMap<SenderId, Arc<Mutex<Slot>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            ttl,
        }
    }

    /// Waits for exclusive access to `sender`'s slot, creating it if needed.
    pub async fn lock(&self, sender: &SenderId) -> SessionGuard {
        let slot = Arc::clone(
            &*self
                .slots
                .entry(sender.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Slot::idle()))),
        );
        SessionGuard {
            slot: slot.lock_owned().await,
            ttl: self.ttl,
        }
    }

    pub async fn get(&self, sender: &SenderId) -> PendingState {
        self.lock(sender).await.state()
    }

    pub async fn set(&self, sender: &SenderId, state: PendingState) {
        self.lock(sender).await.set(state);
    }

    pub async fn clear(&self, sender: &SenderId) {
        self.lock(sender).await.clear();
    }

    /// Removes idle and expired slots nobody is using. Returns how many
    /// were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            // The shard is write-locked here, so a count of one means no
            // dispatcher holds or is about to lock this slot.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => !guard.is_reclaimable(self.ttl),
                Err(_) => true,
            }
        });
        let evicted = before.saturating_sub(self.slots.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.slots.len(), "evicted session slots");
        }
        evicted
    }

    /// Number of slots currently held.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
