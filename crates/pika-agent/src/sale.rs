// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Guided sale entry behind `/venta`.
//!
//! The wizard asks for the client's phone, for a name when the phone is not
//! on file, then builds a cart of catalog items with a quantity and a price
//! per box, and finally asks for a yes or no. Nothing is written before that
//! yes. The writes are fixed statements rendered here with escaped literals;
//! the dispatcher still sends each one through the validator.

use pika_sql::{CatalogProduct, catalog};
use pika_storage::ExecutionReport;
use pika_storage::report::NULL_VALUE;

pub const MIN_PHONE_DIGITS: usize = 7;
pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_QUANTITY: u32 = 99;

/// Items are sold by the box.
const UNIT: &str = "caja";

/// Answers that close the cart while choosing products.
const FINISH_WORDS: &[&str] = &["listo", "finalizar", "fin", "terminar"];

/// Prefix of `clients.source_client_id` for clients created by the wizard.
const SOURCE_PREFIX: &str = "telegram_";

/// Prefix of `orders.source_session_id` for orders created by the wizard.
const ORDER_REF_PREFIX: &str = "venta_";

/// Who the sale is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleClient {
    /// Found by phone; `id` is the stored client id.
    Existing { id: String, name: String },
    /// Created together with the order.
    New { name: String },
}

impl SaleClient {
    pub fn name(&self) -> &str {
        match self {
            SaleClient::Existing { name, .. } | SaleClient::New { name } => name,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SaleClient::New { .. })
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product: CatalogProduct,
    pub quantity: u32,
    pub unit_price: u64,
}

impl CartItem {
    pub fn subtotal(&self) -> u64 {
        u64::from(self.quantity) * self.unit_price
    }
}

/// A sale being put together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDraft {
    /// Digits only.
    pub phone: String,
    pub client: SaleClient,
    pub items: Vec<CartItem>,
}

impl SaleDraft {
    pub fn new(phone: String, client: SaleClient) -> Self {
        Self {
            phone,
            client,
            items: Vec::new(),
        }
    }

    /// Adds `item`, folding it into an existing line for the same product
    /// at the same price.
    pub fn add(&mut self, item: CartItem) {
        match self
            .items
            .iter_mut()
            .find(|line| line.product == item.product && line.unit_price == item.unit_price)
        {
            Some(line) => line.quantity += item.quantity,
            None => self.items.push(item),
        }
    }

    /// The order total: the sum of every line's quantity times price.
    pub fn total(&self) -> u64 {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    fn source_client_id(&self) -> String {
        format!("{SOURCE_PREFIX}{}", self.phone)
    }

    /// The writes that record this sale under `order_ref`, in order.
    pub fn statements(&self, order_ref: &str) -> SaleStatements {
        let client = match &self.client {
            SaleClient::Existing { .. } => None,
            SaleClient::New { name } => Some(format!(
                "INSERT INTO clients (name, phone, source_client_id) VALUES ({}, {}, {})",
                literal(name),
                literal(&self.phone),
                literal(&self.source_client_id()),
            )),
        };

        let owner = match &self.client {
            SaleClient::Existing { id, .. } => format!("id = {}", literal(id)),
            SaleClient::New { .. } => {
                format!("source_client_id = {}", literal(&self.source_client_id()))
            }
        };
        let order = format!(
            "INSERT INTO orders (client_id, order_date, total, status, source_session_id) \
             SELECT id, CURRENT_DATE, {}, 'pending', {} FROM clients WHERE {owner}",
            self.total(),
            literal(order_ref),
        );

        let items = self
            .items
            .iter()
            .map(|item| {
                let (variant_match, variant_value) = match item.product.variant {
                    Some(variant) => (format!("p.variant = {}", literal(variant)), literal(variant)),
                    None => ("p.variant IS NULL".to_string(), "NULL".to_string()),
                };
                format!(
                    "INSERT INTO order_items \
                     (order_id, product_id, product_name, variant, quantity, unit, unit_price) \
                     SELECT o.id, \
                     (SELECT p.id FROM products p WHERE p.name = {name} AND {variant_match} LIMIT 1), \
                     {name}, {variant_value}, {quantity}, {unit}, {price} \
                     FROM orders o WHERE o.source_session_id = {order_ref}",
                    name = literal(item.product.name),
                    quantity = item.quantity,
                    unit = literal(UNIT),
                    price = item.unit_price,
                    order_ref = literal(order_ref),
                )
            })
            .collect();

        SaleStatements {
            client,
            order,
            items,
            cancel: format!(
                "UPDATE orders SET status = 'cancelled' WHERE source_session_id = {}",
                literal(order_ref)
            ),
        }
    }
}

/// Rendered writes for one sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleStatements {
    /// Present only for a new client.
    pub client: Option<String>,
    pub order: String,
    pub items: Vec<String>,
    /// Marks the order cancelled if an item fails after the order was written.
    pub cancel: String,
}

/// A fresh `source_session_id` for a wizard order.
pub fn new_order_ref() -> String {
    format!("{ORDER_REF_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// The short form operators see: the first eight characters after the prefix.
pub fn short_order_ref(order_ref: &str) -> String {
    order_ref
        .strip_prefix(ORDER_REF_PREFIX)
        .unwrap_or(order_ref)
        .chars()
        .take(8)
        .collect()
}

/// Looks a client up by phone.
pub fn lookup_client_sql(phone: &str) -> String {
    format!(
        "SELECT id, name FROM clients WHERE phone = {} ORDER BY created_at LIMIT 1",
        literal(phone)
    )
}

/// Reads the client out of a [`lookup_client_sql`] result.
pub fn found_client(report: &ExecutionReport) -> Option<SaleClient> {
    let ExecutionReport::Read { sample, .. } = report else {
        return None;
    };
    let row = sample.first()?;
    let id = row.first()?.clone();
    let name = match row.get(1).map(String::as_str) {
        None | Some(NULL_VALUE) | Some("") => "(sin nombre)".to_string(),
        Some(name) => name.to_string(),
    };
    Some(SaleClient::Existing { id, name })
}

/// The digits of `text` when there are enough of them for a phone.
pub fn phone_digits(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
}

pub fn client_name(text: &str) -> Option<String> {
    let name = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (name.chars().count() >= MIN_NAME_CHARS).then_some(name)
}

/// What a message means while products are being chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductChoice {
    Finish,
    Pick(CatalogProduct),
    Unknown,
}

/// Accepts a menu number, a full product label, or a finish word.
pub fn product_choice(text: &str) -> ProductChoice {
    let answer = text.trim().trim_end_matches('.').to_lowercase();
    if FINISH_WORDS.contains(&answer.as_str()) {
        return ProductChoice::Finish;
    }
    let products = catalog();
    if let Ok(number) = answer.parse::<usize>() {
        return match number.checked_sub(1).and_then(|i| products.get(i)) {
            Some(product) => ProductChoice::Pick(*product),
            None => ProductChoice::Unknown,
        };
    }
    products
        .into_iter()
        .find(|product| product.label().to_lowercase() == answer)
        .map_or(ProductChoice::Unknown, ProductChoice::Pick)
}

pub fn quantity(text: &str) -> Option<u32> {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| (1..=MAX_QUANTITY).contains(n))
}

/// A positive peso amount; `$`, thousands separators and spaces are ignored.
pub fn amount(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '.' | ',') && !c.is_whitespace())
        .collect();
    digits.parse::<u64>().ok().filter(|n| *n > 0)
}

/// `66000` → `66,000`.
pub fn money(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
