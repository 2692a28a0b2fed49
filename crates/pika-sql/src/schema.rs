// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fixed, known schema of the sales store.
//!
//! The same description feeds both sides of the pipeline: the translator
//! receives it as context, and the validator uses it as the closed set of
//! relations a statement may reference.

use std::fmt::Write;

/// Whether a relation may be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    /// Read-only view; only valid inside a read statement.
    View,
}

/// A column with its SQL type and a short note for the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub note: &'static str,
}

/// A table or view in the known schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub description: &'static str,
    pub columns: &'static [Column],
}

const fn col(name: &'static str, sql_type: &'static str, note: &'static str) -> Column {
    Column {
        name,
        sql_type,
        note,
    }
}

const SALES_RELATIONS: &[Relation] = &[
    Relation {
        name: "clients",
        kind: RelationKind::Table,
        description: "buyers",
        columns: &[
            col("id", "UUID", "primary key, generated"),
            col("phone", "VARCHAR(20)", "optional"),
            col("name", "VARCHAR(255)", "optional display name"),
            col(
                "source_client_id",
                "VARCHAR(255)",
                "UNIQUE NOT NULL external identifier, never changes once created",
            ),
            col("created_at", "TIMESTAMP", "defaults to now"),
            col("updated_at", "TIMESTAMP", "defaults to now"),
        ],
    },
    Relation {
        name: "orders",
        kind: RelationKind::Table,
        description: "purchase events",
        columns: &[
            col("id", "UUID", "primary key, generated"),
            col("client_id", "UUID", "references clients.id, nullable"),
            col("order_date", "DATE", "date of the order"),
            col("city", "VARCHAR(100)", "delivery city"),
            col("address", "TEXT", "delivery address"),
            col("payment_method", "VARCHAR(50)", "how the order was paid"),
            col("total", "DECIMAL(12,2)", "order total"),
            col(
                "status",
                "VARCHAR(50)",
                "one of pending, confirmed, delivered, cancelled; default pending",
            ),
            col("source_session_id", "VARCHAR(255)", "external session identifier"),
            col("created_at", "TIMESTAMP", "defaults to now"),
            col("updated_at", "TIMESTAMP", "defaults to now"),
        ],
    },
    Relation {
        name: "order_items",
        kind: RelationKind::Table,
        description: "product lines of an order",
        columns: &[
            col("id", "UUID", "primary key, generated"),
            col("order_id", "UUID", "references orders.id, required"),
            col("product_id", "UUID", "references products.id, nullable"),
            col("product_name", "VARCHAR(255)", "NOT NULL, authoritative product name"),
            col("variant", "VARCHAR(255)", "flavour or variant, optional"),
            col("quantity", "INTEGER", ">= 1, default 1"),
            col("unit", "VARCHAR(50)", "caja, unidad, paquete, kg"),
            col("unit_price", "DECIMAL(10,2)", ">= 0"),
            col("created_at", "TIMESTAMP", "defaults to now"),
        ],
    },
    Relation {
        name: "products",
        kind: RelationKind::Table,
        description: "catalog entries, UNIQUE(name, variant)",
        columns: &[
            col("id", "UUID", "primary key, generated"),
            col("name", "VARCHAR(100)", "NOT NULL"),
            col("variant", "VARCHAR(100)", "optional"),
            col("created_at", "TIMESTAMP", "defaults to now"),
        ],
    },
    Relation {
        name: "v_client_summary",
        kind: RelationKind::View,
        description: "one row per client with order count and total spent",
        columns: &[
            col("client_id", "UUID", ""),
            col("name", "VARCHAR", ""),
            col("phone", "VARCHAR", ""),
            col("source_client_id", "VARCHAR", ""),
            col("order_count", "BIGINT", ""),
            col("total_spent", "DECIMAL", ""),
            col("last_order_date", "DATE", ""),
        ],
    },
    Relation {
        name: "v_orders_with_client",
        kind: RelationKind::View,
        description: "orders joined with their client",
        columns: &[
            col("order_id", "UUID", ""),
            col("order_date", "DATE", ""),
            col("city", "VARCHAR", ""),
            col("total", "DECIMAL", ""),
            col("status", "VARCHAR", ""),
            col("client_name", "VARCHAR", ""),
            col("client_phone", "VARCHAR", ""),
        ],
    },
    Relation {
        name: "v_sales_by_month",
        kind: RelationKind::View,
        description: "sales grouped by month",
        columns: &[
            col("month", "TEXT", "YYYY-MM"),
            col("order_count", "BIGINT", ""),
            col("total_sales", "DECIMAL", ""),
        ],
    },
    Relation {
        name: "v_top_products",
        kind: RelationKind::View,
        description: "products ranked by units sold",
        columns: &[
            col("product_name", "VARCHAR", ""),
            col("variant", "VARCHAR", ""),
            col("units_sold", "BIGINT", ""),
            col("order_count", "BIGINT", ""),
        ],
    },
];

/// Official product names and variants, used to normalise free-text orders.
const CATALOG: &[(&str, &[&str])] = &[
    (
        "Arepa",
        &[
            "Maíz Multigranos",
            "Maíz Queso y Semillas",
            "Yuca y Queso",
            "Maduro y Queso",
        ],
    ),
    ("Brownie", &[]),
    ("Muffin", &["Chocolate", "Banano", "Zanahoria"]),
    ("Waffle", &["Yuca y Queso", "Plátano y Queso"]),
];

/// One sellable item: a product name and, when it has one, its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogProduct {
    pub name: &'static str,
    pub variant: Option<&'static str>,
}

impl CatalogProduct {
    /// "Muffin Banano", or just "Brownie".
    pub fn label(&self) -> String {
        match self.variant {
            Some(variant) => format!("{} {variant}", self.name),
            None => self.name.to_string(),
        }
    }
}

/// Every sellable item in catalog order, one entry per variant.
pub fn catalog() -> Vec<CatalogProduct> {
    CATALOG
        .iter()
        .flat_map(|&(name, variants)| {
            let variants: Vec<Option<&'static str>> = if variants.is_empty() {
                vec![None]
            } else {
                variants.iter().copied().map(Some).collect()
            };
            variants
                .into_iter()
                .map(move |variant| CatalogProduct { name, variant })
        })
        .collect()
}

/// The closed set of relations statements may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownSchema {
    relations: &'static [Relation],
}

impl KnownSchema {
    /// The sales store: four tables and four read-only views.
    pub const fn sales() -> Self {
        Self {
            relations: SALES_RELATIONS,
        }
    }

    /// All relations, tables first.
    pub fn relations(&self) -> &'static [Relation] {
        self.relations
    }

    /// Looks a relation up by its (already case-folded) name.
    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Renders the description handed to the statement translator.
    pub fn describe(&self) -> String {
        let mut out = String::from("PostgreSQL schema of the sales store.\n\n");

        for kind in [RelationKind::Table, RelationKind::View] {
            out.push_str(match kind {
                RelationKind::Table => "Tables:\n",
                RelationKind::View => "\nRead-only views (SELECT only):\n",
            });
            for relation in self.relations.iter().filter(|r| r.kind == kind) {
                let _ = writeln!(out, "- {} ({})", relation.name, relation.description);
                for column in relation.columns {
                    if column.note.is_empty() {
                        let _ = writeln!(out, "    {} {}", column.name, column.sql_type);
                    } else {
                        let _ = writeln!(
                            out,
                            "    {} {}: {}",
                            column.name, column.sql_type, column.note
                        );
                    }
                }
            }
        }

        out.push_str("\nProduct catalog (official names and variants):\n");
        for (name, variants) in CATALOG {
            if variants.is_empty() {
                let _ = writeln!(out, "- {name} (no variants)");
            } else {
                let _ = writeln!(out, "- {name}: {}", variants.join(", "));
            }
        }

        out.push_str(
            "\nAllowed statements: exactly one SELECT, INSERT or UPDATE against the \
             relations above. Views may only be read. No DELETE, no DDL, no comments, \
             no second statement after a semicolon.\n",
        );
        out
    }
}

impl Default for KnownSchema {
    fn default() -> Self {
        Self::sales()
    }
}
