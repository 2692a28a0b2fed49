// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trust boundary of the Pika gateway: the identity and transport gate, and
//! secret redaction for log output.

pub mod gate;
pub mod redact;

pub use gate::{Gate, GateRejection};
pub use redact::{RedactingWriter, SecretRegistry, redact};
