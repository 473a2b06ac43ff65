//! PostgreSQL wire protocol implementation.
//!
//! # Structure
//!
//! - [`codec`] - Big-endian field encoding/decoding primitives
//! - [`frame`] - Inbound frame extraction from transport chunks
//! - [`frontend`] - Client → server messages
//! - [`backend`] - Server → client messages
//! - [`types`] - Shared protocol types (OIDs, format codes)

pub mod backend;
pub mod codec;
pub mod frame;
pub mod frontend;
pub mod types;
