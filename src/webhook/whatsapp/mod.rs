//! WhatsApp webhook integration module
//!
//! ## Submodules
//!
//! - [`handler`] - Routing of webhook deliveries (messages, statuses, actions)
//! - [`routes`] - HTTP endpoint handlers for WhatsApp webhooks
//! - [`schemas`] - Data structures of the inbound webhook payloads
//! - [`outgoing_schemas`] - Data structures of the outbound messages
//! - [`client`] - WhatsApp API client for sending messages and media
//! - [`security`] - `X-Hub-Signature-256` verification

pub mod client;
pub mod handler;
pub mod outgoing_schemas;
pub mod routes;
pub mod schemas;
pub mod security;

pub use routes::{receive, verify};
