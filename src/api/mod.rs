//! # API Module
//!
//! Business logic of the inbox, independent of the HTTP layer.
//!
//! ## Modules
//!
//! - [`action`] - Button payload decoding and action dispatch
//! - [`handlers`] - Handlers of the known button actions
//! - [`sender`] - Outbound text, media and template messages
//! - [`status`] - Delivery status state machine
//! - [`template`] - Template placeholder rendering

pub mod action;
pub mod handlers;
pub mod sender;
pub mod status;
pub mod template;
