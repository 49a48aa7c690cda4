//! Route configuration of the internal endpoints.

use super::internal_api;
use ntex::web;

/// Configures the internal routes, guarded by the `X-Internal-Secret` header.
///
/// # Routes
/// - `POST /internal/send-message` - Send a text, media or template message
/// - `PUT /internal/template` - Store a template definition
pub fn internal(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/internal")
            .service((internal_api::send_message, internal_api::put_template)),
    );
}
