//! WhatsApp webhook endpoint handlers
//!
//! This module handles incoming webhook requests from WhatsApp Business API.
//! It implements both the verification endpoint (GET) and the webhook receiver (POST).

use crate::{
    consts,
    front::{AppState, errors::ApiError, utils},
};
use ntex::{util::Bytes, web};
use serde::Deserialize;

/// Query parameters for webhook verification
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// The mode parameter, should be "subscribe"
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    /// The verification token from WhatsApp
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    /// The challenge string to echo back
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Webhook verification endpoint (GET)
///
/// WhatsApp sends a GET request to verify the webhook URL.
///
/// # Returns
/// - 200 with challenge string if verification succeeds
/// - 400 if a parameter is missing
/// - 403 if the mode or the token doesn't match
#[web::get("")]
pub async fn verify(
    query: web::types::Query<VerifyQuery>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let (Some(mode), Some(verify_token), Some(challenge)) =
        (&query.mode, &query.verify_token, &query.challenge)
    else {
        return Err(ApiError::BadRequest(
            "hub.mode, hub.verify_token and hub.challenge are required".to_string(),
        )
        .into());
    };

    if mode != "subscribe" || !utils::secret_matches(Some(verify_token), &app_state.verify_token) {
        logfire::warn!("webhook verification rejected");
        return Err(ApiError::Forbidden.into());
    }

    Ok(web::HttpResponse::Ok()
        .content_type("text/plain")
        .body(challenge.clone()))
}

/// Webhook receiver endpoint (POST)
///
/// The body is verified against `X-Hub-Signature-256` before it is parsed.
/// WhatsApp retries deliveries answered with a non-2xx status, so only
/// failures to store the delivery are reported as errors.
#[web::post("")]
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let signature = utils::get_header_str_value(req.headers(), consts::SIGNATURE_HEADER_NAME);

    app_state
        .webhook_router
        .handle(signature, &body)
        .await
        .map_err(|e| {
            logfire::warn!("webhook delivery rejected: {error}", error = e.to_string());
            ApiError::from(e)
        })?;

    Ok(web::HttpResponse::Ok().json(&serde_json::json!({
        "status": "received"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        front::tests::app_state,
        webhook::{self, whatsapp::security},
    };
    use ntex::web::test;

    #[ntex::test]
    async fn test_verify_endpoint() {
        let app = test::init_service(
            web::App::new()
                .state(app_state().await)
                .configure(webhook::routes::whatsapp),
        )
        .await;

        let cases = [
            ("?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=42", 200),
            ("?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=42", 403),
            ("?hub.mode=unsubscribe&hub.verify_token=verify-me&hub.challenge=42", 403),
            ("?hub.mode=subscribe&hub.challenge=42", 400),
        ];

        for (query, expected) in cases {
            let req = test::TestRequest::get()
                .uri(&format!("/webhook/whatsapp{query}"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), expected, "query: {query}");

            if expected == 200 {
                assert_eq!(test::read_body(resp).await, Bytes::from_static(b"42"));
            }
        }
    }

    #[ntex::test]
    async fn test_receive_endpoint_status_codes() {
        let app = test::init_service(
            web::App::new()
                .state(app_state().await)
                .configure(webhook::routes::whatsapp),
        )
        .await;

        let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;

        let unsigned = test::TestRequest::post()
            .uri("/webhook/whatsapp")
            .set_payload(body.to_vec())
            .to_request();
        assert_eq!(test::call_service(&app, unsigned).await.status().as_u16(), 401);

        let signed = test::TestRequest::post()
            .uri("/webhook/whatsapp")
            .header(consts::SIGNATURE_HEADER_NAME, security::sign(body, "app_secret"))
            .set_payload(body.to_vec())
            .to_request();
        assert_eq!(test::call_service(&app, signed).await.status().as_u16(), 200);

        let garbage = b"not json";
        let malformed = test::TestRequest::post()
            .uri("/webhook/whatsapp")
            .header(consts::SIGNATURE_HEADER_NAME, security::sign(garbage, "app_secret"))
            .set_payload(garbage.to_vec())
            .to_request();
        assert_eq!(test::call_service(&app, malformed).await.status().as_u16(), 400);
    }
}
