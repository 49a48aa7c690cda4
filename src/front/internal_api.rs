//! Internal API endpoints used by the chat panel.
//!
//! These endpoints are not exposed to the public internet. They require
//! authentication via the X-Internal-Secret header.

use crate::{
    api::sender::{FileKind, OutboundFile, SendMessageRequest},
    consts,
    front::{AppState, errors::ApiError, utils},
    models::template::{TemplateDefinition, TemplateRequest},
};
use anyhow::{Context, bail};
use futures::TryStreamExt;
use ntex::web;
use serde_json::json;

fn verify_internal_secret(req: &web::HttpRequest, app_state: &AppState) -> Result<(), ApiError> {
    let provided = utils::get_header_str_value(req.headers(), consts::INTERNAL_SECRET_HEADER_NAME);

    if !utils::secret_matches(provided, &app_state.internal_api_secret) {
        logfire::warn!("rejected internal api call with an invalid secret");
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

#[derive(Default)]
struct SendMessageForm {
    to: Option<String>,
    message: Option<String>,
    file_type: Option<String>,
    file: Option<(String, String, Vec<u8>)>,
    template: Option<String>,
}

impl SendMessageForm {
    fn into_request(self) -> anyhow::Result<SendMessageRequest> {
        let to = self
            .to
            .map(|to| to.trim().to_string())
            .filter(|to| !to.is_empty())
            .context("`to` is required")?;

        let template = self
            .template
            .filter(|t| !t.trim().is_empty())
            .map(|t| serde_json::from_str::<TemplateRequest>(&t))
            .transpose()
            .context("`template` is not a valid template request")?;

        let file = self.file.map(|(filename, mime_type, bytes)| OutboundFile {
            kind: FileKind::from_tag(self.file_type.as_deref()),
            filename,
            mime_type,
            bytes,
        });

        Ok(SendMessageRequest {
            to,
            message: self.message,
            file,
            template,
        })
    }
}

async fn deserialize_send_form(
    mut payload: ntex_multipart::Multipart,
) -> anyhow::Result<SendMessageRequest> {
    let mut form = SendMessageForm::default();

    while let Ok(Some(field)) = payload.try_next().await {
        let content_disposition = utils::get_header_str_value(field.headers(), "content-disposition")
            .unwrap_or_default()
            .to_string();
        let Some(name) = utils::content_disposition_param(&content_disposition, "name") else {
            continue;
        };

        match name.as_str() {
            "to" => form.to = Some(utils::get_field_value(field).await),
            "message" => form.message = Some(utils::get_field_value(field).await),
            "fileType" => form.file_type = Some(utils::get_field_value(field).await),
            "template" => form.template = Some(utils::get_field_value(field).await),
            "file" => {
                let filename = utils::content_disposition_param(&content_disposition, "filename")
                    .unwrap_or_else(|| "file".to_string());
                let mime_type = field.content_type().essence_str().to_string();
                let body = utils::get_bytes_value(field).await;

                if body.len() > consts::OUTBOUND_FILE_MAX_SIZE_BYTES {
                    bail!(
                        "file is too big. max size: {}",
                        consts::OUTBOUND_FILE_MAX_SIZE_BYTES
                    )
                }

                form.file = Some((filename, mime_type, body));
            }
            _ => continue,
        }
    }

    form.into_request()
}

/// Sends a text, media or template message to a contact.
///
/// Multipart fields: `to`, `message`, `fileType` (`image`, `video`, `file`),
/// `file` and `template` (JSON). Provider errors are relayed with their
/// status and body.
#[web::post("/send-message")]
pub async fn send_message(
    req: web::HttpRequest,
    app_state: web::types::State<AppState>,
    payload: ntex_multipart::Multipart,
) -> Result<impl web::Responder, web::Error> {
    verify_internal_secret(&req, &app_state)?;

    let request = deserialize_send_form(payload)
        .await
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;

    let sent = app_state.sender.send(request).await.map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&sent))
}

/// Stores the canonical definition of a template, used to render the
/// template messages kept in the inbox
#[web::put("/template")]
pub async fn put_template(
    req: web::HttpRequest,
    app_state: web::types::State<AppState>,
    definition: web::types::Json<TemplateDefinition>,
) -> Result<impl web::Responder, web::Error> {
    verify_internal_secret(&req, &app_state)?;

    let definition = definition.into_inner();
    if definition.name.trim().is_empty() || definition.language.trim().is_empty() {
        return Err(ApiError::BadRequest("`name` and `language` are required".to_string()).into());
    }

    app_state
        .repo
        .upsert_message_template(&definition)
        .await
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;

    Ok(web::HttpResponse::Ok().json(&json!({
        "name": definition.name,
        "language": definition.language
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{routes, tests::app_state};
    use ntex::web::test;

    const DEFINITION: &str = r#"{"name":"promo","language":"es","components":[{"type":"BODY","text":"Hola {{1}}"}]}"#;

    #[test]
    fn test_form_requires_recipient() {
        let form = SendMessageForm {
            message: Some("hola".to_string()),
            ..Default::default()
        };

        assert!(form.into_request().is_err());
    }

    #[test]
    fn test_form_file_and_template() {
        let form = SendMessageForm {
            to: Some(" 15550001111 ".to_string()),
            file_type: Some("image".to_string()),
            file: Some(("a.png".to_string(), "image/png".to_string(), vec![1, 2, 3])),
            template: Some(r#"{"name":"promo","language":{"code":"es"}}"#.to_string()),
            ..Default::default()
        };

        let request = form.into_request().unwrap();

        assert_eq!(request.to, "15550001111");
        assert_eq!(request.file.unwrap().kind, FileKind::Image);
        assert_eq!(request.template.unwrap().name, "promo");
    }

    #[test]
    fn test_form_rejects_bad_template_json() {
        let form = SendMessageForm {
            to: Some("15550001111".to_string()),
            template: Some("{not json".to_string()),
            ..Default::default()
        };

        assert!(form.into_request().is_err());
    }

    #[ntex::test]
    async fn test_internal_routes_require_secret() {
        let app = test::init_service(
            web::App::new()
                .state(app_state().await)
                .configure(routes::internal),
        )
        .await;

        for secret in [None, Some("wrong")] {
            let mut put = test::TestRequest::put()
                .uri("/internal/template")
                .header("content-type", "application/json");
            let mut send = test::TestRequest::post()
                .uri("/internal/send-message")
                .header("content-type", "multipart/form-data; boundary=xyz");
            if let Some(secret) = secret {
                put = put.header(consts::INTERNAL_SECRET_HEADER_NAME, secret);
                send = send.header(consts::INTERNAL_SECRET_HEADER_NAME, secret);
            }

            let put = put.set_payload(DEFINITION).to_request();
            assert_eq!(test::call_service(&app, put).await.status().as_u16(), 401);

            let send = send.set_payload("--xyz--\r\n").to_request();
            assert_eq!(test::call_service(&app, send).await.status().as_u16(), 401);
        }
    }

    #[ntex::test]
    async fn test_put_template_with_secret_stores_definition() {
        let state = app_state().await;
        let repo = state.repo.clone();
        let app = test::init_service(
            web::App::new().state(state).configure(routes::internal),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/internal/template")
            .header("content-type", "application/json")
            .header(consts::INTERNAL_SECRET_HEADER_NAME, "internal")
            .set_payload(DEFINITION)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status().as_u16(), 200);

        let stored = repo.get_message_template("promo", "es").await.unwrap();
        assert!(stored.is_some());
    }
}
