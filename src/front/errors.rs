use crate::{api::sender::SendError, webhook::whatsapp::handler::WebhookError};
use derive_more::{Display, Error};
use ntex::{http, web};
use serde_json::json;

#[derive(Debug, Display, Error)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    BadRequest(#[error(not(source))] String),
    /// Provider answer relayed as-is
    #[display("upstream error {status}: {body}")]
    Upstream {
        status: u16,
        body: String,
    },
    InternalServerError(#[error(not(source))] String),
}

impl web::error::WebResponseError for ApiError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        match self {
            ApiError::Upstream { body, .. } => {
                logfire::warn!("relaying upstream error: {error}", error = self.to_string());

                let content_type = if serde_json::from_str::<serde_json::Value>(body).is_ok() {
                    "application/json"
                } else {
                    "text/plain; charset=utf-8"
                };

                web::HttpResponse::build(self.status_code())
                    .set_header("content-type", content_type)
                    .body(body.clone())
            }
            ApiError::InternalServerError(msg) => {
                logfire::error!("internal error: {error}", error = msg.clone());
                web::HttpResponse::build(self.status_code())
                    .json(&json!({"error": "internal server error"}))
            }
            ApiError::BadRequest(msg) => web::HttpResponse::build(self.status_code())
                .json(&json!({"error": msg})),
            ApiError::Unauthorized | ApiError::Forbidden => {
                web::HttpResponse::build(self.status_code())
                    .json(&json!({"error": self.to_string().to_lowercase()}))
            }
        }
    }

    fn status_code(&self) -> http::StatusCode {
        match self {
            ApiError::Unauthorized => http::StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => http::StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => http::StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => {
                http::StatusCode::from_u16(*status).unwrap_or(http::StatusCode::BAD_GATEWAY)
            }
            ApiError::InternalServerError(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SendError> for ApiError {
    fn from(error: SendError) -> Self {
        match error {
            SendError::Validation(msg) => ApiError::BadRequest(msg),
            SendError::Upstream { status, body } => ApiError::Upstream { status, body },
            SendError::Internal(msg) => ApiError::InternalServerError(msg),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(error: WebhookError) -> Self {
        match error {
            WebhookError::AuthenticationFailure => ApiError::Unauthorized,
            WebhookError::ValidationFailure(msg) => ApiError::BadRequest(msg),
            WebhookError::PersistenceFailure(msg) => ApiError::InternalServerError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntex::web::error::WebResponseError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(WebhookError::AuthenticationFailure).status_code(),
            http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(WebhookError::ValidationFailure("x".into())).status_code(),
            http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(WebhookError::PersistenceFailure("x".into())).status_code(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SendError::Upstream {
                status: 429,
                body: "{}".into()
            })
            .status_code(),
            http::StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Upstream {
                status: 42,
                body: String::new()
            }
            .status_code(),
            http::StatusCode::BAD_GATEWAY
        );
    }
}
