pub mod errors;
pub mod internal_api;
pub mod routes;
pub mod utils;

use crate::{api, repo, webhook};
use std::sync::Arc;

/// Per-worker state, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub repo: repo::ImplAppRepo,
    pub webhook_router: Arc<webhook::whatsapp::handler::WebhookRouter>,
    pub sender: Arc<api::sender::OutboundSender>,
    pub verify_token: String,
    pub internal_api_secret: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        api::{
            action::{ActionDispatcher, MockActionHandlers},
            sender::OutboundSender,
            status::StatusReconciler,
        },
        repo::sqlite::tests::memory_repo,
        services::{MockMediaService, MockNotificationService, MockStorageService},
        webhook::whatsapp::{client::MockWhatsAppApi, handler::WebhookRouter},
    };
    use std::time::Duration;

    /// State over an in-memory database, with collaborators that expect no calls
    /// besides the notifier. Webhook secret `app_secret`, verify token
    /// `verify-me`, internal secret `internal`.
    pub(crate) async fn app_state() -> AppState {
        let repo: repo::ImplAppRepo = Arc::new(memory_repo().await);
        let mut notifier = MockNotificationService::new();
        notifier.expect_broadcast_reply().returning(|_| Ok(()));
        notifier.expect_refresh_unread_count().returning(|_| Ok(()));
        let notifier = Arc::new(notifier);

        AppState {
            repo: repo.clone(),
            webhook_router: Arc::new(WebhookRouter {
                repo: repo.clone(),
                media: Arc::new(MockMediaService::new()),
                notifier: notifier.clone(),
                dispatcher: ActionDispatcher {
                    handlers: Arc::new(MockActionHandlers::new()),
                    timeout: Duration::from_secs(1),
                },
                reconciler: StatusReconciler {
                    repo: repo.clone(),
                    notifier,
                },
                app_secret: "app_secret".to_string(),
            }),
            sender: Arc::new(OutboundSender {
                client: Arc::new(MockWhatsAppApi::new()),
                repo,
                storage: Arc::new(MockStorageService::new()),
            }),
            verify_token: "verify-me".to_string(),
            internal_api_secret: "internal".to_string(),
        }
    }
}
