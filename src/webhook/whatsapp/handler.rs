//! # WhatsApp Webhook Handler
//!
//! Entry point of every webhook delivery. A request goes through
//! verification, parsing and raw persistence before anything else happens;
//! a failure in those steps leaves no trace. After the raw entries are stored,
//! each `messages` change is routed to contacts, messages, media download,
//! button actions and status reconciliation.
//!
//! Deliveries are at least once and may arrive out of order. Duplicates are
//! absorbed by the repository: a known `wam_id` inserts nothing and triggers
//! nothing, a status that doesn't move forward changes nothing.

use super::{schemas, security};
use crate::{
    api::{
        action::{self, ActionDispatcher, DispatchOutcome},
        status::{StatusOutcome, StatusReconciler},
    },
    metric, repo, services,
};
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::Instrument;

#[derive(Debug, Display, Error)]
pub enum WebhookError {
    #[display("webhook signature verification failed")]
    AuthenticationFailure,
    #[display("malformed webhook payload: {_0}")]
    ValidationFailure(#[error(not(source))] String),
    #[display("failed to persist webhook: {_0}")]
    PersistenceFailure(#[error(not(source))] String),
}

/// Counters of what a delivery produced
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct WebhookReport {
    pub entries: usize,
    pub messages_received: usize,
    pub messages_inserted: usize,
    pub media_downloaded: usize,
    pub actions_handled: usize,
    pub statuses_applied: usize,
    pub statuses_skipped: usize,
}

#[derive(Clone)]
pub struct WebhookRouter {
    pub repo: repo::ImplAppRepo,
    pub media: services::ImplMediaService,
    pub notifier: services::ImplNotificationService,
    pub dispatcher: ActionDispatcher,
    pub reconciler: StatusReconciler,
    pub app_secret: String,
}

impl WebhookRouter {
    /// Processes one webhook delivery.
    ///
    /// `signature` is the `X-Hub-Signature-256` header and `body` the untouched
    /// request body.
    pub async fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookReport, WebhookError> {
        self.process(signature, body)
            .instrument(logfire::span!("whatsapp_webhook"))
            .await
    }

    async fn process(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookReport, WebhookError> {
        if !security::verify_request(signature, body, &self.app_secret) {
            metric::incr_webhook_event_statds("rejected");
            return Err(WebhookError::AuthenticationFailure);
        }

        let (raw_entries, values) = parse(body)?;

        self.repo
            .insert_webhook_entries(&raw_entries)
            .await
            .map_err(|e| WebhookError::PersistenceFailure(e.to_string()))?;

        let mut report = WebhookReport {
            entries: raw_entries.len(),
            ..Default::default()
        };
        let mut status_failures = 0;

        for value in &values {
            if let Some(messages) = &value.messages {
                let contacts = value.contacts.as_deref().unwrap_or_default();
                self.route_messages(contacts, messages, &mut report).await?;
            }

            for status in value.statuses.iter().flatten() {
                match self.reconciler.reconcile(status).await {
                    Ok(StatusOutcome::Applied(_)) => report.statuses_applied += 1,
                    Ok(_) => report.statuses_skipped += 1,
                    Err(e) => {
                        status_failures += 1;
                        logfire::error!(
                            "failed to store status {state} of {wam_id}: {error}",
                            state = status.status.clone(),
                            wam_id = status.id.clone(),
                            error = e.to_string()
                        );
                    }
                }
            }
        }

        metric::incr_webhook_event_statds("received");

        if status_failures > 0 {
            return Err(WebhookError::PersistenceFailure(format!(
                "{status_failures} status updates could not be stored"
            )));
        }

        logfire::info!(
            "webhook processed: {inserted} new messages, {statuses} statuses applied",
            inserted = report.messages_inserted as i64,
            statuses = report.statuses_applied as i64
        );

        Ok(report)
    }

    async fn route_messages(
        &self,
        contacts: &[schemas::Contact],
        messages: &[schemas::Message],
        report: &mut WebhookReport,
    ) -> Result<(), WebhookError> {
        report.messages_received += messages.len();

        let rows: Vec<_> = messages
            .iter()
            .filter_map(|message| match message.to_new_message() {
                Ok(row) => Some(row),
                Err(e) => {
                    logfire::warn!(
                        "skipping message {wam_id}: {error}",
                        wam_id = message.id.clone(),
                        error = e.to_string()
                    );
                    None
                }
            })
            .collect();

        let last_seen = last_seen_by_contact(&rows);
        for contact in contacts {
            let seen_at = last_seen.get(&contact.wa_id).copied().unwrap_or_else(Utc::now);
            if let Err(e) = self.repo.upsert_contact(&contact.to_sighting(seen_at)).await {
                logfire::error!(
                    "failed to upsert contact {wa_id}: {error}",
                    wa_id = contact.wa_id.clone(),
                    error = e.to_string()
                );
            }
        }

        let inserted: HashSet<String> = self
            .repo
            .insert_messages(&rows)
            .await
            .map_err(|e| WebhookError::PersistenceFailure(e.to_string()))?
            .into_iter()
            .collect();
        report.messages_inserted += inserted.len();

        for message in messages.iter().filter(|m| inserted.contains(&m.id)) {
            if message.is_downloadable_media() {
                match self.media.download_media(message).await {
                    Ok(()) => report.media_downloaded += 1,
                    Err(e) => {
                        logfire::error!(
                            "media download failed for {wam_id}: {error}",
                            wam_id = message.id.clone(),
                            error = format!("{e:#}")
                        );
                    }
                }
            }

            if let Some(button) = message.button.as_ref().filter(|_| message.msg_type == "button") {
                match action::decode_button_payload(&button.payload, &message.from) {
                    Ok(decoded) => {
                        if self.dispatcher.dispatch(&decoded).await == DispatchOutcome::Handled {
                            report.actions_handled += 1;
                        }
                    }
                    Err(e) => {
                        logfire::warn!(
                            "undecodable button payload on {wam_id}: {error}",
                            wam_id = message.id.clone(),
                            error = e.to_string()
                        );
                    }
                }
            }
        }

        if let Err(e) = self.notifier.broadcast_reply(messages).await {
            logfire::error!(
                "broadcast reply notification failed: {error}",
                error = e.to_string()
            );
        }

        let mut senders: Vec<String> = Vec::new();
        for message in messages {
            if !senders.contains(&message.from) {
                senders.push(message.from.clone());
            }
        }
        if let Err(e) = self.notifier.refresh_unread_count(&senders).await {
            logfire::error!(
                "unread count refresh failed: {error}",
                error = e.to_string()
            );
        }

        Ok(())
    }
}

/// Splits the body into the raw entries to store and the typed values of the
/// `messages` changes
fn parse(body: &[u8]) -> Result<(Vec<serde_json::Value>, Vec<schemas::Value>), WebhookError> {
    let raw: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| WebhookError::ValidationFailure(e.to_string()))?;

    let payload: schemas::WebhookPayload = serde_json::from_value(raw.clone())
        .map_err(|e| WebhookError::ValidationFailure(e.to_string()))?;

    let raw_entries = match raw.get("entry") {
        Some(serde_json::Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    };

    let values = payload
        .entry
        .into_iter()
        .flat_map(|entry| entry.changes)
        .filter(|change| change.is_messages())
        .map(|change| {
            serde_json::from_value::<schemas::Value>(change.value)
                .map_err(|e| WebhookError::ValidationFailure(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((raw_entries, values))
}

fn last_seen_by_contact(
    rows: &[crate::models::message::NewMessage],
) -> HashMap<String, DateTime<Utc>> {
    let mut last_seen: HashMap<String, DateTime<Utc>> = HashMap::new();
    for row in rows {
        last_seen
            .entry(row.chat_id.clone())
            .and_modify(|at| *at = (*at).max(row.created_at))
            .or_insert(row.created_at);
    }
    last_seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::action::MockActionHandlers,
        models::message::MessageStatus,
        repo::{AppRepo, ImplAppRepo, sqlite::tests::memory_repo, sqlite::tests::new_message},
        services::{MockMediaService, MockNotificationService},
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    const SECRET: &str = "app_secret";

    struct Mocks {
        media: MockMediaService,
        notifier: MockNotificationService,
        handlers: MockActionHandlers,
    }

    impl Mocks {
        /// Notifier that accepts any call
        fn quiet() -> Self {
            let mut notifier = MockNotificationService::new();
            notifier.expect_broadcast_reply().returning(|_| Ok(()));
            notifier.expect_refresh_unread_count().returning(|_| Ok(()));
            notifier.expect_broadcast_status().returning(|_| Ok(()));

            Self {
                media: MockMediaService::new(),
                notifier,
                handlers: MockActionHandlers::new(),
            }
        }
    }

    fn router(repo: ImplAppRepo, mocks: Mocks) -> WebhookRouter {
        let notifier: services::ImplNotificationService = Arc::new(mocks.notifier);

        WebhookRouter {
            repo: repo.clone(),
            media: Arc::new(mocks.media),
            notifier: notifier.clone(),
            dispatcher: ActionDispatcher {
                handlers: Arc::new(mocks.handlers),
                timeout: Duration::from_secs(1),
            },
            reconciler: StatusReconciler { repo, notifier },
            app_secret: SECRET.to_string(),
        }
    }

    fn envelope(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "changes": [{"field": "messages", "value": value}]
            }]
        }))
        .unwrap()
    }

    fn inbound(messages: serde_json::Value) -> Vec<u8> {
        envelope(json!({
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "15550009999", "phone_number_id": "123456"},
            "contacts": [{"profile": {"name": "Alice"}, "wa_id": "15550001111"}],
            "messages": messages
        }))
    }

    async fn count(repo: &repo::sqlite::SqlxSqliteRepo, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&repo.db_pool)
            .await
            .unwrap()
    }

    #[ntex::test]
    async fn test_bad_signature_persists_nothing() {
        let sqlite = memory_repo().await;
        let router = router(Arc::new(sqlite.clone()), Mocks::quiet());
        let body = inbound(json!([{
            "from": "15550001111", "id": "wamid.IN1", "timestamp": "1700000000",
            "type": "text", "text": {"body": "hola"}
        }]));

        let missing = router.handle(None, &body).await;
        let forged = router
            .handle(Some(&security::sign(&body, "other_secret")), &body)
            .await;

        assert!(matches!(missing, Err(WebhookError::AuthenticationFailure)));
        assert!(matches!(forged, Err(WebhookError::AuthenticationFailure)));
        assert_eq!(count(&sqlite, "webhook_event").await, 0);
        assert_eq!(count(&sqlite, "message").await, 0);
        assert_eq!(count(&sqlite, "contact").await, 0);
    }

    #[ntex::test]
    async fn test_malformed_envelope_is_a_validation_failure() {
        let sqlite = memory_repo().await;
        let router = router(Arc::new(sqlite.clone()), Mocks::quiet());
        let body = br#"{"object":"whatsapp_business_account","entry":"nope"}"#;

        let result = router.handle(Some(&security::sign(body, SECRET)), body).await;

        assert!(matches!(result, Err(WebhookError::ValidationFailure(_))));
        assert_eq!(count(&sqlite, "webhook_event").await, 0);
    }

    #[ntex::test]
    async fn test_duplicate_delivery_has_no_duplicate_side_effects() {
        let sqlite = memory_repo().await;
        let mut mocks = Mocks::quiet();
        mocks
            .media
            .expect_download_media()
            .withf(|message| message.id == "wamid.IMG1")
            .times(1)
            .returning(|_| Ok(()));

        let router = router(Arc::new(sqlite.clone()), mocks);
        let body = inbound(json!([
            {"from": "15550001111", "id": "wamid.IN1", "timestamp": "1700000000",
             "type": "text", "text": {"body": "hola"}},
            {"from": "15550001111", "id": "wamid.IMG1", "timestamp": "1700000001",
             "type": "image", "image": {"id": "media-1", "mime_type": "image/jpeg"}}
        ]));
        let signature = security::sign(&body, SECRET);

        let first = router.handle(Some(&signature), &body).await.unwrap();
        let second = router.handle(Some(&signature), &body).await.unwrap();

        assert_eq!(first.messages_inserted, 2);
        assert_eq!(first.media_downloaded, 1);
        assert_eq!(second.messages_inserted, 0);
        assert_eq!(second.media_downloaded, 0);
        assert_eq!(count(&sqlite, "message").await, 2);
        // raw entries are an append-only log
        assert_eq!(count(&sqlite, "webhook_event").await, 2);

        let contact = sqlite.get_contact("15550001111").await.unwrap().unwrap();
        assert_eq!(contact.profile_name.as_deref(), Some("Alice"));
        assert_eq!(contact.unread_count, 0);
    }

    #[ntex::test]
    async fn test_late_envelope_does_not_rewind_contact_times() {
        let sqlite = memory_repo().await;
        let router = router(Arc::new(sqlite.clone()), Mocks::quiet());
        let newer = inbound(json!([{
            "from": "15550001111", "id": "wamid.NEW", "timestamp": "1700000500",
            "type": "text", "text": {"body": "second"}
        }]));
        let older = inbound(json!([{
            "from": "15550001111", "id": "wamid.OLD", "timestamp": "1700000000",
            "type": "text", "text": {"body": "first"}
        }]));

        router
            .handle(Some(&security::sign(&newer, SECRET)), &newer)
            .await
            .unwrap();
        router
            .handle(Some(&security::sign(&older, SECRET)), &older)
            .await
            .unwrap();

        let expected = DateTime::from_timestamp(1_700_000_500, 0);
        let contact = sqlite.get_contact("15550001111").await.unwrap().unwrap();
        assert_eq!(contact.last_message_at, expected);
        assert_eq!(contact.last_message_received_at, expected);
        assert_eq!(count(&sqlite, "message").await, 2);
    }

    #[ntex::test]
    async fn test_button_press_dispatches_enable_smart_price() {
        let sqlite = memory_repo().await;
        let mut mocks = Mocks::quiet();
        mocks
            .handlers
            .expect_enable_smart_price()
            .withf(|request| request.user_id == "u1" && request.wa_id == "15550001111")
            .times(1)
            .returning(|_| Ok(()));

        let router = router(Arc::new(sqlite), mocks);
        let body = inbound(json!([{
            "from": "15550001111", "id": "wamid.BTN1", "timestamp": "1700000000",
            "type": "button",
            "context": {"from": "15550009999", "id": "wamid.BC1"},
            "button": {
                "text": "Enable",
                "payload": "{\"action\":\"enableSmartPrice\",\"data\":{\"user_id\":\"u1\"}}"
            }
        }]));
        let signature = security::sign(&body, SECRET);

        let report = router.handle(Some(&signature), &body).await.unwrap();
        assert_eq!(report.actions_handled, 1);

        // a redelivery must not run the action again
        let report = router.handle(Some(&signature), &body).await.unwrap();
        assert_eq!(report.actions_handled, 0);
    }

    #[ntex::test]
    async fn test_unknown_action_and_bad_payload_are_skipped() {
        let router = router(Arc::new(memory_repo().await), Mocks::quiet());
        let body = inbound(json!([
            {"from": "15550001111", "id": "wamid.BTN2", "timestamp": "1700000000",
             "type": "button", "button": {"text": "?", "payload": "{\"action\":\"launchRocket\"}"}},
            {"from": "15550001111", "id": "wamid.BTN3", "timestamp": "1700000000",
             "type": "button", "button": {"text": "Stop", "payload": "STOP"}}
        ]));

        let report = router
            .handle(Some(&security::sign(&body, SECRET)), &body)
            .await
            .unwrap();

        assert_eq!(report.messages_inserted, 2);
        assert_eq!(report.actions_handled, 0);
    }

    #[ntex::test]
    async fn test_statuses_continue_after_unknown_value() {
        let sqlite = memory_repo().await;
        sqlite
            .insert_messages(&[new_message("wamid.OUT1", "15550001111", false)])
            .await
            .unwrap();

        let router = router(Arc::new(sqlite.clone()), Mocks::quiet());
        let body = envelope(json!({
            "messaging_product": "whatsapp",
            "statuses": [
                {"id": "wamid.OUT1", "status": "queued", "timestamp": "1700000050", "recipient_id": "15550001111"},
                {"id": "wamid.OUT1", "status": "read", "timestamp": "1700000200", "recipient_id": "15550001111"},
                {"id": "wamid.OUT1", "status": "delivered", "timestamp": "1700000100", "recipient_id": "15550001111"}
            ]
        }));

        let report = router
            .handle(Some(&security::sign(&body, SECRET)), &body)
            .await
            .unwrap();

        assert_eq!(report.statuses_applied, 1);
        assert_eq!(report.statuses_skipped, 2);

        let stored = sqlite.get_message("wamid.OUT1").await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
        assert_eq!(stored.read_at.unwrap().timestamp(), 1_700_000_200);
    }

    #[ntex::test]
    async fn test_non_message_changes_are_only_stored_raw() {
        let sqlite = memory_repo().await;
        let router = router(Arc::new(sqlite.clone()), Mocks::quiet());
        let body = serde_json::to_vec(&json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "changes": [{"field": "account_update", "value": {"event": "VERIFIED_ACCOUNT"}}]
            }]
        }))
        .unwrap();

        let report = router
            .handle(Some(&security::sign(&body, SECRET)), &body)
            .await
            .unwrap();

        assert_eq!(report.entries, 1);
        assert_eq!(count(&sqlite, "webhook_event").await, 1);
        assert_eq!(count(&sqlite, "message").await, 0);
    }
}
