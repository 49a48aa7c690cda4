//! # WhatsApp Business inbox
//!
//! Main entry point of the inbox service: receives the WhatsApp webhook,
//! keeps the message history and sends outbound messages for the chat panel.

#![recursion_limit = "256"]

pub mod api;
pub mod config;
pub mod consts;
pub mod front;
pub mod metric;
pub mod models;
pub mod repo;
pub mod services;
pub mod utils;
pub mod webhook;

use logfire::config::MetricsOptions;
use ntex::web;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use std::sync::Arc;
use webhook::whatsapp::client;

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    let app_config = config::init_config()?;

    // Initialize logging and metrics
    let mut logfire_config = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(logfire::config::SendToLogfire::IfTokenPresent);
    if let Some(token) = &app_config.logfire_token {
        logfire_config = logfire_config.with_token(token);
    }
    let shutdown_handler = logfire_config.finish()?;

    // Initialize database connection pool
    let db_pool = utils::setup_sqlite_db_pool(app_config).await?;
    utils::run_migrations(&db_pool).await?;
    let app_state = create_app_state(app_config, repo::sqlite::SqlxSqliteRepo { db_pool }).await?;

    logfire::info!(
        "starting inbox server on port {port}",
        port = app_config.web_server_port as i64
    );

    configure_and_run_server(app_config, app_state).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Configures SSL acceptor for production environments
fn setup_ssl_acceptor(
    app_config: &config::AppConfig,
) -> anyhow::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut ssl_acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls_server())
        .map_err(|e| anyhow::anyhow!("Failed to create SSL acceptor: {}", e))?;

    ssl_acceptor
        .set_private_key_file(&app_config.private_key_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load private key from {}: {}",
                app_config.private_key_path,
                e
            )
        })?;

    ssl_acceptor
        .set_certificate_file(&app_config.certificate_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load certificate from {}: {}",
                app_config.certificate_path,
                e
            )
        })?;

    Ok(ssl_acceptor)
}

/// Wires the collaborators shared by every worker
async fn create_app_state(
    app_config: &config::AppConfig,
    sqlite_repo: repo::sqlite::SqlxSqliteRepo,
) -> anyhow::Result<front::AppState> {
    let repo: repo::ImplAppRepo = Arc::new(sqlite_repo);

    // Initialize AWS services
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(app_config.aws_region.clone()))
        .load()
        .await;

    let storage_service: services::ImplStorageService =
        Arc::new(services::storage::StorageHandler {
            client: aws_sdk_s3::Client::new(&aws_config),
            bucket: app_config.media_bucket_name.clone(),
        });

    let whatsapp_client: Arc<dyn client::WhatsAppApi> =
        Arc::new(client::WhatsAppClient::new(app_config)?);
    let http_client = utils::build_http_client(app_config.http_timeout())?;

    let notification_service: services::ImplNotificationService =
        Arc::new(services::notification::NotificationHandler { repo: repo.clone() });

    let sender = Arc::new(api::sender::OutboundSender {
        client: whatsapp_client.clone(),
        repo: repo.clone(),
        storage: storage_service.clone(),
    });

    let action_handlers = Arc::new(api::handlers::BusinessActions {
        sender: sender.clone(),
        business: Arc::new(services::business::BusinessApiHandler {
            client: http_client.clone(),
            base_url: app_config.business_api_url.clone(),
        }),
        completion: Arc::new(services::completion::OpenAiCompletion {
            client: http_client,
            endpoint: app_config.openai_endpoint.clone(),
            api_key: app_config.openai_api_key.clone(),
            model: app_config.openai_model.clone(),
            system_context: app_config
                .assistant_context
                .clone()
                .unwrap_or_else(|| consts::DEFAULT_ASSISTANT_CONTEXT.to_string()),
        }),
    });

    let webhook_router = Arc::new(webhook::whatsapp::handler::WebhookRouter {
        repo: repo.clone(),
        media: Arc::new(services::media::MediaHandler {
            client: whatsapp_client,
            storage: storage_service,
            repo: repo.clone(),
        }),
        notifier: notification_service.clone(),
        dispatcher: api::action::ActionDispatcher {
            handlers: action_handlers,
            timeout: consts::ACTION_HANDLER_TIMEOUT,
        },
        reconciler: api::status::StatusReconciler {
            repo: repo.clone(),
            notifier: notification_service,
        },
        app_secret: app_config.whatsapp_app_secret.clone(),
    });

    Ok(front::AppState {
        repo,
        webhook_router,
        sender,
        verify_token: app_config.whatsapp_verify_token.clone(),
        internal_api_secret: app_config.internal_api_secret.clone(),
    })
}

/// Configures and starts the web server with appropriate SSL settings
async fn configure_and_run_server(
    app_config: &'static config::AppConfig,
    app_state: front::AppState,
) -> anyhow::Result<()> {
    let server_addr = ("0.0.0.0", app_config.web_server_port);

    let server = web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(app_state.clone())
            .configure(webhook::routes::whatsapp)
            .configure(front::routes::internal)
    });

    let bound_server = if app_config.is_prod() {
        let ssl_acceptor = setup_ssl_acceptor(app_config)?;
        server.bind_openssl(server_addr, ssl_acceptor)?
    } else {
        server.bind(server_addr)?
    };

    bound_server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
