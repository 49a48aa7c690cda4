//! Application configuration management with security considerations.
//!
//! This module handles all configuration values required for the application.
//! Sensitive fields are clearly marked and must never be logged.
//!
//! # Security Notes
//! - Production environments should use secure secret management systems
//! - All sensitive data should be stored using encryption at rest

use anyhow::Context;
use envconfig::Envconfig;
use std::{sync::OnceLock, time::Duration};

/// Application configuration with security-aware field management.
///
/// This struct contains all environment variables used to configure the application.
///
/// # Security Requirements
/// - All `SENSITIVE` fields must be stored securely (encrypted at rest)
/// - Never log or expose sensitive values
/// - Rotate sensitive credentials regularly
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Database host value (NON-SENSITIVE)
    /// Example: "sqlite:data/inbox.db"
    pub db_host: String,

    /// 🔒 SENSITIVE: Database password to encrypt SQLite data
    pub db_pass_encrypt: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "8080")]
    pub web_server_port: u16,

    /// Path to SSL private key file (SENSITIVE PATH)
    #[envconfig(default = "server.key")]
    pub private_key_path: String,

    /// Path to SSL certificate file (NON-SENSITIVE)
    #[envconfig(default = "server.crt")]
    pub certificate_path: String,

    /// 🔒 SENSITIVE: Logfire write token. Traces stay local when absent.
    pub logfire_token: Option<String>,

    /// WhatsApp Business phone number ID (SEMI-SENSITIVE)
    pub whatsapp_business_phone_number_id: u64,

    /// 🔒 SENSITIVE: WhatsApp Business authentication token
    pub whatsapp_business_auth: String,

    /// 🔒 SENSITIVE: Meta app secret, key of the `X-Hub-Signature-256` HMAC
    pub whatsapp_app_secret: String,

    /// 🔒 SENSITIVE: token echoed by Meta on webhook subscription
    pub whatsapp_verify_token: String,

    /// Graph API version used for every provider call (NON-SENSITIVE)
    #[envconfig(default = "v20.0")]
    pub whatsapp_graph_api_version: String,

    /// 🔒 SENSITIVE: shared secret for the internal endpoints (`X-Internal-Secret`)
    pub internal_api_secret: String,

    /// 🔒 SENSITIVE: OpenAI API key for the assistant replies
    pub openai_api_key: String,

    #[envconfig(default = "gpt-4o-mini")]
    pub openai_model: String,

    #[envconfig(default = "https://api.openai.com/v1/chat/completions")]
    pub openai_endpoint: String,

    /// System prompt for the assistant, falls back to the bundled FAQ context
    pub assistant_context: Option<String>,

    /// Base url of the marketplace API that executes button actions (NON-SENSITIVE)
    #[envconfig(default = "https://dake.dev")]
    pub business_api_url: String,

    /// S3 bucket holding uploaded and downloaded media (NON-SENSITIVE)
    #[envconfig(default = "wa-inbox-media")]
    pub media_bucket_name: String,

    #[envconfig(default = "us-east-2")]
    pub aws_region: String,

    /// Upper bound for every outbound http request, in seconds
    #[envconfig(default = "15")]
    pub http_timeout_secs: u64,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// Base url of the Graph API, versioned
    pub fn graph_api_base_url(&self) -> String {
        format!(
            "https://graph.facebook.com/{version}",
            version = self.whatsapp_graph_api_version
        )
    }

    /// Constructs the WhatsApp Business API endpoint for sending messages
    pub fn whatsapp_send_msg_endpoint(&self) -> String {
        format!(
            "{base}/{id}/messages",
            base = self.graph_api_base_url(),
            id = self.whatsapp_business_phone_number_id
        )
    }

    /// Constructs the WhatsApp Business API endpoint for uploading media
    pub fn whatsapp_upload_media_endpoint(&self) -> String {
        format!(
            "{base}/{id}/media",
            base = self.graph_api_base_url(),
            id = self.whatsapp_business_phone_number_id
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Global application configuration instance.
///
/// Populated once by [`init_config`] at process start; components receive the
/// values they need at construction time.
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the configuration from the environment and stores it in [`APP_CONFIG`].
pub fn init_config() -> anyhow::Result<&'static AppConfig> {
    if let Some(app_config) = APP_CONFIG.get() {
        return Ok(app_config);
    }

    let app_config = AppConfig::init_from_env()
        .context("Failed to load application configuration. Check environment variables")?;

    Ok(APP_CONFIG.get_or_init(|| app_config))
}
