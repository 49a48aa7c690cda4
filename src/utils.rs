//! Helper functions could be used in api/, front/, webhook/, ...

use crate::config;
use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::{path::Path, str::FromStr, time::Duration};

const INIT_MIGRATION: &str = include_str!("../migrations/0001_init.sql");

pub async fn setup_sqlite_db_pool(app_config: &config::AppConfig) -> anyhow::Result<SqlitePool> {
    if app_config.is_prod() {
        return Ok(SqlitePool::connect_with(
            SqliteConnectOptions::from_str(&app_config.db_host)?
                .pragma("key", app_config.db_pass_encrypt.clone())
                .pragma("cipher_page_size", "1024")
                .pragma("kdf_iter", "64000")
                .pragma("cipher_hmac_algorithm", "HMAC_SHA1")
                .pragma("cipher_kdf_algorithm", "PBKDF2_HMAC_SHA1")
                .pragma("foreign_keys", "ON")
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Delete),
        )
        .await?);
    }

    Ok(SqlitePool::connect_with(
        SqliteConnectOptions::from_str(&app_config.db_host)?
            .pragma("foreign_keys", "ON")
            .create_if_missing(true),
    )
    .await?)
}

/// Creates the schema if it doesn't exist yet. Statements are idempotent.
pub async fn run_migrations(db_pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(INIT_MIGRATION)
        .execute(db_pool)
        .await
        .context("failed to run database migrations")?;
    Ok(())
}

/// Client used for every outbound http call, bounded by `timeout`
pub fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}

/// Parses the provider timestamps: unix seconds encoded as a string
pub fn parse_unix_timestamp(value: &str) -> anyhow::Result<DateTime<Utc>> {
    let seconds = value
        .trim()
        .parse::<i64>()
        .with_context(|| format!("timestamp is not a number: {value}"))?;

    DateTime::from_timestamp(seconds, 0).ok_or_else(|| anyhow!("timestamp out of range: {value}"))
}

/// Lowercased extension of `filename`, if any
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Best effort extension from a mime type: `image/jpeg; q=1` -> `jpeg`
pub fn extension_from_mime(mime_type: &str) -> String {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    let subtype = essence.rsplit('/').next().unwrap_or_default();

    match subtype {
        "" => "bin".to_string(),
        "plain" => "txt".to_string(),
        "mpeg" if essence.starts_with("audio") => "mp3".to_string(),
        "vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx".to_string(),
        "vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx".to_string(),
        other => other.to_lowercase(),
    }
}
