use anyhow::{Context, bail};
use async_trait::async_trait;

/// Client of the marketplace API that executes the button actions
#[derive(Clone)]
pub struct BusinessApiHandler {
    pub client: reqwest::Client,
    pub base_url: String,
}

impl BusinessApiHandler {
    fn smart_price_endpoint(&self, user_id: &str) -> String {
        format!(
            "{base}/api/users/{user_id}/apply-smart-price-to-products",
            base = self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl crate::services::BusinessService for BusinessApiHandler {
    async fn apply_smart_price(&self, user_id: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.smart_price_endpoint(user_id))
            .send()
            .await
            .context("smart price request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("smart price request returned {status}: {body}");
        }

        Ok(())
    }
}
