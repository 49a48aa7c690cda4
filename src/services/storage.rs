use async_trait::async_trait;

#[derive(Clone)]
pub struct StorageHandler {
    pub client: aws_sdk_s3::Client,
    pub bucket: String,
}

#[async_trait]
impl crate::services::StorageService for StorageHandler {
    async fn save_media(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let body = aws_sdk_s3::primitives::ByteStream::from(body);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .body(body)
            .send()
            .await?;

        Ok(path.to_string())
    }
}
