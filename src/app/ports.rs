use crate::error::FetchError;
use async_trait::async_trait;

/// Retrieves the raw body of one page. One outbound request per call, no
/// retries.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
