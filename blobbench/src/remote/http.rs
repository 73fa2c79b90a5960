use blobbench_client::{Client, Result};
use bytes::Bytes;

use super::Remote;

#[async_trait::async_trait]
impl Remote for Client {
    fn describe(&self) -> String {
        format!("{} ({})", self.base_url(), self.flavor())
    }

    async fn health_check(&self) -> Result<()> {
        Client::health_check(self).await
    }

    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        Client::fetch(self, locator).await
    }

    async fn create(&self, body: Bytes) -> Result<String> {
        Client::create(self, body).await
    }

    async fn delete(&self, locator: &str) -> Result<()> {
        Client::delete(self, locator).await
    }

    fn close(&self) {
        Client::close(self)
    }
}
