use reqwest::{Method, StatusCode};

use crate::{Client, Error, Result};

impl Client {
    /// Deletes the object stored under the given `locator`.
    ///
    /// Stores acknowledge a deletion with `202 Accepted` or `410 Gone`, and respond with
    /// `404 Not Found` if they never knew the object.
    pub async fn delete(&self, locator: &str) -> Result<()> {
        let url = self.locator_url(locator);
        let _permit = self.permit(&url).await?;

        let response = self.request(Method::DELETE, url).send().await?;
        let status = response.status();

        match status {
            StatusCode::ACCEPTED | StatusCode::GONE => Ok(()),
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::NotFound { status }),
            status if status.is_server_error() => {
                let message = response.text().await.unwrap_or_default();
                Err(Error::Server { status, message })
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(Error::BadRequest { status, message })
            }
        }
    }
}
