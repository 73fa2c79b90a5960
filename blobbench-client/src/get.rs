use bytes::Bytes;
use reqwest::{Method, StatusCode};

use crate::error::error_for_status;
use crate::{Client, Error, Result};

impl Client {
    /// Fetches the object stored under the given `locator`.
    ///
    /// Returns [`Error::NotFound`] if the store responds with `404 Not Found` or `410 Gone`.
    pub async fn fetch(&self, locator: &str) -> Result<Bytes> {
        let url = self.locator_url(locator);
        let _permit = self.permit(&url).await?;

        let response = self.request(Method::GET, url).send().await?;
        let response = error_for_status(response, true).await?;

        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?),
            status => Err(Error::UnexpectedStatus { status }),
        }
    }
}
