use bytes::Bytes;
use reqwest::{Method, StatusCode, header};

use crate::error::error_for_status;
use crate::{Client, Error, Result};

impl Client {
    /// Stores a new object and returns the locator the store assigned to it.
    ///
    /// The body is sent as-is, the client does not look into it. The store must answer
    /// `201 Created` with a `Location` header.
    pub async fn create(&self, body: impl Into<Bytes>) -> Result<String> {
        let url = format!("{}{}", self.base_url, self.flavor.create_path());
        let _permit = self.permit(&url).await?;

        let mut builder = self
            .request(Method::POST, url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into());
        for (name, value) in self.flavor.create_headers() {
            builder = builder.header(*name, *value);
        }

        let response = builder.send().await?;
        let response = error_for_status(response, false).await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            tracing::debug!(%status, "store did not create the object");
            return Err(Error::UnexpectedStatus { status });
        }

        let locator = response
            .headers()
            .get_all(header::LOCATION)
            .iter()
            .next_back()
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(Error::MissingLocation)?;

        Ok(locator.to_owned())
    }
}
