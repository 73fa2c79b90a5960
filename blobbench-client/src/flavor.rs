use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of blob store the client talks to.
///
/// All supported stores speak the same create/fetch/delete protocol, but differ in their
/// endpoints and the headers they expect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFlavor {
    /// [Ambry](https://github.com/linkedin/ambry), LinkedIn's distributed object store.
    #[default]
    Ambry,
    /// Stored, a minimal content-addressable blob store.
    Stored,
}

impl StoreFlavor {
    /// The URL a local development instance of this store listens on.
    pub fn default_url(self) -> &'static str {
        match self {
            StoreFlavor::Ambry => "http://127.0.0.1:1174",
            StoreFlavor::Stored => "http://127.0.0.1:8080",
        }
    }

    /// The liveness endpoint, relative to the base URL.
    pub fn health_path(self) -> &'static str {
        match self {
            StoreFlavor::Ambry => "/healthCheck",
            StoreFlavor::Stored => "/health",
        }
    }

    /// The body a healthy store responds with on [`health_path`](Self::health_path).
    pub fn health_body(self) -> &'static str {
        match self {
            StoreFlavor::Ambry => "GOOD",
            StoreFlavor::Stored => "Ok",
        }
    }

    /// The endpoint new objects are `POST`ed to, relative to the base URL.
    pub fn create_path(self) -> &'static str {
        match self {
            StoreFlavor::Ambry => "",
            StoreFlavor::Stored => "/blob",
        }
    }

    /// Additional headers sent along with every create request.
    pub fn create_headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            StoreFlavor::Ambry => &[
                ("x-ambry-service-id", "blobbench/ambry"),
                ("x-ambry-content-type", "application/json"),
            ],
            StoreFlavor::Stored => &[],
        }
    }

    /// The `User-Agent` the client identifies itself with.
    pub fn user_agent(self) -> &'static str {
        match self {
            StoreFlavor::Ambry => "blobbench/ambry",
            StoreFlavor::Stored => "blobbench/stored",
        }
    }
}

impl fmt::Display for StoreFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFlavor::Ambry => f.write_str("ambry"),
            StoreFlavor::Stored => f.write_str("stored"),
        }
    }
}

/// The store flavor parse error.
#[derive(Clone, Debug)]
pub struct FlavorParseError(String);

impl fmt::Display for FlavorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as store flavor: expected one of "ambry", "stored""#,
            self.0
        )
    }
}

impl std::error::Error for FlavorParseError {}

impl FromStr for StoreFlavor {
    type Err = FlavorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("ambry") => Ok(StoreFlavor::Ambry),
            s if s.eq_ignore_ascii_case("stored") => Ok(StoreFlavor::Stored),
            s => Err(FlavorParseError(s.into())),
        }
    }
}
