use reqwest::StatusCode;

/// Errors that can happen within the blobbench-client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error emitted from the underlying [`reqwest`] client, such as a refused connection or
    /// a timeout.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// The store does not know the requested object, or it has been deleted.
    #[error("object not found (status {status})")]
    NotFound {
        /// The status code returned by the store.
        status: StatusCode,
    },
    /// The store rejected the request as malformed.
    #[error("bad request (status {status}): {message}")]
    BadRequest {
        /// The status code returned by the store.
        status: StatusCode,
        /// The response body, if it could be read.
        message: String,
    },
    /// The store failed to handle the request.
    #[error("server error (status {status}): {message}")]
    Server {
        /// The status code returned by the store.
        status: StatusCode,
        /// The response body, if it could be read.
        message: String,
    },
    /// The store responded with a status code that is not part of the protocol.
    #[error("unexpected response status {status}")]
    UnexpectedStatus {
        /// The status code returned by the store.
        status: StatusCode,
    },
    /// A create request succeeded, but the store did not say where the object lives.
    #[error("response is missing the `Location` header")]
    MissingLocation,
    /// The health check endpoint did not respond with `200 OK`.
    #[error("health check failed with status {status}")]
    Unhealthy {
        /// The status code returned by the store.
        status: StatusCode,
    },
    /// Error when the configured base URL cannot be used.
    #[error("invalid base URL `{url}`")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },
    /// The client has been closed and does not accept new requests.
    #[error("client is closed")]
    Closed,
}

/// A coarse classification of [`Error`]s.
///
/// Callers branch on this instead of matching on individual error variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The store could not be reached, or the client could not send the request.
    Transport,
    /// The store failed, or answered outside of the protocol.
    Server,
    /// The store rejected the request.
    BadRequest,
    /// The object does not exist.
    NotFound,
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reqwest(_) | Error::Closed => ErrorKind::Transport,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::BadRequest { .. } | Error::InvalidUrl { .. } => ErrorKind::BadRequest,
            Error::Server { .. }
            | Error::UnexpectedStatus { .. }
            | Error::MissingLocation
            | Error::Unhealthy { .. } => ErrorKind::Server,
        }
    }

    /// Returns `true` if the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Maps error statuses to an [`Error`], passing all other responses through.
///
/// `404 Not Found` and `410 Gone` are reported as [`Error::NotFound`] if `not_found` is set,
/// otherwise as [`Error::BadRequest`].
pub(crate) async fn error_for_status(
    response: reqwest::Response,
    not_found: bool,
) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }

    if not_found && matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
        return Err(Error::NotFound { status });
    }

    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(Error::Server { status, message })
    } else {
        Err(Error::BadRequest { status, message })
    }
}
