//! Outcomes of single benchmark operations.

use std::fmt;

use blobbench_client::ErrorKind;

/// The outcome of a single benchmark operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The operation failed, either in transport or on the store.
    Error,
    /// The record does not exist.
    NotFound,
    /// The store rejected the request.
    BadRequest,
    /// The store does not support the operation.
    NotImplemented,
}

impl Status {
    /// All statuses, in reporting order.
    pub const ALL: [Status; 5] = [
        Status::Ok,
        Status::Error,
        Status::NotFound,
        Status::BadRequest,
        Status::NotImplemented,
    ];

    /// Returns the name used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::NotFound => "NOT_FOUND",
            Status::BadRequest => "BAD_REQUEST",
            Status::NotImplemented => "NOT_IMPLEMENTED",
        }
    }

    /// Returns `true` if the operation succeeded.
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&blobbench_client::Error> for Status {
    fn from(error: &blobbench_client::Error) -> Self {
        match error.kind() {
            ErrorKind::Transport | ErrorKind::Server => Status::Error,
            ErrorKind::BadRequest => Status::BadRequest,
            ErrorKind::NotFound => Status::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use blobbench_client::{Error, StatusCode};

    use super::*;

    #[test]
    fn classifies_client_errors() {
        let status = |error: Error| Status::from(&error);

        assert_eq!(
            status(Error::NotFound {
                status: StatusCode::GONE
            }),
            Status::NotFound
        );
        assert_eq!(
            status(Error::BadRequest {
                status: StatusCode::BAD_REQUEST,
                message: String::new(),
            }),
            Status::BadRequest
        );
        assert_eq!(
            status(Error::Server {
                status: StatusCode::BAD_GATEWAY,
                message: String::new(),
            }),
            Status::Error
        );
        assert_eq!(status(Error::Closed), Status::Error);
        assert_eq!(status(Error::MissingLocation), Status::Error);
    }
}
