// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt;
use std::io;

use crate::codec::{DecodeError, EncodeError};

/// Coarse classification of every failure this crate can surface at its
/// public boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed packet received from the network, or an attempt to send one.
    Protocol,

    /// The broker rejected the CONNECT attempt.
    Connect,

    /// The underlying transport failed (socket error, TLS handshake failure).
    Connection,

    /// A PUBLISH could not be completed (broker returned a failure reason, or
    /// local flow control refused it).
    Publish,

    /// A SUBSCRIBE/UNSUBSCRIBE could not be completed.
    Subscribe,

    /// Enhanced authentication failed or was rejected.
    Auth,

    /// A bounded local resource is exhausted (packet-id space, send quota,
    /// offline queue).
    ResourceExhausted,

    /// The session is not in a state that permits the requested operation.
    IllegalState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Protocol => "protocol error",
            Self::Connect => "connect error",
            Self::Connection => "connection error",
            Self::Publish => "publish error",
            Self::Subscribe => "subscribe error",
            Self::Auth => "authentication error",
            Self::ResourceExhausted => "resource exhausted",
            Self::IllegalState => "illegal state",
        };
        write!(f, "{s}")
    }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Connection, &err.to_string())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Self::new(ErrorKind::Protocol, &err.to_string())
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        Self::new(ErrorKind::Protocol, &err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
