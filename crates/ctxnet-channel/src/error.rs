use ctxnet_buf::{BufError, Identifier};

use crate::ids::PeerId;

/// Boxed error carried as the cause of a handling failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How the dispatch boundary reacts to a [`HandlingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingPolicy {
    /// Drop the message without logging or replying.
    Silent,
    /// Tear down the connection that delivered the message.
    Disconnect,
    /// Log the failure and keep the connection open.
    Log,
}

/// Failure raised while resolving a context or running a handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlingError {
    /// Expected early exit. Not an error.
    #[error("handling cancelled")]
    Silent,

    /// Protocol violation that must close the connection.
    #[error("{message}")]
    Disconnect {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Generic handler failure.
    #[error("{message}")]
    Error {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The context object could not be found or had the wrong type.
    #[error("context resolution failed: {0}")]
    Resolution(String),

    /// The payload bytes were malformed.
    #[error("malformed payload: {0}")]
    Decode(#[from] BufError),
}

impl HandlingError {
    pub fn silent() -> Self {
        Self::Silent
    }

    pub fn disconnect(message: impl Into<String>) -> Self {
        Self::Disconnect {
            message: message.into(),
            source: None,
        }
    }

    pub fn disconnect_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Disconnect {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            source: None,
        }
    }

    pub fn error_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Error {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution(message.into())
    }

    /// The single policy this failure maps to.
    pub fn policy(&self) -> HandlingPolicy {
        match self {
            Self::Silent => HandlingPolicy::Silent,
            Self::Disconnect { .. } => HandlingPolicy::Disconnect,
            Self::Error { .. } | Self::Resolution(_) | Self::Decode(_) => HandlingPolicy::Log,
        }
    }
}

pub type HandlingResult<T = ()> = std::result::Result<T, HandlingError>;

/// Errors reported by a platform transport when it cannot route a packet.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target selector makes no sense from this side of the connection.
    #[error("cannot send to {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The addressed peer is not connected.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    /// The connection has been torn down.
    #[error("connection closed")]
    Closed,

    /// The encoded packet exceeds what the transport accepts.
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// The packet header could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] BufError),

    /// The transport's own I/O machinery failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned from channel send operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The context or data payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] BufError),

    /// The transport refused the packet.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised while registering channels.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Another channel already uses this name.
    #[error("channel {0} is already registered")]
    DuplicateChannel(Identifier),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
