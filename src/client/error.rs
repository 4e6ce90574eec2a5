// ABOUTME: Session-level error type for bind, submit and keep-alive operations
// ABOUTME: Wraps codec and I/O failures and distinguishes SMSC rejections from transport loss

use crate::codec::CodecError;
use crate::datatypes::{CommandId, CommandStatus};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmppError {
    /// I/O error while connecting, reading or writing
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// PDU could not be encoded or the stream could not be decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The SMSC answered with a non-zero command_status
    #[error("SMSC rejected request: {0:?}")]
    Protocol(CommandStatus),

    /// The SMSC could not parse the request at all
    #[error("SMSC sent generic_nack: {0:?}")]
    GenericNack(CommandStatus),

    /// No response within the session's response timeout
    #[error("Operation timeout")]
    Timeout,

    /// Wrong response type for the request
    #[error("Unexpected PDU: expected {expected:?}, got {actual:?}")]
    UnexpectedPdu {
        expected: CommandId,
        actual: CommandId,
    },

    /// Link dropped while the request was outstanding, or before it was sent
    #[error("Connection closed")]
    ConnectionClosed,

    /// Session not in a state that allows the operation
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl SmppError {
    /// Whether the link itself is gone, as opposed to one request failing.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            SmppError::Connection(_) | SmppError::ConnectionClosed
        ) || matches!(self, SmppError::Codec(e) if e.is_fatal())
    }
}

/// Result type alias for SMPP operations
pub type SmppResult<T> = Result<T, SmppError>;
