// ABOUTME: Error types for encoding outbound text and decoding inbound payloads
// ABOUTME: Neither involves I/O; both are raised before or after the session is involved

use crate::datatypes::DataCoding;
use thiserror::Error;

/// Outbound text could not be turned into submit_sm PDUs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("character {0:?} has no GSM 03.38 encoding")]
    Unrepresentable(char),

    #[error("message needs {needed} segments, at most {max} fit a one-octet total")]
    TooManySegments { needed: usize, max: usize },

    /// Segmentation produced a unit that does not fit; a bug, not bad input.
    #[error("segment {index} is {len} octets, over the {capacity} octet capacity")]
    CapacityExceeded {
        index: usize,
        len: usize,
        capacity: usize,
    },
}

/// An inbound payload could not be turned into text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("septet {0:#04x} is outside the 7-bit range")]
    InvalidSeptet(u8),

    #[error("escape septet at end of payload")]
    TruncatedEscape,

    #[error("UCS2 payload has odd length {0}")]
    OddUcs2Length(usize),

    #[error("UCS2 payload is not valid UTF-16")]
    InvalidUtf16,

    #[error("user data header is malformed: {0}")]
    MalformedUdh(&'static str),

    #[error("data_coding {0:?} carries no text")]
    UnsupportedCoding(DataCoding),
}
