// SMPP v3.4 Codec - wire format kept apart from the PDU models
//
// Each PDU implements Encodable/Decodable; `Frame` is the closed set of PDUs
// a transceiver session exchanges, and `PduRegistry` maps a decoded header to
// the decoder for its body.

use crate::datatypes::{
    BindTransceiver, BindTransceiverResponse, CommandId, CommandStatus, DataSm, DataSmResponse,
    DeliverSm, DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack, SubmitSm,
    SubmitSmResponse, Unbind, UnbindResponse,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;
use thiserror::Error;

/// Maximum accepted command_length; anything larger is treated as a framing error.
pub const MAX_PDU_SIZE: u32 = 65536;

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: CommandId,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode and validate a PDU header.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id_raw = buf.get_u32();
        let command_status_raw = buf.get_u32();
        let sequence_number = buf.get_u32();

        if !(Self::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        let command_id =
            CommandId::try_from(command_id_raw).map_err(|_| CodecError::InvalidCommandId {
                command_id: command_id_raw,
                sequence_number,
            })?;
        let command_status = CommandStatus::from_raw(command_status_raw);

        // SMPP v3.4: requests carry command_status = 0
        if !command_id.is_response() && command_status != CommandStatus::Ok {
            return Err(CodecError::InvalidRequestStatus {
                command_id,
                command_status,
            });
        }

        // generic_nack may legitimately use 0 when the offending PDU was unreadable
        if (sequence_number == 0 && command_id != CommandId::GenericNack)
            || sequence_number == 0xFFFF_FFFF
        {
            return Err(CodecError::ReservedSequenceNumber(sequence_number));
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode the header. `command_length` is written as given; callers that
    /// build the body afterwards patch it with [`Encodable::to_bytes`].
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id as u32);
        buf.put_u32(self.command_status as u32);
        buf.put_u32(self.sequence_number);
        Ok(())
    }
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU, header included, to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size by encoding into a scratch buffer
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Encode into a fresh buffer and fix up command_length.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;

        let length = u32::try_from(buf.len())
            .ok()
            .filter(|len| *len <= MAX_PDU_SIZE)
            .ok_or(CodecError::InvalidPduLength {
                length: buf.len().min(u32::MAX as usize) as u32,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            })?;
        buf[0..4].copy_from_slice(&length.to_be_bytes());

        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer positioned after the header
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this PDU type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid command_id {command_id:#x} (sequence {sequence_number})")]
    InvalidCommandId {
        command_id: u32,
        sequence_number: u32,
    },

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Request PDU {command_id:?} has non-zero status: {command_status:?}")]
    InvalidRequestStatus {
        command_id: CommandId,
        command_status: CommandStatus,
    },

    #[error("Reserved sequence number: {0} (0 and 0xFFFFFFFF are reserved)")]
    ReservedSequenceNumber(u32),

    #[error("Unexpected command_id: expected {expected:?}, got {actual:?}")]
    UnexpectedCommandId {
        expected: CommandId,
        actual: CommandId,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("TLV parsing error: {0}")]
    TlvError(String),

    #[error("Cannot encode {0:?}: frame carries no decodable body")]
    Unencodable(CommandId),

    /// The header was readable but the body was not. Carries what is needed
    /// to answer the PDU.
    #[error("Undecodable {command_id:?} #{sequence_number}: {source}")]
    UndecodablePdu {
        command_id: CommandId,
        sequence_number: u32,
        source: Box<CodecError>,
    },

    #[error("Connection reset by peer mid-PDU")]
    ConnectionReset,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether the byte stream can no longer be trusted. Anything else only
    /// affected the one PDU, which has already been skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            CodecError::UndecodablePdu { source, .. } => source.is_fatal(),
            other => matches!(
                other,
                CodecError::InvalidPduLength { .. } | CodecError::ConnectionReset | CodecError::Io(_)
            ),
        }
    }

    /// command_status to report back to the peer for a PDU that failed to decode.
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::InvalidPduLength { .. } => CommandStatus::InvalidCommandLength,
            CodecError::InvalidCommandId { .. } => CommandStatus::InvalidCommandId,
            CodecError::FieldValidation { field, .. } => match *field {
                "source_addr" => CommandStatus::InvalidSourceAddress,
                "destination_addr" => CommandStatus::InvalidDestinationAddress,
                "short_message" => CommandStatus::InvalidMsgLength,
                "esm_class" => CommandStatus::InvalidEsmClassFieldData,
                _ => CommandStatus::SystemError,
            },
            CodecError::TlvError(_) => CommandStatus::InvalidOptionalPartOfPdu,
            CodecError::UndecodablePdu { source, .. } => source.to_command_status(),
            _ => CommandStatus::SystemError,
        }
    }
}

/// Read a NUL-terminated C-Octet String of at most `max_len` octets
/// (terminator included).
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field_name: &'static str,
) -> Result<String, CodecError> {
    let chunk = buf.chunk();
    let window = &chunk[..chunk.len().min(max_len)];
    let end = window
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CodecError::FieldValidation {
            field: field_name,
            reason: format!("no NUL terminator within {max_len} octets"),
        })?;

    let value = String::from_utf8(window[..end].to_vec()).map_err(|e| {
        CodecError::FieldValidation {
            field: field_name,
            reason: format!("not valid UTF-8: {e}"),
        }
    })?;
    buf.advance(end + 1);
    Ok(value)
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::FieldValidation {
            field: "body",
            reason: "PDU body ends before its mandatory fields".to_string(),
        });
    }
    Ok(buf.get_u8())
}

/// Write `value` followed by a NUL. Fails if it does not fit in `max_len`
/// octets including the terminator.
pub fn encode_cstring(buf: &mut BytesMut, value: &str, max_len: usize) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() >= max_len {
        return Err(CodecError::FieldValidation {
            field: "c-octet string",
            reason: format!(
                "{:?} is {} octets, maximum is {}",
                value,
                bytes.len(),
                max_len - 1
            ),
        });
    }
    if bytes.contains(&0) {
        return Err(CodecError::FieldValidation {
            field: "c-octet string",
            reason: "embedded NUL".to_string(),
        });
    }
    buf.put_slice(bytes);
    buf.put_u8(0);
    Ok(())
}

/// Encode a single byte
pub fn encode_u8(buf: &mut BytesMut, value: u8) {
    buf.put_u8(value);
}

/// Every PDU a transceiver session sends or receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    // Session management PDUs
    BindTransceiver(BindTransceiver),
    BindTransceiverResp(BindTransceiverResponse),
    Unbind(Unbind),
    UnbindResp(UnbindResponse),

    // Keep-alive PDUs
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),

    // Message PDUs
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),
    DataSm(Box<DataSm>),
    DataSmResp(DataSmResponse),

    GenericNack(GenericNack),

    /// A known command the gateway has no decoder for (query_sm, outbind, ...)
    Unknown { header: PduHeader, body: Bytes },
}

/// Registry of PDU decoders for extensible parsing
type DecoderFn =
    Box<dyn Fn(PduHeader, &mut Cursor<&[u8]>) -> Result<Frame, CodecError> + Send + Sync>;

pub struct PduRegistry {
    decoders: HashMap<CommandId, DecoderFn>,
}

impl PduRegistry {
    /// Create a registry holding every PDU in [`Frame`]
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };

        registry.register_pdu::<BindTransceiver, _>(Frame::BindTransceiver);
        registry.register_pdu::<BindTransceiverResponse, _>(Frame::BindTransceiverResp);
        registry.register_pdu::<Unbind, _>(Frame::Unbind);
        registry.register_pdu::<UnbindResponse, _>(Frame::UnbindResp);
        registry.register_pdu::<EnquireLink, _>(Frame::EnquireLink);
        registry.register_pdu::<EnquireLinkResponse, _>(Frame::EnquireLinkResp);
        registry.register_pdu::<GenericNack, _>(Frame::GenericNack);

        // Message PDUs are boxed to keep Frame small
        registry.register_pdu::<SubmitSm, _>(|pdu| Frame::SubmitSm(Box::new(pdu)));
        registry.register_pdu::<SubmitSmResponse, _>(Frame::SubmitSmResp);
        registry.register_pdu::<DeliverSm, _>(|pdu| Frame::DeliverSm(Box::new(pdu)));
        registry.register_pdu::<DeliverSmResponse, _>(Frame::DeliverSmResp);
        registry.register_pdu::<DataSm, _>(|pdu| Frame::DataSm(Box::new(pdu)));
        registry.register_pdu::<DataSmResponse, _>(Frame::DataSmResp);

        registry
    }

    /// Shared registry; building it once avoids a HashMap per parsed frame.
    pub fn global() -> &'static PduRegistry {
        static REGISTRY: OnceLock<PduRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PduRegistry::new)
    }

    fn register_pdu<T, F>(&mut self, frame_constructor: F)
    where
        T: Decodable + 'static,
        F: Fn(T) -> Frame + Send + Sync + 'static,
    {
        let command_id = T::command_id();
        let decoder = Box::new(move |header: PduHeader, buf: &mut Cursor<&[u8]>| {
            let pdu = T::decode(header, buf)?;
            Ok(frame_constructor(pdu))
        });
        self.decoders.insert(command_id, decoder);
    }

    /// Decode a PDU body given its header. `buf` must hold exactly the body.
    pub fn decode_pdu(
        &self,
        header: PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Frame, CodecError> {
        match self.decoders.get(&header.command_id) {
            Some(decoder) => decoder(header, buf),
            None => {
                let body = buf.copy_to_bytes(buf.remaining());
                tracing::warn!(
                    "No decoder for {:?} (sequence {}), passing through as opaque data",
                    header.command_id,
                    header.sequence_number
                );
                Ok(Frame::Unknown { header, body })
            }
        }
    }

    pub fn is_registered(&self, command_id: CommandId) -> bool {
        self.decoders.contains_key(&command_id)
    }
}

impl Default for PduRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    pub fn command_id(&self) -> CommandId {
        match self {
            Frame::BindTransceiver(_) => CommandId::BindTransceiver,
            Frame::BindTransceiverResp(_) => CommandId::BindTransceiverResp,
            Frame::Unbind(_) => CommandId::Unbind,
            Frame::UnbindResp(_) => CommandId::UnbindResp,
            Frame::EnquireLink(_) => CommandId::EnquireLink,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Frame::SubmitSm(_) => CommandId::SubmitSm,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Frame::DeliverSm(_) => CommandId::DeliverSm,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Frame::DataSm(_) => CommandId::DataSm,
            Frame::DataSmResp(_) => CommandId::DataSmResp,
            Frame::GenericNack(_) => CommandId::GenericNack,
            Frame::Unknown { header, .. } => header.command_id,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::BindTransceiver(pdu) => pdu.sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::DataSm(pdu) => pdu.sequence_number,
            Frame::DataSmResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number,
        }
    }

    /// command_status from the header; `Ok` for every request.
    pub fn command_status(&self) -> CommandStatus {
        match self {
            Frame::BindTransceiverResp(pdu) => pdu.command_status,
            Frame::UnbindResp(pdu) => pdu.command_status,
            Frame::EnquireLinkResp(pdu) => pdu.command_status,
            Frame::SubmitSmResp(pdu) => pdu.command_status,
            Frame::DeliverSmResp(pdu) => pdu.command_status,
            Frame::DataSmResp(pdu) => pdu.command_status,
            Frame::GenericNack(pdu) => pdu.command_status,
            Frame::Unknown { header, .. } => header.command_status,
            _ => CommandStatus::Ok,
        }
    }

    pub fn is_response(&self) -> bool {
        self.command_id().is_response()
    }

    /// Encode the frame to wire bytes.
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        match self {
            Frame::BindTransceiver(pdu) => pdu.to_bytes(),
            Frame::BindTransceiverResp(pdu) => pdu.to_bytes(),
            Frame::Unbind(pdu) => pdu.to_bytes(),
            Frame::UnbindResp(pdu) => pdu.to_bytes(),
            Frame::EnquireLink(pdu) => pdu.to_bytes(),
            Frame::EnquireLinkResp(pdu) => pdu.to_bytes(),
            Frame::SubmitSm(pdu) => pdu.to_bytes(),
            Frame::SubmitSmResp(pdu) => pdu.to_bytes(),
            Frame::DeliverSm(pdu) => pdu.to_bytes(),
            Frame::DeliverSmResp(pdu) => pdu.to_bytes(),
            Frame::DataSm(pdu) => pdu.to_bytes(),
            Frame::DataSmResp(pdu) => pdu.to_bytes(),
            Frame::GenericNack(pdu) => pdu.to_bytes(),
            Frame::Unknown { header, .. } => Err(CodecError::Unencodable(header.command_id)),
        }
    }

    /// Checks whether `buf` holds a complete PDU and returns its length.
    ///
    /// `Incomplete` means more bytes are needed. A command_length outside
    /// 16..=MAX_PDU_SIZE means framing is lost.
    pub fn check(buf: &mut Cursor<&[u8]>) -> Result<usize, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::Incomplete);
        }

        let pos = buf.position();
        let command_length = buf.get_u32();
        buf.set_position(pos);

        if !(PduHeader::SIZE as u32..=MAX_PDU_SIZE).contains(&command_length) {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        if buf.remaining() < command_length as usize {
            return Err(CodecError::Incomplete);
        }

        Ok(command_length as usize)
    }

    /// Parses one complete PDU. `pdu` must be exactly `command_length` bytes,
    /// as returned by [`Frame::check`].
    pub fn parse(pdu: &[u8]) -> Result<Frame, CodecError> {
        let mut cursor = Cursor::new(pdu);
        let header = PduHeader::decode(&mut cursor)?;
        PduRegistry::global().decode_pdu(header, &mut cursor)
    }
}
