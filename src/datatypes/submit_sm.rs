// ABOUTME: submit_sm and submit_sm_resp PDUs (SMPP v3.4 Sections 4.4.1, 4.4.2)
// ABOUTME: Also hosts the short-message body codec that deliver_sm shares field for field

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    encode_u8,
};
use crate::datatypes::address::{Address, decode_address, encode_address};
use crate::datatypes::tlv::{Tlv, decode_tlvs, encode_tlvs, find_tlv};
use crate::datatypes::{CommandId, CommandStatus, DataCoding, EsmClass};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Largest short_message the sm_length octet can describe.
pub const MAX_SHORT_MESSAGE_LENGTH: usize = 254;

/// registered_delivery value requesting an SMSC delivery receipt on final outcome.
pub const REGISTERED_DELIVERY_RECEIPT: u8 = 0x01;

pub(crate) const SERVICE_TYPE_LEN: usize = 6;
pub(crate) const TIME_LEN: usize = 17;
const MESSAGE_ID_LEN: usize = 65;

/// Submits one short message to the SMSC for onward delivery.
///
/// Concatenated parts are ordinary `SubmitSm`s whose `esm_class` has UDHI
/// set and whose `short_message` starts with the user data header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// 4.4.1 service_type; empty for the SMSC default.
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub protocol_id: u8,
    pub priority_flag: u8,
    /// Absolute or relative time in `YYMMDDhhmmsstnnp` form; empty for immediate.
    pub schedule_delivery_time: String,
    /// Same format; empty for the SMSC default validity.
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: DataCoding,
    pub sm_default_msg_id: u8,
    /// User data, at most 254 octets; sm_length is derived from it.
    pub short_message: Bytes,
    /// Optional parameters in the order they are written.
    pub tlvs: Vec<Tlv>,
}

impl SubmitSm {
    /// A submit_sm with every optional field at its default. The sequence
    /// number is left at 0 for the session to assign.
    pub fn new(
        source: Address,
        destination: Address,
        data_coding: DataCoding,
        esm_class: EsmClass,
        short_message: Bytes,
    ) -> Self {
        SubmitSm {
            command_status: CommandStatus::Ok,
            sequence_number: 0,
            service_type: String::new(),
            source,
            destination,
            esm_class,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 0,
            replace_if_present_flag: 0,
            data_coding,
            sm_default_msg_id: 0,
            short_message,
            tlvs: Vec::new(),
        }
    }

    pub fn with_registered_delivery(mut self, registered_delivery: u8) -> Self {
        self.registered_delivery = registered_delivery;
        self
    }

    pub fn sm_length(&self) -> usize {
        self.short_message.len()
    }

    pub fn tlv(&self, tag: u16) -> Option<&Tlv> {
        find_tlv(&self.tlvs, tag)
    }
}

/// The mandatory body shared by submit_sm and deliver_sm, in wire order.
pub(crate) struct MessageBody {
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: DataCoding,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl MessageBody {
    pub(crate) fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_type = decode_cstring(buf, SERVICE_TYPE_LEN, "service_type")?;
        let source = decode_address(buf, ["source_addr_ton", "source_addr_npi", "source_addr"])?;
        let destination =
            decode_address(buf, ["dest_addr_ton", "dest_addr_npi", "destination_addr"])?;
        let esm_class = EsmClass::from_byte(decode_u8(buf)?);
        let protocol_id = decode_u8(buf)?;
        let priority_flag = decode_u8(buf)?;
        let schedule_delivery_time = decode_cstring(buf, TIME_LEN, "schedule_delivery_time")?;
        let validity_period = decode_cstring(buf, TIME_LEN, "validity_period")?;
        let registered_delivery = decode_u8(buf)?;
        let replace_if_present_flag = decode_u8(buf)?;
        let data_coding = DataCoding::from_byte(decode_u8(buf)?);
        let sm_default_msg_id = decode_u8(buf)?;

        let sm_length = decode_u8(buf)? as usize;
        if buf.remaining() < sm_length {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "sm_length {sm_length} exceeds the {} octets left in the PDU",
                    buf.remaining()
                ),
            });
        }
        let short_message = buf.copy_to_bytes(sm_length);
        let tlvs = decode_tlvs(buf)?;

        Ok(MessageBody {
            service_type,
            source,
            destination,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
            tlvs,
        })
    }
}

pub(crate) fn check_short_message(short_message: &[u8]) -> Result<(), CodecError> {
    if short_message.len() > MAX_SHORT_MESSAGE_LENGTH {
        return Err(CodecError::FieldValidation {
            field: "short_message",
            reason: format!(
                "{} octets exceeds maximum of {MAX_SHORT_MESSAGE_LENGTH}",
                short_message.len()
            ),
        });
    }
    Ok(())
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::SubmitSm,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf)?;

        check_short_message(&self.short_message)?;
        encode_cstring(buf, &self.service_type, SERVICE_TYPE_LEN)?;
        encode_address(buf, &self.source)?;
        encode_address(buf, &self.destination)?;
        encode_u8(buf, self.esm_class.to_byte());
        encode_u8(buf, self.protocol_id);
        encode_u8(buf, self.priority_flag);
        encode_cstring(buf, &self.schedule_delivery_time, TIME_LEN)?;
        encode_cstring(buf, &self.validity_period, TIME_LEN)?;
        encode_u8(buf, self.registered_delivery);
        encode_u8(buf, self.replace_if_present_flag);
        encode_u8(buf, self.data_coding.to_byte());
        encode_u8(buf, self.sm_default_msg_id);
        encode_u8(buf, self.short_message.len() as u8);
        buf.put_slice(&self.short_message);
        encode_tlvs(&self.tlvs, buf)
    }
}

impl Decodable for SubmitSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let body = MessageBody::decode(buf)?;

        Ok(SubmitSm {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            service_type: body.service_type,
            source: body.source,
            destination: body.destination,
            esm_class: body.esm_class,
            protocol_id: body.protocol_id,
            priority_flag: body.priority_flag,
            schedule_delivery_time: body.schedule_delivery_time,
            validity_period: body.validity_period,
            registered_delivery: body.registered_delivery,
            replace_if_present_flag: body.replace_if_present_flag,
            data_coding: body.data_coding,
            sm_default_msg_id: body.sm_default_msg_id,
            short_message: body.short_message,
            tlvs: body.tlvs,
        })
    }

    fn command_id() -> CommandId {
        CommandId::SubmitSm
    }
}

/// Acknowledges a submit_sm; `message_id` is the SMSC's handle for the part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
}

impl SubmitSmResponse {
    pub fn new(sequence_number: u32, message_id: &str) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id: message_id.to_string(),
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            message_id: String::new(),
        }
    }
}

pub(crate) fn encode_message_id_response(
    buf: &mut BytesMut,
    command_id: CommandId,
    command_status: CommandStatus,
    sequence_number: u32,
    message_id: &str,
) -> Result<(), CodecError> {
    PduHeader {
        command_length: 0,
        command_id,
        command_status,
        sequence_number,
    }
    .encode(buf)?;
    // Error responses are sent header-only.
    if command_status.is_ok() {
        encode_cstring(buf, message_id, MESSAGE_ID_LEN)?;
    }
    Ok(())
}

/// Reads an optional message_id body; SMSCs omit it on error responses.
pub(crate) fn decode_message_id(buf: &mut Cursor<&[u8]>) -> Result<String, CodecError> {
    if !buf.has_remaining() {
        return Ok(String::new());
    }
    decode_cstring(buf, MESSAGE_ID_LEN, "message_id")
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        encode_message_id_response(
            buf,
            CommandId::SubmitSmResp,
            self.command_status,
            self.sequence_number,
            &self.message_id,
        )
    }
}

impl Decodable for SubmitSmResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let message_id = decode_message_id(buf)?;

        Ok(SubmitSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }

    fn command_id() -> CommandId {
        CommandId::SubmitSmResp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};

    fn sample() -> SubmitSm {
        let source = Address::new(TypeOfNumber::Alphanumeric, NumericPlanIndicator::Unknown, "ACME").unwrap();
        let destination = Address::unknown("447700900123").unwrap();
        let mut pdu = SubmitSm::new(
            source,
            destination,
            DataCoding::SmscDefault,
            EsmClass::default(),
            Bytes::from_static(b"Hello"),
        )
        .with_registered_delivery(REGISTERED_DELIVERY_RECEIPT);
        pdu.sequence_number = 12;
        pdu
    }

    #[test]
    fn submit_sm_encodes_variable_length_strings() {
        let bytes = sample().to_bytes().unwrap();

        // header, service_type "\0", ton, npi, "ACME\0", ton, npi,
        // "447700900123\0", esm, pid, prio, "\0", "\0", rd, rip, dc, dmid, len, "Hello"
        let expected_len = 16 + 1 + 2 + 5 + 2 + 13 + 3 + 1 + 1 + 4 + 1 + 5;
        assert_eq!(bytes.len(), expected_len);
        assert_eq!(&bytes[0..4], &(expected_len as u32).to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 6..], b"\x05Hello");
    }

    #[test]
    fn submit_sm_decodes_what_it_encodes() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSm::decode(header, &mut cursor).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.registered_delivery, REGISTERED_DELIVERY_RECEIPT);
    }

    #[test]
    fn oversized_short_message_is_rejected() {
        let mut pdu = sample();
        pdu.short_message = Bytes::from(vec![b'x'; 255]);
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::FieldValidation { field: "short_message", .. })
        ));
    }

    #[test]
    fn error_response_has_no_body() {
        let resp = SubmitSmResponse::error(4, CommandStatus::ThrottlingError);
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSmResponse::decode(header, &mut cursor).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn response_message_id() {
        let bytes = SubmitSmResponse::new(5, "msg-0001").to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSmResponse::decode(header, &mut cursor).unwrap();
        assert_eq!(decoded.message_id, "msg-0001");
    }
}
