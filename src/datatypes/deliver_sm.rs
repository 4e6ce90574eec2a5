// ABOUTME: deliver_sm and deliver_sm_resp PDUs (SMPP v3.4 Sections 4.6.1, 4.6.2)
// ABOUTME: Carries mobile-originated messages, concatenated parts and SMSC delivery receipts

use crate::codec::{CodecError, Decodable, Encodable, PduHeader, encode_cstring, encode_u8};
use crate::datatypes::address::{Address, encode_address};
use crate::datatypes::submit_sm::{
    MessageBody, SERVICE_TYPE_LEN, TIME_LEN, check_short_message, decode_message_id,
    encode_message_id_response,
};
use crate::datatypes::tlv::{Tlv, encode_tlvs, find_tlv, tags};
use crate::datatypes::{CommandId, CommandStatus, DataCoding, EsmClass};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Delivered by the SMSC to the ESME.
///
/// `schedule_delivery_time` and `validity_period` are always empty on
/// deliver_sm but are still read off the wire so the layout matches submit_sm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

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

/// Concatenation info carried in the SAR optional parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SarInfo {
    pub msg_ref_num: u16,
    pub total_segments: u8,
    pub segment_seqnum: u8,
}

impl DeliverSm {
    pub fn builder() -> DeliverSmBuilder {
        DeliverSmBuilder::default()
    }

    pub fn tlv(&self, tag: u16) -> Option<&Tlv> {
        find_tlv(&self.tlvs, tag)
    }

    pub fn is_delivery_receipt(&self) -> bool {
        self.esm_class.is_delivery_receipt()
    }

    /// All three SAR parameters, or `None` if any is missing or malformed.
    pub fn sar_info(&self) -> Option<SarInfo> {
        Some(SarInfo {
            msg_ref_num: self.tlv(tags::SAR_MSG_REF_NUM)?.as_u16()?,
            total_segments: self.tlv(tags::SAR_TOTAL_SEGMENTS)?.as_u8()?,
            segment_seqnum: self.tlv(tags::SAR_SEGMENT_SEQNUM)?.as_u8()?,
        })
    }

    /// User data: message_payload when present, otherwise short_message.
    pub fn payload(&self) -> &Bytes {
        match self.tlv(tags::MESSAGE_PAYLOAD) {
            Some(tlv) if self.short_message.is_empty() => &tlv.value,
            _ => &self.short_message,
        }
    }

    pub fn receipted_message_id(&self) -> Option<String> {
        self.tlv(tags::RECEIPTED_MESSAGE_ID)?.as_cstring()
    }
}

#[derive(Debug, Default)]
pub struct DeliverSmBuilder {
    sequence_number: u32,
    source: Address,
    destination: Address,
    esm_class: EsmClass,
    data_coding: DataCoding,
    short_message: Bytes,
    tlvs: Vec<Tlv>,
}

impl DeliverSmBuilder {
    crate::macros::builder_setters! {
        sequence_number: u32,
        source: Address,
        destination: Address,
        esm_class: EsmClass,
        data_coding: DataCoding,
    }

    pub fn short_message(mut self, short_message: impl Into<Bytes>) -> Self {
        self.short_message = short_message.into();
        self
    }

    pub fn tlv(mut self, tlv: Tlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    pub fn sar(self, msg_ref_num: u16, total_segments: u8, segment_seqnum: u8) -> Self {
        self.tlv(Tlv::from_u16(tags::SAR_MSG_REF_NUM, msg_ref_num))
            .tlv(Tlv::from_u8(tags::SAR_TOTAL_SEGMENTS, total_segments))
            .tlv(Tlv::from_u8(tags::SAR_SEGMENT_SEQNUM, segment_seqnum))
    }

    pub fn build(self) -> DeliverSm {
        DeliverSm {
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
            service_type: String::new(),
            source: self.source,
            destination: self.destination,
            esm_class: self.esm_class,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 0,
            replace_if_present_flag: 0,
            data_coding: self.data_coding,
            sm_default_msg_id: 0,
            short_message: self.short_message,
            tlvs: self.tlvs,
        }
    }
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSm,
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

impl Decodable for DeliverSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let body = MessageBody::decode(buf)?;

        Ok(DeliverSm {
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
        CommandId::DeliverSm
    }
}

/// deliver_sm_resp; its message_id is unused and sent as a single NUL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl DeliverSmResponse {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
        }
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        encode_message_id_response(
            buf,
            CommandId::DeliverSmResp,
            self.command_status,
            self.sequence_number,
            "",
        )
    }
}

impl Decodable for DeliverSmResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        decode_message_id(buf)?;

        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }

    fn command_id() -> CommandId {
        CommandId::DeliverSmResp
    }
}
