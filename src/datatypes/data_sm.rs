// ABOUTME: data_sm and data_sm_resp PDUs (SMPP v3.4 Sections 4.7.1, 4.7.2)
// ABOUTME: Some SMSCs deliver mobile-originated traffic as data_sm with a message_payload TLV

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    encode_u8,
};
use crate::datatypes::address::{Address, decode_address, encode_address};
use crate::datatypes::deliver_sm::SarInfo;
use crate::datatypes::submit_sm::{
    SERVICE_TYPE_LEN, decode_message_id, encode_message_id_response,
};
use crate::datatypes::tlv::{Tlv, decode_tlvs, encode_tlvs, find_tlv, tags};
use crate::datatypes::{CommandId, CommandStatus, DataCoding, EsmClass};
use bytes::{Bytes, BytesMut};
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub registered_delivery: u8,
    pub data_coding: DataCoding,

    /// User data travels in the message_payload TLV; data_sm has no
    /// short_message field.
    pub tlvs: Vec<Tlv>,
}

impl DataSm {
    pub fn new(
        source: Address,
        destination: Address,
        data_coding: DataCoding,
        payload: impl Into<Bytes>,
    ) -> Self {
        DataSm {
            command_status: CommandStatus::Ok,
            sequence_number: 0,
            service_type: String::new(),
            source,
            destination,
            esm_class: EsmClass::default(),
            registered_delivery: 0,
            data_coding,
            tlvs: vec![Tlv::new(tags::MESSAGE_PAYLOAD, payload)],
        }
    }

    pub fn tlv(&self, tag: u16) -> Option<&Tlv> {
        find_tlv(&self.tlvs, tag)
    }

    pub fn message_payload(&self) -> Option<&Bytes> {
        self.tlv(tags::MESSAGE_PAYLOAD).map(|tlv| &tlv.value)
    }

    pub fn sar_info(&self) -> Option<SarInfo> {
        Some(SarInfo {
            msg_ref_num: self.tlv(tags::SAR_MSG_REF_NUM)?.as_u16()?,
            total_segments: self.tlv(tags::SAR_TOTAL_SEGMENTS)?.as_u8()?,
            segment_seqnum: self.tlv(tags::SAR_SEGMENT_SEQNUM)?.as_u8()?,
        })
    }
}

impl Encodable for DataSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::DataSm,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf)?;

        encode_cstring(buf, &self.service_type, SERVICE_TYPE_LEN)?;
        encode_address(buf, &self.source)?;
        encode_address(buf, &self.destination)?;
        encode_u8(buf, self.esm_class.to_byte());
        encode_u8(buf, self.registered_delivery);
        encode_u8(buf, self.data_coding.to_byte());
        encode_tlvs(&self.tlvs, buf)
    }
}

impl Decodable for DataSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let service_type = decode_cstring(buf, SERVICE_TYPE_LEN, "service_type")?;
        let source = decode_address(buf, ["source_addr_ton", "source_addr_npi", "source_addr"])?;
        let destination =
            decode_address(buf, ["dest_addr_ton", "dest_addr_npi", "destination_addr"])?;
        let esm_class = EsmClass::from_byte(decode_u8(buf)?);
        let registered_delivery = decode_u8(buf)?;
        let data_coding = DataCoding::from_byte(decode_u8(buf)?);
        let tlvs = decode_tlvs(buf)?;

        Ok(DataSm {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            service_type,
            source,
            destination,
            esm_class,
            registered_delivery,
            data_coding,
            tlvs,
        })
    }

    fn command_id() -> CommandId {
        CommandId::DataSm
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
    pub tlvs: Vec<Tlv>,
}

impl DataSmResponse {
    pub fn new(sequence_number: u32, message_id: &str) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id: message_id.to_string(),
            tlvs: Vec::new(),
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            message_id: String::new(),
            tlvs: Vec::new(),
        }
    }
}

impl Encodable for DataSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        encode_message_id_response(
            buf,
            CommandId::DataSmResp,
            self.command_status,
            self.sequence_number,
            &self.message_id,
        )?;
        encode_tlvs(&self.tlvs, buf)
    }
}

impl Decodable for DataSmResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let message_id = decode_message_id(buf)?;
        let tlvs = decode_tlvs(buf)?;

        Ok(DataSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
            tlvs,
        })
    }

    fn command_id() -> CommandId {
        CommandId::DataSmResp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_sm_round_trip_with_payload() {
        let mut pdu = DataSm::new(
            Address::unknown("447700900123").unwrap(),
            Address::unknown("12345").unwrap(),
            DataCoding::Ucs2,
            Bytes::from_static(&[0x00, 0x48, 0x00, 0x69]),
        );
        pdu.sequence_number = 31;

        let bytes = pdu.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = DataSm::decode(header, &mut cursor).unwrap();

        assert_eq!(decoded.message_payload().map(|p| p.as_ref()), Some(&[0x00, 0x48, 0x00, 0x69][..]));
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn error_response_is_header_only() {
        let bytes = DataSmResponse::error(2, CommandStatus::DeliveryFailure)
            .to_bytes()
            .unwrap();
        assert_eq!(bytes.len(), 16);
    }
}
