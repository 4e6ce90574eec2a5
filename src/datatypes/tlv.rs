// ABOUTME: Tag-Length-Value optional parameters (SMPP v3.4 Section 5.3)
// ABOUTME: Raw TLVs are kept in wire order; typed accessors read the handful the gateway needs

use crate::codec::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Optional parameter tags used by this crate.
pub mod tags {
    pub const PAYLOAD_TYPE: u16 = 0x0019;
    pub const ADDITIONAL_STATUS_INFO_TEXT: u16 = 0x001D;
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
    pub const SOURCE_PORT: u16 = 0x020A;
    pub const DESTINATION_PORT: u16 = 0x020B;
    pub const SAR_MSG_REF_NUM: u16 = 0x020C;
    pub const SAR_TOTAL_SEGMENTS: u16 = 0x020E;
    pub const SAR_SEGMENT_SEQNUM: u16 = 0x020F;
    pub const SC_INTERFACE_VERSION: u16 = 0x0210;
    pub const NETWORK_ERROR_CODE: u16 = 0x0423;
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
    pub const DELIVERY_FAILURE_REASON: u16 = 0x0425;
    pub const MORE_MESSAGES_TO_SEND: u16 = 0x0426;
    pub const MESSAGE_STATE: u16 = 0x0427;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv {
    /// Identifies the optional parameter.
    pub tag: u16,

    /// The parameter value; its length is written as the TLV length field.
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Tlv {
            tag,
            value: value.into(),
        }
    }

    pub fn from_u8(tag: u16, value: u8) -> Self {
        Tlv::new(tag, Bytes::copy_from_slice(&[value]))
    }

    pub fn from_u16(tag: u16, value: u16) -> Self {
        Tlv::new(tag, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let length = u16::try_from(self.value.len()).map_err(|_| CodecError::FieldValidation {
            field: "tlv",
            reason: format!("value for tag {:#06x} exceeds 65535 octets", self.tag),
        })?;
        buf.put_u16(self.tag);
        buf.put_u16(length);
        buf.put_slice(&self.value);
        Ok(())
    }

    pub fn encoded_size(&self) -> usize {
        4 + self.value.len()
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::TlvError(format!(
                "truncated TLV header: {} octets left",
                buf.remaining()
            )));
        }
        let tag = buf.get_u16();
        let length = buf.get_u16() as usize;
        if buf.remaining() < length {
            return Err(CodecError::TlvError(format!(
                "TLV {tag:#06x} declares {length} octets, {} available",
                buf.remaining()
            )));
        }
        let value = buf.copy_to_bytes(length);
        Ok(Tlv { tag, value })
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value.as_ref() {
            [b] => Some(*b),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self.value.as_ref() {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Reads a C-octet string value, tolerating a missing terminator.
    pub fn as_cstring(&self) -> Option<String> {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.value.len());
        String::from_utf8(self.value[..end].to_vec()).ok()
    }
}

/// Decodes every TLV left in `buf`.
pub fn decode_tlvs(buf: &mut Cursor<&[u8]>) -> Result<Vec<Tlv>, CodecError> {
    let mut tlvs = Vec::new();
    while buf.has_remaining() {
        tlvs.push(Tlv::decode(buf)?);
    }
    Ok(tlvs)
}

pub fn encode_tlvs(tlvs: &[Tlv], buf: &mut BytesMut) -> Result<(), CodecError> {
    for tlv in tlvs {
        tlv.encode(buf)?;
    }
    Ok(())
}

pub fn find_tlv(tlvs: &[Tlv], tag: u16) -> Option<&Tlv> {
    tlvs.iter().find(|tlv| tlv.tag == tag)
}
