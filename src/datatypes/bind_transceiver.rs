// ABOUTME: bind_transceiver and bind_transceiver_resp PDUs (SMPP v3.4 Sections 4.1.5, 4.1.6)
// ABOUTME: The gateway binds as a transceiver so submits and deliveries share one link

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    encode_u8,
};
use crate::datatypes::tlv::{Tlv, decode_tlvs, tags};
use crate::datatypes::{CommandId, CommandStatus, InterfaceVersion, NumericPlanIndicator, TypeOfNumber};
use crate::macros::builder_setters;
use bytes::{Buf, BytesMut};
use std::io::Cursor;

// Field sizes including the NUL terminator.
const SYSTEM_ID_LEN: usize = 16;
const PASSWORD_LEN: usize = 9;
const SYSTEM_TYPE_LEN: usize = 13;
const ADDRESS_RANGE_LEN: usize = 41;

/// Request to bind as an ESME that both submits and receives messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindTransceiver {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// 5.2.1 system_id: identifies the ESME to the SMSC (max 15 octets).
    pub system_id: String,

    /// 5.2.2 password: authenticates the ESME (max 8 octets).
    pub password: String,

    /// 5.2.3 system_type: categorises the ESME, e.g. "VMS" (max 12 octets).
    pub system_type: String,

    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,

    /// 5.2.7 address_range: SME addresses served by this ESME (max 40 octets).
    pub address_range: String,
}

impl BindTransceiver {
    pub fn builder() -> BindTransceiverBuilder {
        BindTransceiverBuilder::default()
    }

    fn validate(&self) -> Result<(), CodecError> {
        check_len("system_id", &self.system_id, SYSTEM_ID_LEN)?;
        check_len("password", &self.password, PASSWORD_LEN)?;
        check_len("system_type", &self.system_type, SYSTEM_TYPE_LEN)?;
        check_len("address_range", &self.address_range, ADDRESS_RANGE_LEN)
    }
}

fn check_len(field: &'static str, value: &str, max_len: usize) -> Result<(), CodecError> {
    if value.len() >= max_len {
        return Err(CodecError::FieldValidation {
            field,
            reason: format!("{} octets exceeds maximum of {}", value.len(), max_len - 1),
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct BindTransceiverBuilder {
    sequence_number: u32,
    system_id: String,
    password: String,
    system_type: String,
    interface_version: InterfaceVersion,
    addr_ton: TypeOfNumber,
    addr_npi: NumericPlanIndicator,
    address_range: String,
}

impl BindTransceiverBuilder {
    builder_setters! {
        sequence_number: u32,
        interface_version: InterfaceVersion,
        addr_ton: TypeOfNumber,
        addr_npi: NumericPlanIndicator,
    }

    pub fn system_id(mut self, system_id: &str) -> Self {
        self.system_id = system_id.to_string();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn system_type(mut self, system_type: &str) -> Self {
        self.system_type = system_type.to_string();
        self
    }

    pub fn address_range(mut self, range: &str) -> Self {
        self.address_range = range.to_string();
        self
    }

    pub fn build(self) -> Result<BindTransceiver, CodecError> {
        let pdu = BindTransceiver {
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
            system_id: self.system_id,
            password: self.password,
            system_type: self.system_type,
            interface_version: self.interface_version,
            addr_ton: self.addr_ton,
            addr_npi: self.addr_npi,
            address_range: self.address_range,
        };
        pdu.validate()?;
        Ok(pdu)
    }
}

impl Encodable for BindTransceiver {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.validate()?;

        PduHeader {
            command_length: 0,
            command_id: CommandId::BindTransceiver,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf)?;

        encode_cstring(buf, &self.system_id, SYSTEM_ID_LEN)?;
        encode_cstring(buf, &self.password, PASSWORD_LEN)?;
        encode_cstring(buf, &self.system_type, SYSTEM_TYPE_LEN)?;
        encode_u8(buf, self.interface_version as u8);
        encode_u8(buf, self.addr_ton as u8);
        encode_u8(buf, self.addr_npi as u8);
        encode_cstring(buf, &self.address_range, ADDRESS_RANGE_LEN)?;
        Ok(())
    }
}

impl Decodable for BindTransceiver {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let system_id = decode_cstring(buf, SYSTEM_ID_LEN, "system_id")?;
        let password = decode_cstring(buf, PASSWORD_LEN, "password")?;
        let system_type = decode_cstring(buf, SYSTEM_TYPE_LEN, "system_type")?;
        let interface_version = decode_u8(buf)?;
        let interface_version = InterfaceVersion::try_from(interface_version).map_err(|_| {
            CodecError::FieldValidation {
                field: "interface_version",
                reason: format!("unsupported version {interface_version:#04x}"),
            }
        })?;
        let addr_ton = decode_ton(buf, "addr_ton")?;
        let addr_npi = decode_npi(buf, "addr_npi")?;
        let address_range = decode_cstring(buf, ADDRESS_RANGE_LEN, "address_range")?;

        Ok(BindTransceiver {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }

    fn command_id() -> CommandId {
        CommandId::BindTransceiver
    }
}

pub(crate) fn decode_ton(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<TypeOfNumber, CodecError> {
    let raw = decode_u8(buf)?;
    TypeOfNumber::try_from(raw).map_err(|_| CodecError::FieldValidation {
        field,
        reason: format!("invalid type of number {raw:#04x}"),
    })
}

pub(crate) fn decode_npi(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<NumericPlanIndicator, CodecError> {
    let raw = decode_u8(buf)?;
    NumericPlanIndicator::try_from(raw).map_err(|_| CodecError::FieldValidation {
        field,
        reason: format!("invalid numbering plan indicator {raw:#04x}"),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindTransceiverResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// SMSC identifier. May be absent when the bind was rejected.
    pub system_id: String,

    /// SMPP version supported by the SMSC, if it says.
    pub sc_interface_version: Option<Tlv>,
}

impl BindTransceiverResponse {
    pub fn new(sequence_number: u32, system_id: &str) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            system_id: system_id.to_string(),
            sc_interface_version: None,
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            system_id: String::new(),
            sc_interface_version: None,
        }
    }
}

impl Encodable for BindTransceiverResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader {
            command_length: 0,
            command_id: CommandId::BindTransceiverResp,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf)?;

        encode_cstring(buf, &self.system_id, SYSTEM_ID_LEN)?;
        if let Some(tlv) = &self.sc_interface_version {
            tlv.encode(buf)?;
        }
        Ok(())
    }
}

impl Decodable for BindTransceiverResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        // A rejected bind is allowed to come back header-only.
        if !buf.has_remaining() {
            return Ok(BindTransceiverResponse {
                command_status: header.command_status,
                sequence_number: header.sequence_number,
                system_id: String::new(),
                sc_interface_version: None,
            });
        }

        let system_id = decode_cstring(buf, SYSTEM_ID_LEN, "system_id")?;
        let sc_interface_version = decode_tlvs(buf)?
            .into_iter()
            .find(|tlv| tlv.tag == tags::SC_INTERFACE_VERSION);

        Ok(BindTransceiverResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
            sc_interface_version,
        })
    }

    fn command_id() -> CommandId {
        CommandId::BindTransceiverResp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_long_password() {
        let result = BindTransceiver::builder()
            .system_id("esme")
            .password("muchtoolong")
            .build();
        assert!(matches!(
            result,
            Err(CodecError::FieldValidation { field: "password", .. })
        ));
    }

    #[test]
    fn bind_transceiver_wire_layout() {
        let bind = BindTransceiver::builder()
            .sequence_number(1)
            .system_id("esme")
            .password("pw")
            .build()
            .unwrap();
        let bytes = bind.to_bytes().unwrap();

        // header + "esme\0" + "pw\0" + "\0" + version + ton + npi + "\0"
        assert_eq!(bytes.len(), 16 + 5 + 3 + 1 + 3 + 1);
        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&bytes[16..21], b"esme\0");
        assert_eq!(bytes[25], 0x34);

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        assert_eq!(BindTransceiver::decode(header, &mut cursor).unwrap(), bind);
    }

    #[test]
    fn rejected_bind_response_without_body() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x09, // bind_transceiver_resp
            0x00, 0x00, 0x00, 0x0E, // ESME_RINVPASWD
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let mut cursor = Cursor::new(data);
        let header = PduHeader::decode(&mut cursor).unwrap();
        let resp = BindTransceiverResponse::decode(header, &mut cursor).unwrap();
        assert_eq!(resp.command_status, CommandStatus::InvalidPassword);
        assert!(resp.system_id.is_empty());
    }

    #[test]
    fn response_with_interface_version() {
        let mut resp = BindTransceiverResponse::new(3, "SMSC");
        resp.sc_interface_version = Some(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x34));
        let bytes = resp.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = BindTransceiverResponse::decode(header, &mut cursor).unwrap();
        assert_eq!(decoded.system_id, "SMSC");
        assert_eq!(decoded.sc_interface_version.and_then(|tlv| tlv.as_u8()), Some(0x34));
    }
}
