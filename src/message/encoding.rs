// ABOUTME: Chooses GSM 7-bit or UCS2 for outbound text and decodes inbound payloads by data_coding
// ABOUTME: Capacities assume SMPP short_message with septets unpacked, one per octet

use crate::datatypes::DataCoding;
use crate::message::error::{DecodeError, EncodingError};
use crate::message::gsm7;

/// Size of the concatenation UDH: UDHL, IEI, IEDL, reference, total, index.
pub const CONCAT_UDH_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7Bit,
    Ucs2,
}

impl Encoding {
    /// GSM 7-bit when every character is in the default alphabet or its
    /// extension table, UCS2 otherwise.
    pub fn select(text: &str) -> Encoding {
        if gsm7::is_representable(text) {
            Encoding::Gsm7Bit
        } else {
            Encoding::Ucs2
        }
    }

    pub fn data_coding(self) -> DataCoding {
        match self {
            Encoding::Gsm7Bit => DataCoding::SmscDefault,
            Encoding::Ucs2 => DataCoding::Ucs2,
        }
    }

    /// Octets available to a message sent as one unit (160 septets or 70
    /// UTF-16 code units).
    pub fn single_capacity(self) -> usize {
        match self {
            Encoding::Gsm7Bit => 160,
            Encoding::Ucs2 => 140,
        }
    }

    /// Octets of text per segment once the UDH is in place.
    pub fn segment_capacity(self) -> usize {
        match self {
            // The UDH costs 7 septets on the air interface.
            Encoding::Gsm7Bit => 153,
            Encoding::Ucs2 => 140 - CONCAT_UDH_LEN,
        }
    }

    /// Encoded form of one character.
    pub fn encode_char(self, c: char, out: &mut Vec<u8>) -> Result<(), EncodingError> {
        match self {
            Encoding::Gsm7Bit => {
                gsm7::Septet::for_char(c)
                    .ok_or(EncodingError::Unrepresentable(c))?
                    .write_to(out);
            }
            Encoding::Ucs2 => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
        Ok(())
    }

    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self {
            Encoding::Gsm7Bit => gsm7::encode(text),
            Encoding::Ucs2 => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }
}

/// Decodes an inbound payload (without its UDH) according to data_coding.
pub fn decode_payload(data_coding: DataCoding, payload: &[u8]) -> Result<String, DecodeError> {
    match data_coding {
        DataCoding::SmscDefault | DataCoding::Gsm7BitWithClass(_) => gsm7::decode(payload),
        DataCoding::Ascii => Ok(payload.iter().map(|&b| char::from(b & 0x7F)).collect()),
        DataCoding::Latin1 => Ok(payload.iter().map(|&b| char::from(b)).collect()),
        DataCoding::Ucs2 => decode_ucs2(payload),
        DataCoding::Binary | DataCoding::Custom(_) => {
            Err(DecodeError::UnsupportedCoding(data_coding))
        }
    }
}

fn decode_ucs2(payload: &[u8]) -> Result<String, DecodeError> {
    if payload.len() % 2 != 0 {
        return Err(DecodeError::OddUcs2Length(payload.len()));
    }
    let units = payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|_| DecodeError::InvalidUtf16)
}
