// ABOUTME: SMPP address (TON, NPI, digits) with format validation driven by the Type of Number
// ABOUTME: Outbound addresses are validated on construction; decoded addresses are taken as sent

use crate::codec::{CodecError, decode_cstring, encode_cstring, encode_u8};
use crate::datatypes::bind_transceiver::{decode_npi, decode_ton};
use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use bytes::BytesMut;
use std::fmt;
use std::io::Cursor;

/// Maximum address length in octets, excluding the NUL terminator.
pub const MAX_ADDRESS_LENGTH: usize = 20;

/// A source or destination address as carried in submit_sm/deliver_sm.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Address {
    pub ton: TypeOfNumber,
    pub npi: NumericPlanIndicator,
    addr: String,
}

impl Address {
    /// Creates an address, validating its format against `ton`.
    pub fn new(
        ton: TypeOfNumber,
        npi: NumericPlanIndicator,
        addr: &str,
    ) -> Result<Self, AddressError> {
        if addr.len() > MAX_ADDRESS_LENGTH {
            return Err(AddressError::TooLong {
                max_len: MAX_ADDRESS_LENGTH,
                actual_len: addr.len(),
            });
        }

        let valid = match ton {
            TypeOfNumber::International => addr.chars().all(|c| c.is_ascii_digit() || c == '+'),
            TypeOfNumber::National
            | TypeOfNumber::NetworkSpecific
            | TypeOfNumber::SubscriberNumber => addr.chars().all(|c| c.is_ascii_digit()),
            TypeOfNumber::Alphanumeric | TypeOfNumber::Abbreviated => {
                addr.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
            }
            TypeOfNumber::Unknown => addr.chars().all(|c| c.is_ascii() && !c.is_ascii_control()),
        };

        if !valid {
            return Err(AddressError::InvalidFormat {
                ton,
                addr: addr.to_string(),
            });
        }

        Ok(Address {
            ton,
            npi,
            addr: addr.to_string(),
        })
    }

    /// Address with TON and NPI both `Unknown`, the way destinations arriving
    /// from the front-end are built.
    pub fn unknown(addr: &str) -> Result<Self, AddressError> {
        Self::new(TypeOfNumber::Unknown, NumericPlanIndicator::Unknown, addr)
    }

    /// Wraps an address decoded off the wire without re-validating it; the
    /// SMSC is the authority on what it sends us.
    pub(crate) fn from_wire(ton: TypeOfNumber, npi: NumericPlanIndicator, addr: String) -> Self {
        Address { ton, npi, addr }
    }

    pub fn as_str(&self) -> &str {
        &self.addr
    }

    pub fn is_empty(&self) -> bool {
        self.addr.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// Writes `ton`, `npi` and the NUL-terminated digits.
pub(crate) fn encode_address(buf: &mut BytesMut, address: &Address) -> Result<(), CodecError> {
    encode_u8(buf, address.ton as u8);
    encode_u8(buf, address.npi as u8);
    encode_cstring(buf, address.as_str(), MAX_ADDRESS_LENGTH + 1)
}

pub(crate) fn decode_address(
    buf: &mut Cursor<&[u8]>,
    fields: [&'static str; 3],
) -> Result<Address, CodecError> {
    let [ton_field, npi_field, addr_field] = fields;
    let ton = decode_ton(buf, ton_field)?;
    let npi = decode_npi(buf, npi_field)?;
    let addr = decode_cstring(buf, MAX_ADDRESS_LENGTH + 1, addr_field)?;
    Ok(Address::from_wire(ton, npi, addr))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Address too long: {actual_len} octets (max {max_len})")]
    TooLong { max_len: usize, actual_len: usize },

    #[error("Address {addr:?} is not valid for type of number {ton:?}")]
    InvalidFormat { ton: TypeOfNumber, addr: String },
}
