// ABOUTME: Concatenation user data header (3GPP TS 23.040 9.2.3.24.1 and .8)
// ABOUTME: Written with the 8-bit reference IE; both the 8-bit and 16-bit forms are read

use crate::message::encoding::CONCAT_UDH_LEN;
use crate::message::error::DecodeError;

/// Concatenated short message, 8-bit reference.
pub const IE_CONCAT_8BIT: u8 = 0x00;
/// Concatenated short message, 16-bit reference.
pub const IE_CONCAT_16BIT: u8 = 0x08;

/// Position of one unit within a concatenated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcatInfo {
    pub reference: u8,
    pub total: u8,
    /// 1-based
    pub index: u8,
}

impl ConcatInfo {
    pub fn new(reference: u8, total: u8, index: u8) -> Self {
        Self {
            reference,
            total,
            index,
        }
    }

    /// `05 00 03 ref total index`
    pub fn to_udh(self) -> [u8; CONCAT_UDH_LEN] {
        [
            0x05,
            IE_CONCAT_8BIT,
            0x03,
            self.reference,
            self.total,
            self.index,
        ]
    }

    /// Whether total and index describe a real slot.
    pub fn is_valid(self) -> bool {
        self.total > 0 && self.index > 0 && self.index <= self.total
    }
}

/// Splits a UDHI payload into its concatenation info (if it carries any)
/// and the user data that follows the header.
///
/// A 16-bit reference keeps only its low byte.
pub fn split_udh(payload: &[u8]) -> Result<(Option<ConcatInfo>, &[u8]), DecodeError> {
    let (&udhl, rest) = payload
        .split_first()
        .ok_or(DecodeError::MalformedUdh("empty payload"))?;
    let udhl = udhl as usize;
    if rest.len() < udhl {
        return Err(DecodeError::MalformedUdh("header longer than payload"));
    }
    let (mut header, body) = rest.split_at(udhl);

    let mut concat = None;
    while !header.is_empty() {
        let [iei, len, tail @ ..] = header else {
            return Err(DecodeError::MalformedUdh("truncated information element"));
        };
        let len = *len as usize;
        if tail.len() < len {
            return Err(DecodeError::MalformedUdh("information element overruns header"));
        }
        let (data, next) = tail.split_at(len);

        match (*iei, data) {
            (IE_CONCAT_8BIT, &[reference, total, index]) => {
                concat = Some(ConcatInfo::new(reference, total, index));
            }
            (IE_CONCAT_16BIT, &[_, reference, total, index]) => {
                concat = Some(ConcatInfo::new(reference, total, index));
            }
            (IE_CONCAT_8BIT | IE_CONCAT_16BIT, _) => {
                return Err(DecodeError::MalformedUdh("bad concatenation element length"));
            }
            _ => {}
        }
        header = next;
    }

    Ok((concat, body))
}
