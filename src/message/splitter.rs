// ABOUTME: Turns outbound text into one or more submit_sm PDUs
// ABOUTME: Pure: the reference byte is an input and nothing here touches the network

use crate::datatypes::{
    Address, EsmClass, MAX_SHORT_MESSAGE_LENGTH, REGISTERED_DELIVERY_RECEIPT, SubmitSm,
};
use crate::message::encoding::Encoding;
use crate::message::error::EncodingError;
use crate::message::udh::ConcatInfo;
use bytes::{BufMut, Bytes, BytesMut};

/// Most segments a concatenated message can have; the total is one octet.
pub const MAX_SEGMENTS: usize = 255;

/// Text encoded and cut into segment payloads, before any UDH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub encoding: Encoding,
    pub segments: Vec<Bytes>,
}

impl EncodedMessage {
    pub fn is_concatenated(&self) -> bool {
        self.segments.len() > 1
    }
}

/// Encodes `text` and cuts it into segments.
///
/// Text that fits one unit stays whole. Longer text is cut greedily at
/// [`Encoding::segment_capacity`], always between characters, so neither a
/// GSM escape sequence nor a UTF-16 surrogate pair is ever split.
pub fn encode_message(text: &str) -> Result<EncodedMessage, EncodingError> {
    let encoding = Encoding::select(text);
    let whole = encoding.encode(text)?;

    if whole.len() <= encoding.single_capacity() {
        return Ok(EncodedMessage {
            encoding,
            segments: vec![Bytes::from(whole)],
        });
    }

    let capacity = encoding.segment_capacity();
    let mut segments = Vec::new();
    let mut current = Vec::with_capacity(capacity);
    let mut encoded = Vec::with_capacity(4);

    for c in text.chars() {
        encoded.clear();
        encoding.encode_char(c, &mut encoded)?;
        if current.len() + encoded.len() > capacity {
            segments.push(Bytes::from(std::mem::replace(
                &mut current,
                Vec::with_capacity(capacity),
            )));
        }
        current.extend_from_slice(&encoded);
    }
    if !current.is_empty() {
        segments.push(Bytes::from(current));
    }

    if segments.len() > MAX_SEGMENTS {
        return Err(EncodingError::TooManySegments {
            needed: segments.len(),
            max: MAX_SEGMENTS,
        });
    }

    Ok(EncodedMessage { encoding, segments })
}

/// Builds the submit_sm PDUs for one outbound message, in index order.
///
/// Every unit requests an SMSC delivery receipt. Concatenated units carry
/// the UDH `05 00 03 reference total index` and set UDHI in esm_class.
/// Sequence numbers are left for the session to assign.
pub fn encode_and_split(
    source: &Address,
    destination: &Address,
    text: &str,
    reference: u8,
) -> Result<Vec<SubmitSm>, EncodingError> {
    let message = encode_message(text)?;
    let data_coding = message.encoding.data_coding();

    if !message.is_concatenated() {
        let payload = message.segments.into_iter().next().unwrap_or_default();
        check_fits(1, payload.len())?;
        let unit = SubmitSm::new(
            source.clone(),
            destination.clone(),
            data_coding,
            EsmClass::default(),
            payload,
        )
        .with_registered_delivery(REGISTERED_DELIVERY_RECEIPT);
        return Ok(vec![unit]);
    }

    let total = message.segments.len() as u8;
    let esm_class = EsmClass::default().with_udhi();

    message
        .segments
        .iter()
        .enumerate()
        .map(|(i, segment)| -> Result<SubmitSm, EncodingError> {
            let index = (i + 1) as u8;
            let mut payload = BytesMut::with_capacity(segment.len() + 6);
            payload.put_slice(&ConcatInfo::new(reference, total, index).to_udh());
            payload.put_slice(segment);
            check_fits(i + 1, payload.len())?;

            Ok(SubmitSm::new(
                source.clone(),
                destination.clone(),
                data_coding,
                esm_class,
                payload.freeze(),
            )
            .with_registered_delivery(REGISTERED_DELIVERY_RECEIPT))
        })
        .collect()
}

fn check_fits(index: usize, len: usize) -> Result<(), EncodingError> {
    if len > MAX_SHORT_MESSAGE_LENGTH {
        return Err(EncodingError::CapacityExceeded {
            index,
            len,
            capacity: MAX_SHORT_MESSAGE_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::DataCoding;
    use crate::message::encoding::decode_payload;
    use crate::message::udh::split_udh;

    fn addresses() -> (Address, Address) {
        (
            Address::unknown("12345").unwrap(),
            Address::unknown("447700900000").unwrap(),
        )
    }

    fn rejoin(units: &[SubmitSm]) -> String {
        units
            .iter()
            .map(|unit| {
                let (_, body) = split_udh(&unit.short_message).unwrap();
                decode_payload(unit.data_coding, body).unwrap()
            })
            .collect()
    }

    #[test]
    fn short_text_is_one_unit_without_header() {
        let (src, dst) = addresses();
        let units = encode_and_split(&src, &dst, "Hello", 9).unwrap();

        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.short_message.as_ref(), b"Hello");
        assert!(!unit.esm_class.has_udhi());
        assert_eq!(unit.data_coding, DataCoding::SmscDefault);
        assert_eq!(unit.registered_delivery, REGISTERED_DELIVERY_RECEIPT);
        assert_eq!(unit.source, src);
        assert_eq!(unit.destination, dst);
    }

    #[test]
    fn exactly_160_gsm_characters_fit_one_unit() {
        let (src, dst) = addresses();
        let units = encode_and_split(&src, &dst, &"a".repeat(160), 1).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sm_length(), 160);
    }

    #[test]
    fn one_gsm_character_over_splits_153_and_8() {
        let (src, dst) = addresses();
        let text = "a".repeat(161);
        let units = encode_and_split(&src, &dst, &text, 5).unwrap();

        let lens: Vec<usize> = units.iter().map(|u| u.sm_length() - 6).collect();
        assert_eq!(lens, vec![153, 8]);
        assert_eq!(rejoin(&units), text);
    }

    #[test]
    fn trailing_escape_counts_two_septets() {
        let (src, dst) = addresses();

        // 158 + 2 septets: still one unit.
        let text = format!("{}€", "a".repeat(158));
        let units = encode_and_split(&src, &dst, &text, 5).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].sm_length(), 160);

        // 159 + 2 septets: 161 although only 160 characters.
        let text = format!("{}€", "a".repeat(159));
        let units = encode_and_split(&src, &dst, &text, 5).unwrap();
        let lens: Vec<usize> = units.iter().map(|u| u.sm_length() - 6).collect();
        assert_eq!(lens, vec![153, 8]);
        assert_eq!(&units[1].short_message[12..14], &[0x1B, 0x65]);
        assert_eq!(rejoin(&units), text);
    }

    #[test]
    fn seventy_ucs2_characters_fit_one_unit() {
        let (src, dst) = addresses();
        let text = "Ж".repeat(70);
        let units = encode_and_split(&src, &dst, &text, 1).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].data_coding, DataCoding::Ucs2);
        assert!(!units[0].esm_class.has_udhi());
        assert_eq!(units[0].sm_length(), 140);
    }

    #[test]
    fn seventy_one_ucs2_characters_split_134_and_8() {
        let (src, dst) = addresses();
        let text = "Ж".repeat(71);
        let units = encode_and_split(&src, &dst, &text, 1).unwrap();

        let lens: Vec<usize> = units.iter().map(|u| u.sm_length() - 6).collect();
        assert_eq!(lens, vec![134, 8]);
        assert!(units.iter().all(|u| u.data_coding == DataCoding::Ucs2));
        assert_eq!(rejoin(&units), text);
    }

    #[test]
    fn two_hundred_gsm_characters_make_two_units() {
        let (src, dst) = addresses();
        let text: String = (0..200).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let units = encode_and_split(&src, &dst, &text, 42).unwrap();

        assert_eq!(units.len(), 2);
        let lens: Vec<usize> = units.iter().map(|u| u.sm_length() - 6).collect();
        assert_eq!(lens, vec![153, 47]);

        for (i, unit) in units.iter().enumerate() {
            assert!(unit.esm_class.has_udhi());
            let (info, _) = split_udh(&unit.short_message).unwrap();
            assert_eq!(info, Some(ConcatInfo::new(42, 2, (i + 1) as u8)));
        }
        assert_eq!(rejoin(&units), text);
    }

    #[test]
    fn emoji_forces_ucs2_with_smaller_units() {
        let (src, dst) = addresses();
        let text = "😀".repeat(40);
        let units = encode_and_split(&src, &dst, &text, 3).unwrap();

        assert!(units.iter().all(|u| u.data_coding == DataCoding::Ucs2));
        // 40 emoji are 160 octets: over the 140 octet single-unit capacity.
        assert_eq!(units.len(), 2);
        // 134 octets hold 33 surrogate pairs; the 34th does not fit.
        assert_eq!(units[0].sm_length() - 6, 132);
        assert_eq!(rejoin(&units), text);
    }

    #[test]
    fn escape_sequences_are_not_split() {
        let (src, dst) = addresses();
        // 152 plain septets leave one slot, too few for '€'.
        let text = format!("{}€ and the rest", "a".repeat(152));
        let units = encode_and_split(&src, &dst, &text, 0).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].sm_length() - 6, 152);
        assert_eq!(&units[1].short_message[6..8], &[0x1B, 0x65]);
        assert_eq!(rejoin(&units), text);
    }

    #[test]
    fn too_many_segments() {
        let (src, dst) = addresses();
        let text = "x".repeat(153 * 255 + 1);
        assert_eq!(
            encode_and_split(&src, &dst, &text, 0),
            Err(EncodingError::TooManySegments {
                needed: 256,
                max: MAX_SEGMENTS
            })
        );
    }

    #[test]
    fn empty_text_is_a_single_empty_unit() {
        let (src, dst) = addresses();
        let units = encode_and_split(&src, &dst, "", 0).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].short_message.is_empty());
    }
}
