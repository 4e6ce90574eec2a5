// ABOUTME: SMSC delivery receipts (SMPP v3.4 Appendix B) parsed for logging
// ABOUTME: Receipts are reported, never matched back to the submit that caused them

use crate::datatypes::DeliverSm;
use crate::datatypes::tlv::tags;
use crate::message::encoding::decode_payload;
use std::fmt;

/// Final or intermediate state reported in `stat:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageState {
    Enroute,
    Delivered,
    Expired,
    Deleted,
    Undeliverable,
    Accepted,
    Unknown,
    Rejected,
    Other(String),
}

impl MessageState {
    pub fn parse(stat: &str) -> MessageState {
        match stat.to_ascii_uppercase().as_str() {
            "ENROUTE" => MessageState::Enroute,
            "DELIVRD" => MessageState::Delivered,
            "EXPIRED" => MessageState::Expired,
            "DELETED" => MessageState::Deleted,
            "UNDELIV" => MessageState::Undeliverable,
            "ACCEPTD" => MessageState::Accepted,
            "UNKNOWN" => MessageState::Unknown,
            "REJECTD" => MessageState::Rejected,
            _ => MessageState::Other(stat.to_string()),
        }
    }

    /// message_state TLV values (Section 5.2.28).
    pub fn from_tlv(value: u8) -> Option<MessageState> {
        Some(match value {
            1 => MessageState::Enroute,
            2 => MessageState::Delivered,
            3 => MessageState::Expired,
            4 => MessageState::Deleted,
            5 => MessageState::Undeliverable,
            6 => MessageState::Accepted,
            7 => MessageState::Unknown,
            8 => MessageState::Rejected,
            _ => return None,
        })
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, MessageState::Enroute | MessageState::Accepted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub id: String,
    pub submitted: Option<u32>,
    pub delivered: Option<u32>,
    /// `YYMMDDhhmm`, as sent
    pub submit_date: Option<String>,
    pub done_date: Option<String>,
    pub state: Option<MessageState>,
    pub error: Option<String>,
    pub text: Option<String>,
}

const KEYS: [&str; 7] = ["id", "sub", "dlvrd", "submit date", "done date", "stat", "err"];

impl DeliveryReceipt {
    /// Parses `id:... sub:... dlvrd:... submit date:... done date:... stat:... err:... text:...`.
    ///
    /// Fields may be missing or reordered and keys are matched without
    /// regard to case. `text:` runs to the end. Returns `None` without an id.
    pub fn parse(body: &str) -> Option<DeliveryReceipt> {
        let lower = body.to_ascii_lowercase();

        let text_at = find_key(&lower, "text", lower.len());
        let head_end = text_at.map_or(body.len(), |(start, _)| start);

        let mut found: Vec<(usize, usize, &str)> = KEYS
            .iter()
            .filter_map(|&key| find_key(&lower, key, head_end).map(|(start, end)| (start, end, key)))
            .collect();
        found.sort_unstable();

        let mut receipt = DeliveryReceipt::default();
        for (i, &(_, value_start, key)) in found.iter().enumerate() {
            let value_end = found.get(i + 1).map_or(head_end, |next| next.0);
            let value = body[value_start..value_end].trim();
            match key {
                "id" => receipt.id = value.to_string(),
                "sub" => receipt.submitted = value.parse().ok(),
                "dlvrd" => receipt.delivered = value.parse().ok(),
                "submit date" => receipt.submit_date = Some(value.to_string()),
                "done date" => receipt.done_date = Some(value.to_string()),
                "stat" => receipt.state = Some(MessageState::parse(value)),
                "err" => receipt.error = Some(value.to_string()),
                _ => {}
            }
        }

        if let Some((_, value_start)) = text_at {
            receipt.text = Some(body[value_start..].trim().to_string());
        }

        if found.iter().any(|&(_, _, key)| key == "id") {
            Some(receipt)
        } else {
            None
        }
    }

    /// Reads a receipt from a deliver_sm, preferring the receipted_message_id
    /// and message_state parameters over the text when both are present.
    pub fn from_deliver(deliver: &DeliverSm) -> Option<DeliveryReceipt> {
        let body = decode_payload(deliver.data_coding, deliver.payload()).ok();
        let mut receipt = body.as_deref().and_then(DeliveryReceipt::parse);

        if let Some(id) = deliver.receipted_message_id() {
            receipt.get_or_insert_with(DeliveryReceipt::default).id = id;
        }
        if let Some(state) = deliver
            .tlv(tags::MESSAGE_STATE)
            .and_then(|tlv| tlv.as_u8())
            .and_then(MessageState::from_tlv)
        {
            if let Some(receipt) = receipt.as_mut() {
                receipt.state = Some(state);
            }
        }
        receipt
    }
}

impl fmt::Display for DeliveryReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receipt for {}", self.id)?;
        if let Some(state) = &self.state {
            write!(f, ": {state:?}")?;
        }
        if let Some(err) = &self.error {
            write!(f, " (err {err})")?;
        }
        Ok(())
    }
}

/// Byte range of `key:` found before `limit` at a word boundary: returns
/// (start of key, start of value).
fn find_key(haystack: &str, key: &str, limit: usize) -> Option<(usize, usize)> {
    let needle = format!("{key}:");
    let mut from = 0;
    while let Some(offset) = haystack[from..limit].find(&needle) {
        let start = from + offset;
        let at_boundary = start == 0 || haystack[..start].ends_with(char::is_whitespace);
        if at_boundary {
            return Some((start, start + needle.len()));
        }
        from = start + needle.len();
    }
    None
}
