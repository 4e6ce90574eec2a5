// ABOUTME: esm_class field (Section 5.2.12): messaging mode, message type and GSM feature bits
// ABOUTME: Kept as a thin newtype so unknown combinations pass through unchanged

use std::fmt;

const MESSAGE_TYPE_MASK: u8 = 0b0011_1100;
const UDHI: u8 = 0b0100_0000;
const REPLY_PATH: u8 = 0b1000_0000;

/// Message type bits (2..5) as seen on deliver_sm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Default,
    SmscDeliveryReceipt,
    SmeDeliveryAck,
    SmeManualAck,
    ConversationAbort,
    IntermediateNotification,
    Other(u8),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EsmClass(u8);

impl EsmClass {
    pub fn from_byte(value: u8) -> Self {
        EsmClass(value)
    }

    pub fn to_byte(&self) -> u8 {
        self.0
    }

    /// Sets the User Data Header Indicator: short_message starts with a UDH.
    pub fn with_udhi(self) -> Self {
        EsmClass(self.0 | UDHI)
    }

    pub fn has_udhi(&self) -> bool {
        self.0 & UDHI != 0
    }

    pub fn has_reply_path(&self) -> bool {
        self.0 & REPLY_PATH != 0
    }

    pub fn message_type(&self) -> MessageType {
        match self.0 & MESSAGE_TYPE_MASK {
            0x00 => MessageType::Default,
            0x04 => MessageType::SmscDeliveryReceipt,
            0x08 => MessageType::SmeDeliveryAck,
            0x10 => MessageType::SmeManualAck,
            0x18 => MessageType::ConversationAbort,
            0x20 => MessageType::IntermediateNotification,
            other => MessageType::Other(other),
        }
    }

    pub fn is_delivery_receipt(&self) -> bool {
        self.message_type() == MessageType::SmscDeliveryReceipt
    }
}

impl fmt::Debug for EsmClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EsmClass")
            .field("raw", &format_args!("{:#04x}", self.0))
            .field("message_type", &self.message_type())
            .field("udhi", &self.has_udhi())
            .finish()
    }
}

impl From<u8> for EsmClass {
    fn from(value: u8) -> Self {
        EsmClass(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udhi_bit() {
        let esm = EsmClass::default().with_udhi();
        assert_eq!(esm.to_byte(), 0x40);
        assert!(esm.has_udhi());
        assert_eq!(esm.message_type(), MessageType::Default);
    }

    #[test]
    fn delivery_receipt_type() {
        assert!(EsmClass::from_byte(0x04).is_delivery_receipt());
        assert!(!EsmClass::from_byte(0x40).is_delivery_receipt());
        assert_eq!(EsmClass::from_byte(0x20).message_type(), MessageType::IntermediateNotification);
    }
}
