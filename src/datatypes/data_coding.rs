// ABOUTME: SMPP data_coding scheme (Section 5.2.19) mapped to a typed enum
// ABOUTME: Only the alphabets the gateway encodes or decodes get dedicated variants

/// Message class carried in the 0xF0..0xF3 GSM coding group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageClass {
    /// Class 0, displayed immediately
    Flash,
    MobileEquipment,
    SimSpecific,
    TerminalEquipment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DataCoding {
    /// SMSC default alphabet, which this gateway treats as GSM 03.38
    #[default]
    SmscDefault,
    /// IA5 (CCITT T.50)/ASCII
    Ascii,
    /// Octet unspecified (0x02 or 0x04)
    Binary,
    /// Latin-1 (ISO-8859-1)
    Latin1,
    /// UCS2 (ISO/IEC-10646), carried as UTF-16BE
    Ucs2,
    /// GSM 7-bit default alphabet with an explicit message class
    Gsm7BitWithClass(MessageClass),
    /// Anything else
    Custom(u8),
}

impl DataCoding {
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x00 => DataCoding::SmscDefault,
            0x01 => DataCoding::Ascii,
            0x02 | 0x04 => DataCoding::Binary,
            0x03 => DataCoding::Latin1,
            0x08 => DataCoding::Ucs2,
            0xF0 => DataCoding::Gsm7BitWithClass(MessageClass::Flash),
            0xF1 => DataCoding::Gsm7BitWithClass(MessageClass::MobileEquipment),
            0xF2 => DataCoding::Gsm7BitWithClass(MessageClass::SimSpecific),
            0xF3 => DataCoding::Gsm7BitWithClass(MessageClass::TerminalEquipment),
            _ => DataCoding::Custom(value),
        }
    }

    pub fn to_byte(&self) -> u8 {
        match self {
            DataCoding::SmscDefault => 0x00,
            DataCoding::Ascii => 0x01,
            DataCoding::Binary => 0x04,
            DataCoding::Latin1 => 0x03,
            DataCoding::Ucs2 => 0x08,
            DataCoding::Gsm7BitWithClass(class) => {
                0xF0 | match class {
                    MessageClass::Flash => 0,
                    MessageClass::MobileEquipment => 1,
                    MessageClass::SimSpecific => 2,
                    MessageClass::TerminalEquipment => 3,
                }
            }
            DataCoding::Custom(value) => *value,
        }
    }
}

impl From<u8> for DataCoding {
    fn from(value: u8) -> Self {
        DataCoding::from_byte(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(DataCoding::from_byte(0x00), DataCoding::SmscDefault);
        assert_eq!(DataCoding::from_byte(0x08), DataCoding::Ucs2);
        assert_eq!(DataCoding::Ucs2.to_byte(), 0x08);
        assert_eq!(
            DataCoding::from_byte(0xF2),
            DataCoding::Gsm7BitWithClass(MessageClass::SimSpecific)
        );
        assert_eq!(DataCoding::Gsm7BitWithClass(MessageClass::SimSpecific).to_byte(), 0xF2);
    }

    #[test]
    fn unknown_values_survive() {
        assert_eq!(DataCoding::from_byte(0x11), DataCoding::Custom(0x11));
        assert_eq!(DataCoding::Custom(0x11).to_byte(), 0x11);
    }
}
