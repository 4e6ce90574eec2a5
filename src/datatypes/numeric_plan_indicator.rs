use num_enum::TryFromPrimitive;

/// Numbering Plan Indicator (NPI), SMPP v3.4 Section 5.2.6.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NumericPlanIndicator {
    Unknown = 0x00,
    /// E.163/E.164
    Isdn = 0x01,
    /// X.121
    Data = 0x03,
    /// F.69
    Telex = 0x04,
    LandMobile = 0x06,
    National = 0x08,
    Private = 0x09,
    Ermes = 0x0A,
    Internet = 0x0E,
    WapClientId = 0x12,
}

impl Default for NumericPlanIndicator {
    fn default() -> Self {
        NumericPlanIndicator::Unknown
    }
}
