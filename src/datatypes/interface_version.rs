use num_enum::TryFromPrimitive;

/// SMPP interface_version values sent in bind requests.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterfaceVersion {
    SmppV33 = 0x33,
    SmppV34 = 0x34,
    SmppV50 = 0x50,
}

impl Default for InterfaceVersion {
    fn default() -> Self {
        InterfaceVersion::SmppV34
    }
}
