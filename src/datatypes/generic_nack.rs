use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_header_only_pdu;

/// generic_nack: negative acknowledgement for a PDU the peer could not
/// process at all (Section 4.3). The sequence number echoes the offending
/// PDU, or is 0 when it could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericNack {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

impl GenericNack {
    pub fn new(command_status: CommandStatus, sequence_number: u32) -> Self {
        Self {
            command_status,
            sequence_number,
        }
    }

    pub fn invalid_command_id(sequence_number: u32) -> Self {
        Self::new(CommandStatus::InvalidCommandId, sequence_number)
    }

    pub fn invalid_command_length(sequence_number: u32) -> Self {
        Self::new(CommandStatus::InvalidCommandLength, sequence_number)
    }
}

impl_header_only_pdu!(GenericNack, CommandId::GenericNack);
