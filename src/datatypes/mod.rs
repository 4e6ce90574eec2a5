// ABOUTME: SMPP v3.4 field types and the PDUs a transceiver gateway exchanges
// ABOUTME: Each PDU implements the codec's Encodable/Decodable traits

mod address;
mod bind_transceiver;
mod command_id;
mod command_status;
mod data_coding;
mod data_sm;
mod deliver_sm;
mod enquire_link;
mod esm_class;
mod generic_nack;
mod interface_version;
mod numeric_plan_indicator;
mod submit_sm;
pub mod tlv;
mod type_of_number;
mod unbind;

pub use address::{Address, AddressError, MAX_ADDRESS_LENGTH};
pub use bind_transceiver::{BindTransceiver, BindTransceiverBuilder, BindTransceiverResponse};
pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use data_coding::{DataCoding, MessageClass};
pub use data_sm::{DataSm, DataSmResponse};
pub use deliver_sm::{DeliverSm, DeliverSmBuilder, DeliverSmResponse, SarInfo};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use esm_class::{EsmClass, MessageType};
pub use generic_nack::GenericNack;
pub use interface_version::InterfaceVersion;
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use submit_sm::{
    MAX_SHORT_MESSAGE_LENGTH, REGISTERED_DELIVERY_RECEIPT, SubmitSm, SubmitSmResponse,
};
pub use tlv::Tlv;
pub use type_of_number::TypeOfNumber;
pub use unbind::{Unbind, UnbindResponse};
