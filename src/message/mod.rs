//! Message layer: encoding, segmentation and reassembly of SMS text.
//!
//! Outbound text goes through [`encode_and_split`], which picks GSM 7-bit or
//! UCS2 and cuts long text into concatenated units. Inbound frames become
//! [`ReceivedUnit`]s; deliveries are joined by the [`Reassembler`].

pub mod encoding;
pub mod error;
pub mod gsm7;
pub mod inbound;
pub mod reassembler;
pub mod receipt;
pub mod splitter;
pub mod udh;

pub use encoding::{Encoding, decode_payload};
pub use error::{DecodeError, EncodingError};
pub use inbound::{InboundDispatcher, LoggingSink, MessageSink, ReceivedUnit};
pub use reassembler::{CompletedMessage, Fragment, FragmentKey, Reassembler, ReassemblyError};
pub use receipt::{DeliveryReceipt, MessageState};
pub use splitter::{EncodedMessage, MAX_SEGMENTS, encode_and_split, encode_message};
pub use udh::ConcatInfo;
