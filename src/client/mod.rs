// ABOUTME: SMPP client layer: one transceiver session plus the traits the gateway builds on
// ABOUTME: Exports the session, its builder, error types and keep-alive support

//! SMPP client
//!
//! A [`Session`] binds once as a transceiver and multiplexes everything over
//! that link: submits from any number of tasks, deliveries from the SMSC, and
//! keep-alive probes.
//!
//! * **Native async traits** - [`SmppTransmitter`] uses async fn in traits
//! * **Correlation** - responses are matched to requests by sequence number
//! * **Keep-alive** - enquire_link every 5 seconds by default
//! * **Rebind** - a TCP session reconnects and rebinds after losing its link
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smpp_gateway::client::{BindCredentials, Session, SmppTransmitter};
//! use smpp_gateway::datatypes::{Address, DataCoding, EsmClass, SubmitSm};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = BindCredentials::transceiver("system_id", "password");
//! let session = Session::builder(credentials).connect("localhost:2775").await?;
//!
//! let submit = SubmitSm::new(
//!     Address::unknown("1234")?,
//!     Address::unknown("5678")?,
//!     DataCoding::SmscDefault,
//!     EsmClass::default(),
//!     bytes::Bytes::from_static(b"Hello"),
//! );
//! let receipt = session.submit_sm(&submit).await?;
//! println!("accepted as {}", receipt.message_id);
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod keepalive;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{SmppError, SmppResult};
pub use keepalive::{KeepAliveConfig, KeepAliveManager, KeepAliveStatus};
pub use session::{Session, SessionBuilder};
pub use traits::{
    CloseReason, InboundHandler, LoggingEvents, SessionEvents, SmppTransmitter, SubmitReceipt,
};
pub use types::{BindCredentials, SessionSettings};
