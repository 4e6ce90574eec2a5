//! SMS gateway over SMPP v3.4.
//!
//! Outbound text is encoded as GSM 7-bit or UCS2, split into concatenated
//! submit_sm PDUs when it is too long for one, and submitted in order over a
//! transceiver session. Inbound deliver_sm PDUs are acknowledged, decoded and
//! reassembled; delivery receipts are parsed and logged.
//!
//! # Example
//!
//! ```rust,no_run
//! use smpp_gateway::client::Session;
//! use smpp_gateway::config::GatewayConfig;
//! use smpp_gateway::gateway::MessageSender;
//! use smpp_gateway::message::{InboundDispatcher, LoggingSink, Reassembler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> smpp_gateway::Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!
//!     let reassembler = Arc::new(Reassembler::new(config.reassembly_max_age));
//!     let _sweeper = Reassembler::spawn_sweeper(&reassembler, config.sweep_interval);
//!
//!     let session = Session::builder(config.credentials)
//!         .settings(config.settings)
//!         .handler(Arc::new(InboundDispatcher::new(reassembler, LoggingSink)))
//!         .connect(config.smsc)
//!         .await?;
//!
//!     let sender = MessageSender::new(session.clone(), config.source);
//!     sender.send_message("447700900000", "Hello!").await?;
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod datatypes;
pub mod gateway;
pub mod message;

mod macros;

#[cfg(test)]
mod tests;

pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader, PduRegistry};

pub use client::{BindCredentials, Session, SmppError, SmppResult, SmppTransmitter};
pub use gateway::{GatewayError, MessageSender, SubmitError};

/// Boxed error for application code such as the binary.
///
/// Library code returns the typed error of its layer; this is only for
/// callers that mix several of them.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
