// ABOUTME: Seams between the SMPP session and the gateway logic built on top of it
// ABOUTME: Native async fn in traits; no async_trait dependency

use crate::client::error::{SmppError, SmppResult};
use crate::codec::Frame;
use crate::datatypes::SubmitSm;

/// What the SMSC handed back for one accepted submit_sm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub sequence_number: u32,
    pub message_id: String,
}

/// Anything that can submit a short message and wait for its response.
///
/// [`Session`](crate::client::Session) is the production implementation;
/// tests substitute their own to script failures.
pub trait SmppTransmitter {
    /// Assigns a sequence number, sends the PDU and waits for submit_sm_resp.
    async fn submit_sm(&self, submit: &SubmitSm) -> SmppResult<SubmitReceipt>;
}

/// Receives every inbound frame the session reads, after the session has
/// sent any protocol-level acknowledgement.
///
/// Called from the session's reader task, so implementations must not block.
pub trait InboundHandler: Send + Sync {
    fn on_frame(&self, frame: &Frame);
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called
    Requested,
    /// The SMSC sent unbind
    UnboundByPeer,
    /// The link failed and rebinding is off or gave up
    LinkLost,
}

/// Lifecycle notifications. Every method defaults to doing nothing.
pub trait SessionEvents: Send + Sync {
    /// Reading from the link failed; the PDU or the link was lost.
    fn on_receive_error(&self, _error: &SmppError) {}

    /// A submit_sm failed after it was handed to the session.
    fn on_submit_error(&self, _sequence_number: u32, _error: &SmppError) {}

    /// A reconnect or rebind attempt failed; another will follow.
    fn on_rebind_error(&self, _error: &SmppError) {}

    /// The session is closed for good.
    fn on_closed(&self, _reason: CloseReason) {}
}

/// Logs every lifecycle event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEvents;

impl SessionEvents for LoggingEvents {
    fn on_receive_error(&self, error: &SmppError) {
        tracing::warn!("receive error: {error}");
    }

    fn on_submit_error(&self, sequence_number: u32, error: &SmppError) {
        tracing::warn!("submit_sm #{sequence_number} failed: {error}");
    }

    fn on_rebind_error(&self, error: &SmppError) {
        tracing::warn!("rebind failed: {error}");
    }

    fn on_closed(&self, reason: CloseReason) {
        tracing::info!("session closed: {reason:?}");
    }
}
