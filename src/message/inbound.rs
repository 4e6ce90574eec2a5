// ABOUTME: Inbound dispatch: every frame from the session becomes a ReceivedUnit
// ABOUTME: Only deliveries reach the reassembler; each other kind goes to its own collaborator

use crate::client::InboundHandler;
use crate::codec::Frame;
use crate::datatypes::{
    CommandId, DataSm, DeliverSm, EnquireLinkResponse, GenericNack, SubmitSmResponse,
};
use crate::message::encoding::decode_payload;
use crate::message::reassembler::{CompletedMessage, Reassembler, ReassemblyError};
use crate::message::receipt::DeliveryReceipt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An inbound PDU as the gateway sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedUnit {
    SubmitResponse(SubmitSmResponse),
    /// deliver_sm: a mobile-originated message or part of one, or a receipt
    DeliveryNotification(Box<DeliverSm>),
    GenericNack(GenericNack),
    EnquireLinkResponse(EnquireLinkResponse),
    DataNotification(Box<DataSm>),
    /// Anything the gateway does not act on
    Other(CommandId),
}

impl ReceivedUnit {
    pub fn from_frame(frame: &Frame) -> ReceivedUnit {
        match frame {
            Frame::SubmitSmResp(resp) => ReceivedUnit::SubmitResponse(resp.clone()),
            Frame::DeliverSm(deliver) => ReceivedUnit::DeliveryNotification(deliver.clone()),
            Frame::GenericNack(nack) => ReceivedUnit::GenericNack(nack.clone()),
            Frame::EnquireLinkResp(resp) => ReceivedUnit::EnquireLinkResponse(resp.clone()),
            Frame::DataSm(data) => ReceivedUnit::DataNotification(data.clone()),
            other => ReceivedUnit::Other(other.command_id()),
        }
    }
}

/// Where finished inbound messages and receipts go.
pub trait MessageSink: Send + Sync {
    fn on_message(&self, message: CompletedMessage);

    fn on_receipt(&self, _receipt: DeliveryReceipt) {}
}

/// Logs messages and receipts at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl MessageSink for LoggingSink {
    fn on_message(&self, message: CompletedMessage) {
        match message.reference {
            Some(reference) => info!(
                "message from {} ({} parts, ref {}): {}",
                message.source, message.parts, reference, message.text
            ),
            None => info!("message from {}: {}", message.source, message.text),
        }
    }

    fn on_receipt(&self, receipt: DeliveryReceipt) {
        match &receipt.state {
            Some(state) if !state.is_final() => debug!("interim {receipt}"),
            _ => info!("{receipt}"),
        }
    }
}

/// Routes each [`ReceivedUnit`] to the collaborator for its kind.
pub struct InboundDispatcher<S = LoggingSink> {
    reassembler: Arc<Reassembler>,
    sink: S,
}

impl<S: MessageSink> InboundDispatcher<S> {
    pub fn new(reassembler: Arc<Reassembler>, sink: S) -> Self {
        Self { reassembler, sink }
    }

    pub fn reassembler(&self) -> &Arc<Reassembler> {
        &self.reassembler
    }

    pub fn dispatch(&self, unit: ReceivedUnit) {
        match &unit {
            ReceivedUnit::SubmitResponse(resp) => info!(
                "submit_sm_resp #{} message_id {:?} status {:?}",
                resp.sequence_number, resp.message_id, resp.command_status
            ),
            ReceivedUnit::GenericNack(nack) => warn!(
                "generic_nack #{} status {:?}",
                nack.sequence_number, nack.command_status
            ),
            ReceivedUnit::EnquireLinkResponse(resp) => {
                debug!("enquire_link_resp #{}", resp.sequence_number)
            }
            ReceivedUnit::DataNotification(data) => {
                let text = data
                    .message_payload()
                    .and_then(|payload| decode_payload(data.data_coding, payload).ok());
                info!(
                    "data_sm from {} to {}: {:?}",
                    data.source, data.destination, text
                );
            }
            ReceivedUnit::DeliveryNotification(deliver) if deliver.is_delivery_receipt() => {
                match DeliveryReceipt::from_deliver(deliver) {
                    Some(receipt) => self.sink.on_receipt(receipt),
                    None => warn!("unparseable delivery receipt from {}", deliver.source),
                }
            }
            ReceivedUnit::DeliveryNotification(_) => match self.reassembler.on_received(&unit) {
                Ok(Some(message)) => self.sink.on_message(message),
                Ok(None) => {}
                Err(ReassemblyError::Decode(e)) => warn!("dropping deliver_sm: {e}"),
                Err(e) => warn!("deliver_sm not reassembled: {e}"),
            },
            ReceivedUnit::Other(command_id) => debug!("ignoring {command_id:?}"),
        }
    }
}

impl<S: MessageSink> InboundHandler for InboundDispatcher<S> {
    fn on_frame(&self, frame: &Frame) {
        self.dispatch(ReceivedUnit::from_frame(frame));
    }
}
