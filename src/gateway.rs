// ABOUTME: send_message: encode, split and submit one outbound SMS in order
// ABOUTME: Stops at the first failed part and reports which part and destination failed

use crate::client::{SmppError, SmppTransmitter, SubmitReceipt};
use crate::datatypes::{Address, AddressError};
use crate::message::{EncodingError, encode_and_split};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

/// One part of a message was not accepted. Parts before it were submitted
/// and are not recalled; parts after it were not attempted.
#[derive(Debug, Error)]
#[error("part {part} of {total} to {destination} failed: {source}")]
pub struct SubmitError {
    /// 1-based
    pub part: usize,
    pub total: usize,
    pub destination: String,
    pub source: SmppError,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid destination: {0}")]
    Address(#[from] AddressError),

    #[error("cannot encode message: {0}")]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Sends text messages from one fixed source address.
pub struct MessageSender<T> {
    transport: T,
    source: Address,
    references: AtomicU8,
}

impl<T: SmppTransmitter> MessageSender<T> {
    pub fn new(transport: T, source: Address) -> Self {
        // Start somewhere other than 0 so a restart does not reuse the
        // references the SMSC last saw.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as u8)
            .unwrap_or_default();
        Self::with_first_reference(transport, source, seed)
    }

    pub fn with_first_reference(transport: T, source: Address, reference: u8) -> Self {
        Self {
            transport,
            source,
            references: AtomicU8::new(reference),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn source(&self) -> &Address {
        &self.source
    }

    /// Sends `text` to `destination` (TON and NPI unknown).
    ///
    /// Parts are submitted one at a time, each waiting for its response
    /// before the next is sent. Returns one receipt per part.
    pub async fn send_message(
        &self,
        destination: &str,
        text: &str,
    ) -> Result<Vec<SubmitReceipt>, GatewayError> {
        let destination = Address::unknown(destination)?;
        let reference = self.references.fetch_add(1, Ordering::Relaxed);
        let units = encode_and_split(&self.source, &destination, text, reference)?;
        let total = units.len();

        let mut receipts = Vec::with_capacity(total);
        for (i, unit) in units.iter().enumerate() {
            let part = i + 1;
            match self.transport.submit_sm(unit).await {
                Ok(receipt) => {
                    info!(
                        "submit_sm #{} (part {}/{}) to {} accepted as {}",
                        receipt.sequence_number, part, total, destination, receipt.message_id
                    );
                    receipts.push(receipt);
                }
                Err(source) => {
                    warn!("part {part}/{total} to {destination} failed: {source}");
                    return Err(SubmitError {
                        part,
                        total,
                        destination: destination.to_string(),
                        source,
                    }
                    .into());
                }
            }
        }

        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SmppResult;
    use crate::datatypes::{CommandStatus, SubmitSm};
    use crate::message::udh::split_udh;
    use std::sync::Mutex;

    /// Accepts submits until `fail_on` (1-based), which it rejects.
    #[derive(Default)]
    struct ScriptedTransport {
        fail_on: Option<usize>,
        seen: Mutex<Vec<SubmitSm>>,
    }

    impl SmppTransmitter for ScriptedTransport {
        async fn submit_sm(&self, submit: &SubmitSm) -> SmppResult<SubmitReceipt> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(submit.clone());
            let n = seen.len();
            if Some(n) == self.fail_on {
                return Err(SmppError::Protocol(CommandStatus::SubmitFailed));
            }
            Ok(SubmitReceipt {
                sequence_number: n as u32,
                message_id: format!("m{n}"),
            })
        }
    }

    fn sender(fail_on: Option<usize>) -> MessageSender<ScriptedTransport> {
        let transport = ScriptedTransport {
            fail_on,
            ..Default::default()
        };
        MessageSender::with_first_reference(transport, Address::unknown("12345").unwrap(), 7)
    }

    #[tokio::test]
    async fn single_part_message() {
        let sender = sender(None);
        let receipts = sender.send_message("447700900000", "Hello").await.unwrap();

        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].message_id, "m1");
        let seen = sender.transport().seen.lock().unwrap();
        assert_eq!(seen[0].destination.as_str(), "447700900000");
        assert_eq!(seen[0].source.as_str(), "12345");
    }

    #[tokio::test]
    async fn parts_are_submitted_in_order() {
        let sender = sender(None);
        let text = "x".repeat(400);
        let receipts = sender.send_message("447700900000", &text).await.unwrap();
        assert_eq!(receipts.len(), 3);

        let seen = sender.transport().seen.lock().unwrap();
        let indices: Vec<u8> = seen
            .iter()
            .map(|unit| split_udh(&unit.short_message).unwrap().0.unwrap().index)
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failure_on_part_two_stops_before_part_three() {
        let sender = sender(Some(2));
        let text = "y".repeat(400);

        let err = sender.send_message("447700900000", &text).await.unwrap_err();
        let err = match err {
            GatewayError::Submit(err) => err,
            other => panic!("expected a submit error, got {other:?}"),
        };
        assert_eq!(err.part, 2);
        assert_eq!(err.total, 3);
        assert_eq!(err.destination, "447700900000");
        assert!(matches!(
            err.source,
            SmppError::Protocol(CommandStatus::SubmitFailed)
        ));
        assert_eq!(sender.transport().seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn each_message_gets_a_new_reference() {
        let sender = sender(None);
        let text = "z".repeat(200);
        sender.send_message("1", &text).await.unwrap();
        sender.send_message("1", &text).await.unwrap();

        let seen = sender.transport().seen.lock().unwrap();
        let refs: Vec<u8> = seen
            .iter()
            .map(|unit| split_udh(&unit.short_message).unwrap().0.unwrap().reference)
            .collect();
        assert_eq!(refs, vec![7, 7, 8, 8]);
    }

    #[tokio::test]
    async fn bad_destination_submits_nothing() {
        let sender = sender(None);
        let err = sender
            .send_message("this destination is far too long", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Address(_)));
        assert!(sender.transport().seen.lock().unwrap().is_empty());
    }
}
