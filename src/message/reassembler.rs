// ABOUTME: Joins concatenated inbound messages keyed by their one-octet reference
// ABOUTME: The table is owned, mutex-guarded and swept of entries older than a maximum age

use crate::datatypes::{Address, DeliverSm};
use crate::message::encoding::decode_payload;
use crate::message::error::DecodeError;
use crate::message::inbound::ReceivedUnit;
use crate::message::udh::{ConcatInfo, split_udh};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Key of the reassembly table: the concatenation reference.
///
/// Only one octet travels on the wire, so at most 256 messages can be in
/// flight, and two unrelated senders that pick the same reference at the
/// same time corrupt each other's message. That is a known limitation; keying
/// on reference plus source address would be a change local to this alias and
/// [`Fragment::key`].
pub type FragmentKey = u8;

/// One decoded deliver_sm, ready for the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub concat: Option<ConcatInfo>,
    pub source: Address,
    pub destination: Address,
    pub text: String,
}

impl Fragment {
    /// Decodes the user data of a deliver_sm.
    ///
    /// Concatenation info comes from the UDH when UDHI is set, and from the
    /// SAR optional parameters otherwise (low octet of sar_msg_ref_num).
    pub fn from_deliver(deliver: &DeliverSm) -> Result<Fragment, DecodeError> {
        let payload = deliver.payload();

        let (concat, text) = if deliver.esm_class.has_udhi() {
            let (concat, body) = split_udh(payload)?;
            (concat, decode_payload(deliver.data_coding, body)?)
        } else {
            let concat = deliver.sar_info().map(|sar| {
                ConcatInfo::new(
                    sar.msg_ref_num as u8,
                    sar.total_segments,
                    sar.segment_seqnum,
                )
            });
            (concat, decode_payload(deliver.data_coding, payload)?)
        };

        Ok(Fragment {
            concat,
            source: deliver.source.clone(),
            destination: deliver.destination.clone(),
            text,
        })
    }
}

/// A whole inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedMessage {
    /// `None` for a message that arrived in one unit
    pub reference: Option<FragmentKey>,
    pub parts: u8,
    pub source: Address,
    pub destination: Address,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    #[error("undecodable fragment: {0}")]
    Decode(#[from] DecodeError),

    #[error("reference {reference}: fragment says {actual} parts, in-flight message has {expected}")]
    TotalMismatch {
        reference: FragmentKey,
        expected: u8,
        actual: u8,
    },

    #[error("reference {reference}: part {index} of {total} is not a valid position")]
    InvalidHeader {
        reference: FragmentKey,
        total: u8,
        index: u8,
    },
}

#[derive(Debug)]
struct PartialMessage {
    slots: Vec<Option<String>>,
    filled: usize,
    started_at: Instant,
    source: Address,
    destination: Address,
}

impl PartialMessage {
    fn new(total: u8, fragment: &Fragment, started_at: Instant) -> Self {
        Self {
            slots: vec![None; total as usize],
            filled: 0,
            started_at,
            source: fragment.source.clone(),
            destination: fragment.destination.clone(),
        }
    }

    fn total(&self) -> u8 {
        self.slots.len() as u8
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }
}

/// The reassembly table.
///
/// Each call holds the lock across lookup, insert, completion check and
/// removal, so a message completes exactly once however calls interleave.
#[derive(Debug)]
pub struct Reassembler {
    table: Mutex<HashMap<FragmentKey, PartialMessage>>,
    max_age: Duration,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_AGE)
    }
}

impl Reassembler {
    /// Ten minutes.
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

    pub fn new(max_age: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            max_age,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<FragmentKey, PartialMessage>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feeds one inbound unit through the table.
    ///
    /// Only deliver_sm takes part; every other unit, and delivery receipts,
    /// return `Ok(None)` without touching the table. A payload that cannot
    /// be decoded is rejected before the table is looked at.
    pub fn on_received(
        &self,
        unit: &ReceivedUnit,
    ) -> Result<Option<CompletedMessage>, ReassemblyError> {
        self.on_received_at(unit, Instant::now())
    }

    pub fn on_received_at(
        &self,
        unit: &ReceivedUnit,
        now: Instant,
    ) -> Result<Option<CompletedMessage>, ReassemblyError> {
        let ReceivedUnit::DeliveryNotification(deliver) = unit else {
            return Ok(None);
        };
        if deliver.is_delivery_receipt() {
            return Ok(None);
        }

        let fragment = Fragment::from_deliver(deliver)?;
        self.accept_at(fragment, now)
    }

    pub fn accept(&self, fragment: Fragment) -> Result<Option<CompletedMessage>, ReassemblyError> {
        self.accept_at(fragment, Instant::now())
    }

    /// Stores a decoded fragment, returning the message it completes.
    ///
    /// Fragments without concatenation info complete immediately. A fragment
    /// for a slot that is already filled is ignored.
    pub fn accept_at(
        &self,
        fragment: Fragment,
        now: Instant,
    ) -> Result<Option<CompletedMessage>, ReassemblyError> {
        let Some(concat) = fragment.concat else {
            return Ok(Some(CompletedMessage {
                reference: None,
                parts: 1,
                source: fragment.source,
                destination: fragment.destination,
                text: fragment.text,
            }));
        };

        let reference = concat.reference;
        if !concat.is_valid() {
            return Err(ReassemblyError::InvalidHeader {
                reference,
                total: concat.total,
                index: concat.index,
            });
        }

        let mut table = self.table();
        Self::evict_locked(&mut table, self.max_age, now);

        let partial = table
            .entry(reference)
            .or_insert_with(|| PartialMessage::new(concat.total, &fragment, now));

        if partial.total() != concat.total {
            return Err(ReassemblyError::TotalMismatch {
                reference,
                expected: partial.total(),
                actual: concat.total,
            });
        }

        let slot = &mut partial.slots[concat.index as usize - 1];
        if slot.is_some() {
            debug!(
                "reference {}: duplicate part {}/{} ignored",
                reference, concat.index, concat.total
            );
            return Ok(None);
        }
        *slot = Some(fragment.text);
        partial.filled += 1;

        if !partial.is_complete() {
            debug!(
                "reference {}: {}/{} parts received",
                reference, partial.filled, concat.total
            );
            return Ok(None);
        }

        let Some(PartialMessage {
            slots,
            source,
            destination,
            ..
        }) = table.remove(&reference)
        else {
            return Ok(None);
        };

        Ok(Some(CompletedMessage {
            reference: Some(reference),
            parts: concat.total,
            source,
            destination,
            text: slots.into_iter().flatten().collect(),
        }))
    }

    /// Drops entries started more than the maximum age ago; returns their keys.
    pub fn evict_expired(&self) -> Vec<FragmentKey> {
        self.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> Vec<FragmentKey> {
        Self::evict_locked(&mut self.table(), self.max_age, now)
    }

    fn evict_locked(
        table: &mut HashMap<FragmentKey, PartialMessage>,
        max_age: Duration,
        now: Instant,
    ) -> Vec<FragmentKey> {
        let mut evicted = Vec::new();
        table.retain(|&key, partial| {
            let keep = now.saturating_duration_since(partial.started_at) < max_age;
            if !keep {
                warn!(
                    "reference {}: dropping incomplete message ({}/{} parts)",
                    key,
                    partial.filled,
                    partial.total()
                );
                evicted.push(key);
            }
            keep
        });
        evicted
    }

    /// Messages with at least one part received and not yet complete.
    pub fn in_flight(&self) -> usize {
        self.table().len()
    }

    /// Runs [`Reassembler::evict_expired`] every `every` until the reassembler
    /// is dropped.
    pub fn spawn_sweeper(reassembler: &Arc<Reassembler>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(reassembler);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(reassembler) = weak.upgrade() else {
                    break;
                };
                reassembler.evict_expired();
            }
        })
    }
}
