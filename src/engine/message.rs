// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message lifecycle types threaded through the pipeline.
//!
//! * [`InputMessage`] wraps a raw message from the source and carries its
//!   completion gate. It is shared (`Arc`) between the processing chain and
//!   the commit queue.
//! * [`PendingAck`] is the processing chain's obligation to ack its record.
//!   It cannot be cloned, `ack` consumes it, and dropping it unacked acks
//!   from `Drop`, so every record is acked exactly once.
//! * [`Envelope`] carries a record's pending ack plus the value produced by
//!   the latest stage through Extraction, Transformation and Output.
//! * [`OutputMessage`] is what a transformer hands to the output.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::gate::CompletionGate;
use crate::engine::pool::Poolable;
use crate::observability::messages::{stage::AckedOnDrop, StructuredLog};

/// A record pulled from the source.
#[derive(Debug)]
pub struct InputMessage<M> {
    raw: Option<M>,
    sequence: u64,
    gate: CompletionGate,
}

impl<M> InputMessage<M> {
    /// A standalone record with a closed gate, outside of any pool.
    pub fn new(raw: M, sequence: u64) -> Self {
        let mut message = Self::default();
        message.arm(raw, sequence);
        message
    }

    /// The raw message as returned by the source.
    ///
    /// Always `Some` while the record is in flight; only records parked in
    /// the pool are empty.
    pub fn raw(&self) -> Option<&M> {
        self.raw.as_ref()
    }

    /// Arrival order, starting at 1 for the first record ingested.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether processing of this record has terminated.
    pub fn is_acked(&self) -> bool {
        self.gate.is_open()
    }

    pub(crate) fn arm(&mut self, raw: M, sequence: u64) {
        self.raw = Some(raw);
        self.sequence = sequence;
        self.gate.close();
    }

    pub(crate) fn ack(&self) -> bool {
        self.gate.open()
    }

    pub(crate) async fn wait_acked(&self) {
        self.gate.wait().await
    }
}

impl<M> Default for InputMessage<M> {
    fn default() -> Self {
        Self {
            raw: None,
            sequence: 0,
            gate: CompletionGate::new_open(),
        }
    }
}

impl<M> Poolable for Arc<InputMessage<M>> {
    fn reset(&mut self) -> bool {
        // Reusable only once every other holder has let go.
        match Arc::get_mut(self) {
            Some(message) => {
                message.raw = None;
                message.sequence = 0;
                true
            }
            None => false,
        }
    }
}

/// The obligation to ack one record.
#[derive(Debug)]
pub struct PendingAck<M> {
    record: Arc<InputMessage<M>>,
    acked: bool,
}

impl<M> PendingAck<M> {
    pub(crate) fn new(record: Arc<InputMessage<M>>) -> Self {
        Self {
            record,
            acked: false,
        }
    }

    pub fn record(&self) -> &Arc<InputMessage<M>> {
        &self.record
    }

    /// Open the record's gate, making it eligible for commit.
    pub fn ack(mut self) {
        self.acked = true;
        self.record.ack();
    }
}

impl<M> Drop for PendingAck<M> {
    fn drop(&mut self) {
        if !self.acked {
            self.acked = true;
            self.record.ack();
            AckedOnDrop {
                sequence: self.record.sequence(),
            }
            .log();
        }
    }
}

/// Result of a transformation: a payload plus propagation headers.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputMessage<P> {
    pub payload: P,
    pub headers: BTreeMap<String, String>,
}

impl<P> OutputMessage<P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Per-record container moved from stage to stage.
///
/// Holds at most one of the extracted value and the output message; each is
/// cleared as soon as the next stage supersedes it.
#[derive(Debug)]
pub struct Envelope<M, V, P> {
    ack: Option<PendingAck<M>>,
    extracted: Option<V>,
    output: Option<OutputMessage<P>>,
}

impl<M, V, P> Envelope<M, V, P> {
    pub(crate) fn load(&mut self, ack: PendingAck<M>, extracted: V) {
        self.ack = Some(ack);
        self.extracted = Some(extracted);
        self.output = None;
    }

    pub fn sequence(&self) -> u64 {
        self.ack.as_ref().map_or(0, |ack| ack.record().sequence())
    }

    pub(crate) fn take_extracted(&mut self) -> Option<V> {
        self.extracted.take()
    }

    /// Replace the extracted value with the transformer's output.
    pub(crate) fn supersede(&mut self, output: OutputMessage<P>) {
        self.extracted = None;
        self.output = Some(output);
    }

    pub(crate) fn take_output(&mut self) -> Option<OutputMessage<P>> {
        self.output.take()
    }

    pub(crate) fn take_ack(&mut self) -> Option<PendingAck<M>> {
        self.ack.take()
    }
}

impl<M, V, P> Default for Envelope<M, V, P> {
    fn default() -> Self {
        Self {
            ack: None,
            extracted: None,
            output: None,
        }
    }
}

impl<M, V, P> Poolable for Box<Envelope<M, V, P>> {
    fn reset(&mut self) -> bool {
        // An ack still present here is released by its own Drop.
        self.ack = None;
        self.extracted = None;
        self.output = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pool::Pool;

    #[test]
    fn new_message_is_in_flight() {
        let message = InputMessage::new("raw", 3);
        assert_eq!(message.raw(), Some(&"raw"));
        assert_eq!(message.sequence(), 3);
        assert!(!message.is_acked());
    }

    #[test]
    fn pending_ack_opens_gate_once() {
        let record = Arc::new(InputMessage::new(1u32, 1));
        let pending = PendingAck::new(record.clone());

        pending.ack();
        assert!(record.is_acked());
    }

    #[test]
    fn dropped_pending_ack_opens_gate() {
        let record = Arc::new(InputMessage::new(1u32, 1));
        drop(PendingAck::new(record.clone()));
        assert!(record.is_acked());
    }

    #[test]
    fn pending_ack_dropped_during_panic_opens_gate() {
        let record = Arc::new(InputMessage::new(1u32, 1));
        let pending = PendingAck::new(record.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _pending = pending;
            panic!("worker fault");
        }));

        assert!(result.is_err());
        assert!(record.is_acked());
    }

    #[test]
    fn shared_record_is_not_recycled() {
        let pool: Pool<Arc<InputMessage<String>>> = Pool::new(4);
        let mut record = pool.acquire();
        Arc::get_mut(&mut record).unwrap().arm("a".to_string(), 1);
        let other_holder = record.clone();

        pool.release(record);
        assert_eq!(pool.idle(), 0);
        assert_eq!(other_holder.raw().map(String::as_str), Some("a"));
    }

    #[test]
    fn exclusive_record_is_cleared_and_recycled() {
        let pool: Pool<Arc<InputMessage<String>>> = Pool::new(4);
        let mut record = pool.acquire();
        Arc::get_mut(&mut record).unwrap().arm("a".to_string(), 1);
        record.ack();

        pool.release(record);
        let recycled = pool.acquire();
        assert!(recycled.raw().is_none());
        assert_eq!(recycled.sequence(), 0);
    }

    #[test]
    fn envelope_holds_one_value_at_a_time() {
        let record = Arc::new(InputMessage::new("raw", 9));
        let mut envelope: Envelope<&str, u32, String> = Envelope::default();

        envelope.load(PendingAck::new(record.clone()), 42);
        assert_eq!(envelope.sequence(), 9);

        envelope.supersede(OutputMessage::new("out".to_string()).with_header("trace-id", "abc"));
        assert!(envelope.take_extracted().is_none());
        let output = envelope.take_output().unwrap();
        assert_eq!(output.payload, "out");
        assert_eq!(output.headers.get("trace-id").map(String::as_str), Some("abc"));
        assert!(envelope.take_output().is_none());

        envelope.take_ack().unwrap().ack();
        assert!(record.is_acked());
    }

    #[test]
    fn envelope_reset_releases_pending_ack() {
        let record = Arc::new(InputMessage::new("raw", 1));
        let pool: Pool<Box<Envelope<&str, u32, u32>>> = Pool::new(2);

        let mut envelope = pool.acquire();
        envelope.load(PendingAck::new(record.clone()), 1);
        pool.release(envelope);

        assert!(record.is_acked());
        let mut envelope = pool.acquire();
        assert!(envelope.take_extracted().is_none());
        assert_eq!(envelope.sequence(), 0);
    }
}
